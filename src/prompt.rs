use std::io::{self, BufRead, Write};
use thiserror::Error;

pub const MIN_RADIUS_KM: f64 = 1.0;
pub const MAX_RADIUS_KM: f64 = 50.0;

#[derive(Debug, Error, PartialEq)]
pub enum RadiusError {
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("radius must be between 1 and 50 km, got {0}")]
    OutOfRange(f64),
}

/// Parses a radius typed in kilometres into meters. A decimal comma is
/// accepted.
pub fn parse_radius_km(input: &str) -> Result<u32, RadiusError> {
    let trimmed = input.trim();
    let km: f64 = trimmed
        .replace(',', ".")
        .parse()
        .map_err(|_| RadiusError::NotANumber(trimmed.to_string()))?;

    if !km.is_finite() || !(MIN_RADIUS_KM..=MAX_RADIUS_KM).contains(&km) {
        return Err(RadiusError::OutOfRange(km));
    }

    Ok((km * 1000.0).round() as u32)
}

fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Asks for a place name. An empty line or end of input ends the session.
pub fn prompt_place<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<Option<String>> {
    write!(output, "Podaj nazwę miejscowości (Enter kończy): ")?;
    output.flush()?;

    Ok(read_line(input)?.filter(|place| !place.is_empty()))
}

/// Asks for a radius until a valid one is typed. `None` at end of input.
pub fn prompt_radius<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<Option<u32>> {
    loop {
        write!(
            output,
            "Podaj promień w km ({}-{}): ",
            MIN_RADIUS_KM, MAX_RADIUS_KM
        )?;
        output.flush()?;

        let Some(line) = read_line(input)? else {
            return Ok(None);
        };

        match parse_radius_km(&line) {
            Ok(radius_m) => return Ok(Some(radius_m)),
            Err(e) => writeln!(output, "Nieprawidłowy promień: {}", e)?,
        }
    }
}
