use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FirmyError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Workbook write error: {0}")]
    WorkbookWrite(#[from] rust_xlsxwriter::XlsxError),
    #[error("Workbook read error: {0}")]
    WorkbookRead(#[from] calamine::XlsxError),
    #[error("Scraping error: {0}")]
    Scraping(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FirmyError>;
