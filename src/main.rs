mod prompt;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use csv::Writer;
use firmy_core::config::{DEFAULT_CATEGORIES_PATH, DEFAULT_CONFIG_PATH};
use firmy_core::workbook::Column;
use firmy_core::{
    create_record_table, Annotation, CandidatePolicy, CollectionSummary, Config, Record,
    SheetLayout, Spreadsheet, Store,
};
use firmy_scrapers::{
    harvest, Collector, CollectorFactory, CollectorSettings, CollectorType, KeywordClassifier,
    SearchScope,
};
use indicatif::{ProgressBar, ProgressStyle};
use prompt::{parse_radius_km, prompt_place, prompt_radius};
use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (-c, --config)
    #[arg(short = 'c', long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Spreadsheet the results are merged into (-o, --output)
    #[arg(short = 'o', long, global = true)]
    output: Option<PathBuf>,

    /// How records are spread over sheets
    #[arg(long, global = true, value_enum)]
    layout: Option<SheetLayout>,

    /// Which missing fields disqualify a company; defaults to the source's own policy
    #[arg(long, global = true, value_enum)]
    policy: Option<CandidatePolicy>,

    /// Score company websites against the keyword lists
    #[arg(long, global = true)]
    classify: bool,

    /// Google API key, overrides API_KEY from the configuration
    #[arg(long, global = true, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Append plain log lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search Google Places around a place
    #[command(long_about = "Search Google Places for every configured category around a place. Without --place, asks for places and radii until an empty place is entered.")]
    Places(PlacesCommand),

    /// Sweep a business directory
    #[command(long_about = "Sweep a business directory for every configured category in every configured region.")]
    Directory(DirectoryCommand),

    /// List companies stored in the spreadsheet
    List(ListCommand),

    /// Export the spreadsheet to CSV
    Export(ExportCommand),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDirectory {
    BazaFirm,
    Panoramafirm,
    Olx,
}

impl From<CliDirectory> for CollectorType {
    fn from(value: CliDirectory) -> Self {
        match value {
            CliDirectory::BazaFirm => CollectorType::BazaFirm,
            CliDirectory::Panoramafirm => CollectorType::PanoramaFirm,
            CliDirectory::Olx => CollectorType::Olx,
        }
    }
}

#[derive(Parser)]
struct PlacesCommand {
    /// Place to search around (-p, --place)
    #[arg(short = 'p', long)]
    place: Option<String>,

    /// Search radius in kilometres, 1 to 50 (-r, --radius-km)
    #[arg(short = 'r', long = "radius-km", value_parser = parse_radius_km, requires = "place")]
    radius_m: Option<u32>,
}

#[derive(Parser)]
struct DirectoryCommand {
    /// The directory to sweep (-x, --source)
    #[arg(short = 'x', long, value_enum)]
    source: CliDirectory,
}

#[derive(Parser)]
struct ListCommand {
    /// Show only companies marked as rejected
    #[arg(long)]
    rejected: bool,

    /// Maximum number of companies to display (-l, --limit)
    #[arg(short = 'l', long, default_value_t = 20)]
    limit: usize,
}

#[derive(Parser)]
struct ExportCommand {
    /// CSV file to write
    #[arg(default_value = "firmy.csv")]
    path: PathBuf,
}

/// Settings shared by the collection commands.
struct Session {
    config: Config,
    spreadsheet: Spreadsheet,
    policy: Option<CandidatePolicy>,
    classify: bool,
}

impl Session {
    fn classifier(&self) -> Result<Option<KeywordClassifier>> {
        if !self.classify {
            return Ok(None);
        }
        let classifier =
            KeywordClassifier::new(self.config.keywords.as_ref(), self.config.concurrency())?;
        Ok(Some(classifier))
    }

    /// Collects, merges into the spreadsheet and reports the counters.
    async fn run(&self, collector: &dyn Collector, scope: &SearchScope) -> Result<CollectionSummary> {
        let policy = self.policy.unwrap_or_else(|| collector.default_policy());
        let classifier = self.classifier()?;
        let day = Local::now().date_naive();

        let spinner = progress_spinner(format!("{} {}", collector.name(), scope));
        let result = harvest(collector, scope, policy, classifier.as_ref(), day).await;
        spinner.finish_and_clear();
        let found = result.found;
        let unique = result.records.len();

        let outcome = self
            .spreadsheet
            .persist(result.records)
            .with_context(|| format!("cannot save {}", self.spreadsheet.path().display()))?;
        info!(
            "{} now holds {} companies",
            self.spreadsheet.path().display(),
            outcome.store.len()
        );

        Ok(CollectionSummary {
            found,
            unique,
            added: outcome.added,
        })
    }

    async fn run_area(&self, collector: &dyn Collector, place: String, radius_m: u32) -> Result<()> {
        let scope = SearchScope::Area {
            place,
            radius_m,
            categories: self.config.require_categories()?.to_vec(),
        };
        let summary = self.run(collector, &scope).await?;
        println!("{}: {}", scope, summary);
        Ok(())
    }

    /// Searches one area; a failed search or save is logged and the
    /// session goes on.
    async fn search_area(&self, collector: &dyn Collector, place: String, radius_m: u32) -> bool {
        match self.run_area(collector, place, radius_m).await {
            Ok(()) => true,
            Err(e) => {
                error!("Search failed: {:#}", e);
                false
            }
        }
    }

    /// Asks for places and radii until an empty place is entered. Returns
    /// how many searches completed.
    async fn interactive<R: BufRead, W: Write>(
        &self,
        collector: &dyn Collector,
        input: &mut R,
        output: &mut W,
    ) -> Result<usize> {
        let mut completed = 0;
        while let Some(place) = prompt_place(input, output)? {
            let Some(radius_m) = prompt_radius(input, output)? else {
                break;
            };
            if self.search_area(collector, place, radius_m).await {
                completed += 1;
            }
        }
        Ok(completed)
    }
}

fn progress_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{msg} {spinner:.green} [{elapsed_precise}]") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_or_default(&cli.config)?
        .with_categories_file(DEFAULT_CATEGORIES_PATH)?;

    if let Some(key) = cli.api_key.as_deref().filter(|key| !key.trim().is_empty()) {
        config.api_key = Some(key.to_string());
    }
    if let Some(output) = &cli.output {
        config.output = Some(output.clone());
    }
    if let Some(layout) = cli.layout {
        config.layout = Some(layout);
    }
    Ok(config)
}

/// Stored records in display order, filtered on the rejection marker.
fn select_records(store: &Store, layout: SheetLayout, rejected: bool, limit: usize) -> Vec<&Record> {
    store
        .sorted(layout.sort_order())
        .into_iter()
        .filter(|record| (record.rejected == Annotation::Yes) == rejected)
        .take(limit)
        .collect()
}

fn export_csv(records: &[&Record], path: &Path) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(Column::ALL.iter().map(|column| column.header()))?;

    for record in records {
        writer.write_record(&[
            record
                .matched_keyword_count
                .map(|score| score.to_string())
                .unwrap_or_default(),
            record.website_or_placeholder().to_string(),
            record.name.clone(),
            record.address.clone(),
            record.phone.clone(),
            record.category.clone(),
            record.rejected.as_cell().to_string(),
            record.first_seen.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    let config = load_config(&cli)?;
    let spreadsheet = Spreadsheet::new(config.output(), config.layout());

    match cli.command {
        Commands::Places(cmd) => {
            let settings = CollectorSettings::from_config(&config);
            let collector = CollectorFactory::create_collector(CollectorType::Places, &settings)?;
            config.require_categories()?;

            let session = Session {
                config,
                spreadsheet,
                policy: cli.policy,
                classify: cli.classify,
            };

            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut output = io::stdout();

            if let Some(place) = cmd.place {
                let radius_m = match cmd.radius_m {
                    Some(radius_m) => Some(radius_m),
                    None => prompt_radius(&mut input, &mut output)?,
                };
                match radius_m {
                    Some(radius_m) => {
                        session.search_area(collector.as_ref(), place, radius_m).await;
                    }
                    None => warn!("No radius given, nothing to do"),
                }
            } else {
                let completed = session
                    .interactive(collector.as_ref(), &mut input, &mut output)
                    .await?;
                info!("Finished after {} searches", completed);
            }
        }
        Commands::Directory(cmd) => {
            let scope = SearchScope::Sweep {
                categories: config.require_categories()?.to_vec(),
                regions: config.require_regions()?.to_vec(),
            };
            let settings = CollectorSettings::from_config(&config);
            let collector = CollectorFactory::create_collector(cmd.source.into(), &settings)?;

            let session = Session {
                config,
                spreadsheet,
                policy: cli.policy,
                classify: cli.classify,
            };
            let summary = session.run(collector.as_ref(), &scope).await?;
            println!("{} {}: {}", collector.name(), scope, summary);
        }
        Commands::List(cmd) => {
            let store = Store::from_persisted(spreadsheet.load()?);
            let records = select_records(&store, spreadsheet.layout(), cmd.rejected, cmd.limit);

            if records.is_empty() {
                println!("No companies to show in {}", spreadsheet.path().display());
            } else {
                println!("{}", create_record_table(&records));
                println!("{} of {} companies", records.len(), store.len());
            }
        }
        Commands::Export(cmd) => {
            let store = Store::from_persisted(spreadsheet.load()?);
            let records = store.sorted(spreadsheet.layout().sort_order());
            export_csv(&records, &cmd.path)?;
            info!("Exported {} companies to {}", records.len(), cmd.path.display());
        }
    }

    Ok(())
}
