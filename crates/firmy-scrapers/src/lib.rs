pub mod baza_firm;
pub mod classifier;
pub mod fetch;
pub mod olx;
pub mod panoramafirm;
pub mod places;

use async_trait::async_trait;
use chrono::NaiveDate;
use firmy_core::{dedup, Candidate, CandidatePolicy, Config, FirmyError, Record, Result};
use futures::stream::{self, StreamExt};
use scraper::{ElementRef, Selector};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use baza_firm::BazaFirmCollector;
pub use classifier::KeywordClassifier;
pub use fetch::Fetcher;
pub use olx::OlxCollector;
pub use panoramafirm::PanoramaFirmCollector;
pub use places::PlacesCollector;

/// Enum representing the supported data sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorType {
    /// Google Places text search around a geocoded place
    Places,
    /// baza-firm.com.pl directory
    BazaFirm,
    /// panoramafirm.pl directory
    PanoramaFirm,
    /// olx.pl classifieds
    Olx,
}

/// What a collection run searches.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchScope {
    /// Every category around a place, within a radius in meters.
    Area {
        place: String,
        radius_m: u32,
        categories: Vec<String>,
    },
    /// Every category in every region.
    Sweep {
        categories: Vec<String>,
        regions: Vec<String>,
    },
}

impl SearchScope {
    /// The (category, region) cross product of a sweep; empty for an area.
    pub fn sweep_pairs(&self) -> Vec<(String, String)> {
        match self {
            SearchScope::Sweep { categories, regions } => categories
                .iter()
                .flat_map(|category| {
                    regions
                        .iter()
                        .map(move |region| (category.clone(), region.clone()))
                })
                .collect(),
            SearchScope::Area { .. } => Vec::new(),
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchScope::Area {
                place, radius_m, ..
            } => write!(f, "{} ({} km)", place, *radius_m as f64 / 1000.0),
            SearchScope::Sweep {
                categories,
                regions,
            } => write!(
                f,
                "{} categories x {} regions",
                categories.len(),
                regions.len()
            ),
        }
    }
}

/// Tuning shared by every collector.
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub concurrency: usize,
    pub page_delay: Duration,
    pub api_key: Option<String>,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            concurrency: firmy_core::config::DEFAULT_CONCURRENCY,
            page_delay: Duration::from_secs(firmy_core::config::DEFAULT_PAGE_DELAY_SECS),
            api_key: None,
        }
    }
}

impl CollectorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.concurrency(),
            page_delay: config.page_delay(),
            api_key: config.api_key().ok().map(String::from),
        }
    }
}

/// A source of candidate businesses. Collection never fails as a whole:
/// a page that cannot be fetched or parsed is logged and contributes
/// nothing.
#[async_trait]
pub trait Collector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Which missing fields disqualify a candidate from this source.
    fn default_policy(&self) -> CandidatePolicy;

    async fn collect(&self, scope: &SearchScope) -> Vec<Candidate>;
}

/// Factory for creating collector instances
pub struct CollectorFactory;

impl CollectorFactory {
    pub fn create_collector(
        collector_type: CollectorType,
        settings: &CollectorSettings,
    ) -> Result<Arc<dyn Collector>> {
        let fetcher = Fetcher::new()?;
        let collector: Arc<dyn Collector> = match collector_type {
            CollectorType::Places => {
                let api_key = settings
                    .api_key
                    .clone()
                    .ok_or_else(|| FirmyError::Config("API_KEY is missing".to_string()))?;
                Arc::new(PlacesCollector::new(fetcher, api_key, settings))
            }
            CollectorType::BazaFirm => Arc::new(BazaFirmCollector::new(fetcher, settings)),
            CollectorType::PanoramaFirm => Arc::new(PanoramaFirmCollector::new(fetcher, settings)),
            CollectorType::Olx => Arc::new(OlxCollector::new(fetcher, settings)),
        };
        Ok(collector)
    }
}

/// Runs `task` for every item with at most `limit` in flight and flattens
/// the results in completion order.
pub(crate) async fn fan_out<I, F, Fut, T>(items: I, limit: usize, task: F) -> Vec<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Vec<T>>,
{
    stream::iter(items.into_iter().map(task))
        .buffer_unordered(limit.max(1))
        .collect::<Vec<Vec<T>>>()
        .await
        .into_iter()
        .flatten()
        .collect()
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| FirmyError::Scraping(e.to_string()))
}

/// The element's non-blank text nodes, trimmed and joined with `separator`.
pub(crate) fn joined_text(element: ElementRef<'_>, separator: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Result of a collection pass, before it is merged into the spreadsheet.
#[derive(Debug, Clone)]
pub struct Harvest {
    /// Candidates that passed the policy, duplicates included.
    pub found: usize,
    /// Deduplicated records.
    pub records: Vec<Record>,
}

/// Collects, filters by `policy`, deduplicates by phone and optionally
/// scores the websites of what remains.
pub async fn harvest(
    collector: &dyn Collector,
    scope: &SearchScope,
    policy: CandidatePolicy,
    classifier: Option<&KeywordClassifier>,
    day: NaiveDate,
) -> Harvest {
    info!("Collecting from {} for {}", collector.name(), scope);
    let candidates = policy.apply(collector.collect(scope).await);
    let found = candidates.len();

    let mut records = dedup(
        candidates
            .into_iter()
            .filter_map(|candidate| candidate.into_record(day))
            .collect(),
    );

    if let Some(classifier) = classifier {
        classifier.classify(&mut records).await;
    }

    info!(
        "{}: {} candidates, {} unique",
        collector.name(),
        found,
        records.len()
    );
    Harvest { found, records }
}
