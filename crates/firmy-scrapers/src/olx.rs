use crate::fetch::Fetcher;
use crate::{fan_out, joined_text, parse_selector, Collector, CollectorSettings, SearchScope};
use async_trait::async_trait;
use firmy_core::{non_placeholder, Candidate, CandidatePolicy, Result};
use scraper::Html;
use std::collections::HashSet;
use tracing::{info, warn};

pub const BASE_URL: &str = "https://www.olx.pl";

/// An offer found on a category listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub link: String,
    pub category: String,
}

#[derive(Debug)]
pub struct OlxCollector {
    fetcher: Fetcher,
    base_url: String,
    concurrency: usize,
}

impl OlxCollector {
    pub fn new(fetcher: Fetcher, settings: &CollectorSettings) -> Self {
        Self {
            fetcher,
            base_url: BASE_URL.to_string(),
            concurrency: settings.concurrency,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn search_url(&self, category: &str, region: &str) -> String {
        format!("{}/{}/{}/", self.base_url, category, region)
    }

    /// Offer links in page order, without repeats. `/d/...` links are made
    /// absolute against `base_url`.
    pub fn parse_offer_links(html: &str, base_url: &str) -> Result<Vec<String>> {
        let document = Html::parse_document(html);
        let offer_selector = parse_selector("a.css-qo0cxu")?;

        let mut seen = HashSet::new();
        let links = document
            .select(&offer_selector)
            .filter_map(|link| link.value().attr("href"))
            .map(|href| {
                if href.starts_with("/d/") {
                    format!("{}{}", base_url, href)
                } else {
                    href.to_string()
                }
            })
            .filter(|link| seen.insert(link.clone()))
            .collect();

        Ok(links)
    }

    pub fn parse_offer(html: &str, category: &str) -> Result<Candidate> {
        let document = Html::parse_document(html);
        let field = |test_id: &str, label: &str| -> Result<Option<String>> {
            let selector = parse_selector(&format!(r#"[data-testid="{}"]"#, test_id))?;
            Ok(document
                .select(&selector)
                .next()
                .map(|element| joined_text(element, " ").replace(label, ""))
                .and_then(|text| non_placeholder(&text)))
        };

        Ok(Candidate {
            name: field("company-name", "Nazwa firmy:")?,
            phone: field("phone", "Numer telefonu:")?,
            address: field("address", "Adres:")?,
            ..Candidate::new("olx", category)
        })
    }

    async fn collect_offers(&self, category: &str, region: &str) -> Vec<Offer> {
        let url = self.search_url(category, region);
        let html = match self.fetcher.get_text(&url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("No offers for {}: {}", url, e);
                return Vec::new();
            }
        };

        match Self::parse_offer_links(&html, &self.base_url) {
            Ok(links) => links
                .into_iter()
                .map(|link| Offer {
                    link,
                    category: category.to_string(),
                })
                .collect(),
            Err(e) => {
                warn!("Could not parse {}: {}", url, e);
                Vec::new()
            }
        }
    }

    async fn fetch_offer(&self, offer: Offer) -> Option<Candidate> {
        let html = match self.fetcher.get_text(&offer.link).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Could not load offer {}: {}", offer.link, e);
                return None;
            }
        };

        match Self::parse_offer(&html, &offer.category) {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                warn!("Could not parse offer {}: {}", offer.link, e);
                None
            }
        }
    }
}

#[async_trait]
impl Collector for OlxCollector {
    fn name(&self) -> &'static str {
        "olx"
    }

    fn default_policy(&self) -> CandidatePolicy {
        CandidatePolicy::PhoneOnly
    }

    async fn collect(&self, scope: &SearchScope) -> Vec<Candidate> {
        let pairs = scope.sweep_pairs();
        if pairs.is_empty() {
            warn!("olx needs at least one category and one region");
            return Vec::new();
        }

        let offers = fan_out(pairs, self.concurrency, |(category, region)| async move {
            self.collect_offers(&category, &region).await
        })
        .await;
        info!("olx: {} offers to visit", offers.len());

        fan_out(offers, self.concurrency, |offer| async move {
            self.fetch_offer(offer).await.into_iter().collect::<Vec<_>>()
        })
        .await
    }
}
