use crate::fetch::Fetcher;
use crate::{fan_out, joined_text, parse_selector, Collector, CollectorSettings, SearchScope};
use async_trait::async_trait;
use firmy_core::{clean_address, non_placeholder, Candidate, CandidatePolicy, FirmyError, Result};
use regex::Regex;
use scraper::Html;
use tracing::{debug, info, warn};

pub const BASE_URL: &str = "https://panoramafirm.pl";
pub const COMPANIES_PER_PAGE: usize = 25;

#[derive(Debug)]
pub struct PanoramaFirmCollector {
    fetcher: Fetcher,
    base_url: String,
    concurrency: usize,
}

impl PanoramaFirmCollector {
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

    fn page_url(&self, category: &str, region: &str, page: usize) -> String {
        if page > 1 {
            format!("{}/{}/{}/firmy,{}.html", self.base_url, category, region, page)
        } else {
            format!("{}/{}/{}", self.base_url, category, region)
        }
    }

    /// Page count derived from the "N firm" results heading.
    pub fn parse_total_pages(html: &str) -> Result<usize> {
        let document = Html::parse_document(html);
        let heading = parse_selector("h1.font-size-base.font-weight-normal.text-color-inherit")?;
        let count = Regex::new(r"(\d[\d\s\u{a0}]*) firm")
            .map_err(|e| FirmyError::Scraping(e.to_string()))?;

        let total = document
            .select(&heading)
            .next()
            .map(|element| element.text().collect::<String>())
            .and_then(|text| {
                count.captures(&text).and_then(|captures| {
                    captures[1]
                        .chars()
                        .filter(char::is_ascii_digit)
                        .collect::<String>()
                        .parse::<usize>()
                        .ok()
                })
            })
            .map(|companies| companies.div_ceil(COMPANIES_PER_PAGE))
            .unwrap_or(1);

        Ok(total.max(1))
    }

    /// Reads every `li.company-item`. Entries without an address are dropped;
    /// a missing phone or website is left for the candidate policy to judge.
    pub fn parse_companies(html: &str, category: &str) -> Result<Vec<Candidate>> {
        let document = Html::parse_document(html);
        let item_selector = parse_selector("li.company-item")?;
        let name_selector = parse_selector("a.company-name")?;
        let phone_selector = parse_selector("a.icon-telephone")?;
        let website_selector = parse_selector("a.icon-website")?;
        let address_selector = parse_selector("div.address")?;

        let mut candidates = Vec::new();
        for item in document.select(&item_selector) {
            let address = item
                .select(&address_selector)
                .next()
                .map(|element| clean_address(&element.text().collect::<String>()))
                .and_then(|address| non_placeholder(&address));

            let Some(address) = address else {
                debug!("Skipping company without an address");
                continue;
            };

            let name = item
                .select(&name_selector)
                .next()
                .and_then(|element| non_placeholder(&joined_text(element, " ")));
            let phone = item
                .select(&phone_selector)
                .next()
                .and_then(|element| element.value().attr("title"))
                .and_then(non_placeholder);
            let website = item
                .select(&website_selector)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(non_placeholder);

            candidates.push(Candidate {
                name,
                address: Some(address),
                phone,
                website,
                ..Candidate::new("panoramafirm", category)
            });
        }

        Ok(candidates)
    }

    async fn collect_pair(&self, category: &str, region: &str) -> Vec<Candidate> {
        let first_url = self.page_url(category, region, 1);
        let first_page = match self.fetcher.get_text(&first_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Skipping {}/{}: {}", category, region, e);
                return Vec::new();
            }
        };

        let total_pages = Self::parse_total_pages(&first_page).unwrap_or(1);
        debug!("{}/{}: {} pages", category, region, total_pages);

        let mut pages = vec![first_page];
        for page in 2..=total_pages {
            let url = self.page_url(category, region, page);
            match self.fetcher.get_text(&url).await {
                Ok(html) => pages.push(html),
                Err(e) => warn!("Skipping page {}: {}", url, e),
            }
        }

        pages
            .iter()
            .flat_map(|html| match Self::parse_companies(html, category) {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!("Could not parse {}/{}: {}", category, region, e);
                    Vec::new()
                }
            })
            .collect()
    }
}

#[async_trait]
impl Collector for PanoramaFirmCollector {
    fn name(&self) -> &'static str {
        "panoramafirm"
    }

    fn default_policy(&self) -> CandidatePolicy {
        CandidatePolicy::PhoneAndWebsite
    }

    async fn collect(&self, scope: &SearchScope) -> Vec<Candidate> {
        let pairs = scope.sweep_pairs();
        if pairs.is_empty() {
            warn!("panoramafirm needs at least one category and one region");
            return Vec::new();
        }

        let candidates = fan_out(pairs, self.concurrency, |(category, region)| async move {
            self.collect_pair(&category, &region).await
        })
        .await;

        info!("panoramafirm: {} companies listed", candidates.len());
        candidates
    }
}
