use crate::fetch::Fetcher;
use crate::{fan_out, joined_text, parse_selector, Collector, CollectorSettings, SearchScope};
use async_trait::async_trait;
use firmy_core::{non_placeholder, Candidate, CandidatePolicy, FirmyError, Result};
use regex::Regex;
use scraper::Html;
use tracing::{debug, error, info, warn};
use url::Url;

pub const BASE_URL: &str = "https://www.baza-firm.com.pl";

/// A company link from a listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub name: String,
    pub link: String,
    pub category: String,
}

/// Fields read from a company page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyDetails {
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
}

#[derive(Debug)]
pub struct BazaFirmCollector {
    fetcher: Fetcher,
    base_url: String,
    concurrency: usize,
}

impl BazaFirmCollector {
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

    fn listing_url(&self, category: &str, region: &str, page: usize) -> String {
        format!(
            "{}/vsk/woj/{}/{}/strona-{}/",
            self.base_url, category, region, page
        )
    }

    /// Highest `strona-N` linked from the pager, 1 when there is no pager.
    pub fn parse_total_pages(html: &str) -> Result<usize> {
        let document = Html::parse_document(html);
        let pager = parse_selector("a.pgn")?;
        let page_number =
            Regex::new(r"strona-(\d+)").map_err(|e| FirmyError::Scraping(e.to_string()))?;

        let last = document
            .select(&pager)
            .filter_map(|link| link.value().attr("href"))
            .filter_map(|href| page_number.captures(href))
            .filter_map(|captures| captures[1].parse::<usize>().ok())
            .max()
            .unwrap_or(1);

        Ok(last.max(1))
    }

    pub fn parse_listing(html: &str, base: &Url, category: &str) -> Result<Vec<ListingEntry>> {
        let document = Html::parse_document(html);
        let link_selector = parse_selector("a.wizLnk.displayInlineBlock.padding5")?;
        let name_selector = parse_selector("span.przeppoz")?;

        let entries = document
            .select(&link_selector)
            .filter_map(|link| {
                let href = link.value().attr("href")?;
                let name = link.select(&name_selector).next()?;
                let link = base
                    .join(href)
                    .map(|url| url.to_string())
                    .unwrap_or_else(|_| href.to_string());

                Some(ListingEntry {
                    name: joined_text(name, " "),
                    link,
                    category: category.to_string(),
                })
            })
            .collect();

        Ok(entries)
    }

    pub fn parse_details(html: &str) -> Result<CompanyDetails> {
        let document = Html::parse_document(html);
        // the two boxes differ only in class order
        let address_selector = parse_selector(r#"div[class="txtDataBox lineHeight26 firstBox"]"#)?;
        let phone_selector = parse_selector(r#"div[class="firstBox txtDataBox lineHeight26"]"#)?;
        let www_box_selector = parse_selector("div.displayInlineBlock")?;
        let www_link_selector = parse_selector(r#"a[itemprop="url"]"#)?;
        let industry_selector = parse_selector("#brBox")?;

        let address = document
            .select(&address_selector)
            .next()
            .and_then(|element| non_placeholder(&joined_text(element, " ")));

        let phone = document
            .select(&phone_selector)
            .next()
            .and_then(|element| non_placeholder(&joined_text(element, " | ")));

        let website = document.select(&www_box_selector).next().and_then(|element| {
            let links: Vec<&str> = element
                .select(&www_link_selector)
                .filter_map(|link| link.value().attr("href"))
                .map(str::trim)
                .filter(|href| !href.is_empty())
                .collect();
            non_placeholder(&links.join(" | "))
        });

        let industry = document
            .select(&industry_selector)
            .next()
            .and_then(|element| non_placeholder(&joined_text(element, " | ")));

        Ok(CompanyDetails {
            address,
            phone,
            website,
            industry,
        })
    }

    async fn collect_listing(&self, category: &str, region: &str, base: &Url) -> Vec<ListingEntry> {
        let first_url = self.listing_url(category, region, 1);
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
            let url = self.listing_url(category, region, page);
            match self.fetcher.get_text(&url).await {
                Ok(html) => pages.push(html),
                Err(e) => warn!("Skipping page {}: {}", url, e),
            }
        }

        pages
            .iter()
            .flat_map(|html| match Self::parse_listing(html, base, category) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Could not parse listing for {}/{}: {}", category, region, e);
                    Vec::new()
                }
            })
            .collect()
    }

    async fn fetch_details(&self, entry: ListingEntry) -> Option<Candidate> {
        let html = match self.fetcher.get_text(&entry.link).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Skipping {}: {}", entry.link, e);
                return None;
            }
        };

        let details = match Self::parse_details(&html) {
            Ok(details) => details,
            Err(e) => {
                warn!("Could not parse {}: {}", entry.link, e);
                return None;
            }
        };

        Some(Candidate {
            name: non_placeholder(&entry.name),
            address: details.address,
            phone: details.phone,
            website: details.website,
            ..Candidate::new("baza-firm", details.industry.unwrap_or(entry.category))
        })
    }
}

#[async_trait]
impl Collector for BazaFirmCollector {
    fn name(&self) -> &'static str {
        "baza-firm"
    }

    fn default_policy(&self) -> CandidatePolicy {
        CandidatePolicy::PhoneAndWebsite
    }

    async fn collect(&self, scope: &SearchScope) -> Vec<Candidate> {
        let pairs = scope.sweep_pairs();
        if pairs.is_empty() {
            warn!("baza-firm needs at least one category and one region");
            return Vec::new();
        }

        let base = match Url::parse(&self.base_url) {
            Ok(base) => base,
            Err(e) => {
                error!("Invalid base URL {}: {}", self.base_url, e);
                return Vec::new();
            }
        };

        let base = &base;
        let entries = fan_out(pairs, self.concurrency, |(category, region)| async move {
            self.collect_listing(&category, &region, base).await
        })
        .await;
        info!("baza-firm: {} company pages to visit", entries.len());

        fan_out(entries, self.concurrency, |entry| async move {
            self.fetch_details(entry).await.into_iter().collect::<Vec<_>>()
        })
        .await
    }
}
