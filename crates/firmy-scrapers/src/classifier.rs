use crate::fan_out;
use crate::fetch::Fetcher;
use firmy_core::{KeywordLists, Record, Result};
use scraper::Html;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Words suggesting the company runs its own vehicles.
pub const POSITIVE_KEYWORDS: &[&str] = &[
    "transport", "spedycja", "logistyka", "przewozy", "flota", "dostawy", "dystrybucja",
    "kurierskie", "przewóz osób", "przewóz towarów", "usługi transportowe", "transport krajowy",
    "transport międzynarodowy", "tabor", "auta dostawcze", "ciężarówki", "naczepy", "autolaweta",
    "bus", "van", "pojazdy", "samochody służbowe", "montaż", "instalacja", "serwis mobilny",
    "naprawa w terenie", "na terenie całego województwa", "na terenie całego powiatu",
    "mobilny serwis", "prace w terenie", "dojazd do klienta", "usługi na miejscu",
    "obsługa serwisowa", "dojazd w cenie", "budowa", "remont", "ekipa budowlana",
    "roboty ziemne", "maszyny budowlane", "wynajem samochodów", "leasing pojazdów",
    "auto wypożyczalnia", "wynajem busów",
];

/// Words suggesting the company services vehicles rather than owning a fleet.
pub const NEGATIVE_KEYWORDS: &[&str] = &[
    "serwis samochodowy", "mechanika", "warsztat", "naprawa pojazdów", "diagnostyka",
    "stacja kontroli", "lakiernia", "blacharnia", "naprawa silników", "naprawa skrzyń biegów",
    "auto detailing", "stacja diagnostyczna", "czyszczenie tapicerki", "myjnia samochodowa",
];

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Scores company websites by counting keyword occurrences in their text.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    fetcher: Fetcher,
    positive: Vec<String>,
    negative: Vec<String>,
    concurrency: usize,
}

impl KeywordClassifier {
    /// Single-attempt fetcher with a short timeout. Empty lists in
    /// `keywords` fall back to the built-in ones.
    pub fn new(keywords: Option<&KeywordLists>, concurrency: usize) -> Result<Self> {
        let fetcher = Fetcher::with_timeout(FETCH_TIMEOUT)?.with_attempts(1);
        Ok(Self::with_fetcher(fetcher, keywords, concurrency))
    }

    pub fn with_fetcher(fetcher: Fetcher, keywords: Option<&KeywordLists>, concurrency: usize) -> Self {
        let pick = |custom: Option<&Vec<String>>, builtin: &[&str]| -> Vec<String> {
            match custom {
                Some(list) if !list.is_empty() => list.iter().map(|k| k.trim().to_lowercase()).collect(),
                _ => builtin.iter().map(|k| k.to_string()).collect(),
            }
        };

        Self {
            fetcher,
            positive: pick(keywords.map(|k| &k.positive), POSITIVE_KEYWORDS),
            negative: pick(keywords.map(|k| &k.negative), NEGATIVE_KEYWORDS),
            concurrency,
        }
    }

    /// Total positive matches, or 0 as soon as any negative keyword occurs.
    pub fn score_text(&self, text: &str) -> u32 {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split_whitespace()
            .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|token| !token.is_empty())
            .collect();

        let mut counts: HashMap<&str, u32> = HashMap::new();
        for token in &tokens {
            *counts.entry(*token).or_default() += 1;
        }
        let normalized = format!(" {} ", tokens.join(" "));

        let occurrences = |keyword: &str| -> u32 {
            if keyword.contains(char::is_whitespace) {
                normalized.matches(&format!(" {} ", keyword)).count() as u32
            } else {
                counts.get(keyword).copied().unwrap_or(0)
            }
        };

        if self.negative.iter().any(|keyword| occurrences(keyword.as_str()) > 0) {
            return 0;
        }

        self.positive.iter().map(|keyword| occurrences(keyword.as_str())).sum()
    }

    pub fn score_html(&self, html: &str) -> u32 {
        self.score_text(&visible_text(html))
    }

    /// `None` when the page cannot be fetched.
    pub async fn score_url(&self, url: &str) -> Option<u32> {
        match self.fetcher.get_text(url).await {
            Ok(html) => Some(self.score_html(&html)),
            Err(e) => {
                debug!("Could not score {}: {}", url, e);
                None
            }
        }
    }

    /// Sets `matched_keyword_count` on every record with a website.
    pub async fn classify(&self, records: &mut [Record]) {
        let targets: Vec<(usize, String)> = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                record
                    .primary_website()
                    .and_then(fetchable_url)
                    .map(|url| (index, url))
            })
            .collect();

        info!("Scoring {} websites", targets.len());
        let scores = fan_out(targets, self.concurrency, |(index, url)| async move {
            vec![(index, self.score_url(&url).await)]
        })
        .await;

        let mut scored = 0;
        for (index, score) in scores {
            if score.is_some() {
                scored += 1;
            }
            records[index].matched_keyword_count = score;
        }
        info!("Scored {} of {} records", scored, records.len());
    }
}

/// Adds a scheme to bare host names; rejects values that cannot be a URL.
fn fetchable_url(site: &str) -> Option<String> {
    let site = site.trim();
    if site.is_empty() || site.contains(char::is_whitespace) {
        return None;
    }
    if site.starts_with("http://") || site.starts_with("https://") {
        Some(site.to_string())
    } else {
        Some(format!("http://{}", site))
    }
}

/// Text content outside `script`, `style` and `noscript` elements.
fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();

    for node in document.root_element().descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|element| matches!(element.name(), "script" | "style" | "noscript"))
                .unwrap_or(false)
        });
        if !hidden {
            text.push_str(fragment);
            text.push(' ');
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use firmy_core::Annotation;
    use mockito::Server;

    fn classifier(keywords: Option<&KeywordLists>) -> KeywordClassifier {
        let fetcher = Fetcher::new().unwrap().with_attempts(1);
        KeywordClassifier::with_fetcher(fetcher, keywords, 2)
    }

    fn record(phone: &str, website: Option<String>) -> Record {
        Record {
            category: "transport".to_string(),
            name: "Trans-Pol".to_string(),
            address: "Radom".to_string(),
            phone: phone.to_string(),
            website,
            matched_keyword_count: None,
            rejected: Annotation::Unset,
            first_seen: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            source: "test".to_string(),
        }
    }

    #[test]
    fn test_score_counts_words_and_phrases() {
        let c = classifier(None);
        let text = "Transport, spedycja i TRANSPORT krajowy. Mamy własny tabor oraz auta dostawcze.";
        // transport x2, spedycja, transport krajowy, tabor, auta dostawcze
        assert_eq!(c.score_text(text), 6);
    }

    #[test]
    fn test_phrases_match_whole_tokens() {
        let c = classifier(None);
        // transport, transport krajowy
        assert_eq!(c.score_text("Transport, krajowy!"), 2);
        assert_eq!(c.score_text("autotransport krajowy"), 0);
    }

    #[test]
    fn test_negative_keyword_zeroes_score() {
        let c = classifier(None);
        assert_eq!(c.score_text("transport oraz warsztat samochodowy"), 0);
        assert_eq!(c.score_text("nic ciekawego"), 0);
    }

    #[test]
    fn test_score_html_ignores_scripts() {
        let c = classifier(None);
        let html = r#"<html><head><style>.bus{}</style><script>var transport = 1;</script></head>
            <body><h1>Flota</h1><p>Nasze busy i bus</p></body></html>"#;
        assert_eq!(c.score_html(html), 2);
    }

    #[test]
    fn test_custom_keywords() {
        let lists = KeywordLists {
            positive: vec!["Koparka".to_string()],
            negative: Vec::new(),
        };
        let c = classifier(Some(&lists));
        assert_eq!(c.score_text("koparka, koparka i transport"), 2);
        // the built-in negative list still applies
        assert_eq!(c.score_text("koparka i warsztat"), 0);
    }

    #[test]
    fn test_fetchable_url() {
        assert_eq!(fetchable_url("https://a.pl"), Some("https://a.pl".to_string()));
        assert_eq!(fetchable_url("www.a.pl"), Some("http://www.a.pl".to_string()));
        assert_eq!(fetchable_url("brak danych"), None);
        assert_eq!(fetchable_url(""), None);
    }

    #[tokio::test]
    async fn test_classify_sets_scores() {
        let mut server = Server::new_async().await;
        let _site = server
            .mock("GET", "/firma")
            .with_status(200)
            .with_body("<html><body>transport i spedycja</body></html>")
            .create_async()
            .await;
        let _gone = server
            .mock("GET", "/gone")
            .with_status(404)
            .create_async()
            .await;

        let mut records = vec![
            record("1", Some(format!("{}/firma | https://inna.pl", server.url()))),
            record("2", Some(format!("{}/gone", server.url()))),
            record("3", None),
        ];
        classifier(None).classify(&mut records).await;

        assert_eq!(records[0].matched_keyword_count, Some(2));
        assert_eq!(records[1].matched_keyword_count, None);
        assert_eq!(records[2].matched_keyword_count, None);
    }
}
