use firmy_core::{FirmyError, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// HTTP client shared by the collectors: browser user agent, timeout and a
/// small fixed number of attempts with exponential backoff.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    attempts: u32,
    retry_delay: Duration,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            attempts: MAX_ATTEMPTS,
            retry_delay: RETRY_BASE_DELAY,
        })
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Sends the request built by `build`, retrying transport errors, 429 and
    /// 5xx responses. Any other non-success status fails immediately.
    pub async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut last_error = String::new();

        for attempt in 1..=self.attempts {
            match build(&self.client).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let url = response.url().to_string();
                    let body = response.text().await.unwrap_or_default();
                    last_error = format!("{} returned {}: {}", url, status, truncate(&body, 200));
                    if !is_retryable(status) {
                        return Err(FirmyError::Scraping(last_error));
                    }
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            if attempt < self.attempts {
                let delay = self.retry_delay * 2u32.pow(attempt - 1);
                warn!(
                    "Request failed ({}), retrying in {:?} (attempt {}/{})",
                    last_error, delay, attempt, self.attempts
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(FirmyError::Scraping(format!(
            "giving up after {} attempts: {}",
            self.attempts, last_error
        )))
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        let response = self.send(|client| client.get(url)).await?;
        Ok(response.text().await?)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
