use crate::workbook::SheetLayout;
use crate::{FirmyError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_CATEGORIES_PATH: &str = "categories.json";
pub const DEFAULT_OUTPUT: &str = "firmy.xlsx";
pub const DEFAULT_CONCURRENCY: usize = 2;
pub const DEFAULT_PAGE_DELAY_SECS: u64 = 5;

/// Keyword lists overriding the classifier's built-in ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordLists {
    #[serde(default)]
    pub positive: Vec<String>,
    #[serde(default)]
    pub negative: Vec<String>,
}

/// Contents of `config.json`. Every key is optional; commands check for the
/// ones they need.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "API_KEY", default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(rename = "wojewodztwa", alias = "regions", default)]
    pub regions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_delay_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<SheetLayout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<KeywordLists>,
}

#[derive(Debug, Deserialize)]
struct CategoriesFile {
    #[serde(default)]
    categories: Vec<String>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            FirmyError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise returns an empty configuration.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Takes categories from a separate `{"categories": [...]}` file when the
    /// configuration itself lists none.
    pub fn with_categories_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !self.categories.is_empty() || !path.exists() {
            return Ok(self);
        }

        let text = fs::read_to_string(path)?;
        let file: CategoriesFile = serde_json::from_str(&text)?;
        info!(
            "Loaded {} categories from {}",
            file.categories.len(),
            path.display()
        );
        self.categories = file.categories;
        Ok(self)
    }

    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| FirmyError::Config("API_KEY is missing".to_string()))
    }

    pub fn require_categories(&self) -> Result<&[String]> {
        if self.categories.is_empty() {
            return Err(FirmyError::Config("no categories configured".to_string()));
        }
        Ok(&self.categories)
    }

    pub fn require_regions(&self) -> Result<&[String]> {
        if self.regions.is_empty() {
            return Err(FirmyError::Config(
                "no regions (wojewodztwa) configured".to_string(),
            ));
        }
        Ok(&self.regions)
    }

    pub fn concurrency(&self) -> usize {
        self.max_concurrency
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_CONCURRENCY)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_secs(self.page_delay_secs.unwrap_or(DEFAULT_PAGE_DELAY_SECS))
    }

    pub fn output(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT))
    }

    pub fn layout(&self) -> SheetLayout {
        self.layout.unwrap_or_default()
    }
}
