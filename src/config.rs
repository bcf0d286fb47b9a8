//! Crawl configuration.
//!
//! Defaults reproduce the Medikamio catalog: seven locales, ten concurrent
//! units of work, output to `Medikamio.csv` and failures to `Error.txt`.
//! A YAML file may override any subset of fields:
//!
//! ```yaml
//! concurrency: 4
//! output_path: data/medikamio.csv
//! locales:
//!   - tag: EN
//!     index_url: https://medikamio.com/en-gb/diseases/index
//! ```

use crate::errors::ConfigError;
use crate::models::Locale;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use url::Url;

pub const DEFAULT_SITE: &str = "https://medikamio.com";
pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_OUTPUT_PATH: &str = "Medikamio.csv";
pub const DEFAULT_ERROR_LOG_PATH: &str = "Error.txt";

const DEFAULT_LOCALES: [(&str, &str); 7] = [
    ("EN", "https://medikamio.com/en-gb/diseases/index"),
    ("DE", "https://medikamio.com/de-de/krankheiten/index"),
    ("FR", "https://medikamio.com/fr-fr/maladies/index"),
    ("IT", "https://medikamio.com/it-it/malattie/index"),
    ("NL", "https://medikamio.com/nl-nl/ziekten/index"),
    ("ES", "https://medikamio.com/es-es/enfermedades/index"),
    ("PT", "https://medikamio.com/pt-pt/medicamentos"),
];

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Origin that relative detail links are resolved against.
    pub site: String,
    /// Locales in walk order.
    pub locales: Vec<Locale>,
    /// Maximum number of units of work in flight.
    pub concurrency: usize,
    pub output_path: PathBuf,
    pub error_log_path: PathBuf,
    /// Log per-URL failures with their full error chain.
    pub debug_trace_on_error: bool,
    pub user_agent: Option<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            site: DEFAULT_SITE.to_string(),
            locales: DEFAULT_LOCALES
                .iter()
                .map(|(tag, url)| Locale::new(*tag, *url))
                .collect(),
            concurrency: DEFAULT_CONCURRENCY,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            error_log_path: PathBuf::from(DEFAULT_ERROR_LOG_PATH),
            debug_trace_on_error: true,
            user_agent: None,
        }
    }
}

impl CrawlConfig {
    /// Load a YAML config file; absent fields keep their defaults.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: CrawlConfig =
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        info!(locales = config.locales.len(), "Loaded configuration");
        Ok(config)
    }

    /// Keep only the locales whose tag matches one of `tags` (case-insensitive).
    /// An empty filter keeps everything.
    pub fn retain_locales(&mut self, tags: &[String]) {
        if tags.is_empty() {
            return;
        }
        self.locales
            .retain(|locale| tags.iter().any(|tag| tag.eq_ignore_ascii_case(&locale.tag)));
    }

    /// Parsed base origin. Call [`CrawlConfig::validate`] first.
    pub fn site_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.site)
            .map_err(|e| ConfigError::Invalid(format!("site `{}` is not a URL: {e}", self.site)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency must be a positive integer".to_string(),
            ));
        }
        self.site_url()?;
        if self.locales.is_empty() {
            return Err(ConfigError::Invalid("no locales selected".to_string()));
        }
        for locale in &self.locales {
            if locale.tag.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "locale with index {} has an empty tag",
                    locale.index_url
                )));
            }
            Url::parse(&locale.index_url).map_err(|e| {
                ConfigError::Invalid(format!(
                    "index URL `{}` of locale {} is not a URL: {e}",
                    locale.index_url, locale.tag
                ))
            })?;
        }
        Ok(())
    }
}
