use crate::constants::*;
use crate::error::{Result, ScraperError};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Runtime configuration: required environment plus optional tuning.
pub struct Config {
    pub user_agent: String,
    pub api_url: String,
    pub api_key: String,
    pub ig_username: String,
    pub ig_password: String,
    pub platform_name: String,
    pub bucket_name: String,
    pub endpoint_url: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub aws_region: String,
    pub pushgateway_url: Option<String>,
    pub tuning: Tuning,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tuning {
    #[serde(default)]
    pub scraper: ScraperTuning,
    #[serde(default)]
    pub output: OutputTuning,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperTuning {
    pub request_delay_ms: u64,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for ScraperTuning {
    fn default() -> Self {
        Self {
            request_delay_ms: 1000,
            timeout_seconds: 30,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputTuning {
    pub orient: DocumentOrient,
    pub local_dir: Option<PathBuf>,
}

/// Layout of the persisted dataset document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentOrient {
    /// `{column: {row_index: value}}`, the dataframe export layout.
    #[default]
    Columns,
    /// A JSON array with one object per row.
    Records,
}

impl Config {
    /// Loads `.env`, the process environment and the optional tuning file.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::from_lookup(|name| std::env::var(name).ok())?;

        let tuning_path = std::env::var(ENV_SCRAPER_CONFIG)
            .unwrap_or_else(|_| DEFAULT_TUNING_FILE.to_string());
        config.tuning = Tuning::load(Path::new(&tuning_path))?;
        Ok(config)
    }

    /// Builds the config from any variable source. Every missing required
    /// variable is reported in a single error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> = REQUIRED_ENV_VARS
            .iter()
            .copied()
            .filter(|name| present(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ScraperError::Config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let required = |name: &str| present(name).unwrap_or_default();

        Ok(Self {
            user_agent: required(ENV_USER_AGENT),
            api_url: required(ENV_API_URL),
            api_key: required(ENV_API_KEY),
            ig_username: required(ENV_IG_USERNAME),
            ig_password: required(ENV_IG_PASSWORD),
            platform_name: required(ENV_PLATFORM_NAME),
            bucket_name: required(ENV_BUCKET_NAME),
            endpoint_url: required(ENV_ENDPOINT_URL),
            aws_access_key_id: required(ENV_AWS_ACCESS_KEY_ID),
            aws_secret_access_key: required(ENV_AWS_SECRET_ACCESS_KEY),
            aws_region: present(ENV_AWS_REGION).unwrap_or_else(|| DEFAULT_AWS_REGION.to_string()),
            pushgateway_url: present(ENV_PUSHGATEWAY_URL),
            tuning: Tuning::default(),
        })
    }
}

impl Tuning {
    /// A missing file yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const REDACTED: &str = "<redacted>";
        f.debug_struct("Config")
            .field("user_agent", &self.user_agent)
            .field("api_url", &self.api_url)
            .field("api_key", &REDACTED)
            .field("ig_username", &self.ig_username)
            .field("ig_password", &REDACTED)
            .field("platform_name", &self.platform_name)
            .field("bucket_name", &self.bucket_name)
            .field("endpoint_url", &self.endpoint_url)
            .field("aws_access_key_id", &self.aws_access_key_id)
            .field("aws_secret_access_key", &REDACTED)
            .field("aws_region", &self.aws_region)
            .field("pushgateway_url", &self.pushgateway_url)
            .field("tuning", &self.tuning)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, String> {
        REQUIRED_ENV_VARS
            .iter()
            .map(|name| (*name, format!("value-of-{}", name.to_lowercase())))
            .collect()
    }

    #[test]
    fn loads_all_required_variables() {
        let env = full_env();
        let config = Config::from_lookup(|name| env.get(name).cloned()).unwrap();

        assert_eq!(config.api_url, "value-of-api_url");
        assert_eq!(config.bucket_name, "value-of-bucket_name");
        assert_eq!(config.aws_region, DEFAULT_AWS_REGION);
        assert!(config.pushgateway_url.is_none());
    }

    #[test]
    fn reports_every_missing_variable_at_once() {
        let mut env = full_env();
        env.remove(ENV_API_KEY);
        env.insert(ENV_BUCKET_NAME, "   ".to_string());

        let err = Config::from_lookup(|name| env.get(name).cloned()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("API_KEY"), "{message}");
        assert!(message.contains("BUCKET_NAME"), "{message}");
        assert!(!message.contains("API_URL"), "{message}");
    }

    #[test]
    fn debug_output_hides_secrets() {
        let env = full_env();
        let config = Config::from_lookup(|name| env.get(name).cloned()).unwrap();
        let rendered = format!("{config:?}");

        assert!(!rendered.contains("value-of-ig_password"));
        assert!(!rendered.contains("value-of-aws_secret_access_key"));
        assert!(rendered.contains("value-of-ig_username"));
    }

    #[test]
    fn missing_tuning_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let tuning = Tuning::load(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(tuning.scraper.request_delay_ms, 1000);
        assert_eq!(tuning.output.orient, DocumentOrient::Columns);
        assert!(tuning.output.local_dir.is_none());
    }

    #[test]
    fn partial_tuning_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraper.toml");
        fs::write(&path, "[output]\norient = \"records\"\n").unwrap();

        let tuning = Tuning::load(&path).unwrap();
        assert_eq!(tuning.output.orient, DocumentOrient::Records);
        assert_eq!(tuning.scraper.max_retries, 3);
    }
}
