use std::time::Duration;

use serde_aux::field_attributes::deserialize_number_from_string;

use crate::domain::seed::DEFAULT_SEED_URLS;

#[derive(serde::Deserialize, Debug, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub extractor: ExtractorSettings,
    pub retry: RetrySettings,
    pub output: OutputSettings,
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct ApplicationSettings {
    pub user_agent: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub request_timeout_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub concurrency: usize,
}

impl ApplicationSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        ApplicationSettings {
            user_agent: format!("reel/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 30,
            concurrency: 16,
        }
    }
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct ExtractorSettings {
    #[serde(default)]
    pub seed_urls: Vec<String>,
    pub script_id: String,
    pub summary_class: String,
    pub retry_reason: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub delay_secs: u64,
}

impl ExtractorSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        ExtractorSettings {
            seed_urls: DEFAULT_SEED_URLS.iter().map(|u| u.to_string()).collect(),
            script_id: "__NEXT_DATA__".to_string(),
            summary_class: "ipc-html-content-inner-div".to_string(),
            retry_reason: "no movie_data".to_string(),
            delay_secs: 10,
        }
    }
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct RetrySettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_retries: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_retries: 2,
            backoff_ms: 0,
        }
    }
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct OutputSettings {
    pub path: String,
    pub format: OutputFormat,
}

#[derive(serde::Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jsonl,
    Json,
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        // APP_RETRY__MAX_RETRIES=5 sets Settings.retry.max_retries
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}
