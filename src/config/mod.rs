pub mod cli;

use crate::utils::error::{BotError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_CITY: &str = "Gachibowli";
pub const DEFAULT_COUNTRY: &str = "IN";
pub const DEFAULT_WEATHER_ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_UPLOAD_ENDPOINT: &str = "https://upload.twitter.com/1.1/media/upload.json";
pub const DEFAULT_TWEET_ENDPOINT: &str = "https://api.twitter.com/2/tweets";
pub const TWITTER_MAX_CHARS: usize = 280;
/// Asia/Kolkata has no DST, so a fixed offset is exact.
pub const IST_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub city: String,
    pub country_code: String,
    pub weather: WeatherConfig,
    pub twitter: TwitterConfig,
    pub render: RenderConfig,
    pub report: ReportConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    pub enabled: bool,
    pub credentials: Option<TwitterCredentials>,
    pub upload_endpoint: String,
    pub tweet_endpoint: String,
    pub max_chars: usize,
    pub timeout_seconds: u64,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitterCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub binary: String,
    /// Command prefix such as `["xvfb-run", "-a"]` for hosts without a display.
    pub wrapper: Vec<String>,
    pub width: u32,
    pub timeout_seconds: u64,
    pub template_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub utc_offset_seconds: i32,
    pub base_hashtags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub worker_threads: usize,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_WEATHER_ENDPOINT.to_string(),
            api_key: None,
            timeout_seconds: 10,
        }
    }
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            credentials: None,
            upload_endpoint: DEFAULT_UPLOAD_ENDPOINT.to_string(),
            tweet_endpoint: DEFAULT_TWEET_ENDPOINT.to_string(),
            max_chars: TWITTER_MAX_CHARS,
            timeout_seconds: 30,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            binary: "wkhtmltoimage".to_string(),
            wrapper: Vec::new(),
            width: 600,
            timeout_seconds: 60,
            template_path: None,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            utc_offset_seconds: IST_OFFSET_SECONDS,
            base_hashtags: vec![
                "#Gachibowli".to_string(),
                "#Hyderabad".to_string(),
                "#weatherupdate".to_string(),
            ],
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            worker_threads: 8,
        }
    }
}

impl fmt::Debug for TwitterCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"***")
            .field("access_token", &"***")
            .field("access_token_secret", &"***")
            .finish()
    }
}

/// `POST_TO_TWITTER_ENABLED` style flags: only a literal "true" enables.
pub fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

impl BotConfig {
    pub fn new() -> Self {
        Self {
            city: DEFAULT_CITY.to_string(),
            country_code: DEFAULT_COUNTRY.to_string(),
            ..Self::default()
        }
    }

    /// Loads from a TOML file when one is given, otherwise from the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(city) = lookup("BOT_CITY") {
            config.city = city;
        }
        if let Some(country) = lookup("BOT_COUNTRY") {
            config.country_code = country;
        }
        if let Some(endpoint) = lookup("WEATHER_API_ENDPOINT") {
            config.weather.endpoint = endpoint;
        }
        config.weather.api_key = lookup("WEATHER_API_KEY").filter(|k| !k.is_empty());

        config.twitter.enabled = parse_flag(
            &lookup("POST_TO_TWITTER_ENABLED").unwrap_or_else(|| "true".to_string()),
        );
        config.twitter.credentials = credentials_from_lookup(&lookup);
        if let Some(endpoint) = lookup("TWITTER_UPLOAD_ENDPOINT") {
            config.twitter.upload_endpoint = endpoint;
        }
        if let Some(endpoint) = lookup("TWITTER_TWEET_ENDPOINT") {
            config.twitter.tweet_endpoint = endpoint;
        }

        if let Some(binary) = lookup("WKHTMLTOIMAGE_PATH") {
            config.render.binary = binary;
        }
        if let Some(wrapper) = lookup("RENDER_WRAPPER") {
            config.render.wrapper = wrapper.split_whitespace().map(str::to_string).collect();
        }
        if let Some(template) = lookup("WIDGET_TEMPLATE_PATH") {
            config.render.template_path = Some(PathBuf::from(template));
        }

        if let Some(offset) = lookup("REPORT_UTC_OFFSET_SECONDS") {
            config.report.utc_offset_seconds = parse_number("REPORT_UTC_OFFSET_SECONDS", &offset)?;
        }
        config.apply_server_env(&lookup)?;

        Ok(config)
    }

    /// `PORT` and `WORKER_THREADS` are injected by the hosting platform and win over file values.
    fn apply_server_env<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_number("PORT", &port)?;
        }
        if let Some(threads) = lookup("WORKER_THREADS") {
            self.server.worker_threads = parse_number("WORKER_THREADS", &threads)?;
        }
        Ok(())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BotError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::from_toml_str_with(content, |key| std::env::var(key).ok())
    }

    /// Parses TOML after replacing `${VAR}` placeholders through `lookup`.
    pub fn from_toml_str_with<F>(content: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let processed = substitute_env_vars(content, &lookup)?;
        let mut config: Self = toml::from_str(&processed).map_err(|e| BotError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })?;

        if config.city.is_empty() {
            config.city = DEFAULT_CITY.to_string();
        }
        if config.country_code.is_empty() {
            config.country_code = DEFAULT_COUNTRY.to_string();
        }
        config.apply_server_env(&lookup)?;
        Ok(config)
    }

    pub fn mode_label(&self) -> &'static str {
        if self.twitter.enabled {
            "LIVE MODE"
        } else {
            "TEST MODE"
        }
    }
}

fn credentials_from_lookup<F>(lookup: &F) -> Option<TwitterCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    let keys = [
        "TWITTER_API_KEY",
        "TWITTER_API_SECRET",
        "TWITTER_ACCESS_TOKEN",
        "TWITTER_ACCESS_TOKEN_SECRET",
    ];
    let values: Vec<Option<String>> = keys
        .iter()
        .map(|key| lookup(key).filter(|v| !v.is_empty()))
        .collect();

    match values.as_slice() {
        [Some(ck), Some(cs), Some(at), Some(ats)] => Some(TwitterCredentials {
            consumer_key: ck.clone(),
            consumer_secret: cs.clone(),
            access_token: at.clone(),
            access_token_secret: ats.clone(),
        }),
        _ => {
            let missing: Vec<&str> = keys
                .iter()
                .zip(&values)
                .filter(|(_, v)| v.is_none())
                .map(|(k, _)| *k)
                .collect();
            if missing.len() < keys.len() {
                tracing::warn!("Ignoring partial Twitter credentials, missing: {}", missing.join(", "));
            }
            None
        }
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| BotError::InvalidConfigValueError {
            field: field.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Replaces `${VAR}` with the variable's value; unknown variables are left as-is.
fn substitute_env_vars<F>(content: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| BotError::ConfigError {
        message: format!("Invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        lookup(var_name).unwrap_or_else(|| format!("${{{}}}", var_name))
    });

    Ok(result.into_owned())
}

impl Validate for BotConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("city", &self.city)?;
        validation::validate_non_empty_string("country_code", &self.country_code)?;

        validation::validate_url("weather.endpoint", &self.weather.endpoint)?;
        validation::validate_positive_number("weather.timeout_seconds", self.weather.timeout_seconds, 1)?;

        validation::validate_url("twitter.upload_endpoint", &self.twitter.upload_endpoint)?;
        validation::validate_url("twitter.tweet_endpoint", &self.twitter.tweet_endpoint)?;
        validation::validate_positive_number("twitter.max_chars", self.twitter.max_chars as u64, 1)?;
        validation::validate_positive_number("twitter.timeout_seconds", self.twitter.timeout_seconds, 1)?;

        validation::validate_path("render.binary", &self.render.binary)?;
        validation::validate_positive_number("render.width", u64::from(self.render.width), 1)?;
        validation::validate_positive_number("render.timeout_seconds", self.render.timeout_seconds, 1)?;
        if let Some(template) = &self.render.template_path {
            validation::validate_path("render.template_path", &template.to_string_lossy())?;
        }

        for tag in &self.report.base_hashtags {
            validation::validate_hashtag("report.base_hashtags", tag)?;
        }

        validation::validate_positive_number("server.port", u64::from(self.server.port), 1)?;
        validation::validate_positive_number("server.worker_threads", self.server.worker_threads as u64, 1)?;

        Ok(())
    }
}
