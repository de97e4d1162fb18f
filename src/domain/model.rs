use serde::{Deserialize, Serialize};
use std::path::Path;
use tempfile::TempPath;

/// Subset of the OpenWeatherMap "current weather" payload. Every field falls
/// back to its default so partial responses still produce a report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherReport {
    pub name: String,
    pub weather: Vec<Condition>,
    pub main: MainConditions,
    pub wind: Wind,
    pub rain: Rain,
    pub clouds: Clouds,
    pub sys: Sys,
    /// Observation time, unix seconds.
    pub dt: i64,
    /// Offset from UTC in seconds for the reported location.
    pub timezone: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Condition {
    pub main: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MainConditions {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub pressure: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Wind {
    /// Metres per second.
    pub speed: f64,
    pub deg: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Rain {
    #[serde(rename = "1h")]
    pub one_hour: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Clouds {
    pub all: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Sys {
    pub country: String,
    pub sunrise: i64,
    pub sunset: i64,
}

impl WeatherReport {
    /// First reported condition, if the API sent any.
    pub fn condition(&self) -> Option<&Condition> {
        self.weather.first()
    }

    pub fn wind_speed_kmh(&self) -> f64 {
        self.wind.speed * 3.6
    }

    pub fn rain_last_hour(&self) -> f64 {
        self.rain.one_hour
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweetContent {
    pub lines: Vec<String>,
    pub hashtags: Vec<String>,
}

impl TweetContent {
    /// Body plus every hashtag, without any length limit.
    pub fn full_text(&self) -> String {
        if self.hashtags.is_empty() {
            return self.lines.join("\n");
        }
        format!("{}\n{}", self.lines.join("\n"), self.hashtags.join(" "))
    }
}

/// A rendered PNG on disk. The file is removed when this value is dropped.
#[derive(Debug)]
pub struct RenderedImage {
    path: TempPath,
}

impl RenderedImage {
    pub fn new(path: TempPath) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Posted { tweet_id: String, text: String },
    /// Posting disabled; the composed text is returned for inspection.
    Skipped { text: String },
}
