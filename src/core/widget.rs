use crate::core::compose::{degrees_to_cardinal, title_case};
use crate::core::WeatherReport;
use crate::utils::error::{BotError, Result};
use chrono::{DateTime, FixedOffset};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;

const BUILTIN_TEMPLATE: &str = include_str!("../../templates/weather_widget.html");

/// Formats a unix timestamp in the given UTC offset, e.g. `6:02 AM, Oct 15, 2025`.
pub fn format_unix_timestamp(unix_ts: i64, offset_seconds: i32) -> Option<String> {
    Some(to_local(unix_ts, offset_seconds)?.format("%-I:%M %p, %b %d, %Y").to_string())
}

/// Time of day only, e.g. `6:02 AM`.
pub fn format_unix_time(unix_ts: i64, offset_seconds: i32) -> Option<String> {
    Some(to_local(unix_ts, offset_seconds)?.format("%-I:%M %p").to_string())
}

fn to_local(unix_ts: i64, offset_seconds: i32) -> Option<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(offset_seconds)?;
    Some(DateTime::from_timestamp(unix_ts, 0)?.with_timezone(&offset))
}

/// HTML entity for the dominant weather condition.
pub fn weather_icon(weather_main: &str) -> &'static str {
    let condition = weather_main.to_lowercase();
    if condition.contains("clear") {
        "&#9728;"
    } else if condition.contains("rain") || condition.contains("drizzle") {
        "&#127783;"
    } else if condition.contains("snow") {
        "&#10052;"
    } else if condition.contains("thunderstorm") {
        "&#9741;"
    } else {
        "&#9729;"
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Values available to `{{ name }}` placeholders, stored ready for insertion.
#[derive(Debug, Default, Clone)]
pub struct WidgetContext {
    values: HashMap<String, String>,
}

impl WidgetContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_text(&mut self, key: &str, value: impl AsRef<str>) {
        self.values.insert(key.to_string(), escape_html(value.as_ref()));
    }

    pub fn insert_raw(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn from_report(report: &WeatherReport) -> Self {
        let offset = report.timezone;
        let condition = report.condition();
        let description = condition
            .map(|c| title_case(&c.description))
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "N/A".to_string());
        let time_or_na = |ts: i64, f: fn(i64, i32) -> Option<String>| {
            f(ts, offset).unwrap_or_else(|| "N/A".to_string())
        };

        let mut ctx = Self::new();
        ctx.insert_text("city", &report.name);
        ctx.insert_text("country", &report.sys.country);
        ctx.insert_raw("icon", weather_icon(condition.map(|c| c.main.as_str()).unwrap_or("")));
        ctx.insert_text("description", description);
        ctx.insert_text("temperature", format!("{:.0}", report.main.temp));
        ctx.insert_text("feels_like", format!("{:.0}", report.main.feels_like));
        ctx.insert_text("temp_min", format!("{:.0}", report.main.temp_min));
        ctx.insert_text("temp_max", format!("{:.0}", report.main.temp_max));
        ctx.insert_text("humidity", format!("{:.0}", report.main.humidity));
        ctx.insert_text("pressure", format!("{:.0}", report.main.pressure));
        ctx.insert_text("wind_speed", format!("{:.0}", report.wind_speed_kmh()));
        ctx.insert_text("wind_direction", degrees_to_cardinal(report.wind.deg));
        ctx.insert_text("clouds", format!("{:.0}", report.clouds.all));
        ctx.insert_text("rain", format!("{:.2}", report.rain_last_hour()));
        ctx.insert_text("sunrise", time_or_na(report.sys.sunrise, format_unix_time));
        ctx.insert_text("sunset", time_or_na(report.sys.sunset, format_unix_time));
        ctx.insert_text("updated_at", time_or_na(report.dt, format_unix_timestamp));
        ctx
    }
}

#[derive(Debug, Clone)]
pub struct WidgetTemplate {
    source: String,
}

impl WidgetTemplate {
    pub fn builtin() -> Self {
        Self {
            source: BUILTIN_TEMPLATE.to_string(),
        }
    }

    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Reads the template from `path`, or falls back to the built-in one.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let source = std::fs::read_to_string(path).map_err(|e| BotError::TemplateError {
                    message: format!("HTML template {} could not be read: {}", path.display(), e),
                })?;
                Ok(Self { source })
            }
            None => Ok(Self::builtin()),
        }
    }

    pub fn render(&self, ctx: &WidgetContext) -> Result<String> {
        let re = Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").map_err(|e| {
            BotError::TemplateError {
                message: format!("Invalid placeholder pattern: {}", e),
            }
        })?;

        let mut unknown: Vec<String> = Vec::new();
        let rendered = re.replace_all(&self.source, |caps: &Captures| match ctx.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => {
                unknown.push(caps[1].to_string());
                String::new()
            }
        });

        if !unknown.is_empty() {
            return Err(BotError::TemplateError {
                message: format!("Unknown placeholders: {}", unknown.join(", ")),
            });
        }
        Ok(rendered.into_owned())
    }
}
