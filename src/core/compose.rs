use crate::core::{TweetContent, WeatherReport};
use chrono::{DateTime, Datelike, FixedOffset, Weekday};

const CARDINALS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

const HEATWAVE_CELSIUS: f64 = 35.0;
const COOL_CELSIUS: f64 = 18.0;
const WINDY_KMH: f64 = 25.0;
const HEAVY_RAIN_MM: f64 = 0.5;

/// Maps a wind bearing in degrees to a 16-point compass direction.
pub fn degrees_to_cardinal(degrees: f64) -> &'static str {
    let ix = ((degrees + 11.25) / 22.5).floor() as i64;
    CARDINALS[ix.rem_euclid(16) as usize]
}

/// Capitalises the first letter of every word and lowercases the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

pub fn generate_hashtags(report: &WeatherReport, weekday: Weekday, base: &[String]) -> Vec<String> {
    let mut hashtags: Vec<String> = Vec::new();
    let mut add = |tag: &str| {
        if !hashtags.iter().any(|t| t == tag) {
            hashtags.push(tag.to_string());
        }
    };

    for tag in base {
        add(tag);
    }

    let description = report
        .condition()
        .map(|c| c.description.to_lowercase())
        .unwrap_or_default();

    if report.rain_last_hour() > 0.0 {
        add("#HyderabadRains");
        add("#rain");
    }
    if report.main.temp > HEATWAVE_CELSIUS {
        add("#Heatwave");
    }
    if description.contains("clear") {
        add("#SunnyDay");
    }
    if report.wind_speed_kmh() > WINDY_KMH {
        add("#windy");
    }
    if matches!(weekday, Weekday::Sat | Weekday::Sun) {
        add("#WeekendWeather");
    }

    hashtags
}

fn closing_message(rain_mm: f64, temp: f64) -> &'static str {
    if rain_mm > HEAVY_RAIN_MM {
        "Stay dry out there! 🌧️"
    } else if temp > HEATWAVE_CELSIUS {
        "It's a hot one! Stay cool & hydrated. ☀️"
    } else if temp < COOL_CELSIUS {
        "Brr, it's cool! Consider a light jacket. 🧣"
    } else {
        "Enjoy your day! 😊"
    }
}

/// Builds the tweet body lines and hashtags for `report` as observed at `now`.
pub fn compose(
    city: &str,
    report: &WeatherReport,
    now: DateTime<FixedOffset>,
    base_hashtags: &[String],
) -> TweetContent {
    let sky = report
        .condition()
        .map(|c| c.description.as_str())
        .filter(|d| !d.is_empty())
        .map(title_case)
        .unwrap_or_else(|| "N/A".to_string());

    let temp = report.main.temp;
    let rain = report.rain_last_hour();
    let rain_line = if rain > 0.0 {
        format!("☔ Rain: {:.2} mm/hr", rain)
    } else {
        "☔ No Rain".to_string()
    };

    let greeting = format!(
        "Hello, {}!👋, {} weather at {} {}, {}:",
        city,
        now.format("%A"),
        now.day(),
        now.format("%B"),
        now.format("%I:%M %p"),
    );

    let lines = vec![
        greeting,
        format!("☁️ Sky: {}", sky),
        format!("🌡️ Temp: {:.0}°C (feels: {:.0}°C)", temp, report.main.feels_like),
        format!("💧 Humidity: {:.0}%", report.main.humidity),
        format!(
            "💨 Wind: {:.0} km/h from the {}",
            report.wind_speed_kmh(),
            degrees_to_cardinal(report.wind.deg)
        ),
        rain_line,
        String::new(),
        closing_message(rain, temp).to_string(),
    ];

    TweetContent {
        lines,
        hashtags: generate_hashtags(report, now.weekday(), base_hashtags),
    }
}

/// Joins the body and as many hashtags as fit, dropping from the end first.
pub fn fit_tweet(content: &TweetContent, max_chars: usize) -> String {
    let body = content.lines.join("\n");
    let mut hashtags = content.hashtags.clone();

    while !hashtags.is_empty() {
        let full = format!("{}\n{}", body, hashtags.join(" "));
        if full.chars().count() <= max_chars {
            return full;
        }
        hashtags.pop();
    }

    body
}
