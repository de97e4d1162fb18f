use crate::config::BotConfig;
use crate::core::compose::{compose, fit_tweet};
use crate::core::render::WkhtmlRenderer;
use crate::core::twitter::TwitterPublisher;
use crate::core::weather::OpenWeatherClient;
use crate::core::widget::{WidgetContext, WidgetTemplate};
use crate::core::{ImageRenderer, Publisher, TaskOutcome, TaskRunner, WeatherSource};
use crate::utils::error::{BotError, Result};
use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Fetch weather, render the widget, compose and post the tweet.
pub struct TweetTask<W: WeatherSource, R: ImageRenderer, P: Publisher> {
    city: String,
    base_hashtags: Vec<String>,
    offset: FixedOffset,
    max_chars: usize,
    posting_enabled: bool,
    template: WidgetTemplate,
    weather: W,
    renderer: R,
    publisher: Option<P>,
    clock: Clock,
}

/// The production wiring.
pub type BotTask = TweetTask<OpenWeatherClient, WkhtmlRenderer, TwitterPublisher>;

impl<W: WeatherSource, R: ImageRenderer, P: Publisher> TweetTask<W, R, P> {
    pub fn new(
        config: &BotConfig,
        template: WidgetTemplate,
        weather: W,
        renderer: R,
        publisher: Option<P>,
    ) -> Result<Self> {
        let offset = FixedOffset::east_opt(config.report.utc_offset_seconds).ok_or_else(|| {
            BotError::InvalidConfigValueError {
                field: "report.utc_offset_seconds".to_string(),
                value: config.report.utc_offset_seconds.to_string(),
                reason: "offset must be within one day".to_string(),
            }
        })?;

        Ok(Self {
            city: config.city.clone(),
            base_hashtags: config.report.base_hashtags.clone(),
            offset,
            max_chars: config.twitter.max_chars,
            posting_enabled: config.twitter.enabled,
            template,
            weather,
            renderer,
            publisher,
            clock: Arc::new(Utc::now),
        })
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    async fn execute(&self) -> Result<TaskOutcome> {
        let report = self
            .weather
            .fetch(&self.city)
            .await
            .inspect_err(|_| tracing::warn!("Could not retrieve weather for {}. Aborting.", self.city))?;

        let html = self.template.render(&WidgetContext::from_report(&report))?;
        // Dropping `image` deletes the file, whichever way this function returns.
        let image = self
            .renderer
            .render(&html)
            .await
            .inspect_err(|_| tracing::warn!("Failed to create weather image. Aborting tweet."))?;

        let now = (self.clock)().with_timezone(&self.offset);
        let content = compose(&self.city, &report, now, &self.base_hashtags);

        if !self.posting_enabled {
            let text = content.full_text();
            tracing::info!("[TEST MODE] Skipping post. Content:\n{}", text);
            return Ok(TaskOutcome::Skipped { text });
        }

        let text = fit_tweet(&content, self.max_chars);
        let publisher = self.publisher.as_ref().ok_or_else(|| {
            tracing::error!("Tweet posting prerequisites not met. Aborting.");
            BotError::PrerequisiteError {
                message: "Twitter credentials are not configured".to_string(),
            }
        })?;

        let tweet_id = publisher.publish(&text, &image).await?;
        tracing::info!("Final Tweet ({} chars): \n{}", text.chars().count(), text);
        Ok(TaskOutcome::Posted { tweet_id, text })
    }
}

#[async_trait::async_trait]
impl<W: WeatherSource, R: ImageRenderer, P: Publisher> TaskRunner for TweetTask<W, R, P> {
    async fn run(&self) -> Result<TaskOutcome> {
        tracing::info!("--- Running weather tweet job for {} ---", self.city);

        match self.execute().await {
            Ok(outcome) => {
                tracing::info!("✅ Tweet task for {} completed successfully.", self.city);
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(
                    "❌ Tweet task for {} did not complete successfully: {}",
                    self.city,
                    e
                );
                tracing::warn!("💡 Suggestion: {}", e.recovery_suggestion());
                Err(e)
            }
        }
    }
}

impl BotTask {
    /// Wires the real weather, rendering and Twitter clients from configuration.
    pub fn from_config(config: &BotConfig) -> Result<Self> {
        let template = WidgetTemplate::load(config.render.template_path.as_deref())?;
        let weather = OpenWeatherClient::new(&config.weather, &config.country_code)?;
        let renderer = WkhtmlRenderer::new(&config.render);

        let publisher = match &config.twitter.credentials {
            Some(credentials) => {
                tracing::info!("Twitter client initialized successfully.");
                Some(TwitterPublisher::new(&config.twitter, credentials.clone())?)
            }
            None => {
                if config.twitter.enabled {
                    tracing::error!("Twitter credentials missing; posting will fail until they are set.");
                }
                None
            }
        };

        if config.twitter.enabled {
            tracing::info!("Twitter interactions ARE ENABLED.");
        } else {
            tracing::warn!("Twitter interactions are DISABLED (Test Mode).");
        }

        Self::new(config, template, weather, renderer, publisher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RenderedImage, WeatherReport};
    use crate::domain::model::{Condition, MainConditions};
    use chrono::TimeZone;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct FixedWeather(Option<WeatherReport>);

    #[async_trait::async_trait]
    impl WeatherSource for FixedWeather {
        async fn fetch(&self, _city: &str) -> Result<WeatherReport> {
            self.0.clone().ok_or_else(|| BotError::WeatherError {
                message: "unavailable".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct FakeRenderer {
        last_path: Mutex<Option<PathBuf>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ImageRenderer for FakeRenderer {
        async fn render(&self, html: &str) -> Result<RenderedImage> {
            if self.fail {
                return Err(BotError::RenderError {
                    message: "no display".to_string(),
                });
            }
            let mut file = tempfile::Builder::new().suffix(".png").tempfile()?;
            file.write_all(html.as_bytes())?;
            let path = file.into_temp_path();
            *self.last_path.lock().unwrap() = Some(path.to_path_buf());
            Ok(RenderedImage::new(path))
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        posted: Mutex<Vec<String>>,
        image_existed: Mutex<bool>,
    }

    #[async_trait::async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, text: &str, image: &RenderedImage) -> Result<String> {
            *self.image_existed.lock().unwrap() = image.path().exists();
            self.posted.lock().unwrap().push(text.to_string());
            Ok("1850000000000000000".to_string())
        }
    }

    fn sample_report() -> WeatherReport {
        WeatherReport {
            name: "Gachibowli".to_string(),
            weather: vec![Condition {
                main: "Clouds".to_string(),
                description: "scattered clouds".to_string(),
            }],
            main: MainConditions {
                temp: 28.0,
                feels_like: 30.0,
                humidity: 70.0,
                ..Default::default()
            },
            timezone: 19800,
            ..Default::default()
        }
    }

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 15, 3, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn test_posts_composed_tweet() {
        let config = BotConfig::new();
        let task = TweetTask::new(
            &config,
            WidgetTemplate::builtin(),
            FixedWeather(Some(sample_report())),
            FakeRenderer::default(),
            Some(RecordingPublisher::default()),
        )
        .unwrap()
        .with_clock(fixed_clock);

        let outcome = task.run().await.unwrap();

        let TaskOutcome::Posted { tweet_id, text } = outcome else {
            panic!("expected a posted tweet");
        };
        assert_eq!(tweet_id, "1850000000000000000");
        assert!(text.starts_with("Hello, Gachibowli!👋, Wednesday weather at 15 October, 09:00 AM:"));
        assert!(text.ends_with("#Gachibowli #Hyderabad #weatherupdate"));

        let publisher = task.publisher.as_ref().unwrap();
        assert_eq!(publisher.posted.lock().unwrap().as_slice(), [text.as_str()]);
        assert!(*publisher.image_existed.lock().unwrap());

        let image_path = task.renderer.last_path.lock().unwrap().clone().unwrap();
        assert!(!image_path.exists());
    }

    #[tokio::test]
    async fn test_test_mode_skips_posting_and_cleans_up() {
        let mut config = BotConfig::new();
        config.twitter.enabled = false;
        let task = TweetTask::new(
            &config,
            WidgetTemplate::builtin(),
            FixedWeather(Some(sample_report())),
            FakeRenderer::default(),
            Some(RecordingPublisher::default()),
        )
        .unwrap()
        .with_clock(fixed_clock);

        let outcome = task.run().await.unwrap();

        assert!(matches!(outcome, TaskOutcome::Skipped { .. }));
        assert!(task.publisher.as_ref().unwrap().posted.lock().unwrap().is_empty());
        let image_path = task.renderer.last_path.lock().unwrap().clone().unwrap();
        assert!(!image_path.exists());
    }

    #[tokio::test]
    async fn test_test_mode_reports_untrimmed_text() {
        let mut config = BotConfig::new();
        config.twitter.enabled = false;
        config.twitter.max_chars = 40;
        let task = TweetTask::new(
            &config,
            WidgetTemplate::builtin(),
            FixedWeather(Some(sample_report())),
            FakeRenderer::default(),
            Some(RecordingPublisher::default()),
        )
        .unwrap()
        .with_clock(fixed_clock);

        let TaskOutcome::Skipped { text } = task.run().await.unwrap() else {
            panic!("expected a skipped run");
        };
        assert!(text.chars().count() > 40);
        assert!(text.starts_with("Hello, Gachibowli!👋"));
        assert!(text.ends_with("#Gachibowli #Hyderabad #weatherupdate"));
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_when_live() {
        let config = BotConfig::new();
        let task: TweetTask<_, _, RecordingPublisher> = TweetTask::new(
            &config,
            WidgetTemplate::builtin(),
            FixedWeather(Some(sample_report())),
            FakeRenderer::default(),
            None,
        )
        .unwrap();

        let err = task.run().await.unwrap_err();
        assert!(matches!(err, BotError::PrerequisiteError { .. }));
    }

    #[tokio::test]
    async fn test_weather_failure_aborts_before_rendering() {
        let config = BotConfig::new();
        let task = TweetTask::new(
            &config,
            WidgetTemplate::builtin(),
            FixedWeather(None),
            FakeRenderer::default(),
            Some(RecordingPublisher::default()),
        )
        .unwrap();

        let err = task.run().await.unwrap_err();
        assert!(matches!(err, BotError::WeatherError { .. }));
        assert!(task.renderer.last_path.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_render_failure_aborts_tweet() {
        let config = BotConfig::new();
        let task = TweetTask::new(
            &config,
            WidgetTemplate::builtin(),
            FixedWeather(Some(sample_report())),
            FakeRenderer {
                fail: true,
                ..Default::default()
            },
            Some(RecordingPublisher::default()),
        )
        .unwrap();

        let err = task.run().await.unwrap_err();
        assert!(matches!(err, BotError::RenderError { .. }));
        assert!(task.publisher.as_ref().unwrap().posted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_offset_is_rejected() {
        let mut config = BotConfig::new();
        config.report.utc_offset_seconds = 90_000;
        let result = TweetTask::new(
            &config,
            WidgetTemplate::builtin(),
            FixedWeather(None),
            FakeRenderer::default(),
            Some(RecordingPublisher::default()),
        );
        assert!(result.is_err());
    }
}
