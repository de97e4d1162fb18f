use crate::domain::model::{RenderedImage, TaskOutcome, WeatherReport};
use crate::utils::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch(&self, city: &str) -> Result<WeatherReport>;
}

#[async_trait]
pub trait ImageRenderer: Send + Sync {
    async fn render(&self, html: &str) -> Result<RenderedImage>;
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Posts `text` with the image attached and returns the new tweet id.
    async fn publish(&self, text: &str, image: &RenderedImage) -> Result<String>;
}

/// Something that can execute one full weather-tweet run.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self) -> Result<TaskOutcome>;
}
