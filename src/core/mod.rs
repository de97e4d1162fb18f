pub mod compose;
pub mod render;
pub mod task;
pub mod twitter;
pub mod weather;
pub mod widget;

pub use crate::domain::model::{RenderedImage, TaskOutcome, TweetContent, WeatherReport};
pub use crate::domain::ports::{ImageRenderer, Publisher, TaskRunner, WeatherSource};
pub use crate::utils::error::Result;
