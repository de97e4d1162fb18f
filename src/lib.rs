pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

pub use config::{cli::CliArgs, BotConfig};
pub use core::task::{BotTask, TweetTask};
pub use domain::model::TaskOutcome;
pub use utils::error::{BotError, Result};
