use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Weather lookup failed: {message}")]
    WeatherError { message: String },

    #[error("Template error: {message}")]
    TemplateError { message: String },

    #[error("Image rendering failed: {message}")]
    RenderError { message: String },

    #[error("Twitter API returned {status}: {message}")]
    TwitterError { status: u16, message: String },

    #[error("Twitter rate limit exceeded")]
    RateLimited,

    #[error("Posting prerequisites not met: {message}")]
    PrerequisiteError { message: String },
}

impl BotError {
    pub fn user_friendly_message(&self) -> String {
        match self {
            BotError::HttpError(e) if e.is_timeout() => {
                "A remote service did not answer in time".to_string()
            }
            BotError::HttpError(_) => "Could not reach a remote service".to_string(),
            BotError::IoError(e) => format!("File system error: {}", e),
            BotError::SerializationError(_) => {
                "Received a response that could not be understood".to_string()
            }
            BotError::ConfigError { message } => format!("Configuration problem: {}", message),
            BotError::MissingConfigError { field } => {
                format!("Required setting '{}' is not set", field)
            }
            BotError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            BotError::WeatherError { message } => {
                format!("Could not retrieve the weather: {}", message)
            }
            BotError::TemplateError { message } => {
                format!("Could not prepare the weather widget: {}", message)
            }
            BotError::RenderError { message } => {
                format!("Could not render the weather widget: {}", message)
            }
            BotError::TwitterError { status, .. } => {
                format!("Twitter rejected the request (HTTP {})", status)
            }
            BotError::RateLimited => "Twitter rate limit reached, tweet not posted".to_string(),
            BotError::PrerequisiteError { message } => message.clone(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            BotError::HttpError(_) => "Check network connectivity and the configured endpoints",
            BotError::IoError(_) => "Check file permissions and available disk space",
            BotError::SerializationError(_) => "Verify the remote API version matches the client",
            BotError::ConfigError { .. } | BotError::InvalidConfigValueError { .. } => {
                "Fix the configuration file or environment variables"
            }
            BotError::MissingConfigError { .. } => "Set the missing environment variable",
            BotError::WeatherError { .. } => {
                "Check WEATHER_API_KEY and that the city is known to OpenWeatherMap"
            }
            BotError::TemplateError { .. } => "Check WIDGET_TEMPLATE_PATH and its placeholders",
            BotError::RenderError { .. } => {
                "Make sure wkhtmltoimage is installed and a display (xvfb-run) is available"
            }
            BotError::TwitterError { .. } => "Check the Twitter app permissions and credentials",
            BotError::RateLimited => "Wait for the rate limit window to reset",
            BotError::PrerequisiteError { .. } => {
                "Set all four TWITTER_* credentials or disable posting"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
