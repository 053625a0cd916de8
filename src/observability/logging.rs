use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::{AppError, Result};

/// Configuration for logging.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
    pub include_file: bool,
    pub include_line: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
            include_file: false,
            include_line: false,
        }
    }
}

impl LogConfig {
    pub fn from_settings(settings: &crate::config::ApplicationSettings) -> Self {
        Self {
            level: settings.log_level.clone(),
            format: LogFormat::from(settings.log_format.as_str()),
            ..Self::default()
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl From<&str> for LogFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initializes the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = match config.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(config.include_target)
                .with_file(config.include_file)
                .with_line_number(config.include_line)
                .with_span_events(FmtSpan::CLOSE);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(config.include_target)
                .with_file(config.include_file)
                .with_line_number(config.include_line);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(config.include_target)
                .with_file(config.include_file)
                .with_line_number(config.include_line);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
        }
    };
    result.map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to initialize logging: {}", e)))?;

    tracing::info!("Logging initialized with level: {}", config.level);
    Ok(())
}

/// Masks sensitive data in strings, keeping `visible_chars` at each end.
pub fn mask_sensitive(value: &str, visible_chars: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= visible_chars * 2 {
        return "*".repeat(chars.len());
    }

    let prefix: String = chars[..visible_chars].iter().collect();
    let suffix: String = chars[chars.len() - visible_chars..].iter().collect();
    let masked_len = chars.len() - (visible_chars * 2);

    format!("{}{}{}", prefix, "*".repeat(masked_len), suffix)
}

/// Masks a UUID, showing only first and last 4 characters.
pub fn mask_uuid(uuid: &uuid::Uuid) -> String {
    let s = uuid.to_string();
    mask_sensitive(&s, 4)
}

/// Masks an email address, keeping the first character and the domain.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => match local.chars().next() {
            Some(first) => format!(
                "{}{}@{}",
                first,
                "*".repeat(local.chars().count() - 1),
                domain
            ),
            None => format!("@{}", domain),
        },
        None => "*".repeat(email.chars().count()),
    }
}

/// Masks currency amounts for logging (shows magnitude only).
pub fn mask_amount(amount: &rust_decimal::Decimal) -> String {
    let abs = amount.abs();
    if abs >= rust_decimal::Decimal::from(1_000_000) {
        "***M+".to_string()
    } else if abs >= rust_decimal::Decimal::from(1_000) {
        "***K+".to_string()
    } else {
        "***".to_string()
    }
}
