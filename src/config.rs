use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub ledger: LedgerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSettings {
    /// Currency code assigned to groups created without one.
    pub default_currency: String,
    /// Whether new groups list debts as a netted settlement plan.
    #[serde(default)]
    pub debt_simplification_default: bool,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            application: ApplicationSettings {
                log_level: "info".to_string(),
                log_format: default_log_format(),
            },
            ledger: LedgerSettings {
                default_currency: "USD".to_string(),
                debt_simplification_default: false,
            },
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .set_default("application.log_level", "info")?
            .set_default("application.log_format", "pretty")?
            .set_default("ledger.default_currency", "USD")?
            .set_default("ledger.debt_simplification_default", false)?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }
}
