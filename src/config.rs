use std::env;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("You need to add {0} to the env")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub mongodb_uri: String,
    pub database: String,
    pub bind_address: String,
    pub port: u16,
    /// Allowed browser origin; any origin when unset.
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mongodb_uri = value("MONGODB_URI").ok_or(ConfigError::Missing("MONGODB_URI"))?;
        let port = match value("PORT") {
            Some(port) => port.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: port,
            })?,
            None => 8080,
        };
        Ok(Config {
            mongodb_uri,
            database: value("BILLSPLIT_DATABASE").unwrap_or_else(|| "BillSplit".to_string()),
            bind_address: value("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            cors_origin: value("CORS_ORIGIN"),
        })
    }
}
