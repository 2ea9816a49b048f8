use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub fills_replay_path: Option<String>,
    pub pnl_mode: PnlMode,
    pub collateral_currency: Option<String>,
}

/// Whether realised PNL is reported before or after fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnlMode {
    Gross,
    Net,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            fills_replay_path: None,
            pnl_mode: PnlMode::Net,
            collateral_currency: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let fills_replay_path = non_empty(&env_map, "FILLS_REPLAY_PATH");

        let pnl_mode = match env_map
            .get("PNL_MODE")
            .map(|s| s.as_str())
            .unwrap_or("net")
        {
            "gross" => PnlMode::Gross,
            "net" => PnlMode::Net,
            other => {
                return Err(ConfigError::InvalidValue(
                    "PNL_MODE".to_string(),
                    format!("must be gross or net, got {}", other),
                ))
            }
        };

        let collateral_currency = non_empty(&env_map, "COLLATERAL_CURRENCY")
            .map(|code| code.to_uppercase());
        if let Some(code) = &collateral_currency {
            if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ConfigError::InvalidValue(
                    "COLLATERAL_CURRENCY".to_string(),
                    format!("must be an alphanumeric currency code, got {}", code),
                ));
            }
        }

        Ok(Config {
            port,
            fills_replay_path,
            pnl_mode,
            collateral_currency,
        })
    }
}

fn non_empty(env_map: &HashMap<String, String>, key: &str) -> Option<String> {
    env_map
        .get(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
