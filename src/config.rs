use std::{env, fmt, net::SocketAddr, str::FromStr};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Development,
    Staging,
    Production,
}

impl AppEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnv::Development => "development",
            AppEnv::Staging => "staging",
            AppEnv::Production => "production",
        }
    }

    /// Log filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            AppEnv::Development => "debug,sqlx=warn",
            AppEnv::Staging => "info",
            AppEnv::Production => "warn",
        }
    }
}

impl FromStr for AppEnv {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "dev" | "development" => Ok(AppEnv::Development),
            "staging" => Ok(AppEnv::Staging),
            "prod" | "production" => Ok(AppEnv::Production),
            other => Err(AppError::Config(format!("unknown APP_ENV: {other}"))),
        }
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub app_env: AppEnv,
    pub default_currency: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://travia.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let app_env = env::var("APP_ENV")
            .map(|raw| raw.parse())
            .unwrap_or(Ok(AppEnv::Development))?;

        let default_currency = env::var("DEFAULT_CURRENCY")
            .map(|raw| raw.trim().to_ascii_uppercase())
            .ok()
            .filter(|code| code.len() == 3)
            .unwrap_or_else(|| "USD".to_string());

        Ok(Self {
            database_url,
            listen_addr,
            app_env,
            default_currency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_environments() {
        assert_eq!("production".parse::<AppEnv>().unwrap(), AppEnv::Production);
        assert_eq!("Staging".parse::<AppEnv>().unwrap(), AppEnv::Staging);
        assert_eq!("".parse::<AppEnv>().unwrap(), AppEnv::Development);
        assert!("qa".parse::<AppEnv>().is_err());
    }

    #[test]
    fn production_only_logs_warnings() {
        assert_eq!(AppEnv::Production.default_log_filter(), "warn");
    }
}
