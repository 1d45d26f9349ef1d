use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::{Deserialize, Serialize};
use std::{env, fmt, str::FromStr};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// Deployment environment, read from `ENVIRONMENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    #[default]
    Dev,
    Prod,
}

impl Environment {
    pub fn from_env() -> Result<Self, AppError> {
        match env::var("ENVIRONMENT") {
            Ok(raw) => raw.parse(),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn is_local(self) -> bool {
        self == Self::Local
    }

    pub fn is_prod(self) -> bool {
        self == Self::Prod
    }
}

impl FromStr for Environment {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => Err(AppError::Config(anyhow::anyhow!(
                "ENVIRONMENT must be one of local, dev, prod; got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Dev => "dev",
            Self::Prod => "prod",
        })
    }
}

/// Read `key` from the environment. Outside prod a missing key falls back to
/// `default`; in prod every key must be set explicitly.
pub fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) if is_prod => Err(AppError::Config(anyhow::anyhow!(
            "{} is required in production but not set",
            key
        ))),
        Err(_) => default.map(str::to_string).ok_or_else(|| {
            AppError::Config(anyhow::anyhow!("{} is required but not set", key))
        }),
    }
}

/// Like [`get_env`] but parses the value, naming the key on failure.
pub fn get_env_parsed<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = get_env(key, default, is_prod)?;
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::Config(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parses_case_insensitively() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert_eq!(" local ".parse::<Environment>().unwrap(), Environment::Local);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn missing_key_uses_default_outside_prod() {
        let value = get_env("SERVICE_CORE_TEST_UNSET_KEY", Some("fallback"), false).unwrap();
        assert_eq!(value, "fallback");
    }

    #[test]
    fn missing_key_fails_in_prod() {
        let err = get_env("SERVICE_CORE_TEST_UNSET_KEY", Some("fallback"), true).unwrap_err();
        assert!(err.to_string().contains("SERVICE_CORE_TEST_UNSET_KEY"));
    }

    #[test]
    fn parsed_value_reports_key() {
        let err = get_env_parsed::<u16>("SERVICE_CORE_TEST_UNSET_KEY", Some("abc"), false)
            .unwrap_err();
        assert!(err.to_string().contains("invalid value 'abc'"));
        let port: u16 = get_env_parsed("SERVICE_CORE_TEST_UNSET_KEY", Some("6379"), false).unwrap();
        assert_eq!(port, 6379);
    }
}
