use serde::Deserialize;
use service_core::config::{self as core_config, get_env, get_env_parsed, Environment};
use service_core::error::AppError;
use service_core::serialize::{HttpUrl, RedisDsn, SecretStr, UrlError};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub debug: bool,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub mongodb: MongoConfig,
    pub cache: CacheConfig,
    pub agent: AgentRuntimeConfig,
    pub image: ImageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretStr,
}

impl CacheConfig {
    /// Connection URL. Credentials are only embedded outside local
    /// environments; the password is percent-encoded.
    pub fn url(&self, environment: Environment) -> Result<RedisDsn, UrlError> {
        let raw = if environment.is_local() {
            format!("{}://{}:{}", self.scheme, self.host, self.port)
        } else {
            format!(
                "{}://{}:{}@{}:{}",
                self.scheme,
                self.user,
                urlencoding::encode(self.password.expose()),
                self.host,
                self.port
            )
        };
        RedisDsn::parse(&raw)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentRuntimeConfig {
    /// OpenAI-compatible API root, e.g. an Ollama `/v1` endpoint.
    pub base_url: HttpUrl,
    pub model: String,
    pub system_prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    pub api_url: HttpUrl,
    pub output_dir: PathBuf,
}

impl AgentConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let environment = Environment::from_env()?;
        let is_prod = environment.is_prod();

        let otlp_endpoint = std::env::var("OTLP_ENDPOINT")
            .ok()
            .filter(|endpoint| !endpoint.is_empty());

        Ok(AgentConfig {
            common: common_config,
            environment,
            debug: get_env_parsed("DEBUG", Some("false"), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("agent_db"), is_prod)?,
            },
            cache: CacheConfig {
                scheme: get_env("CACHE_SCHEME", Some("redis"), is_prod)?,
                host: get_env("CACHE_HOST", Some("localhost"), is_prod)?,
                port: get_env_parsed("CACHE_PORT", Some("6379"), is_prod)?,
                user: get_env("CACHE_USER", Some("default"), is_prod)?,
                password: SecretStr::new(get_env("CACHE_PASSWORD", Some(""), is_prod)?),
            },
            agent: AgentRuntimeConfig {
                base_url: parse_url(
                    "AGENT_BASE_URL",
                    &get_env("AGENT_BASE_URL", Some("http://llm:11434/v1"), is_prod)?,
                )?,
                model: get_env("AGENT_MODEL", Some("getrobi/lexa-1.5b"), false)?,
                system_prompt: get_env("AGENT_SYSTEM_PROMPT", Some("Answer concisely."), false)?,
            },
            image: ImageConfig {
                api_url: parse_url(
                    "IMAGE_API_URL",
                    &get_env("IMAGE_API_URL", Some("http://diffusion:7860"), is_prod)?,
                )?,
                output_dir: PathBuf::from(get_env("IMAGE_OUTPUT_DIR", Some("media/image"), false)?),
            },
        })
    }

    pub fn cache_url(&self) -> Result<RedisDsn, AppError> {
        self.cache
            .url(self.environment)
            .map_err(|e| AppError::Config(anyhow::anyhow!("invalid cache URL: {}", e)))
    }
}

fn parse_url(key: &str, raw: &str) -> Result<HttpUrl, AppError> {
    HttpUrl::parse(raw).map_err(|e| AppError::Config(anyhow::anyhow!("{} is invalid: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> CacheConfig {
        CacheConfig {
            scheme: "redis".to_string(),
            host: "cache".to_string(),
            port: 6379,
            user: "default".to_string(),
            password: SecretStr::new("p@ss word"),
        }
    }

    #[test]
    fn local_cache_url_has_no_credentials() {
        let url = cache().url(Environment::Local).unwrap();
        assert_eq!(url.as_url().host_str(), Some("cache"));
        assert_eq!(url.as_url().port(), Some(6379));
        assert_eq!(url.as_url().username(), "");
        assert!(url.as_url().password().is_none());
    }

    #[test]
    fn remote_cache_url_encodes_password() {
        let url = cache().url(Environment::Prod).unwrap();
        assert_eq!(url.as_url().username(), "default");
        assert_eq!(url.as_url().password(), Some("p%40ss%20word"));
        assert!(url.as_str().starts_with("redis://"));
    }

    #[test]
    fn password_is_masked_in_debug_output() {
        let rendered = format!("{:?}", cache());
        assert!(!rendered.contains("p@ss word"));
    }

    #[test]
    fn non_redis_scheme_is_rejected() {
        let mut config = cache();
        config.scheme = "http".to_string();
        assert!(config.url(Environment::Dev).is_err());
    }
}
