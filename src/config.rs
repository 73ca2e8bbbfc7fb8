//! Configuration loading with env-var overrides.
//!
//! Reads one TOML file (`config/default.toml` unless a path is given) and
//! applies environment overrides. Secrets (`NEO4J_PASSWORD`, `LLM_API_KEY`)
//! come only from the environment; the TOML schema has no field for them,
//! so putting one in a file is a parse error.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::export::ExportOptions;
use crate::generator::OpenAiConfig;
use crate::pipeline::RetrievalSettings;
use crate::storage::neo4j_http::Neo4jConfig;
use crate::{Error, Result};

/// Path tried when no explicit config path is given.
pub const DEFAULT_PATH: &str = "config/default.toml";

/// An API key equal to this is treated as unset.
const API_KEY_PLACEHOLDER: &str = "your_api_key";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub log_level: String,
    pub store: StoreConfig,
    pub generator: GeneratorConfig,
    pub retrieval: RetrievalSettings,
    pub export: ExportOptions,
    pub server: ServerConfig,
    #[serde(skip)]
    pub secrets: Secrets,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            store: StoreConfig::default(),
            generator: GeneratorConfig::default(),
            retrieval: RetrievalSettings::default(),
            export: ExportOptions::default(),
            server: ServerConfig::default(),
            secrets: Secrets::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Neo4j,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// HTTP base URI of the Neo4j server.
    pub uri: String,
    pub database: String,
    pub username: String,
    /// JSON fixture loaded by the memory backend.
    pub fixture: Option<PathBuf>,
    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Neo4j,
            uri: "http://localhost:7474".to_string(),
            database: "neo4j".to_string(),
            username: "neo4j".to_string(),
            fixture: None,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Full chat-completions URL.
    pub api_base_url: String,
    pub model: String,
    pub system_prompt: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.deepseek.com/v1/chat/completions".to_string(),
            model: "deepseek-chat".to_string(),
            system_prompt: "You are a professional question answering assistant that answers \
                            strictly from the knowledge graph information it is given."
                .to_string(),
            timeout_seconds: 60,
            max_retries: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "127.0.0.1:5000".to_string() }
    }
}

/// Credentials, never read from files.
#[derive(Clone, Default, PartialEq)]
pub struct Secrets {
    pub neo4j_password: Option<String>,
    pub llm_api_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("neo4j_password", &self.neo4j_password.as_ref().map(|_| "***"))
            .field("llm_api_key", &self.llm_api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Environment overrides, captured once so tests can pass them directly.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub log_level: Option<String>,
    pub bind: Option<String>,
    pub neo4j_uri: Option<String>,
    pub neo4j_username: Option<String>,
    pub neo4j_password: Option<String>,
    pub llm_api_key: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("KG_RAG_LOG_LEVEL").ok(),
            bind: env::var("KG_RAG_BIND").ok(),
            neo4j_uri: env::var("NEO4J_URI").ok(),
            neo4j_username: env::var("NEO4J_USERNAME").ok(),
            neo4j_password: env::var("NEO4J_PASSWORD").ok(),
            llm_api_key: env::var("LLM_API_KEY").ok(),
        }
    }
}

/// Load config from `path`, or `KG_RAG_CONFIG`, or [`DEFAULT_PATH`], then
/// apply environment overrides. Only an explicitly named file must exist;
/// otherwise built-in defaults apply.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let overrides = EnvOverrides::from_env();
    let explicit = path
        .map(Path::to_path_buf)
        .or_else(|| env::var("KG_RAG_CONFIG").ok().map(PathBuf::from));

    match explicit {
        Some(path) => load_from(&path, &overrides),
        None => {
            let default_path = Path::new(DEFAULT_PATH);
            if default_path.exists() {
                load_from(default_path, &overrides)
            } else {
                let mut config = Config::default();
                config.apply(&overrides);
                config.validate()?;
                Ok(config)
            }
        }
    }
}

pub fn load_from(path: &Path, overrides: &EnvOverrides) -> Result<Config> {
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    parse(&raw, overrides).map_err(|e| match e {
        Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// Parse TOML text and apply overrides.
pub fn parse(raw: &str, overrides: &EnvOverrides) -> Result<Config> {
    let mut config: Config = toml::from_str(raw).map_err(|e| Error::Config(format!("parse error: {e}")))?;
    config.apply(overrides);
    config.validate()?;
    Ok(config)
}

impl Config {
    fn apply(&mut self, overrides: &EnvOverrides) {
        if let Some(level) = &overrides.log_level {
            self.log_level = level.clone();
        }
        if let Some(bind) = &overrides.bind {
            self.server.bind = bind.clone();
        }
        if let Some(uri) = &overrides.neo4j_uri {
            self.store.uri = uri.clone();
        }
        if let Some(username) = &overrides.neo4j_username {
            self.store.username = username.clone();
        }
        self.secrets = Secrets {
            neo4j_password: overrides.neo4j_password.clone(),
            llm_api_key: overrides.llm_api_key.clone(),
        };
    }

    pub fn validate(&self) -> Result<()> {
        self.retrieval.validate()?;
        if self.store.backend == StoreBackend::Memory && self.store.fixture.is_none() {
            return Err(Error::Config("store.fixture is required for the memory backend".into()));
        }
        if self.generator.timeout_seconds == 0 {
            return Err(Error::Config("generator.timeout_seconds must be at least 1".into()));
        }
        Ok(())
    }

    pub fn neo4j(&self) -> Neo4jConfig {
        Neo4jConfig {
            uri: self.store.uri.clone(),
            database: self.store.database.clone(),
            username: self.store.username.clone(),
            password: self.secrets.neo4j_password.clone(),
            timeout_seconds: self.store.timeout_seconds,
        }
    }

    /// Generator settings, or `None` when no usable API key is set.
    pub fn openai(&self) -> Option<OpenAiConfig> {
        let key = self
            .secrets
            .llm_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && *k != API_KEY_PLACEHOLDER)?;
        Some(OpenAiConfig {
            api_base_url: self.generator.api_base_url.clone(),
            model: self.generator.model.clone(),
            system_prompt: self.generator.system_prompt.clone(),
            timeout_seconds: self.generator.timeout_seconds,
            max_retries: self.generator.max_retries,
            api_key: Some(key.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = parse("", &EnvOverrides::default()).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.store.backend, StoreBackend::Neo4j);
        assert_eq!(config.retrieval, RetrievalSettings::default());
        assert_eq!(config.generator.timeout_seconds, 60);
    }

    #[test]
    fn test_shipped_default_parses() {
        let config = parse(include_str!("../config/default.toml"), &EnvOverrides::default()).unwrap();
        assert_eq!(config.retrieval, RetrievalSettings::default());
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn test_sections_parse() {
        let raw = r#"
            log_level = "debug"

            [store]
            backend = "memory"
            fixture = "fixtures/cardio.json"

            [retrieval]
            num_samples = 5
            entity_scope = "subgraph"

            [server]
            bind = "0.0.0.0:9000"
        "#;
        let config = parse(raw, &EnvOverrides::default()).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.retrieval.num_samples, 5);
        assert_eq!(config.server.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_env_overrides_win() {
        let overrides = EnvOverrides {
            log_level: Some("trace".into()),
            neo4j_uri: Some("http://db:7474".into()),
            neo4j_password: Some("secret".into()),
            ..Default::default()
        };
        let config = parse("log_level = \"warn\"", &overrides).unwrap();
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.neo4j().uri, "http://db:7474");
        assert_eq!(config.neo4j().password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_secrets_rejected_in_file() {
        assert!(parse("[store]\npassword = \"x\"", &EnvOverrides::default()).is_err());
    }

    #[test]
    fn test_placeholder_key_means_unconfigured() {
        for key in [None, Some(""), Some("your_api_key")] {
            let overrides = EnvOverrides { llm_api_key: key.map(String::from), ..Default::default() };
            assert!(parse("", &overrides).unwrap().openai().is_none());
        }
        let overrides = EnvOverrides { llm_api_key: Some("sk-live".into()), ..Default::default() };
        let openai = parse("", &overrides).unwrap().openai().unwrap();
        assert_eq!(openai.api_key.as_deref(), Some("sk-live"));
    }

    #[test]
    fn test_memory_backend_needs_fixture() {
        assert!(parse("[store]\nbackend = \"memory\"", &EnvOverrides::default()).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retrieval]\ntop_k = 4").unwrap();
        let config = load_from(file.path(), &EnvOverrides::default()).unwrap();
        assert_eq!(config.retrieval.top_k, 4);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(load_from(Path::new("/nonexistent/kg-rag.toml"), &EnvOverrides::default()).is_err());
    }
}
