use std::collections::HashMap;
use std::path::Path;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// A required key is absent from every source.
    NotFound(String),
    /// An I/O or YAML parsing error occurred while loading config files.
    Load(String),
    /// A value is present but cannot be converted.
    Invalid { key: String, value: String, expected: &'static str },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Config key not found: {key}"),
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
            ConfigError::Invalid {
                key,
                value,
                expected,
            } => write!(f, "Invalid value '{value}' for '{key}': expected {expected}"),
        }
    }
}

impl std::error::Error for ConfigError {}

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const KEYS: [&str; 4] = [
    "database.url",
    "database.echo",
    "database.max_connections",
    "database.create_if_missing",
];

/// Connection settings for [`Database::init`](crate::Database::init).
///
/// Resolution order (lowest to highest priority):
/// 1. `application.yaml` (base)
/// 2. `application-{profile}.yaml` (profile override)
/// 3. `.env` and `.env.{profile}` files (loaded into process environment)
/// 4. Environment variables (`DATABASE_URL` overrides `database.url`,
///    `DATABASE_MAX_CONNECTIONS` overrides `database.max_connections`, ...)
///
/// `.env` files never overwrite already-set environment variables.
/// Profile is determined by: `STRATA_PROFILE` env var > argument.
///
/// ```yaml
/// database:
///   url: sqlite://data/app.db
///   echo: true
///   max_connections: 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    /// Log every statement at `info` level.
    pub echo: bool,
    pub max_connections: u32,
    /// Create the SQLite file when it does not exist.
    pub create_if_missing: bool,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            echo: false,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            create_if_missing: true,
        }
    }

    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Load the configuration for `profile` from the current working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from(Path::new("."), profile)
    }

    /// Load the configuration for `profile` from the files in `dir`.
    pub fn load_from(dir: &Path, profile: &str) -> Result<Self, ConfigError> {
        let active_profile =
            std::env::var("STRATA_PROFILE").unwrap_or_else(|_| profile.to_string());

        let mut values = HashMap::new();
        load_yaml_file(&dir.join("application.yaml"), &mut values)?;
        load_yaml_file(
            &dir.join(format!("application-{active_profile}.yaml")),
            &mut values,
        )?;

        let _ = dotenvy::from_path(dir.join(".env"));
        let _ = dotenvy::from_path(dir.join(format!(".env.{active_profile}")));

        // Convention: `database.max_connections` <-> `DATABASE_MAX_CONNECTIONS`
        for key in KEYS {
            if let Ok(value) = std::env::var(env_name(key)) {
                values.insert(key.to_string(), value);
            }
        }

        Self::from_values(&values)
    }

    /// Parse a YAML document, without consulting files or the environment.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        load_yaml_str(yaml, &mut values)?;
        Self::from_values(&values)
    }

    fn from_values(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let url = values
            .get("database.url")
            .ok_or_else(|| ConfigError::NotFound("database.url".into()))?;
        let mut config = Self::new(url.as_str());
        if let Some(echo) = parse(values, "database.echo", "a boolean")? {
            config.echo = echo;
        }
        if let Some(max) = parse::<u32>(values, "database.max_connections", "a positive integer")? {
            if max == 0 {
                return Err(ConfigError::Invalid {
                    key: "database.max_connections".into(),
                    value: "0".into(),
                    expected: "a positive integer",
                });
            }
            config.max_connections = max;
        }
        if let Some(create) = parse(values, "database.create_if_missing", "a boolean")? {
            config.create_if_missing = create;
        }
        Ok(config)
    }
}

fn env_name(key: &str) -> String {
    key.to_uppercase().replace('.', "_")
}

fn parse<T: std::str::FromStr>(
    values: &HashMap<String, String>,
    key: &str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    values
        .get(key)
        .map(|raw| {
            raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value: raw.clone(),
                expected,
            })
        })
        .transpose()
}

fn load_yaml_file(path: &Path, values: &mut HashMap<String, String>) -> Result<(), ConfigError> {
    if path.exists() {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Load(e.to_string()))?;
        load_yaml_str(&content, values)?;
    }
    Ok(())
}

fn load_yaml_str(content: &str, values: &mut HashMap<String, String>) -> Result<(), ConfigError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))?;
    flatten_yaml("", &yaml, values);
    Ok(())
}

/// Flatten a YAML tree into dot-separated keys with scalar leaves.
fn flatten_yaml(prefix: &str, value: &serde_yaml::Value, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                let key_str = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => format!("{other:?}"),
                };
                let full_key = if prefix.is_empty() {
                    key_str
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(&full_key, v, out);
            }
        }
        serde_yaml::Value::String(s) if !prefix.is_empty() => {
            out.insert(prefix.to_string(), s.clone());
        }
        serde_yaml::Value::Bool(b) if !prefix.is_empty() => {
            out.insert(prefix.to_string(), b.to_string());
        }
        serde_yaml::Value::Number(n) if !prefix.is_empty() => {
            out.insert(prefix.to_string(), n.to_string());
        }
        // Nulls, sequences and tags carry no database setting.
        _ => {}
    }
}
