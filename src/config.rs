use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

const APP_DIR: &str = ".momentum";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_API_HOST: &str = "127.0.0.1";
const DEFAULT_API_PORT: u16 = 8000;
const DEFAULT_REST_TIMEOUT_SECONDS: u64 = 15;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Rest,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => f.write_str("sqlite"),
            Self::Rest => f.write_str("rest"),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "rest" | "supabase" => Ok(Self::Rest),
            other => bail!("store_backend must be sqlite or rest, got: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,
    pub store_backend: StoreBackend,
    pub db_path: PathBuf,
    pub rest_url: Option<String>,
    pub rest_api_key: Option<String>,
    pub rest_timeout_seconds: u64,
    pub cors_origins: Vec<String>,
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            api_port: DEFAULT_API_PORT,
            store_backend: StoreBackend::Sqlite,
            db_path: default_root_dir().join("db").join("momentum.db"),
            rest_url: None,
            rest_api_key: None,
            rest_timeout_seconds: DEFAULT_REST_TIMEOUT_SECONDS,
            cors_origins: default_cors_origins(),
            environment: "development".to_string(),
        }
    }
}

impl Config {
    pub fn config_path() -> PathBuf {
        default_root_dir().join(CONFIG_FILE)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn resolve() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        set_mode_600(path)?;

        Ok(())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(*key))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        if let Some(value) = first(&["MOMENTUM_STORE_BACKEND"]) {
            self.set_value("store_backend", &value)?;
        }
        if let Some(value) = first(&["MOMENTUM_STORE_URL", "SUPABASE_URL"]) {
            self.set_value("rest_url", &value)?;
        }
        if let Some(value) = first(&[
            "MOMENTUM_STORE_KEY",
            "SUPABASE_SERVICE_ROLE_KEY",
            "SUPABASE_KEY",
        ]) {
            self.rest_api_key = Some(value);
        }
        if let Some(value) = first(&["MOMENTUM_API_PORT"]) {
            self.set_value("api_port", &value)?;
        }
        if let Some(value) = first(&["MOMENTUM_ENV", "ENVIRONMENT"]) {
            self.environment = value;
        }

        Ok(())
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "api_host" => {
                let host = value.trim();
                if host.is_empty() {
                    bail!("api_host must not be empty");
                }
                self.api_host = host.to_string();
            }
            "api_port" => {
                self.api_port = value
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "store_backend" => {
                self.store_backend = value.parse()?;
            }
            "db_path" => {
                self.db_path = expand_home(value.trim());
            }
            "rest_url" => {
                let trimmed = value.trim().trim_end_matches('/');
                Url::parse(trimmed)
                    .with_context(|| format!("rest_url must be a valid URL: {value}"))?;
                self.rest_url = Some(trimmed.to_string());
            }
            "rest_api_key" => {
                self.rest_api_key = (!value.trim().is_empty()).then(|| value.trim().to_string());
            }
            "rest_timeout_seconds" => {
                self.rest_timeout_seconds = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| anyhow!("rest_timeout_seconds must be a number"))?
                    .max(1);
            }
            "cors_origins" => {
                self.cors_origins = value
                    .split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(ToOwned::to_owned)
                    .collect();
            }
            "environment" => {
                self.environment = value.trim().to_string();
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: api_host|api.host, api_port|api.port, store_backend|store.backend, db_path|db.path, rest_url|rest.url, rest_api_key|rest.api_key, rest_timeout_seconds|rest.timeout_seconds, cors_origins|cors.origins, environment"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "api_host" => Some(self.api_host.clone()),
            "api_port" => Some(self.api_port.to_string()),
            "store_backend" => Some(self.store_backend.to_string()),
            "db_path" => Some(self.db_path.display().to_string()),
            "rest_url" => Some(
                self.rest_url
                    .clone()
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "rest_api_key" => Some(
                self.rest_api_key
                    .as_ref()
                    .map(|_| "***set***".to_string())
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "rest_timeout_seconds" => Some(self.rest_timeout_seconds.to_string()),
            "cors_origins" => Some(self.cors_origins.join(",")),
            "environment" => Some(self.environment.clone()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "api_host" | "api.host" => "api_host",
        "api_port" | "api.port" => "api_port",
        "store_backend" | "store.backend" => "store_backend",
        "db_path" | "db.path" => "db_path",
        "rest_url" | "rest.url" => "rest_url",
        "rest_api_key" | "rest.api_key" => "rest_api_key",
        "rest_timeout_seconds" | "rest.timeout_seconds" => "rest_timeout_seconds",
        "cors_origins" | "cors.origins" => "cors_origins",
        _ => key,
    }
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_cors_origins() -> Vec<String> {
    [
        "http://localhost:8080",
        "http://localhost:5173",
        "http://localhost:3000",
        "https://*.vercel.app",
    ]
    .into_iter()
    .map(ToOwned::to_owned)
    .collect()
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
