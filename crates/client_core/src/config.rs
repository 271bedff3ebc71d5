use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:9090";
pub const CONFIG_FILE_NAME: &str = "dashboard.toml";
pub const BASE_URL_ENV_VARS: [&str; 2] = ["DASHBOARD_BASE_URL", "APP__BASE_URL"];

const CONCEPT_CHANNEL_PATH: &str = "/ws";
const PEER_CHANNEL_PATH: &str = "/ws/peers";

/// Backend origin shared by the REST and WebSocket surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    rest_origin: String,
    ws_origin: String,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let raw = base_url.trim();
        let parsed = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
            url: raw.to_string(),
            source,
        })?;
        let ws_scheme = match parsed.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(ConfigError::UnsupportedScheme {
                    scheme: other.to_string(),
                })
            }
        };
        if parsed.host_str().is_none() {
            return Err(ConfigError::MissingHost {
                url: raw.to_string(),
            });
        }

        let rest_origin = parsed.as_str().trim_end_matches('/').to_string();
        let ws_origin = format!(
            "{ws_scheme}{}",
            &rest_origin[parsed.scheme().len()..]
        );
        Ok(Self {
            rest_origin,
            ws_origin,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.rest_origin
    }

    pub fn rest_url(&self, path: &str) -> String {
        format!("{}/{}", self.rest_origin, path.trim_start_matches('/'))
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("{}/{}", self.ws_origin, path.trim_start_matches('/'))
    }

    pub fn concept_channel_url(&self) -> String {
        self.ws_url(CONCEPT_CHANNEL_PATH)
    }

    pub fn peer_channel_url(&self) -> String {
        self.ws_url(PEER_CHANNEL_PATH)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rest_origin: DEFAULT_BASE_URL.to_string(),
            ws_origin: DEFAULT_BASE_URL.replacen("http://", "ws://", 1),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    base_url: Option<String>,
}

/// Resolves the base origin from, lowest priority first: the built-in default, the config
/// file, `DASHBOARD_BASE_URL` / `APP__BASE_URL`, and finally an explicit override.
///
/// `config_path` is read only when given; otherwise `./dashboard.toml` is used if present.
pub fn load_config(
    explicit: Option<&str>,
    config_path: Option<&Path>,
) -> Result<ClientConfig, ConfigError> {
    let file_contents = match config_path {
        Some(path) => Some((path.to_path_buf(), read_file(path)?)),
        None => {
            let default_path = PathBuf::from(CONFIG_FILE_NAME);
            match fs::read_to_string(&default_path) {
                Ok(raw) => Some((default_path, raw)),
                Err(_) => None,
            }
        }
    };

    let base_url = resolve_base_url(
        file_contents
            .as_ref()
            .map(|(path, raw)| (path.as_path(), raw.as_str())),
        &|name| std::env::var(name).ok(),
        explicit,
    )?;
    let config = ClientConfig::new(&base_url)?;
    tracing::info!(base_url = config.base_url(), "config: resolved backend origin");
    Ok(config)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn resolve_base_url(
    file: Option<(&Path, &str)>,
    env: &dyn Fn(&str) -> Option<String>,
    explicit: Option<&str>,
) -> Result<String, ConfigError> {
    let mut base_url = DEFAULT_BASE_URL.to_string();

    if let Some((path, raw)) = file {
        let parsed: FileConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(v) = parsed.base_url.filter(|v| !v.trim().is_empty()) {
            base_url = v;
        }
    }

    for name in BASE_URL_ENV_VARS {
        if let Some(v) = env(name).filter(|v| !v.trim().is_empty()) {
            base_url = v;
        }
    }

    if let Some(v) = explicit.filter(|v| !v.trim().is_empty()) {
        base_url = v.to_string();
    }

    Ok(base_url)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
