use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding `api.base_url`.
pub const API_URL_ENV: &str = "FUNDVIEW_API_URL";

const DEFAULT_PAGE_SIZE: u32 = 50;
const DEFAULT_ENRICH_PENDING_LIMIT: u32 = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  /// Log filter used when RUST_LOG is not set (e.g. "info", "fundview=debug")
  pub log_level: Option<String>,
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  /// How many pending assets one enrichment toggle asks the backend to process
  #[serde(default = "default_enrich_pending_limit")]
  pub enrich_pending_limit: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
  #[serde(default)]
  pub base_url: String,
  /// Request timeout; the HTTP client default applies when unset
  pub timeout_secs: Option<u64>,
}

fn default_page_size() -> u32 {
  DEFAULT_PAGE_SIZE
}

fn default_enrich_pending_limit() -> u32 {
  DEFAULT_ENRICH_PENDING_LIMIT
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api: ApiConfig::default(),
      log_level: None,
      page_size: DEFAULT_PAGE_SIZE,
      enrich_pending_limit: DEFAULT_ENRICH_PENDING_LIMIT,
    }
  }
}

impl Config {
  /// Load configuration.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./fundview.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/fundview/config.yaml
  ///
  /// Without a file, defaults apply. FUNDVIEW_API_URL overrides the base URL
  /// in either case.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    config
      .with_api_url_override(std::env::var(API_URL_ENV).ok())
      .validated()
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("fundview.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("fundview").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    Ok(serde_yaml::from_str(contents)?)
  }

  fn with_api_url_override(mut self, url: Option<String>) -> Self {
    if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
      self.api.base_url = url.trim().to_string();
    }
    self
  }

  fn validated(self) -> Result<Self> {
    if self.api.base_url.trim().is_empty() {
      return Err(eyre!(
        "No backend URL configured. Set api.base_url in ~/.config/fundview/config.yaml\n\
         or the {} environment variable.",
        API_URL_ENV
      ));
    }
    Ok(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_full_config() {
    let config = Config::parse(
      "api:\n  base_url: http://localhost:8000\n  timeout_secs: 30\nlog_level: debug\npage_size: 20\n",
    )
    .unwrap();

    assert_eq!(config.api.base_url, "http://localhost:8000");
    assert_eq!(config.api.timeout_secs, Some(30));
    assert_eq!(config.log_level.as_deref(), Some("debug"));
    assert_eq!(config.page_size, 20);
    assert_eq!(config.enrich_pending_limit, 50);
  }

  #[test]
  fn test_env_url_overrides_file() {
    let config = Config::parse("api:\n  base_url: http://file\n")
      .unwrap()
      .with_api_url_override(Some("http://env:9000".to_string()))
      .validated()
      .unwrap();
    assert_eq!(config.api.base_url, "http://env:9000");
  }

  #[test]
  fn test_missing_url_is_error() {
    assert!(Config::default().validated().is_err());
    assert!(Config::default()
      .with_api_url_override(Some("  ".to_string()))
      .validated()
      .is_err());
  }

  #[test]
  fn test_explicit_path_must_exist() {
    let err = Config::load(Some(Path::new("/nonexistent/fundview.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
