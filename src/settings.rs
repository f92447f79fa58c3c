use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
  #[default]
  Light,
  Dark,
}

impl Theme {
  pub fn toggled(self) -> Self {
    match self {
      Theme::Light => Theme::Dark,
      Theme::Dark => Theme::Light,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Theme::Light => "light",
      Theme::Dark => "dark",
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Settings {
  #[serde(default)]
  theme: Theme,
}

/// User preferences, loaded once at startup and written back on every change.
#[derive(Debug)]
pub struct SettingsStore {
  path: PathBuf,
  settings: Settings,
}

impl SettingsStore {
  /// Open the store at $XDG_CONFIG_HOME/fundview/settings.yaml.
  pub fn open_default() -> Result<Self> {
    let dir = dirs::config_dir().ok_or_else(|| eyre!("Could not determine config directory"))?;
    Self::open(dir.join("fundview").join("settings.yaml"))
  }

  /// Open the store at `path`. A missing file means default settings.
  pub fn open(path: PathBuf) -> Result<Self> {
    let settings = if path.exists() {
      let contents = std::fs::read_to_string(&path)
        .map_err(|e| eyre!("Failed to read settings {}: {}", path.display(), e))?;
      serde_yaml::from_str(&contents)
        .map_err(|e| eyre!("Failed to parse settings {}: {}", path.display(), e))?
    } else {
      Settings::default()
    };
    Ok(Self { path, settings })
  }

  pub fn theme(&self) -> Theme {
    self.settings.theme
  }

  pub fn set_theme(&mut self, theme: Theme) -> Result<Theme> {
    self.settings.theme = theme;
    self.save()?;
    info!(theme = theme.as_str(), "theme changed");
    Ok(theme)
  }

  pub fn toggle_theme(&mut self) -> Result<Theme> {
    self.set_theme(self.theme().toggled())
  }

  fn save(&self) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create {}: {}", parent.display(), e))?;
    }
    let contents = serde_yaml::to_string(&self.settings)?;
    std::fs::write(&self.path, contents)
      .map_err(|e| eyre!("Failed to write settings {}: {}", self.path.display(), e))
  }
}
