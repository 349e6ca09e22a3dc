use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::common::paths;

use super::options::{LoginSizing, PictureOption};

fn default_stylesheet() -> PathBuf {
    PathBuf::from("/usr/share/gnome-shell/theme/gdm3.css")
}

fn default_selector() -> String {
    "#lockDialogGroup".to_string()
}

fn default_elevation_command() -> String {
    "pkexec".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BackgrounderConfig {
    /// GDM stylesheet holding the login background rule
    pub stylesheet: PathBuf,
    /// Selector prefix of the rule to rewrite
    pub selector: String,
    /// Program used to run chmod/chown as root
    pub elevation_command: String,
    pub wallpaper_option: PictureOption,
    pub lock_screen_option: PictureOption,
    pub login_sizing: LoginSizing,
    /// Rewrite rgb() colors as hex when saving the stylesheet
    pub normalize_colors: bool,
}

impl Default for BackgrounderConfig {
    fn default() -> Self {
        Self {
            stylesheet: default_stylesheet(),
            selector: default_selector(),
            elevation_command: default_elevation_command(),
            wallpaper_option: PictureOption::default(),
            lock_screen_option: PictureOption::default(),
            login_sizing: LoginSizing::default(),
            normalize_colors: false,
        }
    }
}

impl BackgrounderConfig {
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(paths::config_dir()?.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from_path(Self::config_file_path()?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let s = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&s).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to_path(Self::config_file_path()?)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("creating config directory")?;
        }

        let toml = self.to_toml()?;
        fs::write(path, toml).context("writing config file")?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing config to toml")
    }
}
