//! Runtime settings, layered from an optional TOML file and `GROVE_*`
//! environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// SQLite file backing the group and policy stores.
  #[serde(default = "default_store_path")]
  pub store_path:      PathBuf,
  /// Platform object on which `admin` makes a principal a super-administrator.
  #[serde(default = "default_platform_object")]
  pub platform_object: String,
}

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/grove/grove.db") }

fn default_platform_object() -> String { "grove".to_owned() }

impl Default for Settings {
  fn default() -> Self {
    Self {
      store_path:      default_store_path(),
      platform_object: default_platform_object(),
    }
  }
}

impl Settings {
  /// Load settings from `path` (if given and present), overridden by
  /// environment variables such as `GROVE_STORE_PATH`.
  pub fn load(path: Option<&Path>) -> Result<Self> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
      builder = builder.add_source(config::File::from(path.to_path_buf()).required(false));
    }
    let settings = builder
      .add_source(config::Environment::with_prefix("GROVE"))
      .build()?;

    Ok(settings.try_deserialize()?)
  }

  /// `store_path` with a leading `~` expanded to the user's home directory.
  pub fn store_path(&self) -> PathBuf {
    let s = self.store_path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/")
      && let Ok(home) = std::env::var("HOME")
    {
      return PathBuf::from(home).join(rest);
    }
    self.store_path.clone()
  }
}
