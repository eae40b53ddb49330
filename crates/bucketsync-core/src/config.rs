use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info,
  warn
};

pub const CONFIG_ENV: &str =
  "BUCKETSYNC_CONFIG";
pub const SERVER_ENV: &str =
  "BUCKETSYNC_SERVER";

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(default)]
pub struct ServerConfig {
  pub base_url:     String,
  pub timeout_secs: u64
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      base_url:     "http://127.0.0.1:5000"
        .to_string(),
      timeout_secs: 30
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(default)]
pub struct PollConfig {
  pub interval_secs: u64
}

impl Default for PollConfig {
  fn default() -> Self {
    Self { interval_secs: 10 }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(default)]
pub struct UiConfig {
  pub color:      String,
  pub assume_yes: bool
}

impl Default for UiConfig {
  fn default() -> Self {
    Self {
      color:      "on".to_string(),
      assume_yes: false
    }
  }
}

#[derive(
  Debug,
  Clone,
  Default,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(default)]
pub struct Config {
  pub server:       ServerConfig,
  pub poll:         PollConfig,
  pub ui:           UiConfig,
  #[serde(skip)]
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  /// Defaults, then the config file,
  /// then the environment.
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg =
      match resolve_config_path(
        config_override
      )? {
        | Some(path) => {
          info!(config = %path.display(), "loading config");
          Self::from_file(&path)?
        }
        | None => {
          warn!(
            "no config file found; \
             using defaults"
          );
          Self::default()
        }
      };

    cfg.apply_env(|key| {
      std::env::var(key).ok()
    });
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn from_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    let mut cfg: Config =
      toml::from_str(&text)
        .with_context(|| {
          format!(
            "invalid config file {}",
            path.display()
          )
        })?;
    cfg.loaded_files.push(path);
    Ok(cfg)
  }

  pub fn apply_env<F>(
    &mut self,
    lookup: F
  ) where
    F: Fn(&str) -> Option<String>
  {
    if let Some(url) = lookup(SERVER_ENV)
      .filter(|v| !v.trim().is_empty())
    {
      debug!(url = %url, "server URL from environment");
      self.server.base_url = url;
    }
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.set(&key, &v)?;
    }
    self.validate()
  }

  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    let value = value.trim();
    match key {
      | "server.base_url" => {
        self.server.base_url =
          value.to_string();
      }
      | "server.timeout_secs" => {
        self.server.timeout_secs =
          parse_secs(key, value)?;
      }
      | "poll.interval_secs" => {
        self.poll.interval_secs =
          parse_secs(key, value)?;
      }
      | "ui.color" => {
        self.ui.color =
          value.to_string();
      }
      | "ui.assume_yes" => {
        self.ui.assume_yes =
          parse_bool(value);
      }
      | other => {
        return Err(anyhow!(
          "unknown config key: \
           {other}"
        ));
      }
    }
    Ok(())
  }

  pub fn validate(
    &self
  ) -> anyhow::Result<()> {
    if self.server.base_url.trim().is_empty()
    {
      return Err(anyhow!(
        "server.base_url cannot be \
         empty"
      ));
    }
    if self.poll.interval_secs == 0 {
      return Err(anyhow!(
        "poll.interval_secs must be \
         at least 1"
      ));
    }
    if self.server.timeout_secs == 0 {
      return Err(anyhow!(
        "server.timeout_secs must be \
         at least 1"
      ));
    }
    Ok(())
  }

  pub fn poll_interval(
    &self
  ) -> Duration {
    Duration::from_secs(
      self.poll.interval_secs
    )
  }

  pub fn request_timeout(
    &self
  ) -> Duration {
    Duration::from_secs(
      self.server.timeout_secs
    )
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    let path = expand_tilde(path);
    if !path.exists() {
      return Err(anyhow!(
        "config file does not exist: \
         {}",
        path.display()
      ));
    }
    return Ok(Some(path));
  }

  if let Ok(env_path) =
    std::env::var(CONFIG_ENV)
  {
    if env_path == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      env_path
    )));
  }

  let candidate = dirs::config_dir()
    .map(|dir| {
      dir
        .join("bucketsync")
        .join("config.toml")
    });
  Ok(candidate.filter(|p| p.exists()))
}

fn parse_secs(
  key: &str,
  value: &str
) -> anyhow::Result<u64> {
  value.parse::<u64>().with_context(
    || {
      format!(
        "{key} expects whole seconds, \
         got '{value}'"
      )
    }
  )
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
