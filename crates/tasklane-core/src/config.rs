use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::datetime::parse_timezone;
use crate::view::SortKey;

pub const CONFIG_ENV_VAR: &str =
  "TASKLANE_CONFIG";
pub const API_URL_ENV_VAR: &str =
  "TASKLANE_API_URL";
pub const TIMEZONE_ENV_VAR: &str =
  "TASKLANE_TIMEZONE";

const DEFAULT_BASE_URL: &str =
  "http://127.0.0.1:8000";

#[derive(Debug, Clone)]
pub struct Config {
  pub base_url:     String,
  pub timezone:     Tz,
  pub color:        bool,
  pub sort:         SortKey,
  session_file:     Option<PathBuf>,
  pub loaded_files: Vec<PathBuf>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
  api:     ApiSection,
  time:    TimeSection,
  ui:      UiSection,
  session: SessionSection,
  view:    ViewSection
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ApiSection {
  base_url: Option<String>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TimeSection {
  timezone: Option<String>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct UiSection {
  color: Option<bool>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SessionSection {
  file: Option<PathBuf>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ViewSection {
  sort: Option<String>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      base_url:     DEFAULT_BASE_URL
        .to_string(),
      timezone:     chrono_tz::UTC,
      color:        true,
      sort:         SortKey::default(),
      session_file: None,
      loaded_files: vec![]
    }
  }
}

impl Config {
  /// Defaults, then the config file,
  /// then environment overrides.
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    Self::load_with(
      config_override,
      |key| std::env::var(key).ok()
    )
  }

  pub fn load_with<E>(
    config_override: Option<&Path>,
    env: E
  ) -> anyhow::Result<Self>
  where
    E: Fn(&str) -> Option<String>
  {
    let mut cfg = Self::default();

    match resolve_config_path(
      config_override,
      &env
    ) {
      | Some(path) => {
        info!(config = %path.display(), "loading config");
        cfg.load_file(&path)?;
      }
      | None => {
        debug!(
          "no config file; using \
           defaults"
        );
      }
    }

    if let Some(url) = env(
      API_URL_ENV_VAR
    ) {
      cfg.set("api.base_url", &url)?;
    }
    if let Some(tz) =
      env(TIMEZONE_ENV_VAR)
    {
      cfg.set("time.timezone", &tz)?;
    }

    Ok(cfg)
  }

  /// `--set key=value` pairs, applied
  /// last.
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
    for (key, value) in overrides {
      debug!(key = %key, value = %value, "applying override");
      self.set(&key, &value)?;
    }
    Ok(())
  }

  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    match key.trim() {
      | "api.base_url" => {
        let url = value.trim();
        if url.is_empty() {
          return Err(anyhow!(
            "api.base_url cannot be \
             empty"
          ));
        }
        self.base_url = url
          .trim_end_matches('/')
          .to_string();
      }
      | "time.timezone" => {
        self.timezone =
          parse_timezone(value, key)
            .ok_or_else(|| {
              anyhow!(
                "invalid timezone \
                 '{value}'"
              )
            })?;
      }
      | "ui.color" => {
        self.color = parse_bool(value);
      }
      | "session.file" => {
        self.session_file =
          Some(expand_tilde(Path::new(
            value.trim()
          )));
      }
      | "view.sort" => {
        self.sort =
          value.parse().map_err(
            |err| anyhow!("view.sort: {err}")
          )?;
      }
      | other => {
        return Err(anyhow!(
          "unknown config key '{other}'"
        ));
      }
    }
    Ok(())
  }

  /// Where the signed-in session is
  /// kept between runs.
  pub fn session_path(
    &self
  ) -> anyhow::Result<PathBuf> {
    if let Some(path) =
      &self.session_file
    {
      return Ok(path.clone());
    }

    let dir = dirs::data_local_dir()
      .ok_or_else(|| {
        anyhow!(
          "cannot determine local \
           data directory"
        )
      })?;
    Ok(
      dir
        .join("tasklane")
        .join("session.json")
    )
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    let parsed: FileConfig =
      toml::from_str(&text)
        .with_context(|| {
          format!(
            "failed to parse {}",
            path.display()
          )
        })?;

    if let Some(url) =
      parsed.api.base_url
    {
      self.set("api.base_url", &url)?;
    }
    if let Some(tz) =
      parsed.time.timezone
    {
      self.set("time.timezone", &tz)?;
    }
    if let Some(color) = parsed.ui.color
    {
      self.color = color;
    }
    if let Some(file) =
      parsed.session.file
    {
      self.session_file =
        Some(expand_tilde(&file));
    }
    if let Some(sort) = parsed.view.sort
    {
      self.set("view.sort", &sort)?;
    }

    self.loaded_files.push(path);
    Ok(())
  }
}

fn resolve_config_path<E>(
  override_path: Option<&Path>,
  env: &E
) -> Option<PathBuf>
where
  E: Fn(&str) -> Option<String>
{
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }

  if let Some(raw) = env(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if trimmed == "/dev/null" {
      return None;
    }
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  let Some(dir) = dirs::config_dir()
  else {
    warn!(
      "cannot determine config \
       directory"
    );
    return None;
  };
  let candidate = dir
    .join("tasklane")
    .join("config.toml");
  candidate
    .exists()
    .then_some(candidate)
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

#[cfg(test)]
mod tests {
  use std::io::Write;
  use std::path::PathBuf;

  use super::{
    API_URL_ENV_VAR,
    CONFIG_ENV_VAR,
    Config,
    TIMEZONE_ENV_VAR
  };
  use crate::view::SortKey;

  fn no_env(
    _: &str
  ) -> Option<String> {
    None
  }

  fn write_config(
    body: &str
  ) -> tempfile::NamedTempFile {
    let mut file =
      tempfile::NamedTempFile::new()
        .expect("temp file");
    file
      .write_all(body.as_bytes())
      .expect("write config");
    file
  }

  #[test]
  fn defaults_without_a_file() {
    let cfg = Config::load_with(
      None,
      |key| {
        (key == CONFIG_ENV_VAR)
          .then(|| "/dev/null".to_string())
      }
    )
    .expect("defaults");

    assert_eq!(
      cfg.base_url,
      "http://127.0.0.1:8000"
    );
    assert_eq!(
      cfg.timezone,
      chrono_tz::UTC
    );
    assert!(cfg.color);
    assert_eq!(
      cfg.sort,
      SortKey::Created
    );
    assert!(cfg.loaded_files.is_empty());
  }

  #[test]
  fn file_then_env_then_set() {
    let file = write_config(
      r#"
[api]
base_url = "https://todo.example.com/"

[time]
timezone = "Europe/Berlin"

[ui]
color = false

[session]
file = "/tmp/tasklane-session.json"

[view]
sort = "priority"
"#
    );

    let mut cfg = Config::load_with(
      Some(file.path()),
      |key| {
        (key == TIMEZONE_ENV_VAR).then(
          || "America/New_York".to_string()
        )
      }
    )
    .expect("load");

    assert_eq!(
      cfg.base_url,
      "https://todo.example.com"
    );
    assert_eq!(
      cfg.timezone,
      chrono_tz::America::New_York
    );
    assert!(!cfg.color);
    assert_eq!(
      cfg.sort,
      SortKey::Priority
    );
    assert_eq!(
      cfg.session_path().expect("path"),
      PathBuf::from(
        "/tmp/tasklane-session.json"
      )
    );
    assert_eq!(cfg.loaded_files.len(), 1);

    cfg
      .apply_overrides([
        (
          "api.base_url".to_string(),
          "http://localhost:9000".to_string()
        ),
        (
          "ui.color".to_string(),
          "on".to_string()
        ),
      ])
      .expect("overrides");
    assert_eq!(
      cfg.base_url,
      "http://localhost:9000"
    );
    assert!(cfg.color);
  }

  #[test]
  fn env_url_applies_without_a_file() {
    let cfg = Config::load_with(
      None,
      |key| match key {
        | CONFIG_ENV_VAR => {
          Some("/dev/null".to_string())
        }
        | API_URL_ENV_VAR => Some(
          "http://api.internal".to_string()
        ),
        | _ => None
      }
    )
    .expect("load");
    assert_eq!(
      cfg.base_url,
      "http://api.internal"
    );
  }

  #[test]
  fn rejects_bad_values() {
    let mut cfg = Config::default();
    assert!(
      cfg
        .set("time.timezone", "Mars/Olympus")
        .is_err()
    );
    assert!(
      cfg.set("view.sort", "random").is_err()
    );
    assert!(
      cfg.set("no.such.key", "1").is_err()
    );
    assert_eq!(
      cfg.timezone,
      chrono_tz::UTC
    );
  }

  #[test]
  fn unknown_file_keys_are_errors() {
    let file = write_config(
      "[api]\nbase = \"x\"\n"
    );
    assert!(
      Config::load_with(
        Some(file.path()),
        no_env
      )
      .is_err()
    );
  }
}
