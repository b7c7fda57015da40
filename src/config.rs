use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::queue::Auth;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub server: ServerConfig,
  /// Collaboration used when none is given on the command line
  pub default_collab: Option<String>,
  /// Log filter directive (e.g. "info", "jobq=debug"); RUST_LOG wins
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Base URL of the job queue API, path prefix included
  pub url: String,
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from `explicit_path`, or from the first existing
  /// candidate of [`Config::candidate_paths`].
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = match explicit_path {
      Some(p) if p.exists() => p.to_path_buf(),
      Some(p) => return Err(eyre!("Config file not found: {}", p.display())),
      None => Self::candidate_paths()
        .into_iter()
        .find(|p| p.exists())
        .ok_or_else(|| {
          eyre!(
            "No configuration file found. Create ./jobq.yaml or ~/.config/jobq/config.yaml \
             with at least `server: {{ url: ... }}` (see config.example.yaml)."
          )
        })?,
    };

    tracing::debug!(path = %path.display(), "loading config");
    let contents = std::fs::read_to_string(&path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  /// Where a config file is looked for, most specific first: the working
  /// directory, then the user config directory.
  pub fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("jobq.yaml")];
    if let Some(config_dir) = dirs::config_dir() {
      paths.push(config_dir.join("jobq").join("config.yaml"));
    }
    paths
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Get the API token from environment variables.
  ///
  /// Checks JOBQ_TOKEN first, then EBRAINS_TOKEN as fallback.
  pub fn get_auth() -> Result<Auth> {
    std::env::var("JOBQ_TOKEN")
      .or_else(|_| std::env::var("EBRAINS_TOKEN"))
      .map(Auth::new)
      .map_err(|_| eyre!("API token not found. Set JOBQ_TOKEN or EBRAINS_TOKEN environment variable."))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_minimal() {
    let config = Config::parse("server:\n  url: https://queue.example.org/api/v3\n").unwrap();
    assert_eq!(config.server.url, "https://queue.example.org/api/v3");
    assert_eq!(config.default_collab, None);
    assert_eq!(config.log_level, "info");
  }

  #[test]
  fn test_parse_full() {
    let config = Config::parse(
      "server:\n  url: https://q\ndefault_collab: neuro-lab\nlog_level: jobq=debug\n",
    )
    .unwrap();
    assert_eq!(config.default_collab.as_deref(), Some("neuro-lab"));
    assert_eq!(config.log_level, "jobq=debug");
  }

  #[test]
  fn test_missing_server_is_an_error() {
    assert!(Config::parse("default_collab: x\n").is_err());
  }

  #[test]
  fn test_working_directory_is_searched_first() {
    let paths = Config::candidate_paths();
    assert_eq!(paths[0], PathBuf::from("jobq.yaml"));
    assert!(paths.iter().skip(1).all(|p| p.ends_with("jobq/config.yaml")));
  }

  #[test]
  fn test_explicit_missing_path() {
    let err = Config::load(Some(Path::new("/nonexistent/jobq.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
