use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::{MetricsError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

pub const TOKEN_VAR: &str = "GITHUB_TOKEN";
pub const REPO_VAR: &str = "GITHUB_REPO";
pub const API_BASE_VAR: &str = "GITHUB_API_BASE_URL";

/// Repository identifier in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl FromStr for RepoId {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let invalid = || {
            MetricsError::Config(format!(
                "{REPO_VAR} must be in 'owner/name' form, got '{trimmed}'"
            ))
        };
        let (owner, name) = trimmed.split_once('/').ok_or_else(invalid)?;
        if !valid_segment(owner) || !valid_segment(name) {
            return Err(invalid());
        }
        Ok(RepoId {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Settings for one run. Built once at startup and never mutated.
#[derive(Clone)]
pub struct Config {
    token: String,
    pub repo: RepoId,
    pub api_base: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Config {
    pub fn new(token: impl Into<String>, repo: RepoId, api_base: impl Into<String>) -> Self {
        Config {
            token: token.into(),
            repo,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Load a `.env` file (if any) into the process environment, then read the
    /// configuration from it. Variables that are already set win over the file.
    pub fn from_env(env_file: Option<&Path>) -> Result<Config> {
        if let Some(loaded) = load_env_file(env_file)? {
            debug!(path = %loaded.display(), "loaded environment file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(TOKEN_VAR)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MetricsError::Config(format!("{TOKEN_VAR} is not set")))?;

        let repo = lookup(REPO_VAR)
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| MetricsError::Config(format!("{REPO_VAR} is not set")))?
            .parse::<RepoId>()?;

        let api_base = lookup(API_BASE_VAR)
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Config::new(token, repo, api_base))
    }
}

pub const DEFAULT_ENV_FILE: &str = ".env";

/// An explicit path must exist. The default `.env` is optional and only looked
/// up in the working directory, never in its parents.
fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>> {
    match path {
        Some(p) => dotenvy::from_path(p)
            .map(|()| Some(p.to_path_buf()))
            .map_err(|e| {
                MetricsError::Config(format!("cannot load env file {}: {e}", p.display()))
            }),
        None => match dotenvy::from_path(DEFAULT_ENV_FILE) {
            Ok(()) => Ok(Some(PathBuf::from(DEFAULT_ENV_FILE))),
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(MetricsError::Config(format!("invalid {DEFAULT_ENV_FILE} file: {e}"))),
        },
    }
}
