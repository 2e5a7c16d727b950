use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that switches every mutating call to a log statement
pub const DRY_RUN_ENV: &str = "DRY_RUN";

/// Environment variable that routes every call to the security mirror
pub const SECURITY_ENV: &str = "SECURITY";

/// Represents the complete configuration for git-autodeploy.
///
/// Contains the location of the managed repositories and behavior options.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub repositories: RepositoriesConfig,

    #[serde(default)]
    pub behavior: BehaviorConfig,
}

fn default_root() -> PathBuf {
    PathBuf::from("./repositories")
}

fn default_true() -> bool {
    true
}

/// Where project repositories live on disk.
///
/// A project path such as `gitlab-org/omnibus-gitlab` resolves to
/// `<root>/gitlab-org/omnibus-gitlab`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RepositoriesConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for RepositoriesConfig {
    fn default() -> Self {
        RepositoriesConfig {
            root: default_root(),
        }
    }
}

/// Configuration for behavior customization.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BehaviorConfig {
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub security_release: bool,

    /// Upload release metadata after a packager has been tagged
    #[serde(default = "default_true")]
    pub release_metadata_tracking: bool,

    /// Upper bound on parallel packager pipelines; defaults to the CPU count
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        BehaviorConfig {
            dry_run: false,
            security_release: false,
            release_metadata_tracking: true,
            workers: None,
        }
    }
}

/// Immutable run settings threaded through every component.
///
/// Built once per invocation from configuration, environment and CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    pub dry_run: bool,
    pub security_release: bool,
    pub release_metadata_tracking: bool,
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}

impl RunContext {
    pub fn new(dry_run: bool, security_release: bool) -> Self {
        RunContext {
            dry_run,
            security_release,
            release_metadata_tracking: true,
        }
    }

    /// Context from configuration alone
    pub fn from_config(config: &Config) -> Self {
        RunContext {
            dry_run: config.behavior.dry_run,
            security_release: config.behavior.security_release,
            release_metadata_tracking: config.behavior.release_metadata_tracking,
        }
    }

    /// Apply `DRY_RUN` / `SECURITY`; a present, non-empty variable turns the flag on
    pub fn with_env(self) -> Self {
        RunContext {
            dry_run: self.dry_run || env_flag(DRY_RUN_ENV),
            security_release: self.security_release || env_flag(SECURITY_ENV),
            ..self
        }
    }

    /// Apply CLI flags; flags can only switch modes on
    pub fn with_flags(self, dry_run: bool, security_release: bool) -> Self {
        RunContext {
            dry_run: self.dry_run || dry_run,
            security_release: self.security_release || security_release,
            ..self
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        RunContext::new(false, false)
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `autodeploy.toml` in current directory
/// 3. `.autodeploy.toml` in user config directory
/// 4. Default configuration if no file found
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let config_str = if let Some(path) = config_path {
        fs::read_to_string(path)?
    } else if Path::new("./autodeploy.toml").exists() {
        fs::read_to_string("./autodeploy.toml")?
    } else if let Some(config_dir) = dirs::config_dir() {
        let config_path = config_dir.join(".autodeploy.toml");
        if config_path.exists() {
            fs::read_to_string(config_path)?
        } else {
            return Ok(Config::default());
        }
    } else {
        return Ok(Config::default());
    };

    let config: Config = toml::from_str(&config_str)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.repositories.root, PathBuf::from("./repositories"));
        assert!(!config.behavior.dry_run);
        assert!(config.behavior.release_metadata_tracking);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[behavior]\ndry_run = true\n").unwrap();
        assert!(config.behavior.dry_run);
        assert!(config.behavior.release_metadata_tracking);
        assert_eq!(config.repositories, RepositoriesConfig::default());
    }

    #[test]
    fn test_flags_only_switch_on() {
        let ctx = RunContext::new(true, false).with_flags(false, true);
        assert!(ctx.dry_run);
        assert!(ctx.security_release);
    }
}
