//! YAML configuration and command-line overrides.
//!
//! # Storage layout
//!
//! ```text
//! ~/.lnsync/
//!   config.yaml     (optional)
//! ```
//!
//! ```yaml
//! sources:
//!   - /srv/incoming/a
//!   - /srv/incoming/b
//! destination: /srv/library
//! pid_file: /run/lnsync.pid      # optional
//! log_file: /var/log/lnsync.log  # optional
//! ```
//!
//! # API pattern
//!
//! Home-dependent functions take the home directory explicitly (`fn_at(home, …)`)
//! so tests can point them at a `TempDir`. Only the binary calls [`home`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "config.yaml";

// ---------------------------------------------------------------------------
// 1. Types
// ---------------------------------------------------------------------------

/// Partial configuration, as read from YAML or assembled from CLI flags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

/// Validated configuration: at least one source and a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub sources: Vec<PathBuf>,
    pub destination: PathBuf,
    pub pid_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Layer `overrides` on top of `self`, field by field.
    ///
    /// A non-empty source list replaces the whole list.
    pub fn merge(self, overrides: Config) -> Config {
        Config {
            sources: if overrides.sources.is_empty() {
                self.sources
            } else {
                overrides.sources
            },
            destination: overrides.destination.or(self.destination),
            pid_file: overrides.pid_file.or(self.pid_file),
            log_file: overrides.log_file.or(self.log_file),
        }
    }

    /// Validate into [`Settings`].
    ///
    /// Empty source entries (from `-s a,,b`) are dropped and duplicates
    /// collapsed, keeping first-seen order.
    pub fn resolve(self) -> Result<Settings, ConfigError> {
        let mut sources: Vec<PathBuf> = Vec::with_capacity(self.sources.len());
        for source in self.sources {
            if source.as_os_str().is_empty() || sources.contains(&source) {
                continue;
            }
            sources.push(source);
        }
        if sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        let destination = self
            .destination
            .filter(|d| !d.as_os_str().is_empty())
            .ok_or(ConfigError::NoDestination)?;

        Ok(Settings {
            sources,
            destination,
            pid_file: self.pid_file,
            log_file: self.log_file,
        })
    }
}

// ---------------------------------------------------------------------------
// 2. Paths
// ---------------------------------------------------------------------------

/// `<home>/.lnsync/`. Pure, no I/O.
pub fn lnsync_root(home: &Path) -> PathBuf {
    home.join(".lnsync")
}

/// `<home>/.lnsync/config.yaml`. Pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    lnsync_root(home).join(CONFIG_FILE)
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load a config file.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ConfigError::ConfigNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `<home>/.lnsync/config.yaml`, or an empty config when it does not exist.
pub fn load_default_at(home: &Path) -> Result<Config, ConfigError> {
    match load(&config_path_at(home)) {
        Err(ConfigError::ConfigNotFound { .. }) => Ok(Config::default()),
        other => other,
    }
}

/// Current user's home directory.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn cfg(sources: &[&str], destination: Option<&str>) -> Config {
        Config {
            sources: sources.iter().map(PathBuf::from).collect(),
            destination: destination.map(PathBuf::from),
            ..Config::default()
        }
    }

    #[test]
    fn overrides_replace_file_values() {
        let file = Config {
            sources: vec!["/a".into()],
            destination: Some("/d".into()),
            pid_file: Some("/run/lnsync.pid".into()),
            log_file: None,
        };
        let flags = Config {
            destination: Some("/other".into()),
            log_file: Some("/tmp/lnsync.log".into()),
            ..Config::default()
        };

        let merged = file.merge(flags);
        assert_eq!(merged.sources, vec![PathBuf::from("/a")]);
        assert_eq!(merged.destination, Some(PathBuf::from("/other")));
        assert_eq!(merged.pid_file, Some(PathBuf::from("/run/lnsync.pid")));
        assert_eq!(merged.log_file, Some(PathBuf::from("/tmp/lnsync.log")));
    }

    #[test]
    fn non_empty_source_flag_replaces_whole_list() {
        let merged = cfg(&["/a", "/b"], Some("/d")).merge(cfg(&["/c"], None));
        assert_eq!(merged.sources, vec![PathBuf::from("/c")]);
    }

    #[rstest]
    #[case(cfg(&[], Some("/d")), "no source")]
    #[case(cfg(&["", ""], Some("/d")), "no source")]
    #[case(cfg(&["/a"], None), "no destination")]
    #[case(cfg(&["/a"], Some("")), "no destination")]
    fn resolve_rejects_incomplete_config(#[case] config: Config, #[case] expected: &str) {
        let err = config.resolve().unwrap_err();
        assert!(err.to_string().contains(expected), "got: {err}");
    }

    #[test]
    fn resolve_drops_empty_and_duplicate_sources() {
        let settings = cfg(&["/a", "", "/b", "/a"], Some("/d")).resolve().unwrap();
        assert_eq!(
            settings.sources,
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
        assert_eq!(settings.destination, PathBuf::from("/d"));
    }

    #[test]
    fn missing_default_config_is_empty() {
        let home = TempDir::new().unwrap();
        let config = load_default_at(home.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn explicit_missing_config_is_not_found() {
        let home = TempDir::new().unwrap();
        let path = home.path().join("nope.yaml");
        let err = load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigNotFound { .. }), "got: {err}");
        assert!(err.to_string().contains("nope.yaml"));
    }

    #[test]
    fn config_path_is_under_dot_lnsync() {
        let p = config_path_at(Path::new("/home/u"));
        assert_eq!(p, PathBuf::from("/home/u/.lnsync/config.yaml"));
    }

    #[test]
    fn home_not_found_error_message() {
        assert!(ConfigError::HomeNotFound.to_string().contains("home directory"));
    }
}
