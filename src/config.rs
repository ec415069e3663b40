use std::path::{Path, PathBuf};

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

/// Environment variable naming an overlay file that replaces the default location.
pub const CONFIG_ENV_VAR: &str = "CMDPLAN_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

// ── Final (merged) config types ──

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub syntax: SyntaxConfig,
    #[serde(default)]
    pub devices: DevicesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SyntaxConfig {
    /// Character that forces the following character to be taken literally.
    #[serde(default = "default_escape_char")]
    pub escape_char: char,
}

impl Default for SyntaxConfig {
    fn default() -> Self {
        Self {
            escape_char: default_escape_char(),
        }
    }
}

fn default_escape_char() -> char {
    crate::parse::DEFAULT_ESCAPE_CHAR
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct DevicesConfig {
    /// Reserved names kept verbatim when used as a redirection target.
    #[serde(default)]
    pub names: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: String,
    /// Log file path; empty selects `~/.local/share/cmdplan/cmdplan.log`.
    #[serde(default)]
    pub file: String,
}

impl LoggingConfig {
    /// Parsed level, falling back to `Warn` for unknown names.
    pub fn level_filter(&self) -> LevelFilter {
        self.level.parse().unwrap_or(LevelFilter::Warn)
    }

    /// Resolved log file path, with `~` expanded.
    pub fn log_path(&self) -> Option<PathBuf> {
        if !self.file.is_empty() {
            return Some(PathBuf::from(shellexpand::tilde(&self.file).into_owned()));
        }
        let home = std::env::var_os("HOME")?;
        Some(Path::new(&home).join(".local/share/cmdplan/cmdplan.log"))
    }
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    syntax: SyntaxOverlay,
    #[serde(default)]
    devices: DevicesOverlay,
    #[serde(default)]
    logging: LoggingOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SyntaxOverlay {
    escape_char: Option<char>,
}

#[derive(Debug, Deserialize, Default)]
struct DevicesOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    remove_names: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LoggingOverlay {
    level: Option<String>,
    file: Option<String>,
}

// ── Merge logic ──

/// Merge a user list into a default list.
/// In replace mode: user list replaces default entirely.
/// In merge mode: remove items first, then extend with additions (deduped).
/// Device names compare case-insensitively.
fn merge_names(base: &mut Vec<String>, add: Vec<String>, remove: &[String], replace: bool) {
    if replace {
        *base = add;
    } else {
        base.retain(|item| !remove.iter().any(|r| r.eq_ignore_ascii_case(item)));
        for item in add {
            if !base.iter().any(|b| b.eq_ignore_ascii_case(&item)) {
                base.push(item);
            }
        }
    }
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge the user overlay from `$CMDPLAN_CONFIG` or
    ///    `~/.config/cmdplan/config.toml` (if it exists)
    ///
    /// A missing overlay is not an error; an unreadable or malformed one is.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default_config();
        if let Some(overlay) = Self::load_overlay()? {
            config.apply_overlay(overlay);
        }
        Ok(config)
    }

    fn overlay_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            let path = path.to_string_lossy();
            return Some(PathBuf::from(shellexpand::tilde(&path).into_owned()));
        }
        let home = std::env::var_os("HOME")?;
        Some(Path::new(&home).join(".config/cmdplan/config.toml"))
    }

    fn load_overlay() -> Result<Option<ConfigOverlay>, ConfigError> {
        let Some(path) = Self::overlay_path() else {
            return Ok(None);
        };
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        toml::from_str(&content)
            .map(Some)
            .map_err(|source| ConfigError::Parse { path, source })
    }

    /// Apply an overlay on top of this config (merge semantics).
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        if let Some(c) = overlay.syntax.escape_char {
            self.syntax.escape_char = c;
        }

        let d = overlay.devices;
        merge_names(&mut self.devices.names, d.names, &d.remove_names, d.replace);

        let l = overlay.logging;
        if let Some(level) = l.level {
            self.logging.level = level;
        }
        if let Some(file) = l.file {
            self.logging.file = file;
        }
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}
