/*
 * aurpkg - A small AUR search, fetch and build helper.
 * Copyright (C) 2025  aurpkg contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Configuration management with validation and defaults.
//!
//! Every file layer is parsed into a partial struct whose fields are all
//! optional, so a later layer overrides exactly the keys it sets, including
//! a key set back to its built-in default.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{AurError, AurResult};

/// System-wide configuration file
pub const SYSTEM_CONFIG: &str = "/etc/aurpkg/aurpkg.toml";

/// Main configuration structure for aurpkg
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Enable colored output
    pub color: bool,

    /// AUR endpoint and build settings
    pub aur: AurConfig,

    /// Well-known locations of external tools
    pub tools: ToolsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            color: false,
            aur: AurConfig::default(),
            tools: ToolsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// AUR-specific configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AurConfig {
    /// AUR web root, without trailing slash
    pub base_url: String,

    /// Path of the snapshot archives below the web root
    pub snapshot_path: String,

    /// Maximum redirects followed while downloading
    pub max_redirects: u32,

    /// User-Agent sent with every request
    pub user_agent: String,

    /// Pass --noconfirm to makepkg
    pub noconfirm: bool,

    /// Directory archives are downloaded and extracted in (None = cwd)
    pub build_dir: Option<PathBuf>,
}

impl Default for AurConfig {
    fn default() -> Self {
        Self {
            base_url: "https://aur.archlinux.org".to_string(),
            snapshot_path: "cgit/aur.git/snapshot".to_string(),
            max_redirects: 50,
            user_agent: concat!("aurpkg/", env!("CARGO_PKG_VERSION")).to_string(),
            noconfirm: true,
            build_dir: None,
        }
    }
}

/// Tool locations. Lookups probe these exact paths, never $PATH.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolsConfig {
    pub tar_primary: PathBuf,
    pub tar_secondary: PathBuf,
    pub makepkg: PathBuf,
    /// Platform marker read by the Arch check
    pub os_release: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tar_primary: PathBuf::from("/usr/bin/tar"),
            tar_secondary: PathBuf::from("/bin/tar"),
            makepkg: PathBuf::from("/usr/bin/makepkg"),
            os_release: PathBuf::from("/etc/os-release"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (None = no file logging)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

/// One configuration file as written; absent keys stay `None`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigLayer {
    color: Option<bool>,
    aur: AurLayer,
    tools: ToolsLayer,
    logging: LoggingLayer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AurLayer {
    base_url: Option<String>,
    snapshot_path: Option<String>,
    max_redirects: Option<u32>,
    user_agent: Option<String>,
    noconfirm: Option<bool>,
    build_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ToolsLayer {
    tar_primary: Option<PathBuf>,
    tar_secondary: Option<PathBuf>,
    makepkg: Option<PathBuf>,
    os_release: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggingLayer {
    level: Option<String>,
    file: Option<PathBuf>,
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

impl Config {
    /// Load configuration from multiple sources with precedence:
    /// 1. /etc/aurpkg/aurpkg.toml (system-wide)
    /// 2. ~/.config/aurpkg/config.toml (user)
    /// 3. Environment variables (AURPKG_*)
    ///
    /// Unreadable or invalid files are skipped; one diagnostic per skipped
    /// file is returned for the caller to report.
    pub fn load() -> (Self, Vec<String>) {
        let mut paths = vec![PathBuf::from(SYSTEM_CONFIG)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("aurpkg").join("config.toml"));
        }
        Self::load_from(&paths, |key| std::env::var(key).ok())
    }

    /// Layer `paths` in order over the defaults, then apply `var` overrides
    fn load_from(paths: &[PathBuf], var: impl Fn(&str) -> Option<String>) -> (Self, Vec<String>) {
        let mut config = Config::default();
        let mut diagnostics = Vec::new();

        for path in paths {
            match Self::read_file(path) {
                Ok(Some(layer)) => config = config.merge(layer),
                Ok(None) => {}
                Err(message) => diagnostics.push(message),
            }
        }

        (config.apply_env_overrides(var), diagnostics)
    }

    /// Read one layer. A missing file is `Ok(None)`.
    fn read_file(path: &Path) -> Result<Option<ConfigLayer>, String> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .map_err(|e| format!("could not read {}: {}", path.display(), e))?;
        let layer = toml::from_str::<ConfigLayer>(&content)
            .map_err(|e| format!("ignoring invalid configuration {}: {}", path.display(), e))?;
        debug!("loaded configuration from {}", path.display());
        Ok(Some(layer))
    }

    /// Merge one file layer into this config; every key it sets wins
    fn merge(mut self, layer: ConfigLayer) -> Self {
        set(&mut self.color, layer.color);

        let aur = layer.aur;
        set(&mut self.aur.base_url, aur.base_url);
        set(&mut self.aur.snapshot_path, aur.snapshot_path);
        set(&mut self.aur.max_redirects, aur.max_redirects);
        set(&mut self.aur.user_agent, aur.user_agent);
        set(&mut self.aur.noconfirm, aur.noconfirm);
        if aur.build_dir.is_some() {
            self.aur.build_dir = aur.build_dir;
        }

        let tools = layer.tools;
        set(&mut self.tools.tar_primary, tools.tar_primary);
        set(&mut self.tools.tar_secondary, tools.tar_secondary);
        set(&mut self.tools.makepkg, tools.makepkg);
        set(&mut self.tools.os_release, tools.os_release);

        set(&mut self.logging.level, layer.logging.level);
        if layer.logging.file.is_some() {
            self.logging.file = layer.logging.file;
        }

        self
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = var("AURPKG_BASE_URL") {
            self.aur.base_url = val;
        }

        if let Some(val) = var("AURPKG_COLOR") {
            self.color = parse_flag(&val);
        }

        if let Some(val) = var("AURPKG_NOCONFIRM") {
            self.aur.noconfirm = parse_flag(&val);
        }

        if let Some(val) = var("AURPKG_BUILD_DIR") {
            if !val.is_empty() {
                self.aur.build_dir = Some(PathBuf::from(val));
            }
        }

        if let Some(val) = var("AURPKG_LOG_LEVEL") {
            self.logging.level = val;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> AurResult<()> {
        let url = url::Url::parse(&self.aur.base_url).map_err(|e| AurError::Config {
            message: format!("base_url '{}' is not a valid URL: {}", self.aur.base_url, e),
        })?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(AurError::Config {
                message: format!("base_url must be http or https, got '{}'", url.scheme()),
            });
        }
        if self.aur.snapshot_path.trim_matches('/').is_empty() {
            return Err(AurError::Config {
                message: "snapshot_path must not be empty".to_string(),
            });
        }
        if self.aur.max_redirects == 0 {
            return Err(AurError::Config {
                message: "max_redirects must be at least 1".to_string(),
            });
        }
        if self.aur.max_redirects > 100 {
            return Err(AurError::Config {
                message: "max_redirects must be at most 100".to_string(),
            });
        }
        Ok(())
    }

    /// Directory downloads and extraction happen in
    pub fn work_dir(&self) -> PathBuf {
        self.aur
            .build_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn parse_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true") || val.eq_ignore_ascii_case("yes")
}
