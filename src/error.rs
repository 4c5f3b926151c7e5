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

//! Error taxonomy for the search, info and acquisition paths.
//!
//! Every failure is fatal to the invocation; the category only tells the
//! user (and the logs) what kind of thing went wrong.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for aurpkg operations
#[derive(Debug, Error)]
pub enum AurError {
    /// Network errors during RPC calls or downloads
    #[error("network error for {url}: {message}")]
    Network {
        url: String,
        message: String,
        #[source]
        source: Option<Box<ureq::Error>>,
    },

    /// Response could not be decoded or lacks a required field
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    /// Search returned zero results
    #[error("no package results were found for '{query}'")]
    NoResults { query: String },

    /// Info query returned an empty result array
    #[error("no package was found called '{package}'")]
    PackageNotFound { package: String },

    /// File system errors
    #[error("file system error for '{path}': {message}")]
    FileSystem {
        path: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Downloaded file does not carry the gzip signature
    #[error("downloaded archive '{path}' is not a gzipped tarball")]
    InvalidArchive { path: String },

    /// None of the well-known install paths holds the tool
    #[error("'{tool}' is not installed (looked in {})", display_paths(.searched))]
    ToolMissing { tool: String, searched: Vec<PathBuf> },

    /// Platform marker does not identify an Arch Linux host
    #[error("you are not running Arch Linux, so 'makepkg' cannot run here (checked {marker})")]
    UnsupportedPlatform { marker: String },

    /// makepkg refuses to run as root
    #[error("refusing to run 'makepkg' as root, run aurpkg as a normal user")]
    RunningAsRoot,

    /// Child process could not be started
    #[error("failed to run '{tool}': {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// Child process exited unsuccessfully
    #[error("'{tool}' failed for '{package}' with exit code {}", display_code(.code))]
    ToolFailed {
        tool: String,
        package: String,
        code: Option<i32>,
    },

    /// Bad command-line input
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Config { message: String },
}

/// Broad classification used for logging and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network or HTTP failure
    Transport,
    /// Response is unusable
    MalformedResponse,
    /// File or process resources unavailable
    Resource,
    /// A safety check refused to continue
    Validation,
    /// The user asked for something unusable
    Input,
    /// Configuration could not be applied
    Config,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Transport => write!(f, "transport"),
            ErrorCategory::MalformedResponse => write!(f, "malformed-response"),
            ErrorCategory::Resource => write!(f, "resource"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Config => write!(f, "config"),
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none (killed by signal)".to_string(),
    }
}

impl AurError {
    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            AurError::Network { .. } => ErrorCategory::Transport,
            AurError::MalformedResponse { .. }
            | AurError::NoResults { .. }
            | AurError::PackageNotFound { .. } => ErrorCategory::MalformedResponse,
            AurError::FileSystem { .. } | AurError::Spawn { .. } => ErrorCategory::Resource,
            AurError::InvalidArchive { .. }
            | AurError::ToolMissing { .. }
            | AurError::UnsupportedPlatform { .. }
            | AurError::RunningAsRoot
            | AurError::ToolFailed { .. } => ErrorCategory::Validation,
            AurError::InvalidInput { .. } => ErrorCategory::Input,
            AurError::Config { .. } => ErrorCategory::Config,
        }
    }

    /// Create a network error from a transport failure
    pub fn network(url: impl Into<String>, source: ureq::Error) -> Self {
        let message = match &source {
            ureq::Error::Status(code, _) => format!("server returned HTTP {}", code),
            ureq::Error::Transport(t) => t.to_string(),
        };
        AurError::Network {
            url: url.into(),
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create a malformed response error
    pub fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        AurError::MalformedResponse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a filesystem error
    pub fn filesystem(path: &Path, message: impl Into<String>, source: std::io::Error) -> Self {
        AurError::FileSystem {
            path: path.display().to_string(),
            message: message.into(),
            source: Some(source),
        }
    }
}

/// Result type alias for aurpkg operations
pub type AurResult<T> = std::result::Result<T, AurError>;
