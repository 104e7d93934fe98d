// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use std::path::PathBuf;
use thiserror::Error;

/// Fatal at startup: the configuration source could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid upstream server URL {url:?}: {source}")]
    InvalidServer {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// A single upstream request failed. Recoverable: a refresh that hits this
/// is abandoned and the previous cache stays in place.
#[derive(Debug, Error)]
pub enum UpstreamFetchError {
    #[error("request for {action} failed: {source}")]
    Request {
        action: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request for {action} failed with status: {status}")]
    Status {
        action: String,
        status: reqwest::StatusCode,
    },

    #[error("malformed response for {action}: {source}")]
    Decode {
        action: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("refresh task did not complete: {0}")]
    Interrupted(#[source] tokio::task::JoinError),
}

impl UpstreamFetchError {
    pub fn action(&self) -> &str {
        match self {
            Self::Request { action, .. }
            | Self::Status { action, .. }
            | Self::Decode { action, .. } => action,
            Self::Interrupted(_) => "refresh",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request { source, .. } if source.is_timeout())
    }
}
