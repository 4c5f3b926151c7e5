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

//! AUR (Arch User Repository) support module.
//!
//! This module provides:
//! - URL construction and a blocking RPC transport
//! - Vote-ranked search results
//! - Interactive selection parsing
//! - Single-package info aggregation
//! - Snapshot download, extraction and makepkg builds

pub mod builder;
pub mod client;
pub mod info;
pub mod search;
pub mod selection;

pub use builder::{AurBuilder, SystemRunner};
pub use client::{Endpoints, HttpTransport, Transport};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{AurError, AurResult};

/// AUR RPC v5 response wrapper. Records stay as raw JSON until the
/// search or info path decides how to materialize them.
#[derive(Debug, Clone, Deserialize)]
pub struct AurRpcResponse {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(rename = "type", default)]
    pub response_type: Option<String>,
    #[serde(default)]
    pub resultcount: usize,
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AurRpcResponse {
    /// Decode a response body, surfacing RPC-level errors
    pub fn decode(url: &str, body: &[u8]) -> AurResult<Self> {
        let response: AurRpcResponse = serde_json::from_slice(body)
            .map_err(|e| AurError::malformed(url, format!("invalid JSON: {}", e)))?;

        if let Some(error) = &response.error {
            return Err(AurError::malformed(url, format!("AUR RPC error: {}", error)));
        }

        debug!(
            "rpc v{} {} response, resultcount {}",
            response.version.unwrap_or(0),
            response.response_type.as_deref().unwrap_or("unknown"),
            response.resultcount
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_search_shape() {
        let body = br#"{"version":5,"type":"search","resultcount":1,"results":[{"Name":"yay"}]}"#;
        let resp = AurRpcResponse::decode("u", body).unwrap();
        assert_eq!(resp.version, Some(5));
        assert_eq!(resp.response_type.as_deref(), Some("search"));
        assert_eq!(resp.resultcount, 1);
        assert_eq!(resp.results.len(), 1);
    }

    #[test]
    fn test_decode_rpc_error() {
        let body = br#"{"version":5,"type":"error","resultcount":0,"results":[],"error":"Too many package results."}"#;
        let err = AurRpcResponse::decode("u", body).unwrap_err();
        assert!(err.to_string().contains("Too many package results."));
    }

    #[test]
    fn test_decode_garbage() {
        let err = AurRpcResponse::decode("u", b"<html>").unwrap_err();
        assert!(matches!(err, AurError::MalformedResponse { .. }));
    }
}
