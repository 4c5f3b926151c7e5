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

//! Single-package details from the info endpoint.

use console::style;
use serde::Deserialize;
use tracing::debug;

use super::client::{Endpoints, Transport};
use super::search::{NO_DESCRIPTION, UNKNOWN_VERSION};
use super::AurRpcResponse;
use crate::error::{AurError, AurResult};
use crate::ui::{pretty_date, Painter};

/// Placeholder for absent URLs and empty lists
pub const NONE: &str = "none";

/// Printed between records when several packages are queried
pub const SEPARATOR: &str = "********************************";

/// Package details; list fields are pre-joined for display
#[derive(Debug, Clone, PartialEq)]
pub struct PackageInfo {
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    pub maintainer: Option<String>,
    pub out_of_date: Option<i64>,
    pub num_votes: u32,
    pub first_submitted: i64,
    pub last_modified: i64,
    pub popularity: f64,
    pub depends: String,
    pub licenses: String,
    pub keywords: String,
    pub opt_depends: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawInfo {
    name: String,
    description: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    version: Option<String>,
    maintainer: Option<String>,
    out_of_date: Option<i64>,
    num_votes: Option<u32>,
    first_submitted: Option<i64>,
    last_modified: Option<i64>,
    popularity: Option<f64>,
    depends: Option<Vec<String>>,
    license: Option<Vec<String>>,
    keywords: Option<Vec<String>>,
    opt_depends: Option<Vec<String>>,
}

/// Every element followed by one space, or `"none"` for an empty list
pub fn join_field(values: &[String]) -> String {
    if values.is_empty() {
        return NONE.to_string();
    }
    let mut joined = String::with_capacity(values.iter().map(|v| v.len() + 1).sum());
    for v in values {
        joined.push_str(v);
        joined.push(' ');
    }
    joined
}

impl From<RawInfo> for PackageInfo {
    fn from(raw: RawInfo) -> Self {
        let list = |v: Option<Vec<String>>| join_field(&v.unwrap_or_default());
        Self {
            name: raw.name,
            description: raw.description.unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            url: raw.url.unwrap_or_else(|| NONE.to_string()),
            version: raw.version.unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
            maintainer: raw.maintainer,
            out_of_date: raw.out_of_date.filter(|ts| *ts > 0),
            num_votes: raw.num_votes.unwrap_or(0),
            first_submitted: raw.first_submitted.unwrap_or(0),
            last_modified: raw.last_modified.unwrap_or(0),
            popularity: raw.popularity.unwrap_or(0.0),
            depends: list(raw.depends),
            licenses: list(raw.license),
            keywords: list(raw.keywords),
            opt_depends: list(raw.opt_depends),
        }
    }
}

/// Decode an info response for `name`; an empty result set is fatal
pub fn decode(name: &str, url: &str, body: &[u8]) -> AurResult<PackageInfo> {
    let response = AurRpcResponse::decode(url, body)?;

    let first = response
        .results
        .into_iter()
        .next()
        .ok_or_else(|| AurError::PackageNotFound {
            package: name.to_string(),
        })?;

    let raw: RawInfo = serde_json::from_value(first)
        .map_err(|e| AurError::malformed(url, e.to_string()))?;

    debug!("decoded info for {}", raw.name);
    Ok(raw.into())
}

/// Query the info endpoint for one package
pub fn fetch_info(transport: &dyn Transport, endpoints: &Endpoints, name: &str) -> AurResult<PackageInfo> {
    let url = endpoints.info_url(name);
    let body = transport.fetch(&url)?;
    decode(name, &url, &body)
}

/// Render as `:: Label: value` lines
pub fn render_info(info: &PackageInfo, p: &Painter) -> String {
    let outdated = match info.out_of_date {
        Some(ts) => pretty_date(ts),
        None => "No".to_string(),
    };
    let maintainer = match &info.maintainer {
        Some(m) => m.clone(),
        None => "none (orphaned)".to_string(),
    };
    let popularity = format!("{:.2}%", info.popularity);
    let votes = info.num_votes.to_string();
    let first_submitted = pretty_date(info.first_submitted);
    let last_modified = pretty_date(info.last_modified);

    let rows: [(&str, &str); 14] = [
        ("Package Name", info.name.as_str()),
        ("Description", info.description.as_str()),
        ("URL", info.url.as_str()),
        ("Version", info.version.as_str()),
        ("Maintainer", maintainer.as_str()),
        ("Outdated", outdated.as_str()),
        ("Votes", votes.as_str()),
        ("First Submitted", first_submitted.as_str()),
        ("Last Modified", last_modified.as_str()),
        ("Popularity", popularity.as_str()),
        ("Depends", info.depends.as_str()),
        ("Licenses", info.licenses.as_str()),
        ("Keywords", info.keywords.as_str()),
        ("Opt-Depends", info.opt_depends.as_str()),
    ];

    rows.iter()
        .map(|(label, value)| {
            format!(
                "{} {} {}\n",
                p.paint(style("::").blue().bold()),
                p.paint(style(format!("{}:", label)).white().bold()),
                value
            )
        })
        .collect()
}
