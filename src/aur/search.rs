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

//! Search results ranked by votes.

use console::style;
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Reverse;
use tracing::debug;

use super::client::{Endpoints, Transport};
use super::AurRpcResponse;
use crate::error::{AurError, AurResult};
use crate::ui::{pretty_date, Painter};

pub const NO_DESCRIPTION: &str = "no description was specified";
pub const UNKNOWN_VERSION: &str = "unknown";

/// One search result
#[derive(Debug, Clone, PartialEq)]
pub struct PackageSummary {
    pub name: String,
    pub description: String,
    pub version: String,
    pub num_votes: u32,
    pub popularity: f64,
    /// Flag timestamp, only set when the package is flagged
    pub out_of_date: Option<i64>,
    /// None means orphaned
    pub maintainer: Option<String>,
    pub url_path: Option<String>,
    pub package_base: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawSummary {
    name: String,
    description: Option<String>,
    version: Option<String>,
    num_votes: Option<u32>,
    popularity: Option<f64>,
    out_of_date: Option<i64>,
    maintainer: Option<String>,
    #[serde(rename = "URLPath")]
    url_path: Option<String>,
    package_base: Option<String>,
}

impl From<RawSummary> for PackageSummary {
    fn from(raw: RawSummary) -> Self {
        let package_base = raw.package_base.unwrap_or_else(|| raw.name.clone());
        Self {
            description: raw.description.unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            version: raw.version.unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
            num_votes: raw.num_votes.unwrap_or(0),
            popularity: raw.popularity.unwrap_or(0.0),
            out_of_date: raw.out_of_date.filter(|ts| *ts > 0),
            maintainer: raw.maintainer,
            url_path: raw.url_path,
            package_base,
            name: raw.name,
        }
    }
}

impl PackageSummary {
    pub fn is_orphaned(&self) -> bool {
        self.maintainer.is_none()
    }

    /// Final segment of the download path, used as the local archive name
    pub fn archive_name(&self) -> Option<&str> {
        let path = self.url_path.as_deref()?;
        let (_, base) = path.rsplit_once('/')?;
        if base.is_empty() {
            None
        } else {
            Some(base)
        }
    }
}

fn votes_of(record: &Value) -> u64 {
    record.get("NumVotes").and_then(Value::as_u64).unwrap_or(0)
}

/// Decode a search response and order it by descending vote count.
///
/// Exactly `resultcount` records are materialized. Zero results is the
/// `NoResults` error, a short `results` array is a malformed response.
pub fn rank(query: &str, url: &str, body: &[u8]) -> AurResult<Vec<PackageSummary>> {
    let response = AurRpcResponse::decode(url, body)?;
    let count = response.resultcount;

    if count == 0 {
        return Err(AurError::NoResults {
            query: query.to_string(),
        });
    }
    if response.results.len() < count {
        return Err(AurError::malformed(
            url,
            format!(
                "resultcount is {} but only {} results were sent",
                count,
                response.results.len()
            ),
        ));
    }

    let mut raw = response.results;
    raw.truncate(count);

    let mut order: Vec<usize> = (0..count).collect();
    order.sort_by_key(|&i| Reverse(votes_of(&raw[i])));

    let mut ranked = Vec::with_capacity(count);
    for i in order {
        let value = std::mem::take(&mut raw[i]);
        let summary: RawSummary = serde_json::from_value(value)
            .map_err(|e| AurError::malformed(url, format!("result {}: {}", i + 1, e)))?;
        ranked.push(summary.into());
    }

    debug!("ranked {} results for '{}'", ranked.len(), query);
    Ok(ranked)
}

/// Query the search endpoint and rank the results
pub fn search(
    transport: &dyn Transport,
    endpoints: &Endpoints,
    query: &str,
) -> AurResult<Vec<PackageSummary>> {
    let url = endpoints.search_url(query);
    let body = transport.fetch(&url)?;
    rank(query, &url, &body)
}

/// Render one result: `N aur/name (version) (+votes pop%)` and description
pub fn render_summary(number: usize, pkg: &PackageSummary, p: &Painter) -> String {
    let mut line = format!(
        "{} {}/{} {}",
        p.paint(style(number).magenta()),
        p.paint(style("aur").blue().bold()),
        p.paint(style(&pkg.name).white().bold()),
        p.paint(style(format!("({})", pkg.version)).green().bold()),
    );
    line.push_str(
        &p.paint(style(format!(" (+{} {:.2}%)", pkg.num_votes, pkg.popularity)).white().bold())
            .to_string(),
    );

    if pkg.is_orphaned() {
        line.push_str(&p.paint(style(" (Orphaned)").red().bold()).to_string());
    }
    if let Some(ts) = pkg.out_of_date {
        line.push_str(
            &p.paint(style(format!(" (Out-of-date: {})", pretty_date(ts))).red().bold())
                .to_string(),
        );
    }

    line.push_str(&format!("\n ~> {}\n", pkg.description));
    line
}

/// Render all results, numbered from 1
pub fn render_results(results: &[PackageSummary], p: &Painter) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, pkg)| render_summary(i + 1, pkg, p))
        .collect()
}

/// The selection prompt; the last line is left open for input
pub fn render_prompt(p: &Painter) -> String {
    let marker = p.paint(style("::").blue().bold());
    format!(
        "{} {}\n{} ",
        marker,
        p.paint(style("Packages to install (eg: 1 2 3):").white().bold()),
        marker
    )
}
