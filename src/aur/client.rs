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

//! AUR endpoint URLs and the blocking HTTP transport.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::config::AurConfig;
use crate::error::{AurError, AurResult};

/// Builds RPC and snapshot URLs below one AUR web root
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    base_url: String,
    snapshot_path: String,
}

impl Endpoints {
    pub fn new(base_url: &str, snapshot_path: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            snapshot_path: snapshot_path.trim_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &AurConfig) -> Self {
        Self::new(&config.base_url, &config.snapshot_path)
    }

    /// `{base}/rpc/v5/search/{query}`
    pub fn search_url(&self, query: &str) -> String {
        format!("{}/rpc/v5/search/{}", self.base_url, urlencoding::encode(query))
    }

    /// `{base}/rpc/v5/info?arg[]={name}`
    pub fn info_url(&self, name: &str) -> String {
        format!("{}/rpc/v5/info?arg[]={}", self.base_url, urlencoding::encode(name))
    }

    /// `{base}/{snapshot}/{package_base}.tar.gz`
    pub fn snapshot_url(&self, package_base: &str) -> String {
        format!("{}/{}/{}.tar.gz", self.base_url, self.snapshot_path, package_base)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::from_config(&AurConfig::default())
    }
}

/// One blocking request per call. No retries.
pub trait Transport {
    /// GET `url` and return the whole body
    fn fetch(&self, url: &str) -> AurResult<Vec<u8>>;

    /// GET `url` into a newly created file at `dest`, returning the byte
    /// count. The file is created before the request is sent.
    fn download(&self, url: &str, dest: &Path) -> AurResult<u64> {
        let mut file = File::create(dest)
            .map_err(|e| AurError::filesystem(dest, "failed to create file", e))?;
        let body = self.fetch(url)?;
        file.write_all(&body)
            .map_err(|e| AurError::filesystem(dest, "failed to write file", e))?;
        Ok(body.len() as u64)
    }
}

/// ureq-backed transport
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(user_agent: &str, max_redirects: u32) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(user_agent)
            .redirects(max_redirects)
            .timeout_connect(Duration::from_secs(10))
            .build();
        Self { agent }
    }

    pub fn from_config(config: &AurConfig) -> Self {
        Self::new(&config.user_agent, config.max_redirects)
    }

    fn get(&self, url: &str) -> AurResult<ureq::Response> {
        debug!("GET {}", url);
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| AurError::network(url, e))?;
        debug!("{} -> HTTP {}", response.get_url(), response.status());
        Ok(response)
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> AurResult<Vec<u8>> {
        let response = self.get(url)?;
        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| AurError::Network {
                url: url.to_string(),
                message: format!("failed to read response body: {}", e),
                source: None,
            })?;
        Ok(body)
    }

    fn download(&self, url: &str, dest: &Path) -> AurResult<u64> {
        let file = File::create(dest)
            .map_err(|e| AurError::filesystem(dest, "failed to create file", e))?;

        let mut reader = self.get(url)?.into_reader();
        let mut sink = FileSink::new(file);
        let written = copy_body(url, dest, &mut reader, &mut sink)?;

        debug!("wrote {} bytes to {}", written, dest.display());
        Ok(written)
    }
}

/// Writer that remembers whether the file side failed, so a failed copy
/// can be blamed on the network or on the disk
struct FileSink<W> {
    inner: W,
    failed: bool,
}

impl<W: Write> FileSink<W> {
    fn new(inner: W) -> Self {
        Self { inner, failed: false }
    }
}

impl<W: Write> Write for FileSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.inner.write(buf);
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.flush();
        if result.is_err() {
            self.failed = true;
        }
        result
    }
}

/// Stream `reader` into `sink`, mapping read errors to `Network` and write
/// errors to `FileSystem`
fn copy_body<R: Read, W: Write>(
    url: &str,
    dest: &Path,
    reader: &mut R,
    sink: &mut FileSink<W>,
) -> AurResult<u64> {
    match io::copy(reader, sink).and_then(|n| sink.flush().map(|_| n)) {
        Ok(n) => Ok(n),
        Err(e) if sink.failed => Err(AurError::filesystem(dest, "failed to write file", e)),
        Err(e) => Err(AurError::Network {
            url: url.to_string(),
            message: format!("error while downloading: {}", e),
            source: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct StaticTransport(Vec<u8>);

    impl Transport for StaticTransport {
        fn fetch(&self, _url: &str) -> AurResult<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_search_url() {
        let ep = Endpoints::default();
        assert_eq!(
            ep.search_url("yay"),
            "https://aur.archlinux.org/rpc/v5/search/yay"
        );
        assert_eq!(
            ep.search_url("visual studio"),
            "https://aur.archlinux.org/rpc/v5/search/visual%20studio"
        );
    }

    #[test]
    fn test_info_url() {
        let ep = Endpoints::default();
        assert_eq!(
            ep.info_url("google-chrome"),
            "https://aur.archlinux.org/rpc/v5/info?arg[]=google-chrome"
        );
        assert_eq!(
            ep.info_url("a&b"),
            "https://aur.archlinux.org/rpc/v5/info?arg[]=a%26b"
        );
    }

    #[test]
    fn test_snapshot_url() {
        let ep = Endpoints::default();
        assert_eq!(
            ep.snapshot_url("test-pkg-base"),
            "https://aur.archlinux.org/cgit/aur.git/snapshot/test-pkg-base.tar.gz"
        );
    }

    #[test]
    fn test_endpoints_normalize_slashes() {
        let ep = Endpoints::new("http://localhost:8080/", "/snap/");
        assert_eq!(ep.snapshot_url("x"), "http://localhost:8080/snap/x.tar.gz");
        assert_eq!(ep.search_url("q"), "http://localhost:8080/rpc/v5/search/q");
    }

    #[test]
    fn test_default_download_writes_body() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let t = StaticTransport(vec![1, 2, 3]);

        assert_eq!(t.download("http://x", &dest).unwrap(), 3);
        assert_eq!(fs::read(&dest).unwrap(), vec![1, 2, 3]);
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"))
        }
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_copy_body_streams_everything() {
        let body = vec![7u8; 40 * 1024];
        let mut sink = FileSink::new(Vec::new());
        let n = copy_body("http://x", Path::new("out"), &mut body.as_slice(), &mut sink).unwrap();
        assert_eq!(n, body.len() as u64);
        assert_eq!(sink.inner, body);
    }

    #[test]
    fn test_copy_body_read_error_is_network() {
        let mut sink = FileSink::new(Vec::new());
        let err = copy_body("http://x", Path::new("out"), &mut BrokenReader, &mut sink).unwrap_err();
        assert!(matches!(err, AurError::Network { ref url, .. } if url == "http://x"));
    }

    #[test]
    fn test_copy_body_write_error_is_filesystem() {
        let mut sink = FileSink::new(FullDisk);
        let err = copy_body("http://x", Path::new("out"), &mut &b"data"[..], &mut sink).unwrap_err();
        assert!(matches!(err, AurError::FileSystem { .. }));
    }

    #[test]
    fn test_default_download_bad_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing").join("out.bin");
        let err = StaticTransport(vec![]).download("http://x", &dest).unwrap_err();
        assert!(matches!(err, AurError::FileSystem { .. }));
    }
}
