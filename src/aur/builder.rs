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

//! AUR snapshot download, extraction and makepkg builds.
//!
//! Each step is a hard stop: the first failure ends the whole run and the
//! build tool never sees an archive that failed validation.

use console::style;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use tracing::{debug, info, warn};

use super::client::{Endpoints, Transport};
use super::search::PackageSummary;
use crate::config::{Config, ToolsConfig};
use crate::error::{AurError, AurResult};
use crate::ui::{spinner, Painter};

/// gzip member header
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Any of these in os-release marks the host as (likely) Arch Linux
pub const ARCH_MARKERS: [&str; 3] = ["Arch Linux", "arch", "https://archlinux.org"];

/// Starts external tools and waits for them
pub trait ToolRunner {
    /// Run `program` with `args` in `cwd` and block until it exits
    fn run(&self, program: &Path, args: &[&str], cwd: &Path) -> io::Result<ExitStatus>;

    /// Whether the current process runs with root privileges
    fn is_root(&self) -> bool {
        unsafe { libc::geteuid() == 0 }
    }
}

/// Runs tools as real child processes with inherited stdio
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[&str], cwd: &Path) -> io::Result<ExitStatus> {
        debug!("spawning {} {:?} in {}", program.display(), args, cwd.display());
        let mut child = Command::new(program).args(args).current_dir(cwd).spawn()?;
        wait_uninterrupted(&mut child)
    }
}

/// Block until `child` exits. Interrupted waits are retried; there is no
/// timeout.
pub fn wait_uninterrupted(child: &mut Child) -> io::Result<ExitStatus> {
    loop {
        match child.wait() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Check the first two bytes of `path` against the gzip signature
pub fn verify_gzip_signature(path: &Path) -> AurResult<()> {
    let mut file =
        File::open(path).map_err(|e| AurError::filesystem(path, "failed to open archive", e))?;

    let mut magic = [0u8; 2];
    match file.read_exact(&mut magic) {
        Ok(()) if magic == GZIP_MAGIC => Ok(()),
        Ok(()) => Err(AurError::InvalidArchive {
            path: path.display().to_string(),
        }),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(AurError::InvalidArchive {
            path: path.display().to_string(),
        }),
        Err(e) => Err(AurError::filesystem(path, "failed to read archive", e)),
    }
}

/// First candidate that exists. Only these exact paths are probed.
pub fn locate_tool(tool: &str, candidates: &[&Path]) -> AurResult<PathBuf> {
    for candidate in candidates {
        match candidate.try_exists() {
            Ok(true) => {
                debug!("found {} at {}", tool, candidate.display());
                return Ok(candidate.to_path_buf());
            }
            Ok(false) => continue,
            Err(e) => return Err(AurError::filesystem(candidate, "failed to probe for tool", e)),
        }
    }
    Err(AurError::ToolMissing {
        tool: tool.to_string(),
        searched: candidates.iter().map(|p| p.to_path_buf()).collect(),
    })
}

/// Heuristic Arch check. A missing or unreadable marker file means "no".
pub fn is_likely_arch(marker: &Path) -> bool {
    let content = match fs::read(marker) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!("cannot read {}: {}", marker.display(), e);
            return false;
        }
    };
    ARCH_MARKERS.iter().any(|m| content.contains(m))
}

fn check_status(status: ExitStatus, tool: &str, package: &str) -> AurResult<()> {
    if status.success() {
        Ok(())
    } else {
        Err(AurError::ToolFailed {
            tool: tool.to_string(),
            package: package.to_string(),
            code: status.code(),
        })
    }
}

/// Drives download → validate → extract → build for selected packages
pub struct AurBuilder<'a> {
    transport: &'a dyn Transport,
    runner: &'a dyn ToolRunner,
    endpoints: &'a Endpoints,
    tools: &'a ToolsConfig,
    work_dir: PathBuf,
    noconfirm: bool,
    painter: Painter,
}

impl<'a> AurBuilder<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        runner: &'a dyn ToolRunner,
        endpoints: &'a Endpoints,
        tools: &'a ToolsConfig,
        work_dir: PathBuf,
        painter: Painter,
    ) -> Self {
        Self {
            transport,
            runner,
            endpoints,
            tools,
            work_dir,
            noconfirm: true,
            painter,
        }
    }

    /// Create a builder from configuration
    pub fn from_config(
        config: &'a Config,
        transport: &'a dyn Transport,
        runner: &'a dyn ToolRunner,
        endpoints: &'a Endpoints,
    ) -> Self {
        let mut builder = Self::new(
            transport,
            runner,
            endpoints,
            &config.tools,
            config.work_dir(),
            Painter::new(config.color),
        );
        builder.noconfirm = config.aur.noconfirm;
        builder
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Run the whole pipeline for one selected package. `ordinal` counts
    /// acquisitions in this session, starting at 1.
    pub fn acquire(&self, ordinal: usize, pkg: &PackageSummary) -> AurResult<()> {
        let _span = crate::span_build!(pkg.name.as_str()).entered();
        let p = &self.painter;

        let url_path = pkg.url_path.as_deref().unwrap_or_default();
        let archive = pkg.archive_name().ok_or_else(|| {
            AurError::malformed(url_path, format!("URLPath of '{}' has no file name", pkg.name))
        })?;
        let url = self.endpoints.snapshot_url(&pkg.package_base);

        println!(
            "{} {} {}",
            p.paint(style("::").blue().bold()),
            p.paint(style(format!("({})", ordinal)).magenta()),
            p.paint(style(format!("Downloading {}...", archive)).white().bold())
        );
        let archive_path = self.download(&url, archive)?;

        println!(
            "{} {}",
            p.paint(style("::").blue().bold()),
            p.paint(style(format!("~> Extracting {}...", archive)).white().bold())
        );
        verify_gzip_signature(&archive_path)?;
        self.extract(archive, &pkg.name)?;

        self.build(pkg)?;

        println!(
            "{} {}",
            p.paint(style("::").green().bold()),
            p.paint(style(format!("{} installed", pkg.name)).white().bold())
        );
        Ok(())
    }

    fn download(&self, url: &str, file_name: &str) -> AurResult<PathBuf> {
        let _span = crate::span_download!(url).entered();
        let dest = self.work_dir.join(file_name);

        let pb = spinner(format!("fetching {}", url));
        let result = self.transport.download(url, &dest);
        pb.finish_and_clear();

        let bytes = result?;
        info!("downloaded {} ({:.2} KiB)", file_name, bytes as f64 / 1024.0);
        Ok(dest)
    }

    fn extract(&self, archive: &str, package: &str) -> AurResult<()> {
        let tar = locate_tool(
            "tar",
            &[self.tools.tar_primary.as_path(), self.tools.tar_secondary.as_path()],
        )?;

        let status = self
            .runner
            .run(&tar, &["xf", archive], &self.work_dir)
            .map_err(|source| AurError::Spawn {
                tool: "tar".to_string(),
                source,
            })?;
        check_status(status, "tar", package)
    }

    fn build(&self, pkg: &PackageSummary) -> AurResult<()> {
        if !is_likely_arch(&self.tools.os_release) {
            warn!("{} does not identify Arch Linux", self.tools.os_release.display());
            return Err(AurError::UnsupportedPlatform {
                marker: self.tools.os_release.display().to_string(),
            });
        }

        let makepkg = locate_tool("makepkg", &[self.tools.makepkg.as_path()])?;

        if self.runner.is_root() {
            return Err(AurError::RunningAsRoot);
        }

        let mut args = vec!["-si"];
        if self.noconfirm {
            args.push("--noconfirm");
        }

        let build_dir = self.work_dir.join(&pkg.package_base);
        let status = self
            .runner
            .run(&makepkg, &args, &build_dir)
            .map_err(|source| AurError::Spawn {
                tool: "makepkg".to_string(),
                source,
            })?;
        check_status(status, "makepkg", &pkg.name)
    }
}

/// Download an arbitrary URL into `work_dir` under the last segment of its
/// path. Nothing is validated or extracted.
pub fn fetch_url(transport: &dyn Transport, raw_url: &str, work_dir: &Path) -> AurResult<PathBuf> {
    let parsed = url::Url::parse(raw_url).map_err(|e| AurError::InvalidInput {
        message: format!("'{}' is not a valid URL: {}", raw_url, e),
    })?;

    let file_name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(|name| {
            urlencoding::decode(name)
                .map(|n| n.into_owned())
                .unwrap_or_else(|_| name.to_string())
        })
        .filter(|name| !name.contains('/') && name != "." && name != "..")
        .ok_or_else(|| AurError::InvalidInput {
            message: format!("'{}' does not name a file", raw_url),
        })?;

    let dest = work_dir.join(&file_name);
    let pb = spinner(format!("fetching {}", raw_url));
    let result = transport.download(parsed.as_str(), &dest);
    pb.finish_and_clear();

    let bytes = result?;
    info!("downloaded {} ({} bytes)", file_name, bytes);
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::os::unix::process::ExitStatusExt;
    use tempfile::TempDir;

    const GZIP_BODY: &[u8] = &[0x1f, 0x8b, 0x08, 0x00, 0x00];

    #[derive(Default)]
    struct FakeTransport {
        bodies: HashMap<String, Vec<u8>>,
        requested: RefCell<Vec<String>>,
    }

    impl Transport for FakeTransport {
        fn fetch(&self, url: &str) -> AurResult<Vec<u8>> {
            self.requested.borrow_mut().push(url.to_string());
            self.bodies.get(url).cloned().ok_or_else(|| AurError::Network {
                url: url.to_string(),
                message: "HTTP 404".to_string(),
                source: None,
            })
        }
    }

    #[derive(Default)]
    struct FakeRunner {
        calls: RefCell<Vec<(PathBuf, Vec<String>, PathBuf)>>,
        fail_tool: Option<&'static str>,
        root: bool,
    }

    impl ToolRunner for FakeRunner {
        fn run(&self, program: &Path, args: &[&str], cwd: &Path) -> io::Result<ExitStatus> {
            self.calls.borrow_mut().push((
                program.to_path_buf(),
                args.iter().map(|a| a.to_string()).collect(),
                cwd.to_path_buf(),
            ));
            let failed = self
                .fail_tool
                .map(|t| program.ends_with(t))
                .unwrap_or(false);
            Ok(ExitStatus::from_raw(if failed { 1 << 8 } else { 0 }))
        }

        fn is_root(&self) -> bool {
            self.root
        }
    }

    impl FakeRunner {
        fn programs(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|(p, _, _)| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect()
        }
    }

    struct Fixture {
        dir: TempDir,
        tools: ToolsConfig,
    }

    /// Fake tool binaries and an Arch os-release inside a temp dir
    fn fixture(arch: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        let work = dir.path().join("work");
        fs::create_dir_all(&bin).unwrap();
        fs::create_dir_all(&work).unwrap();
        fs::write(bin.join("tar"), "").unwrap();
        fs::write(bin.join("makepkg"), "").unwrap();

        let os_release = dir.path().join("os-release");
        if arch {
            fs::write(&os_release, "NAME=\"Arch Linux\"\nID=arch\n").unwrap();
        }

        let tools = ToolsConfig {
            tar_primary: bin.join("tar"),
            tar_secondary: dir.path().join("nope").join("tar"),
            makepkg: bin.join("makepkg"),
            os_release,
        };
        Fixture { dir, tools }
    }

    fn summary(name: &str) -> PackageSummary {
        PackageSummary {
            name: name.to_string(),
            description: String::new(),
            version: "1".to_string(),
            num_votes: 1,
            popularity: 0.0,
            out_of_date: None,
            maintainer: Some("m".to_string()),
            url_path: Some(format!("/cgit/aur.git/snapshot/{}.tar.gz", name)),
            package_base: format!("{}-base", name),
        }
    }

    fn transport_with(pkg: &PackageSummary, body: &[u8]) -> FakeTransport {
        let mut t = FakeTransport::default();
        t.bodies
            .insert(Endpoints::default().snapshot_url(&pkg.package_base), body.to_vec());
        t
    }

    #[test]
    fn test_full_pipeline() {
        let fx = fixture(true);
        let pkg = summary("yay");
        let transport = transport_with(&pkg, GZIP_BODY);
        let runner = FakeRunner::default();
        let endpoints = Endpoints::default();
        let work = fx.dir.path().join("work");
        let builder = AurBuilder::new(
            &transport,
            &runner,
            &endpoints,
            &fx.tools,
            work.clone(),
            Painter::new(false),
        );

        builder.acquire(1, &pkg).unwrap();

        assert_eq!(
            *transport.requested.borrow(),
            vec!["https://aur.archlinux.org/cgit/aur.git/snapshot/yay-base.tar.gz".to_string()]
        );
        assert_eq!(fs::read(work.join("yay.tar.gz")).unwrap(), GZIP_BODY);

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, fx.tools.tar_primary);
        assert_eq!(calls[0].1, vec!["xf", "yay.tar.gz"]);
        assert_eq!(calls[0].2, work);
        assert_eq!(calls[1].0, fx.tools.makepkg);
        assert_eq!(calls[1].1, vec!["-si", "--noconfirm"]);
        assert_eq!(calls[1].2, work.join("yay-base"));
    }

    #[test]
    fn test_bad_signature_never_builds() {
        let fx = fixture(true);
        let pkg = summary("evil");
        let transport = transport_with(&pkg, b"<html>not found</html>");
        let runner = FakeRunner::default();
        let endpoints = Endpoints::default();
        let builder = AurBuilder::new(
            &transport,
            &runner,
            &endpoints,
            &fx.tools,
            fx.dir.path().join("work"),
            Painter::new(false),
        );

        let err = builder.acquire(1, &pkg).unwrap_err();
        assert!(matches!(err, AurError::InvalidArchive { .. }));
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn test_missing_platform_marker_skips_build() {
        let fx = fixture(false);
        let pkg = summary("yay");
        let transport = transport_with(&pkg, GZIP_BODY);
        let runner = FakeRunner::default();
        let endpoints = Endpoints::default();
        let builder = AurBuilder::new(
            &transport,
            &runner,
            &endpoints,
            &fx.tools,
            fx.dir.path().join("work"),
            Painter::new(false),
        );

        let err = builder.acquire(1, &pkg).unwrap_err();
        assert!(matches!(err, AurError::UnsupportedPlatform { .. }));
        assert_eq!(runner.programs(), vec!["tar"]);
    }

    #[test]
    fn test_missing_makepkg() {
        let fx = fixture(true);
        fs::remove_file(&fx.tools.makepkg).unwrap();
        let pkg = summary("yay");
        let transport = transport_with(&pkg, GZIP_BODY);
        let runner = FakeRunner::default();
        let endpoints = Endpoints::default();
        let builder = AurBuilder::new(
            &transport,
            &runner,
            &endpoints,
            &fx.tools,
            fx.dir.path().join("work"),
            Painter::new(false),
        );

        let err = builder.acquire(1, &pkg).unwrap_err();
        assert!(matches!(err, AurError::ToolMissing { ref tool, .. } if tool == "makepkg"));
        assert_eq!(runner.programs(), vec!["tar"]);
    }

    #[test]
    fn test_root_refused() {
        let fx = fixture(true);
        let pkg = summary("yay");
        let transport = transport_with(&pkg, GZIP_BODY);
        let runner = FakeRunner {
            root: true,
            ..Default::default()
        };
        let endpoints = Endpoints::default();
        let builder = AurBuilder::new(
            &transport,
            &runner,
            &endpoints,
            &fx.tools,
            fx.dir.path().join("work"),
            Painter::new(false),
        );

        let err = builder.acquire(1, &pkg).unwrap_err();
        assert!(matches!(err, AurError::RunningAsRoot));
        assert_eq!(runner.programs(), vec!["tar"]);
    }

    #[test]
    fn test_tar_failure_stops_pipeline() {
        let fx = fixture(true);
        let pkg = summary("yay");
        let transport = transport_with(&pkg, GZIP_BODY);
        let runner = FakeRunner {
            fail_tool: Some("tar"),
            ..Default::default()
        };
        let endpoints = Endpoints::default();
        let builder = AurBuilder::new(
            &transport,
            &runner,
            &endpoints,
            &fx.tools,
            fx.dir.path().join("work"),
            Painter::new(false),
        );

        let err = builder.acquire(1, &pkg).unwrap_err();
        assert!(matches!(err, AurError::ToolFailed { ref tool, code: Some(1), .. } if tool == "tar"));
        assert_eq!(runner.programs(), vec!["tar"]);
    }

    #[test]
    fn test_download_failure_is_fatal() {
        let fx = fixture(true);
        let pkg = summary("gone");
        let transport = FakeTransport::default();
        let runner = FakeRunner::default();
        let endpoints = Endpoints::default();
        let builder = AurBuilder::new(
            &transport,
            &runner,
            &endpoints,
            &fx.tools,
            fx.dir.path().join("work"),
            Painter::new(false),
        );

        let err = builder.acquire(1, &pkg).unwrap_err();
        assert!(matches!(err, AurError::Network { .. }));
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn test_url_path_without_file_name() {
        let fx = fixture(true);
        let mut pkg = summary("odd");
        pkg.url_path = Some("odd".to_string());
        let transport = FakeTransport::default();
        let runner = FakeRunner::default();
        let endpoints = Endpoints::default();
        let builder = AurBuilder::new(
            &transport,
            &runner,
            &endpoints,
            &fx.tools,
            fx.dir.path().join("work"),
            Painter::new(false),
        );

        let err = builder.acquire(1, &pkg).unwrap_err();
        assert!(matches!(err, AurError::MalformedResponse { .. }));
        assert!(transport.requested.borrow().is_empty());
    }

    #[test]
    fn test_noconfirm_from_config() {
        let fx = fixture(true);
        let mut config = Config::default();
        config.aur.noconfirm = false;
        config.aur.build_dir = Some(fx.dir.path().join("work"));
        config.tools = fx.tools.clone();

        let pkg = summary("yay");
        let transport = transport_with(&pkg, GZIP_BODY);
        let runner = FakeRunner::default();
        let endpoints = Endpoints::default();
        let builder = AurBuilder::from_config(&config, &transport, &runner, &endpoints);

        builder.acquire(1, &pkg).unwrap();
        assert_eq!(runner.calls.borrow()[1].1, vec!["-si"]);
    }

    #[test]
    fn test_verify_gzip_signature() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.tar.gz");
        let bad = dir.path().join("bad.tar.gz");
        let short = dir.path().join("short.tar.gz");
        fs::write(&good, GZIP_BODY).unwrap();
        fs::write(&bad, [0x8b, 0x1f, 0x00]).unwrap();
        fs::write(&short, [0x1f]).unwrap();

        assert!(verify_gzip_signature(&good).is_ok());
        assert!(matches!(verify_gzip_signature(&bad), Err(AurError::InvalidArchive { .. })));
        assert!(matches!(verify_gzip_signature(&short), Err(AurError::InvalidArchive { .. })));
        assert!(matches!(
            verify_gzip_signature(&dir.path().join("missing")),
            Err(AurError::FileSystem { .. })
        ));
    }

    #[test]
    fn test_locate_tool_prefers_primary() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("usr-bin-tar");
        let secondary = dir.path().join("bin-tar");
        fs::write(&secondary, "").unwrap();

        assert_eq!(locate_tool("tar", &[&primary, &secondary]).unwrap(), secondary);

        fs::write(&primary, "").unwrap();
        assert_eq!(locate_tool("tar", &[&primary, &secondary]).unwrap(), primary);
    }

    #[test]
    fn test_locate_tool_missing() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let err = locate_tool("tar", &[&a, &b]).unwrap_err();
        assert!(matches!(err, AurError::ToolMissing { ref searched, .. } if searched.len() == 2));
    }

    #[test]
    fn test_is_likely_arch() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("os-release");
        assert!(!is_likely_arch(&marker));

        fs::write(&marker, "NAME=\"Debian GNU/Linux\"\nID=debian\n").unwrap();
        assert!(!is_likely_arch(&marker));

        fs::write(&marker, "HOME_URL=\"https://archlinux.org/\"\n").unwrap();
        assert!(is_likely_arch(&marker));

        fs::write(&marker, "ID_LIKE=arch\n").unwrap();
        assert!(is_likely_arch(&marker));
    }

    #[test]
    fn test_fetch_url_uses_basename() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = FakeTransport::default();
        t.bodies
            .insert("https://example.org/files/hello%20world.txt".to_string(), b"hi".to_vec());

        let dest = fetch_url(&t, "https://example.org/files/hello%20world.txt", dir.path()).unwrap();
        assert_eq!(dest, dir.path().join("hello world.txt"));
        assert_eq!(fs::read(dest).unwrap(), b"hi");
    }

    #[test]
    fn test_fetch_url_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let t = FakeTransport::default();
        assert!(matches!(
            fetch_url(&t, "not a url", dir.path()),
            Err(AurError::InvalidInput { .. })
        ));
        assert!(matches!(
            fetch_url(&t, "https://example.org/", dir.path()),
            Err(AurError::InvalidInput { .. })
        ));
        assert!(t.requested.borrow().is_empty());
    }

    #[test]
    fn test_wait_uninterrupted_real_child() {
        let mut child = Command::new("sh").args(["-c", "exit 3"]).spawn().unwrap();
        let status = wait_uninterrupted(&mut child).unwrap();
        assert_eq!(status.code(), Some(3));
    }
}
