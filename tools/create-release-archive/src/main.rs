use anyhow::{bail, Context, Result};
use clap::Parser;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SUMS_NAME: &str = "SHA256SUMS";

/// Package a launcher, its core binary and resources into a .tar.gz
///
/// The launcher and core always land side by side under <prefix>/, which is
/// the layout the launcher expects at run time.
#[derive(Parser, Debug)]
#[command(name = "create-release-archive", version, about)]
struct Args {
    /// Launcher binary, archived under its own file name
    #[arg(long)]
    launcher: PathBuf,

    /// Binary the launcher hands over to, archived as `core` (`core.exe`)
    #[arg(long)]
    core: PathBuf,

    /// Directory whose contents are archived next to the binaries
    #[arg(long)]
    resources: Option<PathBuf>,

    /// Output file
    #[arg(short, long)]
    output: PathBuf,

    /// Top-level directory inside the archive
    #[arg(long, default_value = "app")]
    prefix: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    create_release_archive(&args)?;

    eprintln!("Created release archive: {}", args.output.display());
    Ok(())
}

/// Streams entries into a tarball and remembers a checksum for every file.
struct ReleaseBuilder<W: Write> {
    archive: tar::Builder<W>,
    prefix: String,
    sums: Vec<(String, String)>,
}

impl<W: Write> ReleaseBuilder<W> {
    fn new(writer: W, prefix: &str) -> Self {
        Self {
            archive: tar::Builder::new(writer),
            prefix: prefix.trim_matches('/').to_string(),
            sums: Vec::new(),
        }
    }

    fn archive_path(&self, name: &str) -> String {
        format!("{}/{}", self.prefix, name)
    }

    fn add_file(&mut self, source: &Path, name: &str, mode: u32) -> Result<()> {
        let data = fs::read(source)
            .with_context(|| format!("Failed to read {}", source.display()))?;
        self.add_bytes(name, &data, mode)
    }

    fn add_bytes(&mut self, name: &str, data: &[u8], mode: u32) -> Result<()> {
        let archive_path = self.archive_path(name);

        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(mode);
        header.set_cksum();

        self.archive
            .append_data(&mut header, &archive_path, data)
            .with_context(|| format!("Failed to add {} to archive", archive_path))?;

        self.sums.push((format!("{:x}", Sha256::digest(data)), name.to_string()));
        eprintln!("Added: {}", archive_path);
        Ok(())
    }

    fn add_dir_entry(&mut self, name: &str) -> Result<()> {
        let archive_path = self.archive_path(name);

        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_mode(0o755);
        header.set_entry_type(tar::EntryType::Directory);
        header.set_cksum();

        self.archive
            .append_data(&mut header, &archive_path, io::empty())
            .with_context(|| format!("Failed to add directory {}", archive_path))?;

        eprintln!("Added: {}/", archive_path);
        Ok(())
    }

    /// Add everything under `source_dir`, relative to the prefix.
    fn add_directory(&mut self, source_dir: &Path, reserved: &[&str]) -> Result<()> {
        for entry in WalkDir::new(source_dir)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            // Skip the root directory itself
            if path == source_dir {
                continue;
            }

            let relative_path = path
                .strip_prefix(source_dir)
                .context("Failed to compute relative path")?;
            let name = relative_path
                .to_str()
                .context("Invalid UTF-8 in path")?
                .replace('\\', "/"); // Normalize path separators for tar

            if reserved.contains(&name.as_str()) {
                bail!("Resource {} would shadow a release file", name);
            }

            if entry.file_type().is_dir() {
                self.add_dir_entry(&name)?;
            } else if entry.file_type().is_file() {
                let metadata = entry.metadata().context("Failed to read file metadata")?;
                let mode = if is_executable(&metadata) { 0o755 } else { 0o644 };
                self.add_file(path, &name, mode)?;
            }
            // Skip symlinks and other special files
        }

        Ok(())
    }

    /// Append the checksum listing and hand back the underlying writer.
    fn finish(mut self) -> Result<W> {
        let listing: String = self
            .sums
            .iter()
            .map(|(hash, name)| format!("{}  {}\n", hash, name))
            .collect();

        let archive_path = self.archive_path(SUMS_NAME);
        let mut header = tar::Header::new_gnu();
        header.set_size(listing.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        self.archive
            .append_data(&mut header, &archive_path, listing.as_bytes())
            .context("Failed to add checksum listing")?;
        eprintln!("Added: {}", archive_path);

        self.archive.into_inner().context("Failed to finalize archive")
    }
}

fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("No usable file name in {}", path.display()))
}

/// `core`, keeping an `.exe` extension for Windows builds.
fn core_name(source: &Path) -> &'static str {
    match source.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("exe") => "core.exe",
        _ => "core",
    }
}

fn create_release_archive(args: &Args) -> Result<()> {
    for (what, path) in [("launcher", &args.launcher), ("core", &args.core)] {
        if !path.is_file() {
            bail!("{} binary not found: {}", what, path.display());
        }
    }
    if let Some(dir) = &args.resources {
        if !dir.is_dir() {
            bail!("Resources directory not found: {}", dir.display());
        }
    }

    let launcher_name = file_name(&args.launcher)?;
    let core_name = core_name(&args.core);
    if launcher_name == core_name {
        bail!("Launcher cannot be named {}; that name belongs to the core binary", core_name);
    }

    let output_file = File::create(&args.output)
        .with_context(|| format!("Failed to create output file: {}", args.output.display()))?;
    let encoder = GzEncoder::new(output_file, Compression::default());

    let mut release = ReleaseBuilder::new(encoder, &args.prefix);
    release.add_file(&args.launcher, launcher_name, 0o755)?;
    release.add_file(&args.core, core_name, 0o755)?;

    if let Some(dir) = &args.resources {
        release.add_directory(dir, &[launcher_name, core_name, SUMS_NAME])?;
    }

    release
        .finish()?
        .finish()
        .context("Failed to finish gzip stream")?;

    Ok(())
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::collections::BTreeMap;
    use std::io::Read;

    struct Entry {
        mode: u32,
        is_dir: bool,
        data: Vec<u8>,
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "create-release-archive-{}-{}",
            std::process::id(),
            name
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn read_archive(path: &Path) -> BTreeMap<String, Entry> {
        let mut archive = tar::Archive::new(GzDecoder::new(File::open(path).unwrap()));
        let mut entries = BTreeMap::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry
                .path()
                .unwrap()
                .to_string_lossy()
                .trim_end_matches('/')
                .to_string();
            let mode = entry.header().mode().unwrap();
            let is_dir = entry.header().entry_type().is_dir();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            entries.insert(name, Entry { mode, is_dir, data });
        }
        entries
    }

    fn args_for(dir: &Path, resources: Option<PathBuf>) -> Args {
        Args {
            launcher: dir.join("launcher"),
            core: dir.join("core-build"),
            resources,
            output: dir.join("release.tar.gz"),
            prefix: "app".to_string(),
        }
    }

    #[test]
    fn archives_binaries_side_by_side_with_checksums() {
        let dir = scratch_dir("layout");
        fs::write(dir.join("launcher"), b"launcher image").unwrap();
        fs::write(dir.join("core-build"), b"core image").unwrap();
        let resources = dir.join("resources");
        fs::create_dir_all(resources.join("data")).unwrap();
        fs::write(resources.join("data/levels.txt"), b"level 1\n").unwrap();

        let args = args_for(&dir, Some(resources));
        create_release_archive(&args).unwrap();

        let entries = read_archive(&args.output);
        let names: Vec<&str> = entries.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            ["app/SHA256SUMS", "app/core", "app/data", "app/data/levels.txt", "app/launcher"]
        );

        assert_eq!(entries["app/launcher"].mode, 0o755);
        assert_eq!(entries["app/core"].mode, 0o755);
        assert_eq!(entries["app/core"].data, b"core image");
        assert!(entries["app/data"].is_dir);
        assert_eq!(entries["app/data/levels.txt"].mode, 0o644);

        let sums = String::from_utf8(entries["app/SHA256SUMS"].data.clone()).unwrap();
        let lines: Vec<&str> = sums.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("{:x}  launcher", Sha256::digest(b"launcher image")));
        assert_eq!(lines[1], format!("{:x}  core", Sha256::digest(b"core image")));
        assert_eq!(lines[2], format!("{:x}  data/levels.txt", Sha256::digest(b"level 1\n")));
    }

    #[test]
    fn core_keeps_exe_extension() {
        assert_eq!(core_name(Path::new("target/release/game.exe")), "core.exe");
        assert_eq!(core_name(Path::new("target/release/GAME.EXE")), "core.exe");
        assert_eq!(core_name(Path::new("target/release/game")), "core");
    }

    #[test]
    fn missing_core_is_reported() {
        let dir = scratch_dir("missing");
        fs::write(dir.join("launcher"), b"launcher image").unwrap();

        let err = create_release_archive(&args_for(&dir, None)).unwrap_err();
        assert!(err.to_string().starts_with("core binary not found"));
    }

    #[test]
    fn resource_named_core_is_rejected() {
        let dir = scratch_dir("shadow");
        fs::write(dir.join("launcher"), b"launcher image").unwrap();
        fs::write(dir.join("core-build"), b"core image").unwrap();
        let resources = dir.join("resources");
        fs::create_dir_all(&resources).unwrap();
        fs::write(resources.join("core"), b"stale").unwrap();

        let err = create_release_archive(&args_for(&dir, Some(resources))).unwrap_err();
        assert!(err.to_string().contains("would shadow"));
    }
}
