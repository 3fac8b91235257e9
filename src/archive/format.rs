use anyhow::{Context, Result, anyhow};
use flate2::{Compression, write::GzEncoder};
use std::fs;
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;
use zip::{CompressionMethod, ZipWriter, write::FileOptions};

/// Entries at least this large are written with ZIP64 extensions.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Container format of a snapshot, selected by `archive.format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
}

impl FromStr for ArchiveFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar" => Ok(ArchiveFormat::Tar),
            "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            other => Err(anyhow!(
                "unsupported archive format: {} (expected zip, tar, tar.gz or tgz)",
                other
            )),
        }
    }
}

impl ArchiveFormat {
    /// Write `entries` into `out`. Directories are added recursively, each
    /// entry under its own file name at the archive root.
    pub fn write<W: Write + Seek>(self, entries: &[PathBuf], out: W) -> Result<()> {
        match self {
            ArchiveFormat::Zip => write_zip(entries, out),
            ArchiveFormat::Tar => {
                write_tar(entries, out)?;
                Ok(())
            }
            ArchiveFormat::TarGz => {
                let gz = write_tar(entries, GzEncoder::new(out, Compression::default()))?;
                gz.finish()?;
                Ok(())
            }
        }
    }
}

/// Immediate children of `dir`, sorted by path.
pub fn top_level_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let rd = fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;
    let mut entries = Vec::new();
    for ent in rd {
        let ent = ent.with_context(|| format!("failed to list {}", dir.display()))?;
        entries.push(ent.path());
    }
    entries.sort();
    Ok(entries)
}

fn entry_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("entry has no file name: {}", path.display()))
}

fn write_tar<W: Write>(entries: &[PathBuf], out: W) -> Result<W> {
    let mut builder = tar::Builder::new(out);
    builder.follow_symlinks(false);
    for entry in entries {
        let name = entry_name(entry)?;
        let meta = fs::symlink_metadata(entry)
            .with_context(|| format!("failed to stat {}", entry.display()))?;
        if meta.is_dir() {
            builder.append_dir_all(&name, entry)?;
        } else {
            builder.append_path_with_name(entry, &name)?;
        }
    }
    Ok(builder.into_inner()?)
}

fn write_zip<W: Write + Seek>(entries: &[PathBuf], out: W) -> Result<()> {
    let mut zip = ZipWriter::new(out);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for entry in entries {
        add_zip_entry(&mut zip, opts, entry, &entry_name(entry)?)?;
    }
    zip.finish()?;
    Ok(())
}

fn add_zip_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    opts: FileOptions,
    path: &Path,
    name: &str,
) -> Result<()> {
    let meta =
        fs::symlink_metadata(path).with_context(|| format!("failed to stat {}", path.display()))?;

    if meta.is_dir() {
        zip.add_directory(name, opts)?;
        let rd = fs::read_dir(path).with_context(|| format!("failed to list {}", path.display()))?;
        let mut children: Vec<PathBuf> = rd.flatten().map(|e| e.path()).collect();
        children.sort();
        for child in children {
            let child_name = format!("{}/{}", name, entry_name(&child)?);
            add_zip_entry(zip, opts, &child, &child_name)?;
        }
    } else if meta.is_file() {
        zip.start_file(name, file_options(opts, &meta, ZIP64_THRESHOLD))?;
        let mut f =
            fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        io::copy(&mut f, zip)?;
    } else {
        // zip has no portable symlink entry; tar formats keep them.
        debug!(path = %path.display(), "skipping non-regular file in zip snapshot");
    }
    Ok(())
}

fn file_options(opts: FileOptions, meta: &fs::Metadata, zip64_from: u64) -> FileOptions {
    opts.unix_permissions(file_mode(meta)).large_file(meta.len() >= zip64_from)
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}
#[cfg(not(unix))]
fn file_mode(_meta: &fs::Metadata) -> u32 {
    0o644
}
