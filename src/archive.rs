use anyhow::{anyhow, Context, Result};
use bzip2::write::BzEncoder;
use bzip2::Compression;
use futures_util::{Stream, StreamExt};
use log::{debug, info};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

const TEMP_PREFIX: &str = "dockercp";

/// Empty temporary file, removed from disk when dropped.
pub fn temp_file() -> Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile()
        .with_context(|| "creating temporary archive")
}

/// Spools a stream of archive chunks into a temporary file, writing
/// through a buffer of `bufsize` bytes.
pub async fn spill<S, B, E>(chunks: S, bufsize: usize) -> Result<NamedTempFile>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<anyhow::Error>,
{
    let mut chunks = std::pin::pin!(chunks);
    let mut file = temp_file()?;
    let mut received = 0u64;
    {
        let mut writer = BufWriter::with_capacity(bufsize, file.as_file_mut());
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(Into::<anyhow::Error>::into)?;
            writer.write_all(chunk.as_ref())?;
            received += chunk.as_ref().len() as u64;
        }
        writer.flush()?;
    }
    info!("received {} bytes archive", received);
    Ok(file)
}

/// Extracts the (uncompressed) tar at `archive` into `dest`, creating
/// `dest` when it doesn't exist yet.
pub fn unpack(archive: &Path, dest: &Path, bufsize: usize) -> Result<()> {
    let file = File::open(archive)
        .with_context(|| format!("opening archive {:?}", archive))?;
    let mut tar = tar::Archive::new(BufReader::with_capacity(bufsize, file));
    tar.set_preserve_permissions(true);
    tar.unpack(dest)
        .with_context(|| format!("extracting archive into {:?}", dest))?;
    debug!("extracted {:?} into {:?}", archive, dest);
    Ok(())
}

/// Tars `src` into a bzip2 compressed temporary file. The archive holds a
/// single top-level entry named after the base name of `src`; directories
/// are added recursively and symlinks are stored as links.
pub fn pack(src: &Path, bufsize: usize) -> Result<NamedTempFile> {
    let metadata = fs::symlink_metadata(src)
        .with_context(|| format!("unable to read {:?}", src))?;
    let name = archive_name(src)?;
    let mut file = temp_file()?;
    {
        let writer = BufWriter::with_capacity(bufsize, file.as_file_mut());
        let mut builder = tar::Builder::new(BzEncoder::new(writer, Compression::best()));
        builder.follow_symlinks(false);
        if metadata.is_dir() {
            debug!("adding dir {:?} as {:?}", src, name);
            builder.append_dir_all(&name, src)?;
        } else {
            debug!("adding file {:?} as {:?}", src, name);
            builder.append_path_with_name(src, &name)?;
        }
        let encoder = builder.into_inner()?;
        let mut writer = encoder.finish()?;
        writer.flush()?;
    }
    Ok(file)
}

/// Reads a packed archive back into memory.
pub fn read_all(file: &NamedTempFile, bufsize: usize) -> Result<Vec<u8>> {
    let mut reader = BufReader::with_capacity(bufsize, file.reopen()?);
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    Ok(data)
}

// "dir/" -> "dir", "." -> name of the current directory
fn archive_name(src: &Path) -> Result<OsString> {
    if let Some(name) = src.file_name() {
        return Ok(name.to_os_string());
    }
    let canonical = fs::canonicalize(src)
        .with_context(|| format!("unable to resolve {:?}", src))?;
    canonical
        .file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| anyhow!("unable to name an archive for {:?}", src))
}
