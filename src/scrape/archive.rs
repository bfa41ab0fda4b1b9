//! Zip archives of a flat directory.
//!
//! Used for the per-session `media.zip` and for the served directory's
//! on-demand archive.

use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWrite;
use tracing::{debug, info};

pub const ARCHIVE_NAME: &str = "media.zip";

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// A directory entry could not be read; no archive is produced
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] async_zip::error::ZipError),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Regular files directly inside `dir`, sorted by name.
///
/// Subdirectories are skipped. Anything else that cannot be inspected, a
/// dangling symlink for instance, is an error.
async fn list_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|source| ArchiveError::Read {
                path: path.clone(),
                source,
            })?;
        if metadata.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        files.push((name, path));
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Write every file of `dir` into a zip on `writer` and hand the writer back.
///
/// Entries are flat and named by base name. The first unreadable file fails
/// the whole archive.
pub async fn write_archive<W>(dir: &Path, writer: W) -> Result<(W, Vec<String>)>
where
    W: AsyncWrite + Unpin,
{
    let files = list_files(dir).await?;
    let mut zip = ZipFileWriter::with_tokio(writer);
    let mut names = Vec::with_capacity(files.len());

    for (name, path) in files {
        let data = tokio::fs::read(&path)
            .await
            .map_err(|source| ArchiveError::Read {
                path: path.clone(),
                source,
            })?;

        let builder = ZipEntryBuilder::new(name.clone().into(), Compression::Deflate);
        zip.write_entry_whole(builder, &data).await?;
        debug!(entry = %name, bytes = data.len(), "Added archive entry");
        names.push(name);
    }

    let writer = zip.close().await?.into_inner();
    Ok((writer, names))
}

/// Archive `dir` into the file at `dest`, removing `dest` again on failure.
pub async fn build_archive(dir: &Path, dest: &Path) -> Result<Vec<String>> {
    let file = tokio::fs::File::create(dest).await?;

    match write_archive(dir, file).await {
        Ok((mut file, names)) => {
            use tokio::io::AsyncWriteExt;
            file.flush().await?;
            info!(archive = ?dest, entries = names.len(), "Archive built");
            Ok(names)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(dest).await;
            Err(e)
        }
    }
}

/// Archive `dir` in memory
pub async fn archive_to_bytes(dir: &Path) -> Result<Vec<u8>> {
    let (bytes, names) = write_archive(dir, Vec::new()).await?;
    debug!(entries = names.len(), bytes = bytes.len(), "Archive built in memory");
    Ok(bytes)
}

#[cfg(test)]
pub(crate) async fn entry_names(bytes: Vec<u8>) -> Vec<String> {
    let zip = async_zip::base::read::mem::ZipFileReader::new(bytes)
        .await
        .unwrap();
    zip.file()
        .entries()
        .iter()
        .map(|entry| entry.filename().as_str().unwrap().to_string())
        .collect()
}
