//! Archive assembly: concurrent remote fetches, sequential zip writing.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use mgms_core::Config;

use crate::ArchiveError;
use crate::descriptor::{FileDescriptor, FileSource};

/// Builds zip archives in a scratch directory.
///
/// Each assembly call allocates its own uniquely named output file, so
/// independent requests never share state.
pub struct ArchiveAssembler {
    scratch_dir: PathBuf,
    http: reqwest::Client,
}

impl ArchiveAssembler {
    pub fn new(scratch_dir: impl Into<PathBuf>, http: reqwest::Client) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            http,
        }
    }

    /// Assembler using the configured scratch directory and a default HTTP
    /// client.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.scratch_dir.clone(), reqwest::Client::new())
    }

    /// Assemble a zip archive from the given descriptors.
    ///
    /// Remote fetches run concurrently; the archive is written and sealed
    /// only after every fetch has resolved. Unavailable sources (missing
    /// local paths, non-2xx responses, network errors) are omitted without
    /// failing the operation. Fails with [`ArchiveError::NoSourcesResolved`]
    /// only when nothing at all could be included.
    ///
    /// Returns the path of the finalized archive. The caller owns the file
    /// and must delete it after streaming, on every exit path.
    pub async fn assemble(&self, files: &[FileDescriptor]) -> Result<PathBuf, ArchiveError> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        let archive_path = self
            .scratch_dir
            .join(format!("images-{}.zip", Uuid::new_v4()));

        // Fire every remote fetch up front; each resolves to its body or to
        // an omission. Local files are read at write time since they are not
        // I/O-bound in the same sense.
        let mut fetches: JoinSet<(usize, Option<Vec<u8>>)> = JoinSet::new();
        for (index, desc) in files.iter().enumerate() {
            if let FileSource::Remote(url) = &desc.source {
                let http = self.http.clone();
                let url = url.clone();
                fetches.spawn(async move {
                    let body = fetch_remote(&http, &url).await;
                    (index, body)
                });
            }
        }

        // Barrier: every inclusion attempt must resolve before sealing.
        let mut remote_bodies: HashMap<usize, Vec<u8>> = HashMap::new();
        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((index, Some(body))) => {
                    remote_bodies.insert(index, body);
                }
                Ok((_, None)) => {}
                Err(e) => warn!(error = %e, "Remote fetch task failed; entry omitted"),
            }
        }

        let included = match write_entries(&archive_path, files, remote_bodies) {
            Ok(included) => included,
            Err(e) => {
                let _ = std::fs::remove_file(&archive_path);
                return Err(e);
            }
        };

        if included == 0 {
            let _ = std::fs::remove_file(&archive_path);
            return Err(ArchiveError::NoSourcesResolved);
        }

        info!(
            path = %archive_path.display(),
            included,
            requested = files.len(),
            "Archive assembled"
        );
        Ok(archive_path)
    }
}

/// Fetch one remote source; `None` means the entry is omitted.
async fn fetch_remote(http: &reqwest::Client, url: &str) -> Option<Vec<u8>> {
    match http.get(url).send().await {
        Ok(response) if response.status().is_success() => match response.bytes().await {
            Ok(body) => Some(body.to_vec()),
            Err(e) => {
                warn!(url = %url, error = %e, "Failed reading remote body; entry omitted");
                None
            }
        },
        Ok(response) => {
            debug!(url = %url, status = %response.status(), "Remote source unavailable; entry omitted");
            None
        }
        Err(e) => {
            debug!(url = %url, error = %e, "Remote fetch failed; entry omitted");
            None
        }
    }
}

/// Write resolved entries in input order and seal the archive.
///
/// Returns the number of entries actually included.
fn write_entries(
    archive_path: &Path,
    files: &[FileDescriptor],
    mut remote_bodies: HashMap<usize, Vec<u8>>,
) -> Result<usize, ArchiveError> {
    let output = File::create(archive_path)?;
    let mut zip = ZipWriter::new(output);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut names = EntryNames::default();
    let mut included = 0usize;

    for (index, desc) in files.iter().enumerate() {
        let body = match &desc.source {
            FileSource::Local(path) => match std::fs::read(path) {
                Ok(body) => body,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Local source missing; entry omitted");
                    continue;
                }
            },
            FileSource::Remote(_) => match remote_bodies.remove(&index) {
                Some(body) => body,
                None => continue,
            },
        };

        let name = names.reserve(desc.entry_name());
        zip.start_file(name, options)
            .map_err(|e| ArchiveError::Zip(e.to_string()))?;
        zip.write_all(&body)?;
        included += 1;
    }

    zip.finish().map_err(|e| ArchiveError::Zip(e.to_string()))?;
    Ok(included)
}

/// Deduplicates in-archive entry names.
///
/// The container format would accept duplicate names; instead the second
/// `photo.jpg` becomes `photo-2.jpg`, the third `photo-3.jpg`, and so on.
#[derive(Default)]
struct EntryNames {
    seen: HashMap<String, u32>,
}

impl EntryNames {
    fn reserve(&mut self, name: String) -> String {
        let count = self.seen.entry(name.clone()).or_insert(0);
        *count += 1;
        let count = *count;
        if count == 1 {
            return name;
        }
        match name.rsplit_once('.') {
            Some((stem, ext)) => format!("{stem}-{count}.{ext}"),
            None => format!("{name}-{count}"),
        }
    }
}
