//! Archive input units: one descriptor per file to include.

use std::path::{Path, PathBuf};

/// Where a descriptor's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// A file on the local filesystem.
    Local(PathBuf),
    /// An HTTP(S) URL fetched at assembly time.
    Remote(String),
}

/// One file to include in an archive.
///
/// `display_name` is the caller-chosen in-archive name; the extension is
/// inferred from the source so the entry keeps a usable file type.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub source: FileSource,
    pub display_name: String,
}

impl FileDescriptor {
    pub fn local(path: impl Into<PathBuf>, display_name: impl Into<String>) -> Self {
        Self {
            source: FileSource::Local(path.into()),
            display_name: display_name.into(),
        }
    }

    pub fn remote(url: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            source: FileSource::Remote(url.into()),
            display_name: display_name.into(),
        }
    }

    /// The in-archive entry name: `display_name` plus the inferred
    /// extension (before duplicate-name suffixing).
    pub fn entry_name(&self) -> String {
        match &self.source {
            FileSource::Local(path) => format!("{}{}", self.display_name, local_extension(path)),
            FileSource::Remote(url) => format!("{}{}", self.display_name, remote_extension(url)),
        }
    }
}

/// Extension of a local path, including the leading dot; empty when the
/// file has none.
fn local_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Extension inferred from the path component of a URL, defaulting to
/// `.jpg` when the path carries none (or the URL does not parse).
fn remote_extension(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            let path = parsed.path().to_string();
            let name = path.rsplit('/').next()?.to_string();
            let (stem, ext) = name.rsplit_once('.')?;
            if stem.is_empty() || ext.is_empty() {
                None
            } else {
                Some(format!(".{ext}"))
            }
        })
        .unwrap_or_else(|| ".jpg".to_string())
}
