//! Input resolution: read a user-supplied path or URL into memory.
//!
//! Both calamine and the csv reader work from an in-memory cursor, so the
//! whole input is read up front. The file name is kept alongside the bytes
//! because its extension is the first hint for [`SourceKind`].

use crate::config::SourceKind;
use crate::error::EmbedError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The input file's bytes plus the name used for format detection.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    /// File name (local path's last component or URL's last segment).
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ResolvedInput {
    /// Build directly from in-memory bytes, e.g. an upload.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Pick the source kind: explicit override, then extension, then magic bytes.
    pub fn kind(&self, explicit: Option<SourceKind>) -> SourceKind {
        explicit
            .or_else(|| SourceKind::from_path(&self.name))
            .unwrap_or_else(|| SourceKind::sniff(&self.bytes))
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to its bytes.
///
/// If the input is a URL, download it. If the input is a local file,
/// validate it exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, EmbedError> {
    if input.trim().is_empty() {
        return Err(EmbedError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input)).await
    }
}

async fn resolve_local(path: &Path) -> Result<ResolvedInput, EmbedError> {
    let path: PathBuf = path.to_path_buf();

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(EmbedError::PermissionDenied { path });
        }
        Err(_) => return Err(EmbedError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    debug!("Read local input: {} ({} bytes)", path.display(), bytes.len());
    Ok(ResolvedInput { name, bytes })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, EmbedError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EmbedError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            EmbedError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            EmbedError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(EmbedError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = extract_filename(url);

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            EmbedError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            EmbedError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    info!("Downloaded {} bytes as '{}'", bytes.len(), name);
    Ok(ResolvedInput {
        name,
        bytes: bytes.to_vec(),
    })
}

/// Last non-empty path segment of the URL, or an empty name so the kind is sniffed.
fn extract_filename(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| last.contains('.'))
        .unwrap_or_default()
}
