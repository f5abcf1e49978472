//! Locates classifier weights on disk, fetching them once when absent.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

const APP_DIR_NAME: &str = "Face Monitor";

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("could not determine cache directory")]
    NoCacheDir,
    #[error("failed to create cache directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{url} returned an empty body")]
    Empty { url: String },
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Searches a per-user cache and an optional bundled directory, and
/// downloads into the cache as a last resort.
///
/// Zero-byte files are treated as missing: they are what an interrupted
/// copy or a full disk leaves behind, and the inference runtime would
/// otherwise fail on them with an unhelpful message.
pub struct ModelResolver {
    cache_dir: PathBuf,
    bundled_dir: Option<PathBuf>,
}

impl ModelResolver {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            bundled_dir: None,
        }
    }

    /// Resolver over [`model_cache_dir`].
    pub fn user_cache() -> Result<Self, ModelResolveError> {
        Ok(Self::new(model_cache_dir()?))
    }

    pub fn with_bundled_dir(mut self, dir: Option<&Path>) -> Self {
        self.bundled_dir = dir.map(Path::to_path_buf);
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path to a usable copy of `name`, downloading from `url` when neither
    /// the cache nor the bundled directory holds one.
    pub fn resolve(
        &self,
        name: &str,
        url: &str,
        progress: Option<ProgressFn>,
    ) -> Result<PathBuf, ModelResolveError> {
        let cached = self.cache_dir.join(name);
        if is_usable(&cached) {
            log::debug!("Using cached model {}", cached.display());
            return Ok(cached);
        }
        if let Some(bundled) = self.bundled_dir.as_ref().map(|d| d.join(name)) {
            if is_usable(&bundled) {
                log::debug!("Using bundled model {}", bundled.display());
                return Ok(bundled);
            }
        }

        fs::create_dir_all(&self.cache_dir).map_err(|source| ModelResolveError::CacheDir {
            path: self.cache_dir.clone(),
            source,
        })?;
        log::info!("Downloading {name} from {url}");
        let partial = self.cache_dir.join(format!("{name}.part"));
        let result = fetch(url, &partial, progress).and_then(|()| {
            fs::rename(&partial, &cached).map_err(|source| ModelResolveError::Write {
                path: cached.clone(),
                source,
            })
        });
        if result.is_err() {
            let _ = fs::remove_file(&partial);
        }
        result.map(|()| cached)
    }
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/Face Monitor/models/`
/// - Linux: `$XDG_CACHE_HOME/Face Monitor/models/` or `~/.cache/Face Monitor/models/`
/// - Windows: `%LOCALAPPDATA%/Face Monitor/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn is_usable(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

/// Streams `url` into `dest`, reporting progress as bytes land on disk.
fn fetch(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|source| ModelResolveError::Download {
            url: url.to_owned(),
            source,
        })?;
    let total = response.content_length().unwrap_or(0);

    let write_err = |source| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source,
    };
    let file = fs::File::create(dest).map_err(write_err)?;
    let mut writer = ProgressWriter {
        inner: io::BufWriter::new(file),
        written: 0,
        total,
        progress,
    };
    io::copy(&mut response, &mut writer).map_err(write_err)?;
    writer.flush().map_err(write_err)?;

    if writer.written == 0 {
        return Err(ModelResolveError::Empty {
            url: url.to_owned(),
        });
    }
    Ok(())
}

struct ProgressWriter<W> {
    inner: W,
    written: u64,
    total: u64,
    progress: Option<ProgressFn>,
}

impl<W: Write> Write for ProgressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        if let Some(cb) = &self.progress {
            cb(self.written, self.total);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
