//! Content-addressed store for rendered snippet HTML.
//!
//! Rendering a snippet is expensive (check, highlight, link), so the
//! result is persisted under a digest of everything that feeds it. A
//! content change produces a new key rather than an update, which makes
//! concurrent writes to the same key idempotent.

use std::fs;
use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

/// Durable snippet cache: one `<digest>.html` file per entry.
///
/// The cache is a pure durability layer. It never transforms content
/// and never fails the build: unreadable entries are misses, failed
/// writes are logged and dropped.
#[derive(Debug)]
pub struct SnippetCache {
    dir: PathBuf,
}

impl SnippetCache {
    /// Conventional cache location for a docs build.
    pub const DEFAULT_DIR: &str = ".snippets";

    /// Opens the cache rooted at `dir`. The directory is created on
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Digest of everything that determines a snippet's rendered HTML.
    ///
    /// sha-256 over source, language and enclosing section title,
    /// base64-encoded with `/` swapped for `-` so the result is a valid
    /// file name.
    pub fn digest(source: &str, language: &str, current: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source);
        hasher.update(language);
        hasher.update(current);
        STANDARD.encode(hasher.finalize()).replace('/', "-")
    }

    /// Cached HTML for `digest`, or a miss on any read failure.
    pub fn get(&self, digest: &str) -> Option<String> {
        let path = self.dir.join(format!("{digest}.html"));
        match fs::read_to_string(&path) {
            Ok(html) => {
                log::debug!("snippet cache hit: {digest}");
                Some(html)
            }
            Err(_) => None,
        }
    }

    /// Persists `html` under `digest`. Failures are logged, never fatal.
    pub fn put(&self, digest: &str, html: &str) {
        if let Err(err) = fs::create_dir_all(&self.dir) {
            log::warn!("could not create snippet cache {}: {err}", self.dir.display());
            return;
        }
        let path = self.dir.join(format!("{digest}.html"));
        if let Err(err) = fs::write(&path, html) {
            log::warn!("snippet cache write failed for {}: {err}", path.display());
        }
    }
}

impl Default for SnippetCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIR)
    }
}
