//! Normalization cache for repeated batch runs.
//!
//! Re-running `normalize` over a folder that has mostly been processed before
//! should not re-decode and re-encode every image. This module lets the batch
//! layer skip work when both the source bytes and the normalize options are
//! unchanged since the last run.
//!
//! # Design
//!
//! ## Cache keys
//!
//! Entries are found by **what** was normalized, not where it was written:
//! the key is the pair of
//! `source_hash` and `params_hash`, not by output file path, so renaming a
//! source file within the same type does not invalidate its entry.
//!
//! - **`source_hash`**: SHA-256 of the source file contents.
//! - **`params_hash`**: SHA-256 of every [`NormalizeOptions`] field plus the
//!   declared media type (taken from the extension). Changing any option, or
//!   renaming `logo.jpg` to `logo.png`, re-normalizes.
//!
//! A lookup only succeeds while the recorded output file is still present in
//! the output directory.
//!
//! When a hit is found but the output path has changed (e.g. the source was
//! renamed), the cached file is copied to the new location instead of
//! re-encoding.
//!
//! Each entry also stores the [`FileSummary`] of the run that produced it, so
//! a hit can be reported without decoding the output again.
//!
//! ## Storage
//!
//! `<output_dir>/.cache-manifest.json`, pretty-printed, rewritten after
//! every batch.
//!
//! ## Bypassing the cache
//!
//! Pass `--no-cache` to force a full run. This loads an empty manifest, so
//! every image is normalized again and old outputs are overwritten.

use crate::imaging::{MediaType, NormalizeOptions};
use crate::process::FileSummary;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;

const MANIFEST_FILENAME: &str = ".cache-manifest.json";

/// Manifests with any other version are discarded on load.
const MANIFEST_VERSION: u32 = 1;

/// One normalized output and the inputs that produced it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
    pub summary: FileSummary,
}

/// Cache entries keyed by output path (relative to the output directory).
///
/// Lookups go through `by_content`, an in-memory map from
/// `"{source_hash}:{params_hash}"` to the stored output path.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
    /// `"{source_hash}:{params_hash}"` to output path. Rebuilt on load.
    #[serde(skip)]
    by_content: HashMap<String, String>,
}

/// A successful cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedOutput<'a> {
    /// Output path (relative to the output directory) the entry was stored under.
    pub stored_path: &'a str,
    pub summary: &'a FileSummary,
}

impl CacheManifest {
    /// Create an empty manifest (used for `--no-cache` or the first run).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
            by_content: HashMap::new(),
        }
    }

    /// Read the manifest from `output_dir`, falling back to an empty one
    /// when it is missing, unreadable, or from another manifest version.
    pub fn load(output_dir: &Path) -> Self {
        let path = output_dir.join(MANIFEST_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let mut manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unreadable cache manifest");
                return Self::empty();
            }
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest.by_content = index_by_content(&manifest.entries);
        manifest
    }

    /// Write the manifest into `output_dir`.
    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let path = output_dir.join(MANIFEST_FILENAME);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Look up a cached output by content hashes.
    ///
    /// Returns the stored entry if one with matching `source_hash` and
    /// `params_hash` exists **and** its file is still on disk. The stored
    /// path may differ from the caller's expected output path; the caller
    /// copies the file if needed.
    pub fn find_cached(
        &self,
        source_hash: &str,
        params_hash: &str,
        output_dir: &Path,
    ) -> Option<CachedOutput<'_>> {
        let key = format!("{}:{}", source_hash, params_hash);
        let stored_path = self.by_content.get(&key)?;
        if !output_dir.join(stored_path).exists() {
            return None;
        }
        let entry = self.entries.get(stored_path)?;
        Some(CachedOutput {
            stored_path,
            summary: &entry.summary,
        })
    }

    /// Record the output written for a source/options pair.
    ///
    /// If the same content was stored under a different output path, that
    /// entry is dropped. If `output_path` held other content before, that
    /// content is no longer findable.
    pub fn insert(
        &mut self,
        output_path: String,
        source_hash: String,
        params_hash: String,
        summary: FileSummary,
    ) {
        let key = format!("{}:{}", source_hash, params_hash);

        if let Some(old_path) = self.by_content.get(&key)
            && *old_path != output_path
            && self
                .entries
                .get(old_path)
                .is_some_and(|e| e.source_hash == source_hash && e.params_hash == params_hash)
        {
            self.entries.remove(old_path.as_str());
        }

        if let Some(previous) = self.entries.get(&output_path) {
            let previous_key = format!("{}:{}", previous.source_hash, previous.params_hash);
            if previous_key != key && self.by_content.get(&previous_key) == Some(&output_path) {
                self.by_content.remove(&previous_key);
            }
        }

        self.by_content.insert(key, output_path.clone());
        self.entries.insert(
            output_path,
            CacheEntry {
                source_hash,
                params_hash,
                summary,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn index_by_content(entries: &HashMap<String, CacheEntry>) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(output_path, entry)| {
            let key = format!("{}:{}", entry.source_hash, entry.params_hash);
            (key, output_path.clone())
        })
        .collect()
}

/// SHA-256 hash of a byte buffer, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 of everything besides the source bytes that decides the output:
/// every [`NormalizeOptions`] field and the declared media type, which
/// gates whether transparency may be kept.
pub fn hash_params(options: &NormalizeOptions, declared: &MediaType) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"normalize\0");
    hasher.update(options.max_long_side.to_le_bytes());
    hasher.update(options.target_min_short_side.to_le_bytes());
    hasher.update((options.max_bytes as u64).to_le_bytes());
    hasher.update(options.initial_quality.to_le_bytes());
    hasher.update(options.min_quality.to_le_bytes());
    hasher.update(options.quality_step.to_le_bytes());
    hasher.update([options.preserve_transparent_format as u8]);
    hasher.update(b"\0declared\0");
    hasher.update(declared.mime().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub copies: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn copy(&mut self) {
        self.copies += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.copies + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.copies > 0 {
            write!(
                f,
                "{} cached, {} copied, {} normalized ({} total)",
                self.hits,
                self.copies,
                self.misses,
                self.total()
            )
        } else if self.hits > 0 {
            write!(
                f,
                "{} cached, {} normalized ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} normalized", self.misses)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn summary(output: &str) -> FileSummary {
        FileSummary {
            source: "in/photo.png".into(),
            output: output.into(),
            media_type: "image/jpeg".into(),
            width: 300,
            height: 200,
            original_width: 300,
            original_height: 200,
            original_bytes: 2048,
            final_bytes: 1024,
            was_resized: false,
            was_compressed: false,
            within_byte_cap: true,
            notes: vec!["no resize needed (300x200)".into()],
        }
    }

    // =========================================================================
    // CacheManifest basics
    // =========================================================================

    #[test]
    fn empty_manifest_has_no_entries() {
        let m = CacheManifest::empty();
        assert_eq!(m.version, MANIFEST_VERSION);
        assert!(m.is_empty());
        assert!(m.by_content.is_empty());
    }

    #[test]
    fn find_cached_hit() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("b.jpg".into(), "src123".into(), "prm456".into(), summary("b.jpg"));
        fs::write(tmp.path().join("b.jpg"), "data").unwrap();

        let hit = m.find_cached("src123", "prm456", tmp.path()).unwrap();
        assert_eq!(hit.stored_path, "b.jpg");
        assert_eq!(hit.summary.width, 300);
    }

    #[test]
    fn find_cached_miss_wrong_source_hash() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("out.jpg".into(), "hash_a".into(), "params".into(), summary("out.jpg"));
        fs::write(tmp.path().join("out.jpg"), "data").unwrap();

        assert_eq!(m.find_cached("hash_b", "params", tmp.path()), None);
    }

    #[test]
    fn find_cached_miss_wrong_params_hash() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("out.jpg".into(), "hash".into(), "params_a".into(), summary("out.jpg"));
        fs::write(tmp.path().join("out.jpg"), "data").unwrap();

        assert_eq!(m.find_cached("hash", "params_b", tmp.path()), None);
    }

    #[test]
    fn find_cached_miss_file_deleted() {
        let mut m = CacheManifest::empty();
        m.insert("gone.jpg".into(), "h".into(), "p".into(), summary("gone.jpg"));
        let tmp = TempDir::new().unwrap();
        assert_eq!(m.find_cached("h", "p", tmp.path()), None);
    }

    #[test]
    fn insert_removes_stale_entry_on_path_change() {
        let mut m = CacheManifest::empty();
        m.insert("old.jpg".into(), "src".into(), "prm".into(), summary("old.jpg"));
        m.insert("new.jpg".into(), "src".into(), "prm".into(), summary("new.jpg"));

        assert!(!m.entries.contains_key("old.jpg"));
        assert!(m.entries.contains_key("new.jpg"));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn insert_keeps_swapped_contents_findable() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.jpg"), "a").unwrap();
        fs::write(tmp.path().join("b.jpg"), "b").unwrap();
        let mut m = CacheManifest::empty();
        m.insert("a.jpg".into(), "A".into(), "p".into(), summary("a.jpg"));
        m.insert("b.jpg".into(), "B".into(), "p".into(), summary("b.jpg"));

        // Next run: a.jpg now holds B, b.jpg holds A.
        m.insert("a.jpg".into(), "B".into(), "p".into(), summary("a.jpg"));
        m.insert("b.jpg".into(), "A".into(), "p".into(), summary("b.jpg"));

        assert_eq!(m.len(), 2);
        assert_eq!(m.find_cached("A", "p", tmp.path()).unwrap().stored_path, "b.jpg");
        assert_eq!(m.find_cached("B", "p", tmp.path()).unwrap().stored_path, "a.jpg");
    }

    #[test]
    fn overwritten_path_no_longer_serves_old_content() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.jpg"), "a").unwrap();
        let mut m = CacheManifest::empty();
        m.insert("a.jpg".into(), "old".into(), "p".into(), summary("a.jpg"));
        m.insert("a.jpg".into(), "new".into(), "p".into(), summary("a.jpg"));

        assert_eq!(m.find_cached("old", "p", tmp.path()), None);
        assert!(m.find_cached("new", "p", tmp.path()).is_some());
    }

    // =========================================================================
    // Save / Load roundtrip
    // =========================================================================

    #[test]
    fn save_and_load_rebuilds_index() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("x.jpg".into(), "s1".into(), "p1".into(), summary("x.jpg"));
        m.insert("y.png".into(), "s2".into(), "p2".into(), summary("y.png"));
        m.save(tmp.path()).unwrap();

        let loaded = CacheManifest::load(tmp.path());
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.entries["x.jpg"].summary, summary("x.jpg"));
        assert_eq!(loaded.by_content.get("s2:p2"), Some(&"y.png".to_string()));
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(CacheManifest::load(tmp.path()).is_empty());
    }

    #[test]
    fn load_corrupt_json_returns_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MANIFEST_FILENAME), "not json").unwrap();
        assert!(CacheManifest::load(tmp.path()).is_empty());
    }

    #[test]
    fn load_wrong_version_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("a.jpg".into(), "h".into(), "p".into(), summary("a.jpg"));
        m.version = MANIFEST_VERSION + 1;
        m.save(tmp.path()).unwrap();

        assert!(CacheManifest::load(tmp.path()).is_empty());
    }

    // =========================================================================
    // Hash functions
    // =========================================================================

    #[test]
    fn hash_bytes_deterministic_and_content_sensitive() {
        let h1 = hash_bytes(b"version 1");
        assert_eq!(h1, hash_bytes(b"version 1"));
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, hash_bytes(b"version 2"));
    }

    #[test]
    fn hash_params_deterministic() {
        let o = NormalizeOptions::default();
        assert_eq!(
            hash_params(&o, &MediaType::Png),
            hash_params(&o.clone(), &MediaType::Png)
        );
    }

    #[test]
    fn hash_params_varies_with_declared_type() {
        let o = NormalizeOptions::default();
        assert_ne!(
            hash_params(&o, &MediaType::Png),
            hash_params(&o, &MediaType::Jpeg)
        );
    }

    #[test]
    fn hash_params_varies_with_every_option() {
        let base = NormalizeOptions::default();
        let variants = [
            NormalizeOptions {
                max_long_side: 1568,
                ..base.clone()
            },
            NormalizeOptions {
                target_min_short_side: 512,
                ..base.clone()
            },
            NormalizeOptions {
                max_bytes: 1024,
                ..base.clone()
            },
            NormalizeOptions {
                initial_quality: 0.9,
                ..base.clone()
            },
            NormalizeOptions {
                min_quality: 0.5,
                ..base.clone()
            },
            NormalizeOptions {
                quality_step: 0.1,
                ..base.clone()
            },
            NormalizeOptions {
                preserve_transparent_format: false,
                ..base.clone()
            },
        ];
        let base_hash = hash_params(&base, &MediaType::Png);
        for v in &variants {
            assert_ne!(hash_params(v, &MediaType::Png), base_hash, "{v:?}");
        }
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_with_hits() {
        let s = CacheStats {
            hits: 5,
            copies: 0,
            misses: 2,
        };
        assert_eq!(s.to_string(), "5 cached, 2 normalized (7 total)");
    }

    #[test]
    fn cache_stats_display_with_copies() {
        let s = CacheStats {
            hits: 3,
            copies: 2,
            misses: 1,
        };
        assert_eq!(s.to_string(), "3 cached, 2 copied, 1 normalized (6 total)");
    }

    #[test]
    fn cache_stats_display_no_hits() {
        let mut s = CacheStats::default();
        s.miss();
        s.miss();
        s.miss();
        assert_eq!(s.to_string(), "3 normalized");
    }
}
