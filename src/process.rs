//! Batch normalization of files and directories.
//!
//! Takes a list of input paths, normalizes every image found, and writes the
//! results into an output directory together with a `report.json`.
//!
//! ## Inputs
//!
//! - **Files** are taken as given, whatever their extension. The declared
//!   media type comes from the extension when it is a known one.
//! - **Directories** are walked recursively; only files with a supported
//!   extension (`jpg`, `jpeg`, `png`, `webp`, `gif`) are picked up.
//!
//! ## Output Structure
//!
//! ```text
//! out/
//! ├── report.json              # One summary per file, plus failures
//! ├── .cache-manifest.json     # See crate::cache
//! ├── photo.jpg                # From photo.png (opaque → JPEG)
//! ├── logo.png                 # Transparent PNG kept as PNG
//! └── album/
//!     └── 001-dawn.jpg         # Directory inputs keep their relative layout
//! ```
//!
//! Two inputs that would land on the same output stem get `-2`, `-3`, …
//! suffixes in input order.
//!
//! ## Failures
//!
//! A file that cannot be read or decoded is reported as a [`FileFailure`]
//! and the batch carries on. Only problems with the output directory itself
//! abort the run.
//!
//! ## Parallel Processing
//!
//! Files are normalized in parallel using [rayon](https://docs.rs/rayon).
//! All cache lookups, including reading reused outputs, finish before the
//! first output is written; the manifest is updated once at the end.
//!
//! The output directory is skipped when a directory input contains it, so
//! `vision-prep normalize .` does not pick up its own earlier results.

use crate::cache::{self, CacheManifest, CacheStats};
use crate::imaging::{
    BackendError, ImageBackend, MediaType, NormalizeOptions, NormalizePlan, RustBackend,
    normalize, plan_normalization, supported_input_extensions,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};

/// Name of the per-run report written into the output directory.
pub const REPORT_FILENAME: &str = "report.json";

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),
}

/// What happened to one successfully processed file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileSummary {
    pub source: String,
    /// Output path relative to the output directory.
    pub output: String,
    pub media_type: String,
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
    pub original_bytes: usize,
    pub final_bytes: usize,
    pub was_resized: bool,
    pub was_compressed: bool,
    pub within_byte_cap: bool,
    pub notes: Vec<String>,
}

/// A file that could not be processed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileFailure {
    pub source: String,
    pub error: String,
}

/// How a summary was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Output already present from a previous run.
    Cached,
    /// Output from a previous run copied to a new path.
    Copied,
    /// Decoded and encoded in this run.
    Normalized,
}

/// Progress events emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Started {
        total: usize,
    },
    FileProcessed {
        index: usize,
        summary: FileSummary,
        status: FileStatus,
    },
    FileFailed {
        index: usize,
        failure: FileFailure,
    },
}

/// Contents of `report.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    pub files: Vec<FileSummary>,
    pub failures: Vec<FileFailure>,
}

/// Outcome of a batch run.
#[derive(Debug)]
pub struct BatchResult {
    pub report: Report,
    pub cache_stats: CacheStats,
}

/// A file queued for normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub source: PathBuf,
    /// Output path without extension, relative to the output directory.
    pub stem: String,
}

fn has_supported_extension(path: &Path) -> bool {
    let exts = supported_input_extensions();
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| exts.iter().any(|s| s.eq_ignore_ascii_case(e)))
}

fn stem_of(path: &Path) -> String {
    path.with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Expand input paths into the list of files to normalize.
///
/// Directory contents are sorted for deterministic output names.
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<InputFile>, ProcessError> {
    collect_inputs_excluding(inputs, None)
}

/// [`collect_inputs`], skipping the `exclude` directory (the output
/// directory of a batch) wherever a walk reaches it.
pub fn collect_inputs_excluding(
    inputs: &[PathBuf],
    exclude: Option<&Path>,
) -> Result<Vec<InputFile>, ProcessError> {
    let excluded = exclude.and_then(|p| fs::canonicalize(p).ok());
    let is_excluded = |path: &Path| {
        excluded
            .as_ref()
            .is_some_and(|ex| fs::canonicalize(path).is_ok_and(|p| &p == ex))
    };

    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            let name = input.file_name().map(Path::new).unwrap_or(input.as_path());
            files.push(InputFile {
                source: input.clone(),
                stem: stem_of(name),
            });
        } else if input.is_dir() {
            let walker = walkdir::WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| !(e.file_type().is_dir() && is_excluded(e.path())));
            for entry in walker {
                let entry = entry?;
                let path = entry.path();
                if entry.file_type().is_file() && has_supported_extension(path) {
                    let relative = path.strip_prefix(input).unwrap_or(path);
                    files.push(InputFile {
                        source: path.to_path_buf(),
                        stem: stem_of(relative),
                    });
                }
            }
        } else {
            return Err(ProcessError::InputNotFound(input.clone()));
        }
    }
    dedupe_stems(&mut files);
    Ok(files)
}

/// Give colliding output stems `-2`, `-3`, … suffixes in input order.
fn dedupe_stems(files: &mut [InputFile]) {
    let mut taken: HashSet<String> = HashSet::new();
    for file in files.iter_mut() {
        if taken.insert(file.stem.clone()) {
            continue;
        }
        let mut n = 2;
        while !taken.insert(format!("{}-{}", file.stem, n)) {
            n += 1;
        }
        file.stem = format!("{}-{}", file.stem, n);
    }
}

/// Declared media type for a file, from its extension.
fn declared_type(path: &Path) -> MediaType {
    MediaType::from_path(path).unwrap_or_else(|| MediaType::Other(String::new()))
}

/// Normalize all inputs with the production backend.
pub fn normalize_paths(
    inputs: &[PathBuf],
    output_dir: &Path,
    options: &NormalizeOptions,
    use_cache: bool,
    events: Option<Sender<ProcessEvent>>,
) -> Result<BatchResult, ProcessError> {
    let backend = RustBackend::new();
    normalize_paths_with_backend(&backend, inputs, output_dir, options, use_cache, events)
}

/// A file after cache lookup, before anything is written.
enum Staged {
    /// Output already in place under this file's own name.
    Cached(FileSummary),
    /// Output of a previous run under another name, read into memory.
    Reuse {
        summary: FileSummary,
        bytes: Vec<u8>,
        source_hash: String,
        params_hash: String,
    },
    /// Needs decoding and encoding.
    Fresh { params_hash: String },
    Failed(FileFailure),
}

/// Per-file result of the write phase.
enum Outcome {
    Done {
        summary: FileSummary,
        status: FileStatus,
        /// `(source_hash, params_hash)` to record; `None` on a cache hit.
        cache_insert: Option<(String, String)>,
    },
    Failed(FileFailure),
}

/// Normalize all inputs using a specific backend (allows testing with mock).
///
/// Runs in two parallel phases. The first only reads: sources are hashed
/// and outputs reused from earlier runs are loaded into memory. The second
/// writes. Reused outputs may live at a path another input is about to
/// overwrite, so no file is written until every lookup is resolved.
pub fn normalize_paths_with_backend(
    backend: &impl ImageBackend,
    inputs: &[PathBuf],
    output_dir: &Path,
    options: &NormalizeOptions,
    use_cache: bool,
    events: Option<Sender<ProcessEvent>>,
) -> Result<BatchResult, ProcessError> {
    crate::config::validate_options(options)?;
    let files = collect_inputs_excluding(inputs, Some(output_dir))?;
    fs::create_dir_all(output_dir)?;

    let mut manifest = if use_cache {
        CacheManifest::load(output_dir)
    } else {
        CacheManifest::empty()
    };

    if let Some(tx) = &events {
        let _ = tx.send(ProcessEvent::Started { total: files.len() });
    }

    let staged: Vec<Staged> = files
        .par_iter()
        .map(|file| stage_file(file, output_dir, options, &manifest))
        .collect();

    let outcomes: Vec<Outcome> = files
        .par_iter()
        .zip(staged)
        .enumerate()
        .map(|(index, (file, staged))| {
            let outcome = write_file(backend, file, staged, output_dir, options);
            if let Some(tx) = &events {
                let event = match &outcome {
                    Outcome::Done {
                        summary, status, ..
                    } => ProcessEvent::FileProcessed {
                        index: index + 1,
                        summary: summary.clone(),
                        status: *status,
                    },
                    Outcome::Failed(failure) => ProcessEvent::FileFailed {
                        index: index + 1,
                        failure: failure.clone(),
                    },
                };
                let _ = tx.send(event);
            }
            outcome
        })
        .collect();

    let mut stats = CacheStats::default();
    let mut report = Report::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Done {
                summary,
                status,
                cache_insert,
            } => {
                match status {
                    FileStatus::Cached => stats.hit(),
                    FileStatus::Copied => stats.copy(),
                    FileStatus::Normalized => stats.miss(),
                }
                if let Some((source_hash, params_hash)) = cache_insert {
                    manifest.insert(
                        summary.output.clone(),
                        source_hash,
                        params_hash,
                        summary.clone(),
                    );
                }
                report.files.push(summary);
            }
            Outcome::Failed(failure) => report.failures.push(failure),
        }
    }

    manifest.save(output_dir)?;
    let json = serde_json::to_string_pretty(&report)?;
    fs::write(output_dir.join(REPORT_FILENAME), json)?;

    Ok(BatchResult {
        report,
        cache_stats: stats,
    })
}

fn failure(source: &str, error: String) -> FileFailure {
    warn!(source = %source, error = %error, "could not process image");
    FileFailure {
        source: source.to_string(),
        error,
    }
}

/// Look a file up in the cache. Reads only.
fn stage_file(
    file: &InputFile,
    output_dir: &Path,
    options: &NormalizeOptions,
    manifest: &CacheManifest,
) -> Staged {
    let source = file.source.display().to_string();
    let params_hash = cache::hash_params(options, &declared_type(&file.source));

    let bytes = match fs::read(&file.source) {
        Ok(b) => b,
        Err(e) => return Staged::Failed(failure(&source, format!("could not read file: {e}"))),
    };
    let source_hash = cache::hash_bytes(&bytes);

    let Some(hit) = manifest.find_cached(&source_hash, &params_hash, output_dir) else {
        return Staged::Fresh { params_hash };
    };
    let ext = Path::new(hit.stored_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("jpg");
    let expected = format!("{}.{}", file.stem, ext);
    let mut summary = hit.summary.clone();
    summary.source = source;

    if hit.stored_path == expected {
        return Staged::Cached(summary);
    }
    match fs::read(output_dir.join(hit.stored_path)) {
        Ok(bytes) => {
            summary.output = expected;
            Staged::Reuse {
                summary,
                bytes,
                source_hash,
                params_hash,
            }
        }
        Err(_) => Staged::Fresh { params_hash },
    }
}

/// Produce the output for a staged file.
fn write_file(
    backend: &impl ImageBackend,
    file: &InputFile,
    staged: Staged,
    output_dir: &Path,
    options: &NormalizeOptions,
) -> Outcome {
    let source = file.source.display().to_string();
    match staged {
        Staged::Failed(f) => Outcome::Failed(f),
        Staged::Cached(summary) => Outcome::Done {
            summary,
            status: FileStatus::Cached,
            cache_insert: None,
        },
        Staged::Reuse {
            summary,
            bytes,
            source_hash,
            params_hash,
        } => {
            let path = output_dir.join(&summary.output);
            match ensure_parent(&path).and_then(|_| fs::write(&path, bytes)) {
                Ok(()) => Outcome::Done {
                    summary,
                    status: FileStatus::Copied,
                    cache_insert: Some((source_hash, params_hash)),
                },
                Err(e) => Outcome::Failed(failure(
                    &source,
                    format!("could not write {}: {e}", path.display()),
                )),
            }
        }
        Staged::Fresh { params_hash } => {
            normalize_file(backend, file, source, output_dir, options, params_hash)
        }
    }
}

fn normalize_file(
    backend: &impl ImageBackend,
    file: &InputFile,
    source: String,
    output_dir: &Path,
    options: &NormalizeOptions,
    params_hash: String,
) -> Outcome {
    let bytes = match fs::read(&file.source) {
        Ok(b) => b,
        Err(e) => {
            return Outcome::Failed(failure(&source, format!("could not read file: {e}")));
        }
    };
    let source_hash = cache::hash_bytes(&bytes);

    let result = match normalize(backend, &bytes, &declared_type(&file.source), options) {
        Ok(r) => r,
        Err(BackendError::Decode(e)) => {
            return Outcome::Failed(failure(
                &source,
                format!("could not process this image: {e}"),
            ));
        }
        Err(e) => return Outcome::Failed(failure(&source, e.to_string())),
    };

    let output = format!("{}.{}", file.stem, result.format().extension());
    let output_path = output_dir.join(&output);
    if let Err(e) = ensure_parent(&output_path).and_then(|_| fs::write(&output_path, result.bytes()))
    {
        return Outcome::Failed(failure(
            &source,
            format!("could not write {}: {e}", output_path.display()),
        ));
    }

    info!(
        source = %source,
        output = %output,
        width = result.width,
        height = result.height,
        bytes = result.final_bytes,
        "normalized"
    );

    let summary = FileSummary {
        source,
        output,
        media_type: result.media_type.to_string(),
        width: result.width,
        height: result.height,
        original_width: result.original_width,
        original_height: result.original_height,
        original_bytes: result.original_bytes,
        final_bytes: result.final_bytes,
        was_resized: result.was_resized,
        was_compressed: result.was_compressed,
        within_byte_cap: result.within_byte_cap,
        notes: result.note_strings(),
    };
    Outcome::Done {
        summary,
        status: FileStatus::Normalized,
        cache_insert: Some((source_hash, params_hash)),
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

/// Result of a dry run on one file.
#[derive(Debug)]
pub struct CheckOutcome {
    pub source: PathBuf,
    pub result: Result<NormalizePlan, String>,
}

/// Decode every input and compute its plan, without encoding or writing.
pub fn check_paths(
    inputs: &[PathBuf],
    options: &NormalizeOptions,
) -> Result<Vec<CheckOutcome>, ProcessError> {
    let backend = RustBackend::new();
    check_paths_with_backend(&backend, inputs, options)
}

/// [`check_paths`] with a specific backend.
pub fn check_paths_with_backend(
    backend: &impl ImageBackend,
    inputs: &[PathBuf],
    options: &NormalizeOptions,
) -> Result<Vec<CheckOutcome>, ProcessError> {
    let files = collect_inputs(inputs)?;
    Ok(files
        .par_iter()
        .map(|file| {
            let result = fs::read(&file.source)
                .map_err(|e| format!("could not read file: {e}"))
                .and_then(|bytes| {
                    plan_normalization(backend, &bytes, &declared_type(&file.source), options)
                        .map_err(|e| e.to_string())
                });
            CheckOutcome {
                source: file.source.clone(),
                result,
            }
        })
        .collect())
}
