//! CLI output formatting.
//!
//! Each file leads with its positional index and source name; the output
//! path, final geometry and the normalizer's notes follow as indented
//! context lines.
//!
//! # Output Format
//!
//! ## Normalize
//!
//! ```text
//! Normalizing 2 files
//! 001 photo.png → photo.jpg
//!     2048x1536 JPEG, 1.2 MiB: normalized
//!     resized from 4000x3000 to 2048x1536
//!     encoded at quality 0.92
//! 002 broken.png
//!     Error: could not process this image: ...
//!
//! Normalized 1 file, 1 failed → out/
//! Cache: 0 cached, 1 normalized (1 total)
//! ```
//!
//! ## Check
//!
//! ```text
//! 001 big.png
//!     4000x3000 → 2048x1536, JPEG
//!     no transparency found
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::imaging::format_bytes;
use crate::process::{BatchResult, CheckOutcome, FileStatus, ProcessEvent};
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn label_for_mime(mime: &str) -> &str {
    match mime {
        "image/jpeg" => "JPEG",
        "image/png" => "PNG",
        other => other,
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Normalize
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { total } => vec![format!("Normalizing {}", plural(*total, "file"))],
        ProcessEvent::FileProcessed {
            index,
            summary,
            status,
        } => {
            let status_str = match status {
                FileStatus::Cached => "cached",
                FileStatus::Copied => "copied",
                FileStatus::Normalized => "normalized",
            };
            let mut lines = vec![
                format!(
                    "{} {} \u{2192} {}",
                    format_index(*index),
                    file_name(&summary.source),
                    summary.output
                ),
                format!(
                    "    {}x{} {}, {}: {}",
                    summary.width,
                    summary.height,
                    label_for_mime(&summary.media_type),
                    format_bytes(summary.final_bytes),
                    status_str
                ),
            ];
            lines.extend(summary.notes.iter().map(|n| format!("    {n}")));
            lines
        }
        ProcessEvent::FileFailed { index, failure } => vec![
            format!("{} {}", format_index(*index), file_name(&failure.source)),
            format!("    Error: {}", failure.error),
        ],
    }
}

/// Format the closing lines of a batch run.
pub fn format_batch_summary(result: &BatchResult, output_dir: &Path) -> Vec<String> {
    let processed = result.report.files.len();
    let failed = result.report.failures.len();
    let headline = if failed > 0 {
        format!(
            "Normalized {}, {} failed \u{2192} {}",
            plural(processed, "file"),
            failed,
            output_dir.display()
        )
    } else {
        format!(
            "Normalized {} \u{2192} {}",
            plural(processed, "file"),
            output_dir.display()
        )
    };
    vec![
        String::new(),
        headline,
        format!("Cache: {}", result.cache_stats),
    ]
}

pub fn print_batch_summary(result: &BatchResult, output_dir: &Path) {
    for line in format_batch_summary(result, output_dir) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format dry-run results: planned geometry and format per file.
pub fn format_check_output(outcomes: &[CheckOutcome]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, outcome) in outcomes.iter().enumerate() {
        lines.push(format!(
            "{} {}",
            format_index(i + 1),
            file_name(&outcome.source.to_string_lossy())
        ));
        match &outcome.result {
            Ok(plan) => {
                let geometry = if plan.resizes() {
                    format!(
                        "{}x{} \u{2192} {}x{}",
                        plan.original.width,
                        plan.original.height,
                        plan.target.width,
                        plan.target.height
                    )
                } else {
                    format!("{}x{} (unchanged)", plan.original.width, plan.original.height)
                };
                lines.push(format!("    {}, {}", geometry, plan.format.label()));
                lines.push(format!("    {}", plan.transparency_note));
            }
            Err(e) => lines.push(format!("    Error: {}", e)),
        }
    }
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    lines.push(String::new());
    if failed == 0 {
        lines.push(format!("{} ok", plural(outcomes.len(), "file")));
    } else {
        lines.push(format!(
            "{} checked, {} could not be decoded",
            plural(outcomes.len(), "file"),
            failed
        ));
    }
    lines
}

pub fn print_check_output(outcomes: &[CheckOutcome]) {
    for line in format_check_output(outcomes) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStats;
    use crate::imaging::{Dimensions, Note, NormalizePlan, OutputFormat, TargetGeometry};
    use crate::process::{FileFailure, FileSummary, Report};
    use std::path::PathBuf;

    fn summary() -> FileSummary {
        FileSummary {
            source: "in/photo.png".into(),
            output: "photo.jpg".into(),
            media_type: "image/jpeg".into(),
            width: 2048,
            height: 1536,
            original_width: 4000,
            original_height: 3000,
            original_bytes: 9_000_000,
            final_bytes: 512 * 1024,
            was_resized: true,
            was_compressed: true,
            within_byte_cap: true,
            notes: vec!["resized from 4000x3000 to 2048x1536".into()],
        }
    }

    #[test]
    fn started_event() {
        let lines = format_process_event(&ProcessEvent::Started { total: 1 });
        assert_eq!(lines, vec!["Normalizing 1 file"]);
    }

    #[test]
    fn processed_event_shows_output_and_notes() {
        let lines = format_process_event(&ProcessEvent::FileProcessed {
            index: 3,
            summary: summary(),
            status: FileStatus::Normalized,
        });
        assert_eq!(lines[0], "003 photo.png \u{2192} photo.jpg");
        assert_eq!(lines[1], "    2048x1536 JPEG, 512.0 KiB: normalized");
        assert_eq!(lines[2], "    resized from 4000x3000 to 2048x1536");
    }

    #[test]
    fn cached_event_status() {
        let lines = format_process_event(&ProcessEvent::FileProcessed {
            index: 1,
            summary: summary(),
            status: FileStatus::Cached,
        });
        assert!(lines[1].ends_with(": cached"));
    }

    #[test]
    fn failed_event() {
        let lines = format_process_event(&ProcessEvent::FileFailed {
            index: 2,
            failure: FileFailure {
                source: "in/broken.png".into(),
                error: "could not process this image: bad header".into(),
            },
        });
        assert_eq!(
            lines,
            vec![
                "002 broken.png",
                "    Error: could not process this image: bad header"
            ]
        );
    }

    #[test]
    fn batch_summary_mentions_failures() {
        let result = BatchResult {
            report: Report {
                files: vec![summary()],
                failures: vec![FileFailure {
                    source: "x.png".into(),
                    error: "nope".into(),
                }],
            },
            cache_stats: CacheStats {
                hits: 0,
                copies: 0,
                misses: 1,
            },
        };
        let lines = format_batch_summary(&result, Path::new("out"));
        assert_eq!(lines[1], "Normalized 1 file, 1 failed \u{2192} out");
        assert!(lines[2].starts_with("Cache: "));
    }

    #[test]
    fn check_output_lists_plans_and_errors() {
        let outcomes = vec![
            CheckOutcome {
                source: PathBuf::from("in/big.png"),
                result: Ok(NormalizePlan {
                    original: Dimensions {
                        width: 4000,
                        height: 3000,
                    },
                    target: TargetGeometry {
                        width: 2048,
                        height: 1536,
                    },
                    transparent: false,
                    format: OutputFormat::Jpeg,
                    transparency_note: Note::NoTransparencyFound,
                }),
            },
            CheckOutcome {
                source: PathBuf::from("in/bad.gif"),
                result: Err("could not decode image: truncated".into()),
            },
        ];
        let lines = format_check_output(&outcomes);
        assert_eq!(lines[0], "001 big.png");
        assert_eq!(lines[1], "    4000x3000 \u{2192} 2048x1536, JPEG");
        assert_eq!(lines[3], "002 bad.gif");
        assert_eq!(lines[4], "    Error: could not decode image: truncated");
        assert_eq!(lines.last().unwrap(), "2 files checked, 1 could not be decoded");
    }

    #[test]
    fn check_output_unchanged_geometry() {
        let outcomes = vec![CheckOutcome {
            source: PathBuf::from("small.jpg"),
            result: Ok(NormalizePlan {
                original: Dimensions {
                    width: 800,
                    height: 600,
                },
                target: TargetGeometry {
                    width: 800,
                    height: 600,
                },
                transparent: false,
                format: OutputFormat::Jpeg,
                transparency_note: Note::OpaqueSourceFormat,
            }),
        }];
        let lines = format_check_output(&outcomes);
        assert_eq!(lines[1], "    800x600 (unchanged), JPEG");
        assert_eq!(lines.last().unwrap(), "1 file ok");
    }
}
