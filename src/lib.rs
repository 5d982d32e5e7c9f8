//! # Vision Prep
//!
//! Normalizes arbitrary user images into a form a vision-language model API
//! accepts reliably: bounded dimensions, a bounded encoded size, and one of
//! two output encodings (JPEG, or PNG when real transparency must survive).
//!
//! # Pipeline
//!
//! Every image goes through the same fixed sequence:
//!
//! ```text
//! decode → measure → target geometry → resample → transparency → format → encode loop
//! ```
//!
//! The decision steps are pure functions in [`imaging`]; pixel work happens
//! behind the [`imaging::ImageBackend`] trait so the whole sequence can be
//! exercised against a recording mock.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | The normalizer: geometry, transparency sampling, format choice, compression loop |
//! | [`config`] | `vision-prep.toml` loading, stock defaults, validation |
//! | [`process`] | Batch driver: walks inputs, normalizes in parallel, writes `report.json` |
//! | [`cache`] | Content-addressed cache of previous outputs |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Long Side Wins
//!
//! The long-side cap is hard; the short-side floor is a goal. After a
//! downscale the normalizer tries to lift the short side back toward the
//! floor, but never at the price of exceeding the cap. Upscaling beyond the
//! original is never done.
//!
//! ## The Byte Cap Is Soft
//!
//! Lossy output is re-encoded at falling quality until it fits or the quality
//! floor is reached. Lossless output is encoded once. Either way the result is
//! returned, with `within_byte_cap` and a note telling the caller whether the
//! cap was met.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, Lanczos3 resampling and encoding all use the `image` crate. No
//! system libraries are needed.

pub mod cache;
pub mod config;
pub mod imaging;
pub mod output;
pub mod process;
