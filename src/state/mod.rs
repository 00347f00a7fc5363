//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `DownloadState`: NotStarted -> Downloading -> Downloaded | Failed
//! - `ParseState`: NotParsed -> Parsed

mod download_state;

pub use download_state::{DownloadState, ParseState};
