//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TerminalReason`: why a crawl stopped, and whether that counts as done or aborted
//! - `CrawlState`: the in-memory page cursor and failure counters of one crawl

mod crawl_state;

pub use crawl_state::{CrawlState, TerminalReason};
