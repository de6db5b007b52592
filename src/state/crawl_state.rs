/// Crawl state definitions for the page loop
///
/// `CrawlState` is never persisted; only the next page number survives a
/// restart, through the checkpoint store.
use std::fmt;

/// Why a crawl stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalReason {
    // ===== Done =====
    /// The configured page limit was reached
    PageLimit,

    /// An empty page carried an end-of-results marker
    EmptyWithEndMarkers,

    /// An empty page had no pagination navigation
    EmptyNoPagination,

    /// An empty page past the retry window, or still empty after retries
    EmptyResults,

    /// A sparse page lies past the page count implied by the advertised total
    ResultsExhausted,

    // ===== Aborted =====
    /// The source answered with an anti-automation response
    BlockDetected,

    /// Too many consecutive skipped pages
    ErrorThreshold,
}

impl TerminalReason {
    /// Returns true if the crawl ended normally
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            Self::PageLimit
                | Self::EmptyWithEndMarkers
                | Self::EmptyNoPagination
                | Self::EmptyResults
                | Self::ResultsExhausted
        )
    }

    /// Returns true if the crawl was cut short by a failure
    pub fn is_aborted(&self) -> bool {
        !self.is_done()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageLimit => "page_limit",
            Self::EmptyWithEndMarkers => "empty_with_end_markers",
            Self::EmptyNoPagination => "empty_no_pagination",
            Self::EmptyResults => "empty_results",
            Self::ResultsExhausted => "results_exhausted",
            Self::BlockDetected => "block_detected",
            Self::ErrorThreshold => "error_threshold",
        }
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// In-memory state of one crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlState {
    pub current_page: u32,
    pub consecutive_error_count: u32,
    /// Retries spent on the current page because it came back empty
    pub empty_retries: u32,
    /// Transient failures seen on the current page
    pub transient_attempts: u32,
    pub pages_fetched: u32,
    terminal_reason: Option<TerminalReason>,
}

impl CrawlState {
    pub fn new(start_page: u32) -> Self {
        Self {
            current_page: start_page.max(1),
            consecutive_error_count: 0,
            empty_retries: 0,
            transient_attempts: 0,
            pages_fetched: 0,
            terminal_reason: None,
        }
    }

    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        self.terminal_reason
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal_reason.is_some()
    }

    /// Stops the crawl; the first reason recorded wins
    pub fn terminate(&mut self, reason: TerminalReason) {
        if self.terminal_reason.is_none() {
            self.terminal_reason = Some(reason);
        }
    }

    /// Registers a skipped page and returns the new consecutive count
    pub fn record_error(&mut self) -> u32 {
        self.consecutive_error_count += 1;
        self.consecutive_error_count
    }

    /// Moves to the next page, resetting per-page counters
    pub fn advance(&mut self) {
        self.current_page += 1;
        self.empty_retries = 0;
        self.transient_attempts = 0;
    }

    /// Called once a page produced listings
    pub fn record_success(&mut self) {
        self.consecutive_error_count = 0;
    }
}

impl Default for CrawlState {
    fn default() -> Self {
        Self::new(1)
    }
}
