use serde::Deserialize;

/// Main configuration structure for Listing Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// Crawl loop behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Results listing URL; page 1 is fetched exactly as given
    pub base_url: String,

    /// Origin site stamped on every extracted listing
    #[serde(default = "default_source")]
    pub source: String,

    /// Query parameter carrying the page number for pages > 1
    #[serde(default = "default_page_param")]
    pub page_param: String,

    /// Maximum number of pages (0 = unbounded)
    #[serde(default)]
    pub max_pages: u32,

    /// Whether to visit each listing's detail page
    #[serde(default = "default_true")]
    pub fetch_details: bool,

    /// Listings buffered before a flush (0 = single flush at the end)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Resume from the stored checkpoint
    #[serde(default)]
    pub resume: bool,

    /// Maximum number of concurrent detail fetches
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Resolve coordinates for enriched listings
    #[serde(default = "default_true")]
    pub enable_enrichment: bool,

    /// Courtesy delay between result pages (milliseconds, jittered)
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Base of the exponential backoff after a transient failure (milliseconds)
    #[serde(default = "default_transient_backoff_ms")]
    pub transient_backoff_ms: u64,

    #[serde(default = "default_max_transient_retries")]
    pub max_transient_retries: u32,

    /// Delay after a skipped page (milliseconds)
    #[serde(default = "default_error_delay_ms")]
    pub error_delay_ms: u64,

    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    /// How many times an empty page inside the retry window is refetched
    #[serde(default = "default_empty_page_retries")]
    pub empty_page_retries: u32,

    /// Pages up to this number are retried when they come back empty
    #[serde(default = "default_empty_page_retry_window")]
    pub empty_page_retry_window: u32,

    /// Upper bound on one detail enrichment task (seconds)
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    #[serde(default = "default_detail_jitter_min_ms")]
    pub detail_jitter_min_ms: u64,

    #[serde(default = "default_detail_jitter_max_ms")]
    pub detail_jitter_max_ms: u64,

    /// Delay after each coordinate lookup (milliseconds)
    #[serde(default = "default_enrichment_delay_ms")]
    pub enrichment_delay_ms: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "ListingHarvester".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Path to a JSON checkpoint file; checkpoints live in the database when absent
    #[serde(default)]
    pub checkpoint_path: Option<String>,
}

/// Deduplication configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DedupConfig {
    /// Similarity (0-100) at or above which two listings are duplicates
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Keep the record from the higher-priority source when duplicates meet
    #[serde(default = "default_true")]
    pub keep_best_source: bool,

    /// Source ranking, most preferred first
    #[serde(default = "default_source_priority")]
    pub source_priority: Vec<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            keep_best_source: true,
            source_priority: default_source_priority(),
        }
    }
}

/// Coordinate resolver configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GeocodingConfig {
    #[serde(default = "default_geocoding_endpoint")]
    pub endpoint: String,

    /// Country appended to every query
    #[serde(default = "default_country")]
    pub country: String,

    #[serde(default = "default_country_code")]
    pub country_code: String,

    #[serde(default = "default_geocoding_retries")]
    pub max_retries: u32,

    /// Accepted area as [min-lat, max-lat, min-lon, max-lon]
    #[serde(default = "default_bounds")]
    pub bounds: [f64; 4],
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_geocoding_endpoint(),
            country: default_country(),
            country_code: default_country_code(),
            max_retries: default_geocoding_retries(),
            bounds: default_bounds(),
        }
    }
}

/// HTML extractor configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtractorConfig {
    /// Phrases that mark the end of the result set
    #[serde(default = "default_end_markers")]
    pub end_markers: Vec<String>,

    /// Phrases in a successful response that indicate an anti-bot page
    #[serde(default)]
    pub block_markers: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            end_markers: default_end_markers(),
            block_markers: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_source() -> String {
    "otodom.pl".to_string()
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_max_workers() -> usize {
    4
}

fn default_page_delay_ms() -> u64 {
    2000
}

fn default_transient_backoff_ms() -> u64 {
    10_000
}

fn default_max_transient_retries() -> u32 {
    5
}

fn default_error_delay_ms() -> u64 {
    5000
}

fn default_max_consecutive_errors() -> u32 {
    3
}

fn default_empty_page_retries() -> u32 {
    2
}

fn default_empty_page_retry_window() -> u32 {
    5
}

fn default_task_timeout_secs() -> u64 {
    60
}

fn default_detail_jitter_min_ms() -> u64 {
    500
}

fn default_detail_jitter_max_ms() -> u64 {
    2000
}

fn default_enrichment_delay_ms() -> u64 {
    1000
}

fn default_threshold() -> f64 {
    75.0
}

pub(crate) fn default_source_priority() -> Vec<String> {
    [
        "otodom.pl",
        "olx.pl",
        "domiporta.pl",
        "gratka.pl",
        "metrohouse.pl",
        "freedom.pl",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_geocoding_endpoint() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}

fn default_country() -> String {
    "Polska".to_string()
}

fn default_country_code() -> String {
    "pl".to_string()
}

fn default_geocoding_retries() -> u32 {
    2
}

fn default_bounds() -> [f64; 4] {
    [49.0, 54.9, 14.1, 24.2]
}

fn default_end_markers() -> Vec<String> {
    [
        "brak wyników",
        "nie znaleziono",
        "koniec wyników",
        "strona nie istnieje",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[crawler]
base-url = "https://www.otodom.pl/pl/wyniki/sprzedaz/mieszkanie/cala-polska"

[output]
database-path = "./listings.db"
"#,
        )
        .unwrap();

        assert_eq!(config.crawler.source, "otodom.pl");
        assert_eq!(config.crawler.page_param, "page");
        assert_eq!(config.crawler.max_pages, 0);
        assert!(config.crawler.fetch_details);
        assert_eq!(config.crawler.batch_size, 100);
        assert_eq!(config.crawler.max_workers, 4);
        assert_eq!(config.crawler.max_consecutive_errors, 3);
        assert_eq!(config.crawler.empty_page_retry_window, 5);
        assert_eq!(config.crawler.task_timeout_secs, 60);
        assert!(config.output.checkpoint_path.is_none());
        assert_eq!(config.dedup.threshold, 75.0);
        assert_eq!(config.dedup.source_priority[0], "otodom.pl");
        assert_eq!(config.geocoding.country, "Polska");
        assert_eq!(config.extractor.end_markers.len(), 4);
        assert_eq!(config.user_agent.crawler_name, "ListingHarvester");
    }

    #[test]
    fn test_missing_base_url_is_rejected() {
        let result: Result<Config, _> = toml::from_str(
            r#"
[crawler]
max-pages = 3

[output]
database-path = "./listings.db"
"#,
        );
        assert!(result.is_err());
    }
}
