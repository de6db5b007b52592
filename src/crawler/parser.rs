//! HTML extractor for listing result pages and detail pages
//!
//! This module handles parsing HTML content to extract:
//! - Listing stubs from a results page (title, price, location, link, specs)
//! - Detail-page fields (floor, year of construction, finish standard, ...)
//! - End-of-results and pagination markers used by the crawl controller

use crate::config::ExtractorConfig;
use crate::crawler::address::CommaAddressDecomposer;
use crate::crawler::traits::{AddressDecomposer, Extractor, PageFetcher};
use crate::dedup::{extract_area_number, extract_rooms_number};
use crate::listing::{DetailFields, ListingRecord, Market};
use crate::FetchError;
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, LazyLock};
use url::Url;

const CONTAINER_SELECTORS: &[&str] = &["[data-cy='listing-item']", "article", ".listing-item"];
const TITLE_SELECTORS: &[&str] = &["[data-cy='listing-item-title']", "h3", "h2"];
const LINK_SELECTORS: &[&str] = &[
    "[data-cy='listing-item-link']",
    "a[href*='/oferta/']",
    "a[href]",
];
const PRICE_SELECTOR: &str = "[data-cy*='price']";
const LOCATION_SELECTOR: &str = "[data-cy='listing-item-location']";
const PAGINATION_SELECTOR: &str =
    "nav, .pagination, [data-cy*='pagination'], a[title*='następna'], a[title*='dalej']";

const PRIMARY_MARKET_KEYWORDS: &[&str] = &[
    "nowe",
    "nowy",
    "deweloper",
    "inwestycja",
    "przedsprzedaż",
    "stan deweloperski",
    "pierwotny",
];

const BUILDING_TYPES: &[&str] = &[
    "blok",
    "kamienica",
    "apartamentowiec",
    "dom wielorodzinny",
    "wielka płyta",
];

/// Finish standard codes, most specific phrase first
const FINISH_STANDARDS: &[(&str, u8)] = &[
    ("gotowe do zamieszkania", 1),
    ("do zamieszkania", 1),
    ("deweloperski", 2),
    ("developerski", 2),
    ("do wykończenia", 3),
    ("do remontu", 4),
    ("surowy otwarty", 5),
    ("surowy zamknięty", 6),
];

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("number pattern is valid"));

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})\b").expect("year pattern is valid"));

static LISTING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ID:\s*(\d+)").expect("listing id pattern is valid"));

static RESULT_TOTAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*wynik").expect("result total pattern is valid"));

/// Collapsed, trimmed text content of an element
fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased text nodes of a document, without script and style bodies
fn visible_text(document: &Html) -> String {
    document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node
                .parent()
                .and_then(|p| p.value().as_element().map(|e| e.name()));
            (!matches!(parent, Some("script" | "style"))).then_some(&**text)
        })
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Text of the first descendant matching any selector, tried in order
fn first_text(element: &ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        element
            .select(&selector)
            .map(|e| element_text(&e))
            .find(|text| !text.is_empty())
    })
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Parses a money amount such as "650 000 zł" or "1\u{a0}250,50 zł"
pub fn parse_amount(text: &str) -> Option<f64> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let number = NUMBER.find(&compact)?.as_str().replace(',', ".");
    number.parse::<f64>().ok().filter(|v| *v > 0.0)
}

/// Parses a floor label: "3/4", "parter/10", "parter" or "5"
pub fn parse_floor(text: &str) -> (Option<i32>, Option<i32>) {
    let lowered = text.trim().to_lowercase();
    let mut parts = lowered.splitn(2, '/');

    let floor = parts.next().map(str::trim).and_then(|f| {
        if f.starts_with("parter") {
            Some(0)
        } else {
            NUMBER.find(f).and_then(|m| m.as_str().parse().ok())
        }
    });
    let total = parts
        .next()
        .and_then(|t| NUMBER.find(t.trim()))
        .and_then(|m| m.as_str().parse().ok());

    (floor, total)
}

fn parse_year(text: &str) -> Option<u16> {
    YEAR.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .filter(|year| (1800..=2030).contains(year))
}

fn parse_finish_standard(text: &str) -> Option<u8> {
    let lowered = text.to_lowercase();
    FINISH_STANDARDS
        .iter()
        .find(|(phrase, _)| lowered.contains(phrase))
        .map(|(_, code)| *code)
}

fn parse_building_type(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    BUILDING_TYPES
        .iter()
        .find(|t| lowered == **t)
        .map(|t| t.to_string())
        .unwrap_or_else(|| "inny".to_string())
}

/// Label/value pairs of every `dl` under `root`
fn definition_pairs(root: &ElementRef<'_>) -> Vec<(String, String)> {
    let (Ok(dl), Ok(dt), Ok(dd)) = (
        Selector::parse("dl"),
        Selector::parse("dt"),
        Selector::parse("dd"),
    ) else {
        return Vec::new();
    };

    root.select(&dl)
        .flat_map(|list| {
            let labels: Vec<String> = list.select(&dt).map(|e| element_text(&e)).collect();
            let values: Vec<String> = list.select(&dd).map(|e| element_text(&e)).collect();
            labels.into_iter().zip(values).collect::<Vec<_>>()
        })
        .map(|(label, value)| (label.to_lowercase(), value))
        .collect()
}

fn set_amenities_from_text(text: &str, listing: &mut ListingRecord) {
    if contains_any(text, &["balkon", "taras", "loggia"]) {
        listing.has_balcony = true;
    }
    if contains_any(text, &["garaż", "parking"]) {
        listing.has_garage = true;
    }
    if contains_any(text, &["ogród", "ogródek", "działka"]) {
        listing.has_garden = true;
    }
    if text.contains("winda") {
        listing.has_elevator = true;
    }
}

/// Parses a detail page into the fields it carries
pub fn parse_detail_page(html: &str) -> DetailFields {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let mut fields = DetailFields::default();

    for (label, value) in definition_pairs(&root) {
        let lowered_value = value.to_lowercase();

        if label.contains("piętro") {
            let (floor, total) = parse_floor(&value);
            fields.floor = floor;
            fields.total_floors = total;
        } else if label.contains("rok budowy") {
            fields.year_of_construction = parse_year(&value);
        } else if label.contains("winda") {
            if lowered_value.contains("tak") || lowered_value.contains("yes") {
                fields.has_elevator = true;
            }
        } else if label.contains("rodzaj zabudowy") {
            fields.building_type = Some(parse_building_type(&value));
        } else if label.contains("stan wykończenia") {
            fields.finish_standard = parse_finish_standard(&value);
        } else if label.contains("ogrzewanie") {
            if !value.is_empty() {
                fields.heating_type = Some(value.clone());
            }
        } else if label.contains("czynsz") {
            fields.rent_amount = parse_amount(&value);
        } else if label.contains("rynek") {
            fields.market = Market::from_label(&value);
        }
    }

    if let Ok(li) = Selector::parse("li") {
        for item in root.select(&li) {
            let text = element_text(&item).to_lowercase();
            if text.contains("balkon") {
                fields.has_balcony = true;
            }
            if contains_any(&text, &["garaż", "parking"]) {
                fields.has_garage = true;
            }
            if contains_any(&text, &["ogród", "działka"]) {
                fields.has_garden = true;
            }
            if text.contains("piwnica") {
                fields.has_basement = true;
            }
            if text.contains("oddzielna kuchnia") {
                fields.has_separate_kitchen = true;
            }
            if text.contains("winda") {
                fields.has_elevator = true;
            }
            if text.contains("zmywarka") {
                fields.has_dishwasher = true;
            }
            if text.contains("lodówka") {
                fields.has_fridge = true;
            }
            if text.contains("piekarnik") {
                fields.has_oven = true;
            }
        }
    }

    let full_text = element_text(&root);
    fields.listing_id = LISTING_ID
        .captures(&full_text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    fields
}

/// Extractor for server-rendered listing portals
pub struct HtmlExtractor {
    fetcher: Arc<dyn PageFetcher>,
    base_url: Url,
    source: String,
    /// First label of the source domain; absent from pages that failed to render
    site_marker: String,
    end_markers: Vec<String>,
    decomposer: Arc<dyn AddressDecomposer>,
}

impl HtmlExtractor {
    /// Creates an extractor resolving links against `base_url`
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        base_url: Url,
        source: impl Into<String>,
        config: &ExtractorConfig,
    ) -> Self {
        let source = source.into();
        let site_marker = source
            .split('.')
            .next()
            .unwrap_or_default()
            .to_lowercase();
        Self {
            fetcher,
            base_url,
            source,
            site_marker,
            end_markers: config.end_markers.iter().map(|m| m.to_lowercase()).collect(),
            decomposer: Arc::new(CommaAddressDecomposer::new()),
        }
    }

    pub fn with_decomposer(mut self, decomposer: Arc<dyn AddressDecomposer>) -> Self {
        self.decomposer = decomposer;
        self
    }

    fn resolve_link(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return None;
        }
        let absolute = self.base_url.join(href).ok()?;
        matches!(absolute.scheme(), "http" | "https").then(|| absolute.to_string())
    }

    fn link_of(&self, container: &ElementRef<'_>) -> Option<String> {
        LINK_SELECTORS.iter().find_map(|css| {
            let selector = Selector::parse(css).ok()?;
            container
                .select(&selector)
                .filter_map(|a| a.value().attr("href"))
                .find_map(|href| self.resolve_link(href))
        })
    }

    fn parse_stub(&self, container: &ElementRef<'_>) -> Option<ListingRecord> {
        let url = self.link_of(container)?;
        let title = first_text(container, TITLE_SELECTORS).unwrap_or_default();
        let mut listing = ListingRecord::new(url, title, self.source.clone());

        listing.price = first_text(container, &[PRICE_SELECTOR]).and_then(|p| parse_amount(&p));
        listing.address_raw = first_text(container, &[LOCATION_SELECTOR]).unwrap_or_default();

        for (label, value) in definition_pairs(container) {
            if label.contains("powierzchnia") {
                listing.area = extract_area_number(&value);
            } else if label.contains("pokoi") || label.contains("pokój") {
                listing.rooms = extract_rooms_number(&value);
            }
        }

        let text = element_text(container).to_lowercase();
        set_amenities_from_text(&text, &mut listing);
        listing.market = if contains_any(&text, PRIMARY_MARKET_KEYWORDS) {
            Market::Primary
        } else {
            Market::Secondary
        };

        if !listing.address_raw.is_empty() {
            self.decomposer
                .decompose(&listing.address_raw)
                .apply_to(&mut listing);
        }

        Some(listing)
    }
}

#[async_trait]
impl Extractor for HtmlExtractor {
    fn extract_stubs(&self, page: &str) -> Vec<ListingRecord> {
        let document = Html::parse_document(page);

        let containers: Vec<ElementRef<'_>> = CONTAINER_SELECTORS
            .iter()
            .filter_map(|css| Selector::parse(css).ok())
            .map(|selector| document.select(&selector).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        containers
            .iter()
            .filter_map(|container| self.parse_stub(container))
            .filter(|listing| !listing.url.is_empty())
            .collect()
    }

    fn has_end_marker(&self, page: &str) -> bool {
        let text = visible_text(&Html::parse_document(page));
        self.end_markers
            .iter()
            .any(|m| !m.is_empty() && text.contains(m.as_str()))
    }

    fn has_pagination(&self, page: &str) -> bool {
        let document = Html::parse_document(page);
        Selector::parse(PAGINATION_SELECTOR)
            .map(|selector| document.select(&selector).next().is_some())
            .unwrap_or(false)
    }

    fn total_results(&self, page: &str) -> Option<u32> {
        let text = visible_text(&Html::parse_document(page));
        RESULT_TOTAL
            .captures(&text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    fn page_loaded(&self, page: &str) -> bool {
        self.site_marker.is_empty()
            || visible_text(&Html::parse_document(page)).contains(self.site_marker.as_str())
    }

    async fn extract_details(&self, url: &str) -> Result<DetailFields, FetchError> {
        let html = self.fetcher.fetch(url).await?;
        Ok(parse_detail_page(&html))
    }
}
