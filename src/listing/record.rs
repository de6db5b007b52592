use serde::{Deserialize, Serialize};
use std::fmt;

/// Market segment of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    /// New build sold by a developer
    Primary,

    /// Resale
    #[default]
    Secondary,
}

impl Market {
    /// Converts the market to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }

    /// Parses a market from its database form or a site label ("pierwotny", "wtórny")
    pub fn from_label(s: &str) -> Option<Self> {
        let lowered = s.trim().to_lowercase();
        if lowered.contains("primary") || lowered.contains("pierwotny") {
            Some(Self::Primary)
        } else if lowered.contains("secondary") || lowered.contains("wtórny") {
            Some(Self::Secondary)
        } else {
            None
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// One scraped property advertisement
///
/// `url` is the unique key within a source. The extractor never emits a
/// record with an empty `url`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListingRecord {
    pub url: String,
    pub listing_id: Option<String>,
    pub title: String,
    pub price: Option<f64>,
    /// Floor area in m²
    pub area: Option<f64>,
    pub rooms: Option<u32>,

    pub address_raw: String,
    pub street: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,

    pub market: Market,

    pub has_balcony: bool,
    pub has_garage: bool,
    pub has_garden: bool,
    pub has_elevator: bool,
    pub has_basement: bool,
    pub has_separate_kitchen: bool,
    pub has_dishwasher: bool,
    pub has_fridge: bool,
    pub has_oven: bool,

    pub year_of_construction: Option<u16>,
    pub building_type: Option<String>,
    pub floor: Option<i32>,
    pub total_floors: Option<i32>,
    /// 1 ready to move in .. 6 closed shell
    pub finish_standard: Option<u8>,
    pub heating_type: Option<String>,
    pub rent_amount: Option<f64>,

    /// Origin site, e.g. "otodom.pl"
    pub source: String,
    pub source_page: u32,
    /// 1-based position on the results page
    pub source_position: u32,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ListingRecord {
    /// Creates a stub with the minimum identifying fields
    pub fn new(url: impl Into<String>, title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    /// Returns true once coordinates have been resolved
    pub fn is_geocoded(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn set_coordinates(&mut self, latitude: f64, longitude: f64) {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
    }
}
