use crate::listing::{ListingRecord, Market};

/// Fields recovered from a listing's detail page
///
/// Every field is optional: `None` means "not found on the page" and never
/// overwrites what the stub already holds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailFields {
    pub listing_id: Option<String>,
    pub market: Option<Market>,
    pub year_of_construction: Option<u16>,
    pub building_type: Option<String>,
    pub floor: Option<i32>,
    pub total_floors: Option<i32>,
    pub finish_standard: Option<u8>,
    pub heating_type: Option<String>,
    pub rent_amount: Option<f64>,

    pub has_balcony: bool,
    pub has_garage: bool,
    pub has_garden: bool,
    pub has_elevator: bool,
    pub has_basement: bool,
    pub has_separate_kitchen: bool,
    pub has_dishwasher: bool,
    pub has_fridge: bool,
    pub has_oven: bool,
}

impl DetailFields {
    /// Returns true if the detail parse found nothing at all
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merges these fields into a listing
    ///
    /// Present values overwrite, amenity flags are OR-ed.
    pub fn merge_into(self, listing: &mut ListingRecord) {
        if let Some(id) = self.listing_id {
            listing.listing_id = Some(id);
        }
        if let Some(market) = self.market {
            listing.market = market;
        }
        if let Some(year) = self.year_of_construction {
            listing.year_of_construction = Some(year);
        }
        if let Some(building_type) = self.building_type {
            listing.building_type = Some(building_type);
        }
        if let Some(floor) = self.floor {
            listing.floor = Some(floor);
        }
        if let Some(total) = self.total_floors {
            listing.total_floors = Some(total);
        }
        if let Some(finish) = self.finish_standard {
            listing.finish_standard = Some(finish);
        }
        if let Some(heating) = self.heating_type {
            listing.heating_type = Some(heating);
        }
        if let Some(rent) = self.rent_amount {
            listing.rent_amount = Some(rent);
        }

        listing.has_balcony |= self.has_balcony;
        listing.has_garage |= self.has_garage;
        listing.has_garden |= self.has_garden;
        listing.has_elevator |= self.has_elevator;
        listing.has_basement |= self.has_basement;
        listing.has_separate_kitchen |= self.has_separate_kitchen;
        listing.has_dishwasher |= self.has_dishwasher;
        listing.has_fridge |= self.has_fridge;
        listing.has_oven |= self.has_oven;
    }
}
