use crate::crawler::traits::{AddressDecomposer, AddressParts};

/// Street prefixes recognized at the start of the first address part
pub const STREET_PREFIXES: &[&str] = &["ul.", "al.", "pl.", "os."];

/// County names ("olsztyński", "wielicki") end with one of these
const COUNTY_SUFFIXES: &[&str] = &["ski", "ński", "cki", "dzki"];

/// Comma-separated address decomposition
///
/// Handles the forms used by Polish listing portals:
///
/// | parts | layout |
/// |-------|--------|
/// | 2 | city, province |
/// | 3 | district, city, province |
/// | 4 | street, district, city, province |
/// | 5 | street, district, city, county, province |
///
/// Other lengths fall back to reading from the end: province last, then
/// city (skipping a county), then district.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommaAddressDecomposer;

impl CommaAddressDecomposer {
    pub fn new() -> Self {
        Self
    }
}

fn is_county(part: &str) -> bool {
    COUNTY_SUFFIXES.iter().any(|suffix| part.ends_with(suffix))
}

pub(crate) fn has_street_prefix(part: &str) -> bool {
    let lowered = part.to_lowercase();
    STREET_PREFIXES.iter().any(|p| lowered.starts_with(p))
}

impl AddressDecomposer for CommaAddressDecomposer {
    fn decompose(&self, address_raw: &str) -> AddressParts {
        let parts: Vec<&str> = address_raw
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let owned = |s: &str| Some(s.to_string());

        match parts.as_slice() {
            [] => AddressParts::default(),
            [street, district, city, province] => AddressParts {
                street: owned(street),
                district: owned(district),
                city: owned(city),
                province: owned(province),
            },
            [street, district, city, _county, province] => AddressParts {
                street: owned(street),
                district: owned(district),
                city: owned(city),
                province: owned(province),
            },
            _ => {
                let n = parts.len();
                let mut result = AddressParts {
                    province: owned(parts[n - 1]),
                    ..Default::default()
                };

                if n >= 2 {
                    let candidate = parts[n - 2];
                    if !is_county(candidate) {
                        result.city = owned(candidate);
                    } else if n >= 3 {
                        result.city = owned(parts[n - 3]);
                    }
                }

                if n >= 3 && result.city.as_deref() != Some(parts[n - 3]) {
                    result.district = owned(parts[n - 3]);
                }

                if n >= 2 && has_street_prefix(parts[0]) {
                    result.street = owned(parts[0]);
                }

                result
            }
        }
    }
}
