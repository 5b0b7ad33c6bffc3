// Canonical field resolution over loosely-typed catalog records.
//
// Resolution order for every field:
//   1. exact canonical name in the metadata bag
//   2. the field's ordered alias list
//   3. structured record data (seller info, the product price)
//   4. fuzzy keyword scan over metadata keys (numeric fields only)
//   5. title heuristics ("2019 Ford F-150 XLT")
// Keys are compared after lowercasing and dropping every non-alphanumeric
// character, so `odometer_reading`, `Odometer-Reading` and `odometerReading`
// are the same key.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::VehicleRecord;

const MIN_YEAR: u64 = 1900;
const MAX_YEAR: u64 = 2100;

pub const CONTACT_DEALER: &str = "Contact Dealer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Make,
    Model,
    Year,
    Trim,
    Mileage,
    Price,
    BodyType,
    Transmission,
    Drivetrain,
    FuelType,
    ExteriorColor,
    Condition,
    SellerName,
    SellerCity,
    SellerState,
    SellerPhone,
}

static FIELDS_BY_NAME: Lazy<HashMap<String, Field>> = Lazy::new(|| {
    Field::ALL.iter().map(|f| (normalize_key(f.canonical_name()), *f)).collect()
});

impl Field {
    pub const ALL: [Field; 16] = [
        Field::Make,
        Field::Model,
        Field::Year,
        Field::Trim,
        Field::Mileage,
        Field::Price,
        Field::BodyType,
        Field::Transmission,
        Field::Drivetrain,
        Field::FuelType,
        Field::ExteriorColor,
        Field::Condition,
        Field::SellerName,
        Field::SellerCity,
        Field::SellerState,
        Field::SellerPhone,
    ];

    pub fn canonical_name(self) -> &'static str {
        match self {
            Field::Make => "make",
            Field::Model => "model",
            Field::Year => "year",
            Field::Trim => "trim",
            Field::Mileage => "mileage",
            Field::Price => "price",
            Field::BodyType => "bodyType",
            Field::Transmission => "transmission",
            Field::Drivetrain => "drivetrain",
            Field::FuelType => "fuelType",
            Field::ExteriorColor => "exteriorColor",
            Field::Condition => "condition",
            Field::SellerName => "sellerName",
            Field::SellerCity => "sellerCity",
            Field::SellerState => "sellerState",
            Field::SellerPhone => "sellerPhone",
        }
    }

    // Lookup by canonical name, tolerant of case and separators ("body_type")
    pub fn from_name(name: &str) -> Option<Field> {
        FIELDS_BY_NAME.get(&normalize_key(name)).copied()
    }

    // Known alternative metadata keys, tried in order after the canonical name
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Make => &["vehicle_make", "make_name", "brand", "manufacturer", "pa_make"],
            Field::Model => &["vehicle_model", "model_name", "pa_model"],
            Field::Year => &["vehicle_year", "model_year", "year_built", "pa_year"],
            Field::Trim => &["vehicle_trim", "trim_level", "pa_trim"],
            Field::Mileage => &[
                "odometer",
                "odometer_reading",
                "vehicle_mileage",
                "kilometres",
                "kilometers",
                "miles",
                "km",
                "pa_mileage",
            ],
            Field::Price => &["regular_price", "sale_price", "vehicle_price", "asking_price"],
            Field::BodyType => &["body_type", "body_style", "vehicle_body", "body", "pa_body_type"],
            Field::Transmission => &["vehicle_transmission", "trans", "gearbox", "pa_transmission"],
            Field::Drivetrain => &["drive_train", "drive_type", "drive", "pa_drivetrain"],
            Field::FuelType => &["fuel_type", "fuel", "pa_fuel_type"],
            Field::ExteriorColor => &[
                "exterior_color",
                "exterior_colour",
                "color",
                "colour",
                "pa_color",
            ],
            Field::Condition => &["vehicle_condition", "new_used", "pa_condition"],
            Field::SellerName => &["seller_name", "dealer_name", "vendor_name", "seller"],
            Field::SellerCity => &["seller_city", "dealer_city", "city", "location_city"],
            Field::SellerState => &["seller_state", "dealer_state", "state", "province"],
            Field::SellerPhone => &["seller_phone", "dealer_phone", "phone", "contact_phone"],
        }
    }

    // Substrings for the last-resort scan. Only numeric fields get one: a
    // numeric parse is what keeps the scan from matching unrelated keys.
    pub fn fuzzy_keywords(self) -> &'static [&'static str] {
        match self {
            Field::Mileage => &["mile", "odometer", "kilomet"],
            Field::Price => &["price"],
            Field::Year => &["year"],
            _ => &[],
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Field::Mileage | Field::Price | Field::Year)
    }
}

pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// "45,321 mi" -> "45321", "$24,999.99" -> "24999". Negative or digit-free
// input yields None.
pub fn normalize_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('-') {
        return None;
    }
    let integral = match trimmed.find('.') {
        Some(idx) if trimmed[idx + 1..].chars().next().is_some_and(|c| c.is_ascii_digit()) => {
            &trimmed[..idx]
        }
        _ => trimmed,
    };
    let digits: String = integral.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    // Round-trip through u64 to drop leading zeros; absurdly long digit runs are not numbers
    digits.parse::<u64>().ok().map(|n| n.to_string())
}

// "45321" -> "45,321"
pub fn format_grouped(digits: &str) -> String {
    let digits = digits.trim();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return digits.to_string();
    }
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn display_or(value: Option<String>, default: &str) -> String {
    value.unwrap_or_else(|| default.to_string())
}

// Display string for a field: grouped digits for mileage and price, raw otherwise
pub fn display_field(record: &VehicleRecord, field: Field) -> String {
    match (field, resolve_field(record, field)) {
        (Field::Mileage | Field::Price, Some(v)) => format_grouped(&v),
        (_, Some(v)) => v,
        (Field::Price | Field::SellerPhone, None) => CONTACT_DEALER.to_string(),
        (_, None) => "N/A".to_string(),
    }
}

fn clean_value(field: Field, raw: &str) -> Option<String> {
    if field.is_numeric() {
        let n = normalize_number(raw)?;
        if field == Field::Year {
            let y: u64 = n.parse().ok()?;
            if !(MIN_YEAR..=MAX_YEAR).contains(&y) {
                return None;
            }
        }
        Some(n)
    } else {
        let v = raw.trim();
        (!v.is_empty()).then(|| v.to_string())
    }
}

// Raw metadata lookup by key, skipping empty values
pub fn lookup_meta<'a>(record: &'a VehicleRecord, key: &str) -> Option<&'a str> {
    let wanted = normalize_key(key);
    record
        .meta
        .iter()
        .filter(|entry| normalize_key(&entry.key) == wanted)
        .map(|entry| entry.value.trim())
        .find(|value| !value.is_empty())
}

fn lookup_clean(record: &VehicleRecord, field: Field, key: &str) -> Option<String> {
    let wanted = normalize_key(key);
    record
        .meta
        .iter()
        .filter(|entry| normalize_key(&entry.key) == wanted)
        .find_map(|entry| clean_value(field, &entry.value))
}

fn from_seller(record: &VehicleRecord, field: Field) -> Option<String> {
    let seller = record.seller.as_ref()?;
    let value = match field {
        Field::SellerName => seller.name.as_deref(),
        Field::SellerCity => seller.city.as_deref(),
        Field::SellerState => seller.state.as_deref(),
        Field::SellerPhone => seller.phone.as_deref(),
        _ => None,
    }?;
    clean_value(field, value)
}

fn fuzzy_scan(record: &VehicleRecord, field: Field) -> Option<String> {
    let keywords = field.fuzzy_keywords();
    if keywords.is_empty() {
        return None;
    }
    record
        .meta
        .iter()
        .filter(|entry| {
            let key = normalize_key(&entry.key);
            keywords.iter().any(|kw| key.contains(kw))
        })
        .find_map(|entry| clean_value(field, &entry.value))
}

// Titles like "2019 Ford F-150 XLT" carry year, make and model when the
// metadata does not.
fn from_title(record: &VehicleRecord, field: Field) -> Option<String> {
    let mut tokens = record.title.split_whitespace();
    let first = tokens.next()?;
    let year = clean_value(Field::Year, first).filter(|_| first.len() == 4)?;
    match field {
        Field::Year => Some(year),
        Field::Make => tokens.next().map(str::to_string),
        Field::Model => tokens.nth(1).map(str::to_string),
        _ => None,
    }
}

pub fn resolve_field(record: &VehicleRecord, field: Field) -> Option<String> {
    let is_seller = matches!(
        field,
        Field::SellerName | Field::SellerCity | Field::SellerState | Field::SellerPhone
    );
    if is_seller {
        if let Some(v) = from_seller(record, field) {
            return Some(v);
        }
    }

    if let Some(v) = lookup_clean(record, field, field.canonical_name()) {
        return Some(v);
    }
    if let Some(v) = field.aliases().iter().find_map(|alias| lookup_clean(record, field, alias)) {
        return Some(v);
    }
    if field == Field::Price {
        if let Some(v) = record.price.as_deref().and_then(|p| clean_value(field, p)) {
            return Some(v);
        }
    }
    if let Some(v) = fuzzy_scan(record, field) {
        tracing::debug!(record_id = %record.id, field = field.canonical_name(), "Resolved field via fuzzy key scan");
        return Some(v);
    }
    from_title(record, field)
}

pub fn resolve_number(record: &VehicleRecord, field: Field) -> Option<u64> {
    if !field.is_numeric() {
        return None;
    }
    resolve_field(record, field)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SellerInfo;
    use pretty_assertions::assert_eq;

    #[test]
    fn mileage_falls_back_to_odometer_reading_alias() {
        let record = VehicleRecord::new("1", "Pickup").with_meta("odometer_reading", "45,321 mi");
        assert_eq!(resolve_field(&record, Field::Mileage), Some("45321".to_string()));
    }

    #[test]
    fn exact_name_wins_over_aliases() {
        let record = VehicleRecord::new("1", "Sedan")
            .with_meta("odometer", "99,000")
            .with_meta("Mileage", "12000");
        assert_eq!(resolve_field(&record, Field::Mileage), Some("12000".to_string()));
    }

    #[test]
    fn empty_values_are_skipped() {
        let record = VehicleRecord::new("1", "Sedan")
            .with_meta("mileage", "  ")
            .with_meta("vehicle_mileage", "8,000");
        assert_eq!(resolve_field(&record, Field::Mileage), Some("8000".to_string()));
    }

    #[test]
    fn fuzzy_scan_requires_numeric_value() {
        let record = VehicleRecord::new("1", "Coupe")
            .with_meta("mileage_unit", "mi")
            .with_meta("_current_odometer_value", "61 200");
        assert_eq!(resolve_field(&record, Field::Mileage), Some("61200".to_string()));
    }

    #[test]
    fn price_uses_product_price_and_drops_cents() {
        let record = VehicleRecord::new("1", "Coupe").with_price("$24,999.99");
        assert_eq!(resolve_field(&record, Field::Price), Some("24999".to_string()));
        assert_eq!(display_field(&record, Field::Price), "24,999");
    }

    #[test]
    fn missing_price_displays_contact_dealer() {
        let record = VehicleRecord::new("1", "Coupe");
        assert_eq!(resolve_field(&record, Field::Price), None);
        assert_eq!(display_field(&record, Field::Price), CONTACT_DEALER);
    }

    #[test]
    fn title_supplies_year_make_model() {
        let record = VehicleRecord::new("1", "2019 Ford F-150 XLT");
        assert_eq!(resolve_field(&record, Field::Year), Some("2019".to_string()));
        assert_eq!(resolve_field(&record, Field::Make), Some("Ford".to_string()));
        assert_eq!(resolve_field(&record, Field::Model), Some("F-150".to_string()));
        assert_eq!(resolve_field(&record, Field::Trim), None);
    }

    #[test]
    fn out_of_range_year_is_rejected() {
        let record = VehicleRecord::new("1", "Something").with_meta("year", "12");
        assert_eq!(resolve_field(&record, Field::Year), None);
    }

    #[test]
    fn seller_fields_prefer_nested_info() {
        let record = VehicleRecord::new("1", "Van")
            .with_meta("city", "Metadata City")
            .with_seller(SellerInfo { city: Some("Austin".into()), ..Default::default() });
        assert_eq!(resolve_field(&record, Field::SellerCity), Some("Austin".to_string()));
        assert_eq!(resolve_field(&record, Field::SellerState), None);
    }

    #[test]
    fn grouping_and_normalization() {
        assert_eq!(format_grouped("1234567"), "1,234,567");
        assert_eq!(format_grouped("999"), "999");
        assert_eq!(normalize_number("-5"), None);
        assert_eq!(normalize_number("007"), Some("7".to_string()));
        assert_eq!(normalize_number("n/a"), None);
    }

    #[test]
    fn field_names_are_separator_insensitive() {
        assert_eq!(Field::from_name("body_type"), Some(Field::BodyType));
        assert_eq!(Field::from_name("bodyType"), Some(Field::BodyType));
        assert_eq!(Field::from_name("colourful"), None);
    }
}
