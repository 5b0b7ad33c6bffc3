// Filter sets and the predicate that evaluates a vehicle against them.
//
// Lists are OR within a key, keys are AND across the set. An unresolvable
// field fails the filter closed; an empty filter is no constraint at all.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::fields::{self, Field};
use crate::models::VehicleRecord;

pub const SEARCH_KEY: &str = "search";

// Keys that always carry a list of accepted values
pub const LIST_KEYS: &[&str] = &[
    "make",
    "model",
    "year",
    "trim",
    "bodyType",
    "transmission",
    "drivetrain",
    "fuelType",
    "exteriorColor",
    "condition",
    "sellerCity",
    "sellerState",
];

// Keys that always carry a single value
pub const SCALAR_KEYS: &[&str] = &[
    "priceMin",
    "priceMax",
    "mileageMin",
    "mileageMax",
    "yearMin",
    "yearMax",
    SEARCH_KEY,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    List(Vec<String>),
    Scalar(String),
}

impl FilterValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FilterValue::List(values) => values.is_empty(),
            FilterValue::Scalar(value) => value.trim().is_empty(),
        }
    }

    fn sorted(&self) -> FilterValue {
        match self {
            FilterValue::List(values) => {
                let mut sorted = values.clone();
                sorted.sort();
                FilterValue::List(sorted)
            }
            FilterValue::Scalar(value) => FilterValue::Scalar(value.clone()),
        }
    }
}

// List members are a set: order does not affect equality
impl PartialEq for FilterValue {
    fn eq(&self, other: &Self) -> bool {
        match (self.sorted(), other.sorted()) {
            (FilterValue::List(a), FilterValue::List(b)) => a == b,
            (FilterValue::Scalar(a), FilterValue::Scalar(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FilterValue {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FilterSet {
    entries: BTreeMap<String, FilterValue>,
}

// Decoded sets go through the same trimming and empty-value dropping as `set_*`
impl From<BTreeMap<String, FilterValue>> for FilterSet {
    fn from(entries: BTreeMap<String, FilterValue>) -> Self {
        let mut set = FilterSet::new();
        for (key, value) in entries {
            match value {
                FilterValue::List(values) => set.set_list(key, values),
                FilterValue::Scalar(value) => set.set_scalar(key, value),
            }
        }
        set
    }
}

impl<'de> Deserialize<'de> for FilterSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BTreeMap::<String, FilterValue>::deserialize(deserializer).map(FilterSet::from)
    }
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn scalar(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(FilterValue::Scalar(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> &[String] {
        match self.entries.get(key) {
            Some(FilterValue::List(values)) => values,
            _ => &[],
        }
    }

    // Replaces any previous value. Duplicates collapse, first occurrence wins.
    pub fn set_list<I, S>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for value in values {
            let value = value.into().trim().to_string();
            if !value.is_empty() && !unique.contains(&value) {
                unique.push(value);
            }
        }
        self.set(key.into(), FilterValue::List(unique));
    }

    pub fn set_scalar(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into().trim().to_string();
        self.set(key.into(), FilterValue::Scalar(value));
    }

    pub fn set(&mut self, key: String, value: FilterValue) {
        if value.is_empty() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    // Checkbox semantics: add the value if absent, remove it if present
    pub fn toggle(&mut self, key: &str, value: &str) {
        let mut values = self.list(key).to_vec();
        if let Some(pos) = values.iter().position(|v| v == value) {
            values.remove(pos);
        } else {
            values.push(value.to_string());
        }
        self.set_list(key, values);
    }

    pub fn remove(&mut self, key: &str) -> Option<FilterValue> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn without(&self, key: &str) -> FilterSet {
        let mut copy = self.clone();
        copy.entries.remove(key);
        copy
    }

    // Stable serialization used for cache keys: keys sorted by the BTreeMap,
    // list members sorted here.
    pub fn canonical(&self) -> String {
        let sorted: BTreeMap<&String, FilterValue> =
            self.entries.iter().map(|(k, v)| (k, v.sorted())).collect();
        serde_json::to_string(&sorted).unwrap_or_default()
    }
}

// What a filter key constrains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target<'a> {
    Field(Field),
    Min(Field),
    Max(Field),
    Text,
    Meta(&'a str),
}

fn target_for(key: &str) -> Target<'_> {
    match key {
        "priceMin" => Target::Min(Field::Price),
        "priceMax" => Target::Max(Field::Price),
        "mileageMin" => Target::Min(Field::Mileage),
        "mileageMax" => Target::Max(Field::Mileage),
        "yearMin" => Target::Min(Field::Year),
        "yearMax" => Target::Max(Field::Year),
        SEARCH_KEY => Target::Text,
        other => match Field::from_name(other) {
            Some(field) => Target::Field(field),
            None => Target::Meta(other),
        },
    }
}

fn same_value(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn resolve_target(record: &VehicleRecord, target: Target<'_>) -> Option<String> {
    match target {
        Target::Field(field) => fields::resolve_field(record, field),
        Target::Meta(key) => fields::lookup_meta(record, key).map(str::to_string),
        _ => None,
    }
}

fn text_matches(record: &VehicleRecord, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    record.title.to_lowercase().contains(&needle)
        || record.meta.iter().any(|entry| entry.value.to_lowercase().contains(&needle))
}

fn passes(record: &VehicleRecord, key: &str, value: &FilterValue) -> bool {
    if value.is_empty() {
        return true;
    }
    let target = target_for(key);
    match (target, value) {
        (Target::Text, FilterValue::Scalar(needle)) => text_matches(record, needle),
        (Target::Text, FilterValue::List(needles)) => needles.iter().any(|n| text_matches(record, n)),
        (Target::Min(field) | Target::Max(field), FilterValue::Scalar(bound)) => {
            // An unparsable bound constrains nothing
            let Some(bound) = fields::normalize_number(bound).and_then(|b| b.parse::<u64>().ok()) else {
                return true;
            };
            let Some(actual) = fields::resolve_number(record, field) else {
                return false;
            };
            match target {
                Target::Min(_) => actual >= bound,
                _ => actual <= bound,
            }
        }
        (Target::Min(_) | Target::Max(_), FilterValue::List(_)) => true,
        (target, FilterValue::List(accepted)) => match resolve_target(record, target) {
            Some(actual) => accepted.iter().any(|v| same_value(v, &actual)),
            None => false,
        },
        (target, FilterValue::Scalar(expected)) => match resolve_target(record, target) {
            Some(actual) => same_value(expected, &actual),
            None => false,
        },
    }
}

// `exclude_key` lets facet counting ask "what would match if this filter were ignored"
pub fn matches(record: &VehicleRecord, filters: &FilterSet, exclude_key: Option<&str>) -> bool {
    filters
        .iter()
        .filter(|(key, _)| Some(key.as_str()) != exclude_key)
        .all(|(key, value)| passes(record, key, value))
}

pub fn apply<'a>(
    inventory: &'a [VehicleRecord],
    filters: &FilterSet,
) -> impl Iterator<Item = &'a VehicleRecord> {
    inventory.iter().filter(move |record| matches(record, filters, None))
}
