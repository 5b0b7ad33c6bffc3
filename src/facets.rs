// Filter option counts ("Ford (12)") over an inventory snapshot.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::fields::{self, Field};
use crate::filters::{self, FilterSet};
use crate::models::VehicleRecord;

pub const FACET_CATEGORIES: [Field; 9] = [
    Field::Make,
    Field::Model,
    Field::Year,
    Field::BodyType,
    Field::Transmission,
    Field::Drivetrain,
    Field::FuelType,
    Field::ExteriorColor,
    Field::Condition,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetMode {
    // Every category counted over the entire inventory
    #[serde(alias = "full")]
    Unconditioned,
    // Each category counted over vehicles matching all other active filters
    #[default]
    Cascading,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: String,
    pub count: usize,
}

pub type FacetOptions = BTreeMap<String, Vec<FacetCount>>;

fn tally<'a>(records: impl Iterator<Item = &'a VehicleRecord>, field: Field) -> Vec<FacetCount> {
    // IndexMap keeps first-seen order for the stable tie-break below
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for record in records {
        if let Some(value) = fields::resolve_field(record, field) {
            let value = value.trim();
            if !value.is_empty() {
                *counts.entry(value.to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut options: Vec<FacetCount> = counts.into_iter().map(|(value, count)| FacetCount { value, count }).collect();
    if field == Field::Year {
        options.sort_by(|a, b| {
            let a_year = a.value.parse::<u64>().unwrap_or(0);
            let b_year = b.value.parse::<u64>().unwrap_or(0);
            b_year.cmp(&a_year)
        });
    } else {
        options.sort_by(|a, b| b.count.cmp(&a.count));
    }
    options
}

pub fn compute_facets(inventory: &[VehicleRecord], filters: &FilterSet, mode: FacetMode) -> FacetOptions {
    let mut options = FacetOptions::new();
    for field in FACET_CATEGORIES {
        let key = field.canonical_name();
        let counts = match mode {
            FacetMode::Unconditioned => tally(inventory.iter(), field),
            FacetMode::Cascading => tally(
                inventory.iter().filter(|record| filters::matches(record, filters, Some(key))),
                field,
            ),
        };
        options.insert(key.to_string(), counts);
    }
    tracing::debug!(vehicles = inventory.len(), ?mode, "Computed facet counts");
    options
}
