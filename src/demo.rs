// Built-in sample inventory. Served by the `demo` catalog backend and, when
// `demo_fallback` is enabled, in place of a failed catalog page.

use once_cell::sync::Lazy;

use crate::catalog::LocalCatalog;
use crate::models::{PageQuery, PageResult, SellerInfo, VehicleRecord};

struct DemoVehicle {
    year: u16,
    make: &'static str,
    model: &'static str,
    trim: &'static str,
    price: u32,
    mileage: u32,
    body_type: &'static str,
    transmission: &'static str,
    drivetrain: &'static str,
    fuel_type: &'static str,
    color: &'static str,
    condition: &'static str,
    city: &'static str,
    state: &'static str,
}

#[allow(clippy::too_many_arguments)]
const fn demo(
    year: u16,
    make: &'static str,
    model: &'static str,
    trim: &'static str,
    price: u32,
    mileage: u32,
    body_type: &'static str,
    drivetrain: &'static str,
    fuel_type: &'static str,
    color: &'static str,
    condition: &'static str,
    city: &'static str,
    state: &'static str,
) -> DemoVehicle {
    DemoVehicle {
        year,
        make,
        model,
        trim,
        price,
        mileage,
        body_type,
        transmission: "Automatic",
        drivetrain,
        fuel_type,
        color,
        condition,
        city,
        state,
    }
}

const DEMO_VEHICLES: &[DemoVehicle] = &[
    demo(2021, "Ford", "F-150", "XLT", 38_995, 28_410, "Truck", "4WD", "Gasoline", "Oxford White", "Used", "Tulsa", "OK"),
    demo(2019, "Toyota", "Camry", "SE", 21_450, 41_200, "Sedan", "FWD", "Gasoline", "Celestial Silver", "Used", "Dallas", "TX"),
    demo(2022, "Honda", "CR-V", "EX-L", 31_900, 12_050, "SUV", "AWD", "Gasoline", "Radiant Red", "Certified", "Austin", "TX"),
    demo(2018, "Chevrolet", "Silverado 1500", "LT", 29_800, 63_900, "Truck", "4WD", "Gasoline", "Black", "Used", "Wichita", "KS"),
    demo(2023, "Tesla", "Model 3", "Long Range", 42_500, 8_300, "Sedan", "AWD", "Electric", "Pearl White", "Used", "Denver", "CO"),
    demo(2020, "Jeep", "Wrangler", "Sahara", 36_750, 34_100, "SUV", "4WD", "Gasoline", "Sting-Gray", "Used", "Tulsa", "OK"),
    demo(2017, "Ford", "Escape", "SE", 14_200, 78_450, "SUV", "FWD", "Gasoline", "Magnetic", "Used", "Oklahoma City", "OK"),
    demo(2024, "Toyota", "RAV4", "Hybrid XLE", 36_300, 2_100, "SUV", "AWD", "Hybrid", "Blueprint", "New", "Dallas", "TX"),
    demo(2021, "Subaru", "Outback", "Premium", 27_600, 30_750, "Wagon", "AWD", "Gasoline", "Autumn Green", "Certified", "Denver", "CO"),
    demo(2016, "Honda", "Civic", "LX", 12_900, 91_300, "Sedan", "FWD", "Gasoline", "Crystal Black", "Used", "Austin", "TX"),
    demo(2022, "Ram", "1500", "Big Horn", 41_200, 19_600, "Truck", "4WD", "Diesel", "Granite Crystal", "Used", "Wichita", "KS"),
    demo(2020, "Kia", "Telluride", "EX", 33_400, 37_800, "SUV", "AWD", "Gasoline", "Gravity Gray", "Used", "Oklahoma City", "OK"),
];

fn to_record(index: usize, v: &DemoVehicle) -> VehicleRecord {
    let title = format!("{} {} {} {}", v.year, v.make, v.model, v.trim);
    VehicleRecord::new(format!("demo-{}", index + 1), title)
        .with_price(v.price.to_string())
        .with_meta("year", v.year.to_string())
        .with_meta("make", v.make)
        .with_meta("model", v.model)
        .with_meta("trim", v.trim)
        .with_meta("mileage", v.mileage.to_string())
        .with_meta("body_type", v.body_type)
        .with_meta("transmission", v.transmission)
        .with_meta("drivetrain", v.drivetrain)
        .with_meta("fuel_type", v.fuel_type)
        .with_meta("exterior_color", v.color)
        .with_meta("condition", v.condition)
        .with_seller(SellerInfo {
            name: Some(format!("{} Auto Group", v.city)),
            city: Some(v.city.to_string()),
            state: Some(v.state.to_string()),
            ..Default::default()
        })
}

static DEMO_INVENTORY: Lazy<Vec<VehicleRecord>> =
    Lazy::new(|| DEMO_VEHICLES.iter().enumerate().map(|(i, v)| to_record(i, v)).collect());

pub fn demo_inventory() -> Vec<VehicleRecord> {
    DEMO_INVENTORY.clone()
}

// The demo inventory filtered and paginated like a real catalog page
pub fn demo_page(query: &PageQuery) -> PageResult {
    LocalCatalog::new(demo_inventory()).page(query)
}
