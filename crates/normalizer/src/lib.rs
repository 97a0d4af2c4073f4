//! Pure text and numeric normalisation for scraped listing fields
//! (§4.1). Every function here is a total, idempotent transform over
//! plain strings/numbers with no I/O, so the whole crate is exercised
//! by unit tests alone.

pub mod address;
pub mod building_name;
pub mod direction;
pub mod layout;
pub mod numeric;
pub mod validate;

pub use address::{
    decompose, detail_level, district_prefix, is_prefix_chain_partner, normalize_address,
    Components as AddressComponents, DetailLevel,
};
pub use building_name::{
    canonical_name, extract_room_number, is_station_noise, normalize_building_name,
};
pub use direction::normalize_direction;
pub use layout::{normalize_layout, validate_layout};
pub use numeric::{
    extract_area_sqm, extract_built_year, extract_floor_number, extract_price_man_en,
    extract_total_floors,
};
pub use validate::{
    is_plausible_area, is_plausible_built_year, is_plausible_floor, is_plausible_price,
};
