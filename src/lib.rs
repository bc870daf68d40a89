//! Builds polygon boundaries (with holes) for OpenStreetMap ways and relations, refusing any
//! boundary whose ways cannot be joined into closed rings, and renders them as KML or GeoJSON.

pub mod boundary;
pub mod cache;
pub mod config;
pub mod data;
pub mod errors;
pub mod etl;

#[cfg(test)]
mod test_utilities;

pub use boundary::classify::group_rings_into_polygons;
pub use boundary::join_ways::join_way_soup;
pub use boundary::render::render;
pub use boundary::get_boundary;
pub use errors::{Error, Result};
