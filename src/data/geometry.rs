use std::collections::HashSet;

use geo::{Area, BoundingRect, Intersects, LineString};
use serde::{Deserialize, Serialize};

use super::osm::{ElementType, Node, OsmId, Tags};
use crate::errors::{Error, Result};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> LonLat {
        LonLat { lon, lat }
    }

    fn bits(&self) -> (u64, u64) {
        (self.lon.to_bits(), self.lat.to_bits())
    }
}

impl From<&Node> for LonLat {
    fn from(value: &Node) -> Self {
        LonLat {
            lon: value.lon,
            lat: value.lat,
        }
    }
}

/// A closed chain of coordinates: the first point equals the last and at least 3 distinct
/// points are visited.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Ring {
    pub way_ids: Vec<OsmId>,
    points: Vec<LonLat>,
}

impl Ring {
    pub fn new(way_ids: Vec<OsmId>, points: Vec<LonLat>) -> Result<Ring> {
        let distinct_points = points.iter().map(LonLat::bits).collect::<HashSet<_>>().len();
        let closed = match (points.first(), points.last()) {
            (Some(first), Some(last)) => first == last,
            _ => false,
        };
        if !closed || distinct_points < 3 {
            return Err(Error::MalformedRing {
                way_ids,
                distinct_points,
            });
        }
        Ok(Ring { way_ids, points })
    }

    pub fn points(&self) -> &[LonLat] {
        &self.points
    }

    pub fn distinct_points(&self) -> usize {
        self.points.iter().map(LonLat::bits).collect::<HashSet<_>>().len()
    }

    fn line_string(&self) -> LineString<f64> {
        self.points.iter().map(|pt| (pt.lon, pt.lat)).collect()
    }

    pub fn to_geo(&self) -> geo::Polygon<f64> {
        geo::Polygon::new(self.line_string(), Vec::new())
    }

    pub fn area(&self) -> f64 {
        self.to_geo().unsigned_area()
    }

    /// True when the areas enclosed by both rings share at least one point.
    pub fn overlaps(&self, other: &Ring) -> bool {
        self.to_geo().intersects(&other.to_geo())
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match self.line_string().bounding_rect() {
            Some(rect) => BoundingBox {
                min_lon: rect.min().x,
                min_lat: rect.min().y,
                max_lon: rect.max().x,
                max_lat: rect.max().y,
            },
            None => BoundingBox::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Polygon {
    pub outer: Ring,
    pub inner: Vec<Ring>,
}

impl Polygon {
    pub fn new(outer: Ring) -> Polygon {
        Polygon {
            outer,
            inner: Vec::new(),
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.outer.bounding_box()
    }
}

/// (min-lon, min-lat, max-lon, max-lat)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.min_lon, self.min_lat, self.max_lon, self.max_lat)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    UnclosedBoundary,
}

/// The two loose ends of a chain that could not be closed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FragmentEnds {
    pub way_ids: Vec<OsmId>,
    pub start_node: Option<OsmId>,
    pub end_node: Option<OsmId>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Failure {
    pub element_type: ElementType,
    pub element_id: OsmId,
    pub reason: FailureReason,
    pub unclosed_fragment_ids: Vec<OsmId>,
    pub fragments: Vec<FragmentEnds>,
}

impl Failure {
    pub fn unclosed_fragment_count(&self) -> usize {
        self.unclosed_fragment_ids.len()
    }
}

/// One requested element with its polygons.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Placemark {
    pub element_type: ElementType,
    pub element_id: OsmId,
    pub name: String,
    pub tags: Tags,
    pub polygons: Vec<Polygon>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub folder_name: String,
    pub placemarks: Vec<Placemark>,
}

impl Document {
    pub fn new(folder_name: &str) -> Document {
        Document {
            folder_name: folder_name.to_string(),
            placemarks: Vec::new(),
        }
    }

    pub fn merge(folder_name: &str, documents: impl IntoIterator<Item = Document>) -> Document {
        let mut merged = Document::new(folder_name);
        for document in documents {
            merged.placemarks.extend(document.placemarks);
        }
        merged
    }

    pub fn bounding_boxes(&self) -> Vec<BoundingBox> {
        self.placemarks
            .iter()
            .flat_map(|placemark| placemark.polygons.iter().map(Polygon::bounding_box))
            .collect()
    }
}
