use log::warn;
use serde::{Deserialize, Serialize};

use crate::data::geometry::{Polygon, Ring};

/// Which outer ring an inner ring is handed to when it overlaps several.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentPolicy {
    /// The first overlapping outer ring in input order. A small outer ring listed before a
    /// larger one that encloses it takes the hole.
    #[default]
    FirstMatch,
    /// The overlapping outer ring with the smallest area.
    SmallestEnclosing,
}

impl AssignmentPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentPolicy::FirstMatch => "first_match",
            AssignmentPolicy::SmallestEnclosing => "smallest_enclosing",
        }
    }
}

#[derive(Debug, Default)]
pub struct Classified {
    pub polygons: Vec<Polygon>,
    /// Inner rings that overlap no outer ring.
    pub unassigned: Vec<Ring>,
}

fn usable(ring: &Ring) -> bool {
    if ring.distinct_points() < 3 {
        warn!(ways = format!("{:?}", ring.way_ids).as_str(); "Dropping ring with fewer than 3 points");
        return false;
    }
    true
}

pub fn group_rings_into_polygons(
    outer_rings: Vec<Ring>,
    inner_rings: Vec<Ring>,
    policy: AssignmentPolicy,
) -> Classified {
    let mut polygons: Vec<Polygon> = outer_rings
        .into_iter()
        .filter(usable)
        .map(Polygon::new)
        .collect();
    let mut unassigned: Vec<Ring> = Vec::new();

    for inner in inner_rings.into_iter().filter(usable) {
        let target = match policy {
            AssignmentPolicy::FirstMatch => polygons
                .iter()
                .position(|polygon| polygon.outer.overlaps(&inner)),
            AssignmentPolicy::SmallestEnclosing => polygons
                .iter()
                .enumerate()
                .filter(|(_, polygon)| polygon.outer.overlaps(&inner))
                .map(|(idx, polygon)| (idx, polygon.outer.area()))
                .min_by(|(_, a), (_, b)| a.total_cmp(b))
                .map(|(idx, _)| idx),
        };
        match target {
            Some(idx) => polygons[idx].inner.push(inner),
            None => unassigned.push(inner),
        }
    }

    Classified {
        polygons,
        unassigned,
    }
}
