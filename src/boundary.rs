//! Boundary assembly for a single requested element: gather its ways, join them into rings,
//! refuse anything unclosed, sort the rings into polygons and wrap them in a document.

pub mod classify;
pub mod join_ways;
pub mod render;
pub mod validate;

use log::{debug, error, warn};

use crate::data::geometry::{BoundingBox, Document, Failure, Placemark, Ring};
use crate::data::osm::{ElementType, OsmElement, OsmId};
use crate::data::OsmMapData;
use crate::errors::{Error, Result};

use self::classify::{group_rings_into_polygons, AssignmentPolicy};
use self::join_ways::{join_way_soup, ClosedRing, Fragment};
use self::validate::BoundaryValidator;

/// Told about every boundary that could not be closed. Observers only watch; the error is
/// still returned to the caller.
pub trait FailureObserver {
    fn on_failure(&self, failure: &Failure);
}

impl<F: Fn(&Failure)> FailureObserver for F {
    fn on_failure(&self, failure: &Failure) {
        self(failure)
    }
}

pub struct LogObserver;

impl FailureObserver for LogObserver {
    fn on_failure(&self, failure: &Failure) {
        error!(
            element_type = failure.element_type.as_str(),
            element_id = failure.element_id,
            fragments = failure.unclosed_fragment_count();
            "Boundary could not be closed"
        );
    }
}

pub struct BoundaryAssembler<'a> {
    pub folder_name: String,
    pub policy: AssignmentPolicy,
    observers: Vec<Box<dyn FailureObserver + 'a>>,
}

impl<'a> BoundaryAssembler<'a> {
    pub fn new(folder_name: &str) -> BoundaryAssembler<'a> {
        BoundaryAssembler {
            folder_name: folder_name.to_string(),
            policy: AssignmentPolicy::default(),
            observers: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: AssignmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: impl FailureObserver + 'a) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn assemble(
        &self,
        data: &OsmMapData,
        element_type: ElementType,
        element_id: OsmId,
    ) -> Result<(Document, Vec<BoundingBox>)> {
        let result = self.assemble_placemark(data, element_type, element_id);
        if let Err(Error::UnclosedBoundary(failure)) = &result {
            for observer in &self.observers {
                observer.on_failure(failure);
            }
        }

        let placemark = result?;
        let bounding_boxes = placemark.polygons.iter().map(|polygon| polygon.bounding_box()).collect();
        let document = Document {
            folder_name: self.folder_name.clone(),
            placemarks: vec![placemark],
        };
        Ok((document, bounding_boxes))
    }

    fn assemble_placemark(
        &self,
        data: &OsmMapData,
        element_type: ElementType,
        element_id: OsmId,
    ) -> Result<Placemark> {
        let mut validator = BoundaryValidator::new(element_type, element_id);

        let (name, tags, outer, inner) = match element_type {
            ElementType::Way => {
                let way = data.way(element_id)?;
                validator.check_way(way);
                validator.finish()?;
                let ring = ClosedRing {
                    fragments: vec![Fragment::from_way(way)],
                };
                (way.get_name(), way.tags.clone(), vec![ring], Vec::new())
            },
            ElementType::Relation => {
                let relation = data.relation(element_id)?;
                let ways = data.relation_ways(element_id)?;
                let outer = join_way_soup(ways.outer);
                let inner = join_way_soup(ways.inner);
                validator.check_joined(&outer);
                validator.check_joined(&inner);
                validator.check_has_outer(&outer);
                validator.finish()?;
                (relation.get_name(), relation.tags.clone(), outer.rings, inner.rings)
            },
            ElementType::Node => return Err(Error::UnsupportedElementType(element_type)),
        };

        let outer = resolve_rings(data, &outer)?;
        let inner = resolve_rings(data, &inner)?;
        debug!(
            element_type = element_type.as_str(),
            element_id = element_id,
            outer = outer.len(),
            inner = inner.len();
            "Joined rings"
        );

        let classified = group_rings_into_polygons(outer, inner, self.policy);
        if !classified.unassigned.is_empty() {
            warn!(
                element_type = element_type.as_str(),
                element_id = element_id,
                count = classified.unassigned.len();
                "Dropping inner rings outside every outer ring"
            );
        }

        Ok(Placemark {
            element_type,
            element_id,
            name,
            tags,
            polygons: classified.polygons,
        })
    }
}

fn resolve_rings(data: &OsmMapData, rings: &[ClosedRing]) -> Result<Vec<Ring>> {
    rings
        .iter()
        .map(|ring| Ring::new(ring.way_ids(), data.coordinates(&ring.nodes())?))
        .collect()
}

/// Assembles one way or relation with the default first-match policy.
pub fn get_boundary(
    data: &OsmMapData,
    element_type: ElementType,
    element_id: OsmId,
) -> Result<(Document, Vec<BoundingBox>)> {
    let folder_name = match element_type {
        ElementType::Way => data.way(element_id)?.get_name(),
        ElementType::Relation => data.relation(element_id)?.get_name(),
        ElementType::Node => return Err(Error::UnsupportedElementType(element_type)),
    };
    BoundaryAssembler::new(&folder_name).assemble(data, element_type, element_id)
}
