use crate::data::geometry::{Failure, FailureReason, FragmentEnds};
use crate::data::osm::{ElementType, OsmId, Way};
use crate::errors::{Error, Result};

use super::join_ways::JoinedWays;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    Valid,
    /// Terminal: once a break is found the request can only fail.
    Unclosed,
}

/// Gate between the joiner and the classifier. Collects every loose end found for one
/// requested element and turns them into a single [`Failure`].
pub struct BoundaryValidator {
    element_type: ElementType,
    element_id: OsmId,
    state: ValidationState,
    rings: usize,
    fragments: Vec<FragmentEnds>,
}

impl BoundaryValidator {
    pub fn new(element_type: ElementType, element_id: OsmId) -> BoundaryValidator {
        BoundaryValidator {
            element_type,
            element_id,
            state: ValidationState::Valid,
            rings: 0,
            fragments: Vec::new(),
        }
    }

    pub fn state(&self) -> ValidationState {
        self.state
    }

    pub fn check_way(&mut self, way: &Way) {
        if way.closed() {
            self.rings += 1;
        } else {
            self.state = ValidationState::Unclosed;
            self.fragments.push(FragmentEnds {
                way_ids: vec![way.id],
                start_node: way.first_node(),
                end_node: way.last_node(),
            });
        }
    }

    pub fn check_joined(&mut self, joined: &JoinedWays) {
        self.rings += joined.rings.len();
        if !joined.is_closed() {
            self.state = ValidationState::Unclosed;
            self.fragments.extend(joined.remnants.iter().map(|remnant| remnant.ends()));
        }
    }

    /// Holes alone do not make an area.
    pub fn check_has_outer(&mut self, outer: &JoinedWays) {
        if outer.rings.is_empty() {
            self.state = ValidationState::Unclosed;
        }
    }

    pub fn failure(&self) -> Failure {
        Failure {
            element_type: self.element_type,
            element_id: self.element_id,
            reason: FailureReason::UnclosedBoundary,
            unclosed_fragment_ids: self
                .fragments
                .iter()
                .flat_map(|fragment| fragment.way_ids.iter().copied())
                .collect(),
            fragments: self.fragments.clone(),
        }
    }

    /// An element that produced no ring at all is as broken as one with loose ends.
    pub fn finish(mut self) -> Result<()> {
        if self.rings == 0 {
            self.state = ValidationState::Unclosed;
        }
        match self.state {
            ValidationState::Valid => Ok(()),
            ValidationState::Unclosed => Err(Error::UnclosedBoundary(self.failure())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::join_ways::join_way_soup;

    #[test]
    fn closed_way_is_valid() {
        let mut validator = BoundaryValidator::new(ElementType::Way, 1);
        validator.check_way(&Way::new(1, vec![1, 2, 3, 1]));
        assert_eq!(validator.state(), ValidationState::Valid);
        assert!(validator.finish().is_ok());
    }

    #[test]
    fn open_way_fails_with_its_endpoints() {
        let mut validator = BoundaryValidator::new(ElementType::Way, 7);
        validator.check_way(&Way::new(7, vec![1, 2, 3]));
        assert_eq!(validator.state(), ValidationState::Unclosed);

        let failure = match validator.finish() {
            Err(Error::UnclosedBoundary(failure)) => failure,
            other => panic!("expected an unclosed boundary, got {:?}", other),
        };
        assert_eq!(failure.element_type, ElementType::Way);
        assert_eq!(failure.element_id, 7);
        assert_eq!(failure.reason, FailureReason::UnclosedBoundary);
        assert_eq!(failure.unclosed_fragment_ids, vec![7]);
        assert_eq!(failure.fragments[0].start_node, Some(1));
        assert_eq!(failure.fragments[0].end_node, Some(3));
    }

    #[test]
    fn remnants_make_the_whole_relation_fail() {
        let ways = vec![
            Way::new(1, vec![1, 2, 3, 1]),
            Way::new(2, vec![10, 11]),
            Way::new(3, vec![11, 12]),
        ];
        let mut validator = BoundaryValidator::new(ElementType::Relation, 100);
        validator.check_joined(&join_way_soup(&ways));

        let failure = validator.finish().unwrap_err().failure().cloned().unwrap();
        assert_eq!(failure.unclosed_fragment_ids, vec![2, 3]);
        assert_eq!(failure.unclosed_fragment_count(), 2);
        assert_eq!(failure.fragments[0].start_node, Some(10));
        assert_eq!(failure.fragments[0].end_node, Some(12));
    }

    #[test]
    fn nothing_to_assemble_is_unclosed() {
        let mut validator = BoundaryValidator::new(ElementType::Relation, 100);
        validator.check_joined(&JoinedWays::default());
        assert!(matches!(validator.finish(), Err(Error::UnclosedBoundary(_))));
    }

    #[test]
    fn inner_rings_without_outer_are_unclosed() {
        let inner = join_way_soup(&[Way::new(1, vec![1, 2, 3, 1])]);
        let mut validator = BoundaryValidator::new(ElementType::Relation, 100);
        validator.check_joined(&JoinedWays::default());
        validator.check_joined(&inner);
        validator.check_has_outer(&JoinedWays::default());
        assert_eq!(validator.state(), ValidationState::Unclosed);
        assert!(validator.finish().is_err());
    }
}
