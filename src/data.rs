use std::collections::HashMap;

use self::geometry::LonLat;
use self::osm::{ElementType, MemberRole, Node, OsmId, Relation, Way};
use crate::errors::{Error, Result};

pub mod geometry;
pub mod osm;

/// Map data as defined in the .osm file. Elements are kept without any processing; rings
/// and polygons are derived from them per request.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Default, Clone)]
pub struct OsmMapData {
    pub nodes: HashMap<OsmId, Node>,
    pub ways: HashMap<OsmId, Way>,
    pub relations: HashMap<OsmId, Relation>,
}

/// Way members of a multipolygon relation, flattened and split by role.
#[derive(Debug, Default)]
pub struct RelationWays<'a> {
    pub outer: Vec<&'a Way>,
    pub inner: Vec<&'a Way>,
}

impl OsmMapData {
    pub fn node(&self, id: OsmId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(Error::MissingElement {
            element_type: ElementType::Node,
            element_id: id,
        })
    }

    pub fn way(&self, id: OsmId) -> Result<&Way> {
        self.ways.get(&id).ok_or(Error::MissingElement {
            element_type: ElementType::Way,
            element_id: id,
        })
    }

    pub fn relation(&self, id: OsmId) -> Result<&Relation> {
        self.relations.get(&id).ok_or(Error::MissingElement {
            element_type: ElementType::Relation,
            element_id: id,
        })
    }

    pub fn coordinates(&self, node_ids: &[OsmId]) -> Result<Vec<LonLat>> {
        node_ids
            .iter()
            .map(|id| self.node(*id).map(LonLat::from))
            .collect()
    }

    /// Way members of `relation_id` carrying the requested role, in member order. Nested
    /// relations are expanded depth first; an inner sub-relation flips the roles of its own
    /// members.
    pub fn way_iterator(&self, relation_id: OsmId, inner: bool) -> Result<impl Iterator<Item = &Way>> {
        let ways = self.relation_ways(relation_id)?;
        Ok(if inner { ways.inner } else { ways.outer }.into_iter())
    }

    pub fn relation_ways(&self, relation_id: OsmId) -> Result<RelationWays> {
        let mut ways = RelationWays::default();
        let mut path: Vec<OsmId> = Vec::new();
        self.expand_relation(relation_id, false, &mut path, &mut ways)?;
        Ok(ways)
    }

    fn expand_relation<'a>(
        &'a self,
        relation_id: OsmId,
        inverted: bool,
        path: &mut Vec<OsmId>,
        ways: &mut RelationWays<'a>,
    ) -> Result<()> {
        if let Some(start) = path.iter().position(|id| *id == relation_id) {
            let mut cycle = path[start..].to_vec();
            cycle.push(relation_id);
            return Err(Error::MalformedRelationGraph { cycle });
        }
        let relation = self.relation(relation_id)?;
        path.push(relation_id);

        for (member, _role) in relation.iter() {
            let is_inner = match member.ring_role() {
                MemberRole::Outer => inverted,
                MemberRole::Inner => !inverted,
                MemberRole::Other => continue,
            };
            match member.element_type {
                ElementType::Way => {
                    let way = self.way(member.id)?;
                    if is_inner {
                        ways.inner.push(way);
                    } else {
                        ways.outer.push(way);
                    }
                },
                ElementType::Relation => {
                    self.expand_relation(member.id, is_inner, path, ways)?;
                },
                ElementType::Node => (),
            }
        }

        path.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utilities::MapBuilder;

    fn way_ids(ways: &[&Way]) -> Vec<OsmId> {
        ways.iter().map(|way| way.id).collect()
    }

    #[test]
    fn splits_members_by_role() {
        let data = MapBuilder::new()
            .way(1, &[1, 2])
            .way(2, &[3, 4])
            .way(3, &[5, 6])
            .way(4, &[7, 8])
            .relation(10, &[(ElementType::Way, 1, "outer"), (ElementType::Way, 2, "inner"),
                (ElementType::Way, 3, ""), (ElementType::Way, 4, "subarea"),
                (ElementType::Node, 1, "admin_centre")])
            .build();

        let ways = data.relation_ways(10).unwrap();
        assert_eq!(way_ids(&ways.outer), vec![1, 3]);
        assert_eq!(way_ids(&ways.inner), vec![2]);

        let inner: Vec<OsmId> = data.way_iterator(10, true).unwrap().map(|way| way.id).collect();
        assert_eq!(inner, vec![2]);
    }

    #[test]
    fn nested_relations_combine_roles() {
        let data = MapBuilder::new()
            .way(1, &[1, 2])
            .way(2, &[3, 4])
            .way(3, &[5, 6])
            .relation(20, &[(ElementType::Way, 2, "outer"), (ElementType::Way, 3, "inner")])
            .relation(10, &[(ElementType::Way, 1, "outer"), (ElementType::Relation, 20, "inner")])
            .relation(11, &[(ElementType::Relation, 20, "outer")])
            .build();

        let ways = data.relation_ways(10).unwrap();
        assert_eq!(way_ids(&ways.outer), vec![1, 3]);
        assert_eq!(way_ids(&ways.inner), vec![2]);

        let ways = data.relation_ways(11).unwrap();
        assert_eq!(way_ids(&ways.outer), vec![2]);
        assert_eq!(way_ids(&ways.inner), vec![3]);
    }

    #[test]
    fn relation_cycle_is_reported() {
        let data = MapBuilder::new()
            .way(1, &[1, 2])
            .relation(10, &[(ElementType::Way, 1, "outer"), (ElementType::Relation, 11, "outer")])
            .relation(11, &[(ElementType::Relation, 10, "outer")])
            .build();

        match data.relation_ways(10) {
            Err(Error::MalformedRelationGraph { cycle }) => assert_eq!(cycle, vec![10, 11, 10]),
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn shared_sub_relation_is_not_a_cycle() {
        let data = MapBuilder::new()
            .way(1, &[1, 2])
            .relation(20, &[(ElementType::Way, 1, "outer")])
            .relation(10, &[(ElementType::Relation, 20, "outer"), (ElementType::Relation, 20, "outer")])
            .build();

        assert_eq!(way_ids(&data.relation_ways(10).unwrap().outer), vec![1, 1]);
    }

    #[test]
    fn missing_member_is_an_error() {
        let data = MapBuilder::new()
            .relation(10, &[(ElementType::Way, 99, "outer")])
            .build();

        match data.relation_ways(10) {
            Err(Error::MissingElement { element_type, element_id }) => {
                assert_eq!((element_type, element_id), (ElementType::Way, 99));
            },
            other => panic!("expected a missing way, got {:?}", other),
        }
    }
}
