use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::Error;

pub type OsmId = i64;

/// Free-form OSM tags. Kept in a BTreeMap so every consumer sees them sorted by key.
pub type Tags = BTreeMap<String, String>;

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Serialize, Deserialize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Node,
    Way,
    Relation,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Node => "node",
            ElementType::Way => "way",
            ElementType::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" | "n" => Ok(ElementType::Node),
            "way" | "w" => Ok(ElementType::Way),
            "relation" | "r" => Ok(ElementType::Relation),
            _ => Err(format!("Unknown element type {:?}", s).into()),
        }
    }
}

/// Anything addressable by (type, id) that carries tags.
pub trait OsmElement {
    fn element_type(&self) -> ElementType;
    fn id(&self) -> OsmId;
    fn tags(&self) -> &Tags;

    fn get_name(&self) -> String {
        match self.tags().get("name") {
            Some(name) => name.clone(),
            None => format!("Unknown name for {} with ID {}", self.element_type(), self.id()),
        }
    }

    fn name_id_tuple(&self) -> (ElementType, OsmId) {
        (self.element_type(), self.id())
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub struct Node {
    pub id: OsmId,
    pub lon: f64,
    pub lat: f64,
    pub tags: Tags,
}

impl OsmElement for Node {
    fn element_type(&self) -> ElementType {
        ElementType::Node
    }

    fn id(&self) -> OsmId {
        self.id
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq, Default)]
pub struct Way {
    pub id: OsmId,
    pub nodes: Vec<OsmId>,
    pub tags: Tags,
}

impl Way {
    pub fn new(id: OsmId, nodes: Vec<OsmId>) -> Way {
        Way {
            id,
            nodes,
            tags: Tags::new(),
        }
    }

    pub fn first_node(&self) -> Option<OsmId> {
        self.nodes.first().copied()
    }

    pub fn last_node(&self) -> Option<OsmId> {
        self.nodes.last().copied()
    }

    pub fn distinct_node_count(&self) -> usize {
        self.nodes.iter().collect::<HashSet<_>>().len()
    }

    /// A way only describes a ring when its ends meet and it visits at least 3 distinct nodes.
    pub fn closed(&self) -> bool {
        match (self.first_node(), self.last_node()) {
            (Some(first), Some(last)) => first == last && self.distinct_node_count() >= 3,
            _ => false,
        }
    }
}

impl OsmElement for Way {
    fn element_type(&self) -> ElementType {
        ElementType::Way
    }

    fn id(&self) -> OsmId {
        self.id
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub struct Member {
    pub element_type: ElementType,
    pub id: OsmId,
    pub role: String,
}

/// How a member participates in a multipolygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRole {
    Outer,
    Inner,
    /// `subarea`, `admin_centre`, `label` and friends carry no ring geometry.
    Other,
}

impl Member {
    pub fn ring_role(&self) -> MemberRole {
        match self.role.as_str() {
            "" | "outer" => MemberRole::Outer,
            "inner" => MemberRole::Inner,
            _ => MemberRole::Other,
        }
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq, Default)]
pub struct Relation {
    pub id: OsmId,
    pub members: Vec<Member>,
    pub tags: Tags,
}

impl Relation {
    /// Yields `(member, role)` in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&Member, &str)> {
        self.members.iter().map(|member| (member, member.role.as_str()))
    }
}

impl OsmElement for Relation {
    fn element_type(&self) -> ElementType {
        ElementType::Relation
    }

    fn id(&self) -> OsmId {
        self.id
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_requires_three_distinct_nodes() {
        assert!(Way::new(1, vec![1, 2, 3, 1]).closed());
        assert!(!Way::new(1, vec![1, 2, 3]).closed());
        assert!(!Way::new(1, vec![1, 2, 1]).closed());
        assert!(!Way::new(1, vec![1, 1]).closed());
        assert!(!Way::new(1, vec![]).closed());
    }

    #[test]
    fn name_falls_back_to_type_and_id() {
        let mut way = Way::new(42, vec![1, 2, 3, 1]);
        assert_eq!(way.get_name(), "Unknown name for way with ID 42");

        way.tags.insert("name".to_string(), "Fife".to_string());
        assert_eq!(way.get_name(), "Fife");
        assert_eq!(way.name_id_tuple(), (ElementType::Way, 42));
    }

    #[test]
    fn member_roles() {
        let member = |role: &str| Member {
            element_type: ElementType::Way,
            id: 1,
            role: role.to_string(),
        };
        assert_eq!(member("").ring_role(), MemberRole::Outer);
        assert_eq!(member("outer").ring_role(), MemberRole::Outer);
        assert_eq!(member("inner").ring_role(), MemberRole::Inner);
        assert_eq!(member("subarea").ring_role(), MemberRole::Other);
    }

    #[test]
    fn element_type_parses_short_and_long_names() {
        assert_eq!("relation".parse::<ElementType>().unwrap(), ElementType::Relation);
        assert_eq!("w".parse::<ElementType>().unwrap(), ElementType::Way);
        assert!("area".parse::<ElementType>().is_err());
    }
}
