use crate::data::geometry::{LonLat, Ring};
use crate::data::osm::{ElementType, Member, Node, OsmId, Relation, Tags, Way};
use crate::data::OsmMapData;

/// Axis-aligned square ring, counter-clockwise from the lower-left corner.
pub fn square(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Ring {
    let points = vec![
        LonLat::new(min_lon, min_lat),
        LonLat::new(max_lon, min_lat),
        LonLat::new(max_lon, max_lat),
        LonLat::new(min_lon, max_lat),
        LonLat::new(min_lon, min_lat),
    ];
    Ring::new(vec![0], points).unwrap()
}

#[derive(Default)]
pub struct MapBuilder {
    data: OsmMapData,
}

impl MapBuilder {
    pub fn new() -> MapBuilder {
        MapBuilder::default()
    }

    pub fn node(mut self, id: OsmId, lon: f64, lat: f64) -> MapBuilder {
        self.data.nodes.insert(id, Node { id, lon, lat, tags: Tags::new() });
        self
    }

    pub fn way(mut self, id: OsmId, nodes: &[OsmId]) -> MapBuilder {
        self.data.ways.insert(id, Way::new(id, nodes.to_vec()));
        self
    }

    pub fn relation(self, id: OsmId, members: &[(ElementType, OsmId, &str)]) -> MapBuilder {
        self.tagged_relation(id, members, &[])
    }

    pub fn tagged_relation(
        mut self,
        id: OsmId,
        members: &[(ElementType, OsmId, &str)],
        tags: &[(&str, &str)],
    ) -> MapBuilder {
        let members = members
            .iter()
            .map(|(element_type, member_id, role)| Member {
                element_type: *element_type,
                id: *member_id,
                role: role.to_string(),
            })
            .collect();
        self.data.relations.insert(id, Relation { id, members, tags: to_tags(tags) });
        self
    }

    pub fn build(self) -> OsmMapData {
        self.data
    }
}

fn to_tags(tags: &[(&str, &str)]) -> Tags {
    tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}
