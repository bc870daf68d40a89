use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::config::UserConfig;
use crate::data::osm::{Member, Node, Relation, Tags, Way};
use crate::data::OsmMapData;
use crate::errors::{Error, Result};

use super::Etl;

pub const ETL_NAME: &str = "parse_osm";
pub const OUTPUT_FILE_NAME: &str = "osm_elements.rkyv";

/// The element currently open in the document, waiting for its children.
enum ParserState {
    Top,
    Node(Node),
    Way(Way),
    Relation(Relation),
}

fn attribute(el: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        if attribute.key.as_ref() == key {
            return Ok(Some(attribute.unescape_value()?.to_string()));
        }
    }
    Ok(None)
}

fn required<T>(el: &BytesStart, key: &[u8]) -> Result<T>
where
    T: FromStr,
    Error: From<T::Err>,
{
    match attribute(el, key)? {
        Some(value) => Ok(value.parse()?),
        None => Err(format!(
            "<{}> is missing attribute {:?}",
            String::from_utf8_lossy(el.name().as_ref()),
            String::from_utf8_lossy(key),
        ).into()),
    }
}

fn parse_node(el: &BytesStart) -> Result<Node> {
    Ok(Node {
        id: required(el, b"id")?,
        lat: required(el, b"lat")?,
        lon: required(el, b"lon")?,
        tags: Tags::new(),
    })
}

fn parse_member(el: &BytesStart) -> Result<Member> {
    Ok(Member {
        element_type: required(el, b"type")?,
        id: required(el, b"ref")?,
        role: attribute(el, b"role")?.unwrap_or_default(),
    })
}

impl ParserState {
    fn open(el: &BytesStart) -> Result<ParserState> {
        Ok(match el.name().as_ref() {
            b"node" => ParserState::Node(parse_node(el)?),
            b"way" => ParserState::Way(Way {
                id: required(el, b"id")?,
                ..Way::default()
            }),
            b"relation" => ParserState::Relation(Relation {
                id: required(el, b"id")?,
                ..Relation::default()
            }),
            _ => ParserState::Top,
        })
    }

    /// Handles `<tag>`, `<nd>` and `<member>` inside the open element.
    fn child(&mut self, el: &BytesStart) -> Result<()> {
        match (el.name().as_ref(), self) {
            (b"tag", ParserState::Node(Node { tags, .. }))
            | (b"tag", ParserState::Way(Way { tags, .. }))
            | (b"tag", ParserState::Relation(Relation { tags, .. })) => {
                tags.insert(required(el, b"k")?, required(el, b"v")?);
            },
            (b"nd", ParserState::Way(way)) => way.nodes.push(required(el, b"ref")?),
            (b"member", ParserState::Relation(relation)) => relation.members.push(parse_member(el)?),
            _ => (),
        }
        Ok(())
    }

    fn close(self, data: &mut OsmMapData) {
        match self {
            ParserState::Top => (),
            ParserState::Node(node) => {
                data.nodes.insert(node.id, node);
            },
            ParserState::Way(way) => {
                data.ways.insert(way.id, way);
            },
            ParserState::Relation(relation) => {
                data.relations.insert(relation.id, relation);
            },
        }
    }

    fn is_top(&self) -> bool {
        matches!(self, ParserState::Top)
    }
}

/// Reads an OSM XML document (`<osm>` with nodes, ways and relations) into memory. Anything
/// other than those three element kinds and their children is skipped.
pub fn parse_osm<R: BufRead>(source: R) -> Result<OsmMapData> {
    let mut reader = Reader::from_reader(source);
    reader.trim_text(true);
    parse_events(&mut reader)
}

pub fn parse_osm_str(xml: &str) -> Result<OsmMapData> {
    parse_osm(xml.as_bytes())
}

fn parse_events<R: BufRead>(reader: &mut Reader<R>) -> Result<OsmMapData> {
    let mut buf = Vec::new();
    let mut data = OsmMapData::default();
    let mut state = ParserState::Top;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                if state.is_top() {
                    state = ParserState::open(&e)?;
                } else {
                    state.child(&e)?;
                }
            },
            Event::Empty(e) => {
                if state.is_top() {
                    ParserState::open(&e)?.close(&mut data);
                } else {
                    state.child(&e)?;
                }
            },
            Event::End(e) => {
                if matches!(e.name().as_ref(), b"node" | b"way" | b"relation") {
                    std::mem::replace(&mut state, ParserState::Top).close(&mut data);
                }
            },
            // Declarations, comments, and stray text carry nothing we need.
            _ => (),
        }
        // if we don't keep a borrow elsewhere, we can clear the buffer to keep memory usage low
        buf.clear();
    }

    let unresolved = data
        .ways
        .values()
        .flat_map(|way| way.nodes.iter())
        .filter(|id| !data.nodes.contains_key(*id))
        .count();
    if unresolved > 0 {
        warn!(count = unresolved; "Ways refer to nodes missing from the document");
    }
    Ok(data)
}

pub fn open_osm_file(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = fs::File::open(path)
        .map_err(|err| format!("Could not open {}: {}", path.display(), err))?;
    let file_reader = BufReader::new(file);
    if path.extension().is_some_and(|ext| ext == "xz") {
        Ok(Box::new(BufReader::new(XzDecoder::new(file_reader))))
    } else {
        Ok(Box::new(file_reader))
    }
}

pub fn output_path(dir: &Path) -> PathBuf {
    dir.join(OUTPUT_FILE_NAME)
}

/// Reads the element tables written by a previous run of [`ParseOsmEtl`].
pub fn load_cached(dir: &Path) -> Result<OsmMapData> {
    let mut input_file = fs::File::open(output_path(dir))?;
    let mut buf_vec: Vec<u8> = Vec::new();
    input_file.read_to_end(&mut buf_vec)?;

    let mut aligned = rkyv::AlignedVec::with_capacity(buf_vec.len());
    aligned.extend_from_slice(&buf_vec);
    // The file is only ever produced by `ParseOsmEtl::load` from the same type.
    let data: OsmMapData = unsafe {
        rkyv::from_bytes_unchecked(&aligned)
            .map_err(|err| format!("Could not deserialize element cache: {}", err))?
    };
    Ok(data)
}

pub struct ParseOsmEtl {
    data_path: PathBuf,
}

impl ParseOsmEtl {
    pub fn new(config: &UserConfig) -> ParseOsmEtl {
        ParseOsmEtl {
            data_path: PathBuf::from(&config.data_path),
        }
    }
}

impl Etl for ParseOsmEtl {
    type Input = Box<dyn BufRead>;
    type Output = OsmMapData;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        if self.is_cached(dir)? {
            fs::remove_file(output_path(dir))?;
        }
        Ok(())
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        open_osm_file(&self.data_path)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let data = parse_osm(input)?;
        info!(
            nodes = data.nodes.len(),
            ways = data.ways.len(),
            relations = data.relations.len();
            "Parsed OSM elements"
        );
        Ok(data)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let bytes = rkyv::to_bytes::<_, 256>(&output)
            .map_err(|err| format!("Could not serialize elements: {}", err))?;
        let mut output_file = fs::File::create(output_path(dir))?;
        output_file.write_all(&bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::data::osm::{ElementType, OsmElement, OsmId};

    pub const OSM_SAMPLE: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<osm version="0.6" generator="test">
  <bounds minlat="0" minlon="0" maxlat="1" maxlon="1"/>
  <node id="1" lat="0.0" lon="0.0" version="3" user="someone"/>
  <node id="2" lat="0.0" lon="1.0"/>
  <node id="3" lat="1.0" lon="1.0">
    <tag k="place" v="village"/>
  </node>
  <node id="4" lat="1.0" lon="0.0"/>
  <way id="10">
    <nd ref="1"/>
    <nd ref="2"/>
    <nd ref="3"/>
    <tag k="boundary" v="administrative"/>
  </way>
  <way id="11">
    <nd ref="3"/>
    <nd ref="4"/>
    <nd ref="1"/>
  </way>
  <relation id="100">
    <member type="way" ref="10" role="outer"/>
    <member type="way" ref="11" role=""/>
    <member type="node" ref="3" role="admin_centre"/>
    <tag k="name" v="Fife &amp; Kinross"/>
    <tag k="type" v="boundary"/>
  </relation>
</osm>
"#;

    #[test]
    fn parses_nodes_ways_and_relations() {
        let data = parse_osm_str(OSM_SAMPLE).unwrap();

        assert_eq!(data.nodes.len(), 4);
        assert_eq!(data.nodes[&2].lon, 1.0);
        assert_eq!(data.nodes[&3].tags["place"], "village");

        assert_eq!(data.ways[&10].nodes, vec![1, 2, 3]);
        assert_eq!(data.ways[&10].tags["boundary"], "administrative");
        assert_eq!(data.ways[&11].nodes, vec![3, 4, 1]);

        let relation = &data.relations[&100];
        assert_eq!(relation.get_name(), "Fife & Kinross");
        let members: Vec<(ElementType, OsmId, &str)> = relation
            .iter()
            .map(|(member, role)| (member.element_type, member.id, role))
            .collect();
        assert_eq!(
            members,
            vec![
                (ElementType::Way, 10, "outer"),
                (ElementType::Way, 11, ""),
                (ElementType::Node, 3, "admin_centre"),
            ]
        );
    }

    #[test]
    fn missing_coordinates_are_an_error() {
        let xml = r#"<osm><node id="1" lat="0.0"/></osm>"#;
        assert!(parse_osm_str(xml).is_err());
    }

    #[test]
    fn etl_writes_and_reads_back_the_cache() {
        let dir = tempdir().unwrap();
        let data_path = dir.path().join("sample.osm");
        fs::write(&data_path, OSM_SAMPLE).unwrap();

        let mut etl = ParseOsmEtl { data_path };
        assert!(!etl.is_cached(dir.path()).unwrap());
        etl.process(dir.path(), false).unwrap();
        assert!(etl.is_cached(dir.path()).unwrap());

        let data = load_cached(dir.path()).unwrap();
        assert_eq!(data.ways[&11].nodes, vec![3, 4, 1]);
        assert_eq!(data.relations[&100].members.len(), 3);

        etl.clean(dir.path()).unwrap();
        assert!(!etl.is_cached(dir.path()).unwrap());
    }

    #[test]
    fn reads_xz_compressed_dumps() {
        let dir = tempdir().unwrap();
        let data_path = dir.path().join("sample.osm.xz");
        let mut encoder = xz::write::XzEncoder::new(fs::File::create(&data_path).unwrap(), 6);
        encoder.write_all(OSM_SAMPLE.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let data = parse_osm(open_osm_file(&data_path).unwrap()).unwrap();
        assert_eq!(data.relations.len(), 1);
    }
}
