use std::io::Cursor;

use geojson::{feature::Id, Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};

use crate::data::geometry::{Document, Placemark, Polygon, Ring};
use crate::data::osm::{ElementType, OsmId, Tags};
use crate::errors::Result;

const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Kml,
    Geojson,
}

impl OutputFormat {
    pub fn file_name(&self) -> &'static str {
        match self {
            OutputFormat::Kml => "boundaries.kml",
            OutputFormat::Geojson => "boundaries.geojson",
        }
    }
}

impl Document {
    pub fn render(&self, format: OutputFormat) -> Result<Vec<u8>> {
        match format {
            OutputFormat::Kml => self.to_kml(),
            OutputFormat::Geojson => self.to_geojson(),
        }
    }

    pub fn to_kml(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut kml = BytesStart::new("kml");
        kml.push_attribute(("xmlns", KML_NAMESPACE));
        writer.write_event(Event::Start(kml))?;
        writer.write_event(Event::Start(BytesStart::new("Folder")))?;
        write_text_element(&mut writer, "name", &self.folder_name)?;
        for placemark in &self.placemarks {
            write_placemark(&mut writer, placemark)?;
        }
        writer.write_event(Event::End(BytesEnd::new("Folder")))?;
        writer.write_event(Event::End(BytesEnd::new("kml")))?;

        Ok(writer.into_inner().into_inner())
    }

    pub fn to_geojson(&self) -> Result<Vec<u8>> {
        let features = self.placemarks.iter().map(placemark_feature).collect();
        let collection = FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        };
        Ok(GeoJson::from(collection).to_string().into_bytes())
    }
}

/// Renders a single element as a KML document.
pub fn render(
    folder_name: &str,
    placemark_name: &str,
    element: (ElementType, OsmId),
    tags: &Tags,
    polygons: &[Polygon],
) -> Result<Vec<u8>> {
    let (element_type, element_id) = element;
    let document = Document {
        folder_name: folder_name.to_string(),
        placemarks: vec![Placemark {
            element_type,
            element_id,
            name: placemark_name.to_string(),
            tags: tags.clone(),
            polygons: polygons.to_vec(),
        }],
    };
    document.to_kml()
}

fn write_text_element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_placemark<W: std::io::Write>(writer: &mut Writer<W>, placemark: &Placemark) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("Placemark")))?;
    write_text_element(writer, "name", &placemark.name)?;

    // Tags is a BTreeMap, so this is sorted by key.
    writer.write_event(Event::Start(BytesStart::new("ExtendedData")))?;
    for (key, value) in &placemark.tags {
        let mut data = BytesStart::new("Data");
        data.push_attribute(("name", key.as_str()));
        writer.write_event(Event::Start(data))?;
        write_text_element(writer, "value", value)?;
        writer.write_event(Event::End(BytesEnd::new("Data")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("ExtendedData")))?;

    writer.write_event(Event::Start(BytesStart::new("MultiGeometry")))?;
    for polygon in &placemark.polygons {
        writer.write_event(Event::Start(BytesStart::new("Polygon")))?;
        write_boundary(writer, "outerBoundaryIs", &polygon.outer)?;
        for inner in &polygon.inner {
            write_boundary(writer, "innerBoundaryIs", inner)?;
        }
        writer.write_event(Event::End(BytesEnd::new("Polygon")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("MultiGeometry")))?;

    writer.write_event(Event::End(BytesEnd::new("Placemark")))?;
    Ok(())
}

fn write_boundary<W: std::io::Write>(writer: &mut Writer<W>, name: &str, ring: &Ring) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Start(BytesStart::new("LinearRing")))?;
    write_text_element(writer, "coordinates", &kml_coordinates(ring))?;
    writer.write_event(Event::End(BytesEnd::new("LinearRing")))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn kml_coordinates(ring: &Ring) -> String {
    ring.points()
        .iter()
        .map(|pt| format!("{},{},0", pt.lon, pt.lat))
        .collect::<Vec<_>>()
        .join(" ")
}

fn ring_positions(ring: &Ring) -> Vec<Vec<f64>> {
    ring.points().iter().map(|pt| vec![pt.lon, pt.lat]).collect()
}

fn placemark_feature(placemark: &Placemark) -> Feature {
    let multipolygon = placemark
        .polygons
        .iter()
        .map(|polygon| {
            std::iter::once(&polygon.outer)
                .chain(polygon.inner.iter())
                .map(ring_positions)
                .collect()
        })
        .collect();

    let mut properties = JsonObject::new();
    properties.insert("name".to_string(), placemark.name.clone().into());
    properties.insert("osm_type".to_string(), placemark.element_type.as_str().into());
    properties.insert("osm_id".to_string(), placemark.element_id.into());
    let tags: JsonObject = placemark
        .tags
        .iter()
        .map(|(k, v)| (k.clone(), v.clone().into()))
        .collect();
    properties.insert("tags".to_string(), tags.into());

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::MultiPolygon(multipolygon))),
        id: Some(Id::String(format!("{}/{}", placemark.element_type, placemark.element_id))),
        properties: Some(properties),
        foreign_members: None,
    }
}
