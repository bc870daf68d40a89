use std::{convert::Infallible, fmt, io, num::{ParseFloatError, ParseIntError}, str::Utf8Error};
use quick_xml::events::attributes::AttrError;

use crate::data::geometry::Failure;
use crate::data::osm::{ElementType, OsmId};

#[derive(Debug)]
pub enum Error {
    /// A requested element could not be assembled into closed rings.
    UnclosedBoundary(Failure),
    /// Only ways and relations describe areas.
    UnsupportedElementType(ElementType),
    /// A ring reached geometry construction without being closed or with fewer than 3
    /// distinct points.
    MalformedRing {
        way_ids: Vec<OsmId>,
        distinct_points: usize,
    },
    /// Relation members loop back onto a relation that is still being expanded.
    MalformedRelationGraph {
        cycle: Vec<OsmId>,
    },
    MissingElement {
        element_type: ElementType,
        element_id: OsmId,
    },
    Message(String),
}

impl Error {
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Error::UnclosedBoundary(failure) => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnclosedBoundary(failure) => write!(
                f,
                "{} {} has {} unclosed fragment(s): {:?}",
                failure.element_type,
                failure.element_id,
                failure.unclosed_fragment_count(),
                failure.unclosed_fragment_ids,
            ),
            Error::UnsupportedElementType(element_type) => {
                write!(f, "Cannot build a boundary from a {}", element_type)
            },
            Error::MalformedRing { way_ids, distinct_points } => write!(
                f,
                "Ring from ways {:?} has {} distinct points or is not closed",
                way_ids, distinct_points,
            ),
            Error::MalformedRelationGraph { cycle } => {
                write!(f, "Relation members form a cycle: {:?}", cycle)
            },
            Error::MissingElement { element_type, element_id } => {
                write!(f, "{} {} is not in the loaded data", element_type, element_id)
            },
            Error::Message(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::Message(value.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(value: quick_xml::Error) -> Self {
        Error::Message(value.to_string())
    }
}

impl From<ParseFloatError> for Error {
    fn from(value: ParseFloatError) -> Self {
        Error::Message(value.to_string())
    }
}

impl From<ParseIntError> for Error {
    fn from(value: ParseIntError) -> Self {
        Error::Message(value.to_string())
    }
}

impl From<AttrError> for Error {
    fn from(value: AttrError) -> Self {
        Error::Message(value.to_string())
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Error::Message(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Message(value.to_string())
    }
}

impl From<Infallible> for Error {
    fn from(value: Infallible) -> Self {
        match value {}
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Message(value.to_string())
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Message(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
