//! Story structure - Arcs are made of Segments, Segments reference Points
//!
//! A Segment is addressable on its own, but an Arc also owns a list of
//! Segments by value. Segments inside an Arc are replaced and deleted together
//! with the Arc.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::ObjId;
use crate::object::domain_object;
use crate::registry::{ARC, POINT, SEGMENT};

/// A single beat of the story, tied to the objectives it advances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub obj_id: ObjId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub objectives: BTreeSet<ObjId>,
}

impl Point {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            obj_id: ObjId::draft(POINT.prefix),
            title: title.into(),
            description: description.into(),
            objectives: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub obj_id: ObjId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub points: BTreeSet<ObjId>,
}

impl Segment {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            obj_id: ObjId::draft(SEGMENT.prefix),
            title: title.into(),
            description: description.into(),
            points: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    #[serde(default)]
    pub obj_id: ObjId,
    pub title: String,
    pub description: String,
    /// Owned segments, in story order
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl Arc {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            obj_id: ObjId::draft(ARC.prefix),
            title: title.into(),
            description: description.into(),
            segments: Vec::new(),
        }
    }

    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }
}

domain_object!(Point, POINT);
domain_object!(Segment, SEGMENT);
domain_object!(Arc, ARC);

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::object::DomainObject;

    #[test]
    fn arc_document_nests_segments_by_value() {
        let arc = Arc::new("The Heist", "Rob the vault")
            .with_segment(Segment::new("Casing", "Scout the bank"));
        let doc = arc.to_document().expect("document");
        assert_eq!(doc["segments"][0]["title"], json!("Casing"));
        assert_eq!(
            doc["segments"][0]["obj_id"],
            json!({"prefix": "S", "numeric": 0})
        );
    }

    #[test]
    fn segment_without_points_deserializes() {
        let segment =
            Segment::from_value(json!({"title": "t", "description": "d"})).expect("segment");
        assert!(segment.points.is_empty());
        assert_eq!(segment.obj_id, ObjId::draft("S"));
    }

    #[test]
    fn point_rejects_missing_title() {
        let err = Point::from_value(json!({"description": "d"})).expect_err("missing title");
        assert!(err.to_string().contains("title"));
    }
}
