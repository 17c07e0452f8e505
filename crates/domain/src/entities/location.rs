//! Location entity - Places in the campaign world
//!
//! Neighbours are a self-referential link. A location may list itself, and two
//! locations may list each other.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::ObjId;
use crate::object::domain_object;
use crate::registry::LOCATION;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub obj_id: ObjId,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub neighboring_locations: BTreeSet<ObjId>,
    /// Characters usually found here
    #[serde(default)]
    pub characters: BTreeSet<ObjId>,
}

impl Location {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            obj_id: ObjId::draft(LOCATION.prefix),
            name: name.into(),
            description: description.into(),
            neighboring_locations: BTreeSet::new(),
            characters: BTreeSet::new(),
        }
    }

    pub fn next_to(mut self, neighbor: ObjId) -> Self {
        self.neighboring_locations.insert(neighbor);
        self
    }
}

domain_object!(Location, LOCATION);
