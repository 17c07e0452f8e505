//! Character entity - Player characters and NPCs
//!
//! Inventory and storylines are links: deleting a character never deletes the
//! items it carries or the arcs it takes part in.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ids::ObjId;
use crate::object::domain_object;
use crate::registry::CHARACTER;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    #[serde(default)]
    pub obj_id: ObjId,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub is_player: bool,
    /// Ability scores (e.g., "strength" -> 14)
    #[serde(default)]
    pub attributes: BTreeMap<String, i64>,
    #[serde(default)]
    pub skills: BTreeMap<String, i64>,
    /// Items this character carries
    #[serde(default)]
    pub inventory: BTreeSet<ObjId>,
    /// Arcs this character takes part in
    #[serde(default)]
    pub storylines: BTreeSet<ObjId>,
}

impl Character {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            obj_id: ObjId::draft(CHARACTER.prefix),
            name: name.into(),
            description: description.into(),
            is_player: false,
            attributes: BTreeMap::new(),
            skills: BTreeMap::new(),
            inventory: BTreeSet::new(),
            storylines: BTreeSet::new(),
        }
    }

    pub fn player(mut self) -> Self {
        self.is_player = true;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: i64) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn with_skill(mut self, name: impl Into<String>, value: i64) -> Self {
        self.skills.insert(name.into(), value);
        self
    }

    pub fn carrying(mut self, item: ObjId) -> Self {
        self.inventory.insert(item);
        self
    }
}

domain_object!(Character, CHARACTER);
