//! Item entity - Objects that can be carried by characters
//!
//! Possession lives on the character side (`Character::inventory`), so an item
//! survives its holder being deleted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::ObjId;
use crate::object::domain_object;
use crate::registry::ITEM;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub obj_id: ObjId,
    pub name: String,
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    /// Free-form properties (e.g., "damage" -> "1d6")
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

fn default_quantity() -> i64 {
    1
}

impl Item {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            obj_id: ObjId::draft(ITEM.prefix),
            name: name.into(),
            description: description.into(),
            quantity: default_quantity(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

domain_object!(Item, ITEM);

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::object::DomainObject;

    #[test]
    fn quantity_defaults_to_one() {
        let item = Item::from_value(json!({"name": "Rope", "description": "50ft"})).expect("item");
        assert_eq!(item.quantity, 1);
        assert!(item.properties.is_empty());
    }

    #[test]
    fn properties_keep_unique_keys() {
        let item = Item::new("Sword", "Sharp")
            .with_property("damage", "1d6")
            .with_property("damage", "1d8");
        assert_eq!(item.properties.len(), 1);
        assert_eq!(item.properties["damage"], "1d8");
    }
}
