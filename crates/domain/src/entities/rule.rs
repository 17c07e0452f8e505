//! Rule entity - A house rule or mechanic the game master applies at the table

use serde::{Deserialize, Serialize};

use crate::ids::ObjId;
use crate::object::domain_object;
use crate::registry::RULE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub obj_id: ObjId,
    pub description: String,
    pub effect: String,
    /// Ordered tags the rule applies to (e.g., "fire", "melee")
    #[serde(default)]
    pub components: Vec<String>,
}

impl Rule {
    pub fn new(description: impl Into<String>, effect: impl Into<String>) -> Self {
        Self {
            obj_id: ObjId::draft(RULE.prefix),
            description: description.into(),
            effect: effect.into(),
            components: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.components.push(component.into());
        self
    }
}

domain_object!(Rule, RULE);

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::object::DomainObject;

    #[test]
    fn new_rule_is_a_draft() {
        let rule = Rule::new("Fire damage", "+2 dmg").with_component("fire");
        assert_eq!(rule.obj_id, ObjId::draft("R"));
        assert_eq!(rule.components, vec!["fire".to_string()]);
    }

    #[test]
    fn deserializes_without_obj_id_or_components() {
        let rule = Rule::from_value(json!({"description": "d", "effect": "e"})).expect("rule");
        assert!(rule.components.is_empty());
        assert!(!rule.obj_id.is_assigned());
    }

    #[test]
    fn document_carries_prefixed_obj_id() {
        let mut rule = Rule::new("d", "e");
        rule.set_obj_id(ObjId::new("R", 1));
        let doc = rule.to_document().expect("document");
        assert_eq!(doc["obj_id"], json!({"prefix": "R", "numeric": 1}));
        assert_eq!(doc["components"], json!([]));
    }
}
