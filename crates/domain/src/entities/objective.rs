//! Objective entity - Something the party is trying to achieve

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::ObjId;
use crate::object::domain_object;
use crate::registry::OBJECTIVE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    #[serde(default)]
    pub obj_id: ObjId,
    pub description: String,
    #[serde(default)]
    pub completion_condition: Option<String>,
    /// Objectives that must be completed first. May form cycles.
    #[serde(default)]
    pub prerequisites: BTreeSet<ObjId>,
}

impl Objective {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            obj_id: ObjId::draft(OBJECTIVE.prefix),
            description: description.into(),
            completion_condition: None,
            prerequisites: BTreeSet::new(),
        }
    }

    pub fn with_completion_condition(mut self, condition: impl Into<String>) -> Self {
        self.completion_condition = Some(condition.into());
        self
    }

    pub fn requires(mut self, prerequisite: ObjId) -> Self {
        self.prerequisites.insert(prerequisite);
        self
    }
}

domain_object!(Objective, OBJECTIVE);

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::object::DomainObject;

    #[test]
    fn prerequisites_serialize_as_sorted_obj_ids() {
        let objective = Objective::new("Find the key")
            .requires(ObjId::new("O", 3))
            .requires(ObjId::new("O", 1));
        let doc = objective.to_document().expect("document");
        assert_eq!(
            doc["prerequisites"],
            json!([{"prefix": "O", "numeric": 1}, {"prefix": "O", "numeric": 3}])
        );
        assert_eq!(doc["completion_condition"], json!(null));
    }

    #[test]
    fn rejects_foreign_obj_id() {
        let err = Objective::from_value(json!({
            "obj_id": {"prefix": "R", "numeric": 1},
            "description": "x"
        }))
        .expect_err("wrong prefix");
        assert!(err.to_string().contains("expected prefix O"));
    }
}
