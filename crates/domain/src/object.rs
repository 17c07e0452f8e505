//! The shape every persisted domain type shares.
//!
//! Typed objects cross into the persistence layer as [`Document`]s (JSON
//! objects produced by serde). The registry descriptor then decides which keys
//! are columns, map entries, owned children or links.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::DomainError;
use crate::ids::ObjId;
use crate::registry::TypeDescriptor;

/// Untyped form of a domain object.
pub type Document = Map<String, Value>;

/// Key under which every document carries its identity.
pub const OBJ_ID_KEY: &str = "obj_id";

/// A concrete type with a registry entry.
pub trait DomainObject:
    Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync + 'static
{
    fn descriptor() -> &'static TypeDescriptor;

    fn obj_id(&self) -> &ObjId;

    fn set_obj_id(&mut self, id: ObjId);

    fn prefix() -> &'static str {
        Self::descriptor().prefix
    }

    fn to_document(&self) -> Result<Document, DomainError> {
        match serde_json::to_value(self)? {
            Value::Object(mut doc) => {
                let id = document_obj_id(&doc, Self::descriptor())?;
                set_document_obj_id(&mut doc, &id);
                Ok(doc)
            }
            other => Err(DomainError::validation(format!(
                "{} serialized to a non-object value: {other}",
                Self::descriptor().type_name
            ))),
        }
    }

    fn from_document(doc: Document) -> Result<Self, DomainError> {
        let id = document_obj_id(&doc, Self::descriptor())?;
        let mut object: Self = serde_json::from_value(Value::Object(doc))?;
        object.set_obj_id(id);
        Ok(object)
    }

    fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Object(doc) => Self::from_document(doc),
            other => Err(DomainError::validation(format!(
                "expected a JSON object for {}, got {other}",
                Self::descriptor().type_name
            ))),
        }
    }
}

/// Read the identity of a document, treating a missing or blank `obj_id` as a
/// draft of the descriptor's type.
pub fn document_obj_id(doc: &Document, descriptor: &TypeDescriptor) -> Result<ObjId, DomainError> {
    let id = match doc.get(OBJ_ID_KEY) {
        None | Some(Value::Null) => ObjId::draft(descriptor.prefix),
        Some(value) => {
            let mut id: ObjId = serde_json::from_value(value.clone()).map_err(|e| {
                DomainError::validation(format!(
                    "{}.{OBJ_ID_KEY} is malformed: {e}",
                    descriptor.type_name
                ))
            })?;
            if id.prefix.is_empty() && !id.is_assigned() {
                id.prefix = descriptor.prefix.to_string();
            }
            id
        }
    };

    if id.prefix != descriptor.prefix {
        return Err(DomainError::validation(format!(
            "{} carries identifier {id}, expected prefix {}",
            descriptor.type_name, descriptor.prefix
        )));
    }
    Ok(id)
}

pub fn set_document_obj_id(doc: &mut Document, id: &ObjId) {
    doc.insert(OBJ_ID_KEY.to_string(), obj_id_value(id));
}

pub fn obj_id_value(id: &ObjId) -> Value {
    let mut map = Map::new();
    map.insert("prefix".to_string(), Value::String(id.prefix.clone()));
    map.insert("numeric".to_string(), Value::from(id.numeric));
    Value::Object(map)
}

/// Implements [`DomainObject`] for a struct with a public `obj_id` field.
macro_rules! domain_object {
    ($ty:ty, $descriptor:path) => {
        impl $crate::object::DomainObject for $ty {
            fn descriptor() -> &'static $crate::registry::TypeDescriptor {
                &$descriptor
            }

            fn obj_id(&self) -> &$crate::ids::ObjId {
                &self.obj_id
            }

            fn set_obj_id(&mut self, id: $crate::ids::ObjId) {
                self.obj_id = id;
            }
        }
    };
}

pub(crate) use domain_object;
