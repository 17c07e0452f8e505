//! Conversion between document values and SQL values.

use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite};
use taleweaver_domain::object::obj_id_value;
use taleweaver_domain::{
    Document, LinkField, MapField, MapValueKind, ObjId, ScalarField, ScalarKind, TypeDescriptor,
};

use crate::infrastructure::ports::RepoError;

/// A value bound into a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    Integer(i64),
    Real(f64),
    Bool(bool),
}

pub fn bind<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Text(v) => query.bind(v),
        SqlValue::Integer(v) => query.bind(v),
        SqlValue::Real(v) => query.bind(v),
        SqlValue::Bool(v) => query.bind(v),
    }
}

pub fn numeric_to_sql(numeric: u64) -> Result<i64, RepoError> {
    i64::try_from(numeric)
        .map_err(|_| RepoError::validation(format!("numeric {numeric} is out of range")))
}

pub fn numeric_from_sql(numeric: i64) -> Result<u64, RepoError> {
    u64::try_from(numeric)
        .map_err(|_| RepoError::serialization(format!("stored numeric {numeric} is negative")))
}

fn shape_error(descriptor: &TypeDescriptor, field: &str, expected: &str) -> RepoError {
    RepoError::validation(format!("{}.{field} must be {expected}", descriptor.type_name))
}

/// Read a scalar field from a document. Missing optional text is `NULL`;
/// any other missing field is a validation error.
pub fn encode_scalar(
    descriptor: &TypeDescriptor,
    doc: &Document,
    field: &ScalarField,
) -> Result<SqlValue, RepoError> {
    let value = doc.get(field.name).unwrap_or(&Value::Null);
    let err = |expected: &str| shape_error(descriptor, field.name, expected);

    match field.kind {
        ScalarKind::Text => value
            .as_str()
            .map(|s| SqlValue::Text(Some(s.to_string())))
            .ok_or_else(|| err("a string")),
        ScalarKind::OptionalText => match value {
            Value::Null => Ok(SqlValue::Text(None)),
            Value::String(s) => Ok(SqlValue::Text(Some(s.clone()))),
            _ => Err(err("a string or null")),
        },
        ScalarKind::Integer => value
            .as_i64()
            .map(SqlValue::Integer)
            .ok_or_else(|| err("an integer")),
        ScalarKind::Real => value
            .as_f64()
            .map(SqlValue::Real)
            .ok_or_else(|| err("a number")),
        ScalarKind::Bool => value
            .as_bool()
            .map(SqlValue::Bool)
            .ok_or_else(|| err("a boolean")),
        ScalarKind::TextList => {
            let items = match value {
                Value::Null => Vec::new(),
                Value::Array(items) => items.clone(),
                _ => return Err(err("a list of strings")),
            };
            if !items.iter().all(Value::is_string) {
                return Err(err("a list of strings"));
            }
            let text = serde_json::to_string(&items).map_err(RepoError::serialization)?;
            Ok(SqlValue::Text(Some(text)))
        }
    }
}

pub fn decode_scalar(row: &SqliteRow, field: &ScalarField) -> Result<Value, RepoError> {
    let decode_err = |e: sqlx::Error| {
        RepoError::serialization(format!("column {}: {e}", field.name))
    };

    Ok(match field.kind {
        ScalarKind::Text => {
            Value::String(row.try_get::<String, _>(field.name).map_err(decode_err)?)
        }
        ScalarKind::OptionalText => row
            .try_get::<Option<String>, _>(field.name)
            .map_err(decode_err)?
            .map(Value::String)
            .unwrap_or(Value::Null),
        ScalarKind::Integer => Value::from(row.try_get::<i64, _>(field.name).map_err(decode_err)?),
        ScalarKind::Real => Value::from(row.try_get::<f64, _>(field.name).map_err(decode_err)?),
        ScalarKind::Bool => Value::Bool(row.try_get::<bool, _>(field.name).map_err(decode_err)?),
        ScalarKind::TextList => {
            let text: String = row.try_get(field.name).map_err(decode_err)?;
            serde_json::from_str(&text).map_err(RepoError::serialization)?
        }
    })
}

/// Entries of a map field as `(key, JSON-encoded value)`.
pub fn encode_map(
    descriptor: &TypeDescriptor,
    doc: &Document,
    field: &MapField,
) -> Result<Vec<(String, String)>, RepoError> {
    let entries = match doc.get(field.name) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(entries)) => entries,
        Some(_) => return Err(shape_error(descriptor, field.name, "an object")),
    };

    entries
        .iter()
        .map(|(key, value)| {
            let ok = match field.value {
                MapValueKind::Text => value.is_string(),
                MapValueKind::Integer => value.is_i64(),
            };
            if !ok {
                let expected = match field.value {
                    MapValueKind::Text => "a map of strings",
                    MapValueKind::Integer => "a map of integers",
                };
                return Err(shape_error(descriptor, field.name, expected));
            }
            Ok((key.clone(), value.to_string()))
        })
        .collect()
}

pub fn decode_map_value(text: &str) -> Result<Value, RepoError> {
    serde_json::from_str(text).map_err(RepoError::serialization)
}

/// Identifiers named by a link field. Each must be assigned and carry the
/// link's target prefix.
pub fn encode_links(
    descriptor: &TypeDescriptor,
    doc: &Document,
    field: &LinkField,
) -> Result<Vec<ObjId>, RepoError> {
    let items = match doc.get(field.name) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(shape_error(descriptor, field.name, "a list of identifiers")),
    };

    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        let id: ObjId = serde_json::from_value(item.clone())
            .map_err(|_| shape_error(descriptor, field.name, "a list of identifiers"))?;
        if id.prefix != field.target {
            return Err(RepoError::validation(format!(
                "{}.{} only links to {} objects, got {id}",
                descriptor.type_name, field.name, field.target
            )));
        }
        id.validate()?;
        ids.push(id);
    }
    ids.sort();
    ids.dedup();
    Ok(ids)
}

pub fn decode_links(field: &LinkField, targets: Vec<i64>) -> Result<Value, RepoError> {
    targets
        .into_iter()
        .map(|n| Ok::<_, RepoError>(obj_id_value(&ObjId::new(field.target, numeric_from_sql(n)?))))
        .collect::<Result<Vec<_>, RepoError>>()
        .map(Value::Array)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use taleweaver_domain::registry::{AGENT_CONFIG, CHARACTER, OBJECTIVE, RULE};

    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn encodes_each_scalar_kind() {
        let d = doc(json!({
            "name": "Narrator",
            "provider": "ollama",
            "model": "llama3",
            "temperature": 0.5,
            "max_tokens": 256,
        }));
        let values: Vec<SqlValue> = AGENT_CONFIG
            .scalars
            .iter()
            .map(|f| encode_scalar(&AGENT_CONFIG, &d, f).expect("encode"))
            .collect();
        assert_eq!(values[3], SqlValue::Real(0.5));
        assert_eq!(values[4], SqlValue::Integer(256));
        assert_eq!(values[5], SqlValue::Text(None));
    }

    #[test]
    fn text_list_is_stored_as_json() {
        let d = doc(json!({"components": ["fire", "melee"]}));
        let value = encode_scalar(&RULE, &d, &RULE.scalars[2]).expect("encode");
        assert_eq!(
            value,
            SqlValue::Text(Some(r#"["fire","melee"]"#.to_string()))
        );

        let bad = doc(json!({"components": ["fire", 3]}));
        assert!(encode_scalar(&RULE, &bad, &RULE.scalars[2]).is_err());
    }

    #[test]
    fn missing_required_scalar_is_a_validation_error() {
        let err = encode_scalar(&RULE, &doc(json!({})), &RULE.scalars[0]).expect_err("missing");
        assert!(matches!(err, RepoError::Validation(_)));
        assert!(err.to_string().contains("Rule.description"));
    }

    #[test]
    fn map_values_are_checked_against_their_kind() {
        let field = &CHARACTER.maps[0];
        let good = doc(json!({"attributes": {"str": 12}}));
        assert_eq!(
            encode_map(&CHARACTER, &good, field).expect("encode"),
            vec![("str".to_string(), "12".to_string())]
        );
        let bad = doc(json!({"attributes": {"str": "twelve"}}));
        assert!(encode_map(&CHARACTER, &bad, field).is_err());
    }

    #[test]
    fn links_must_target_the_declared_type() {
        let field = &OBJECTIVE.links[0];
        let good = doc(json!({"prerequisites": [
            {"prefix": "O", "numeric": 2},
            {"prefix": "O", "numeric": 1},
            {"prefix": "O", "numeric": 2}
        ]}));
        assert_eq!(
            encode_links(&OBJECTIVE, &good, field).expect("links"),
            vec![ObjId::new("O", 1), ObjId::new("O", 2)]
        );

        let wrong_type = doc(json!({"prerequisites": [{"prefix": "R", "numeric": 1}]}));
        assert!(encode_links(&OBJECTIVE, &wrong_type, field).is_err());

        let draft = doc(json!({"prerequisites": [{"prefix": "O", "numeric": 0}]}));
        assert!(encode_links(&OBJECTIVE, &draft, field).is_err());
    }

    #[test]
    fn decoded_links_use_target_prefix() {
        let value = decode_links(&CHARACTER.links[0], vec![3, 7]).expect("decode");
        assert_eq!(
            value,
            json!([{"prefix": "I", "numeric": 3}, {"prefix": "I", "numeric": 7}])
        );
    }
}
