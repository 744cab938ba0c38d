use std::collections::BTreeMap;
use std::path::{Component, Path};

use serde_json::{Map, Value, json};
use thiserror::Error;

/// Why a parsed reply was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

fn invalid<T>(msg: impl Into<String>) -> Result<T, ValidationError> {
    Err(ValidationError(msg.into()))
}

/// The shape a task expects its reply block to have.
#[derive(Debug, Clone, Copy)]
pub enum Schema<'a> {
    /// `{"types": [{"name": ...}, ...]}`
    TypeCatalogue,
    /// Any non-empty object.
    FormatSpec,
    /// `{"1": TYPE, "2": TYPE, ...}`, restricted to `allowed` when it is non-empty.
    Sequence { allowed: &'a [String] },
    /// `{"type": ..., "design": ...}`
    FieldDesign,
    /// `{"status": "Success", "seed_name": ...}` naming a file inside `seed_dir`.
    SeedReport { seed_dir: &'a Path },
}

/// A validated reply, one variant per schema.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleValue {
    TypeCatalogue { types: Vec<String> },
    FormatSpec(Map<String, Value>),
    Sequence(BTreeMap<u32, String>),
    FieldDesign { type_name: String, design: String },
    SeedReport { seed_name: String },
}

impl RoleValue {
    pub fn parse(schema: Schema<'_>, value: Value) -> Result<Self, ValidationError> {
        match schema {
            Schema::TypeCatalogue => Self::type_catalogue(value),
            Schema::FormatSpec => match value {
                Value::Object(map) if !map.is_empty() => Ok(RoleValue::FormatSpec(map)),
                Value::Object(_) => invalid("format specification is empty"),
                _ => invalid("format specification must be a JSON object"),
            },
            Schema::Sequence { allowed } => Self::sequence(value, allowed),
            Schema::FieldDesign => {
                let type_name = non_empty_str(&value, "type")?;
                let design = non_empty_str(&value, "design")?;
                Ok(RoleValue::FieldDesign { type_name, design })
            }
            Schema::SeedReport { seed_dir } => Self::seed_report(value, seed_dir),
        }
    }

    fn type_catalogue(value: Value) -> Result<Self, ValidationError> {
        let Some(entries) = value.get("types").and_then(Value::as_array) else {
            return invalid("missing 'types' array");
        };
        let mut types: Vec<String> = Vec::new();
        for entry in entries {
            let name = match entry {
                Value::String(s) => s.trim(),
                other => other.get("name").and_then(Value::as_str).unwrap_or("").trim(),
            };
            if !name.is_empty() && !types.iter().any(|t| t == name) {
                types.push(name.to_string());
            }
        }
        if types.is_empty() {
            return invalid("'types' has no named entries");
        }
        Ok(RoleValue::TypeCatalogue { types })
    }

    fn sequence(value: Value, allowed: &[String]) -> Result<Self, ValidationError> {
        let Value::Object(map) = value else {
            return invalid("sequence must be a JSON object of index -> type");
        };
        if map.is_empty() {
            return invalid("sequence is empty");
        }
        let mut steps = BTreeMap::new();
        for (key, ty) in map {
            let Ok(index) = key.trim().parse::<u32>() else {
                return invalid(format!("sequence key '{key}' is not an integer"));
            };
            let Some(ty) = ty.as_str().map(str::trim).filter(|t| !t.is_empty()) else {
                return invalid(format!("step {index} has no type name"));
            };
            if !allowed.is_empty() && !allowed.iter().any(|a| a == ty) {
                return invalid(format!("step {index} uses unknown type '{ty}'"));
            }
            if steps.insert(index, ty.to_string()).is_some() {
                return invalid(format!("step {index} appears twice"));
            }
        }
        let contiguous = steps.keys().copied().eq(1..=steps.len() as u32);
        if !contiguous {
            return invalid("sequence indices must run 1..=n without gaps");
        }
        Ok(RoleValue::Sequence(steps))
    }

    fn seed_report(value: Value, seed_dir: &Path) -> Result<Self, ValidationError> {
        match value.get("status").and_then(Value::as_str) {
            Some("Success") => {}
            Some(other) => return invalid(format!("developer reported status '{other}'")),
            None => return invalid("missing 'status'"),
        }
        let seed_name = non_empty_str(&value, "seed_name")?;
        let relative = Path::new(&seed_name);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return invalid(format!("seed name '{seed_name}' must be a plain relative path"));
        }
        if !seed_dir.join(relative).is_file() {
            return invalid(format!(
                "seed file '{seed_name}' does not exist in {}",
                seed_dir.display()
            ));
        }
        Ok(RoleValue::SeedReport { seed_name })
    }

    /// The document committed to memory for this value.
    pub fn to_document(&self) -> String {
        let value = match self {
            RoleValue::TypeCatalogue { types } => {
                json!({ "types": types.iter().map(|t| json!({ "name": t })).collect::<Vec<_>>() })
            }
            RoleValue::FormatSpec(map) => Value::Object(map.clone()),
            RoleValue::Sequence(steps) => Value::Object(
                steps
                    .iter()
                    .map(|(i, t)| (i.to_string(), Value::String(t.clone())))
                    .collect(),
            ),
            RoleValue::FieldDesign { type_name, design } => {
                json!({ "type": type_name, "design": design })
            }
            RoleValue::SeedReport { seed_name } => {
                json!({ "status": "Success", "seed_name": seed_name })
            }
        };
        value.to_string()
    }

    /// Step types in order, for sequences.
    pub fn steps(&self) -> Option<Vec<&str>> {
        match self {
            RoleValue::Sequence(steps) => Some(steps.values().map(String::as_str).collect()),
            _ => None,
        }
    }
}

fn non_empty_str(value: &Value, key: &str) -> Result<String, ValidationError> {
    match value.get(key).and_then(Value::as_str).map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => invalid(format!("missing or empty '{key}'")),
    }
}
