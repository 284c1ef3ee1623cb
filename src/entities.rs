//! Structured metadata attached to statistical maps.
//!
//! An [`Entities`] map describes where a map came from (subject, session,
//! run, contrast, ...). The same type doubles as an entity filter: a filter
//! selects a map when each of its keys is present in the map's metadata with
//! an equal value. Keys missing from the filter are "don't care".

use serde_json::Value;
use std::collections::BTreeMap;

/// Ordered string → scalar (JSON value) mapping.
pub type Entities = BTreeMap<String, Value>;

/// Returns `true` when every key of `filter` appears in `metadata` with an
/// equal value.
///
/// # Examples
///
/// ```
/// use fmri_glm::entities::{matches, Entities};
/// use serde_json::json;
///
/// let mut metadata = Entities::new();
/// metadata.insert("subject".into(), json!("01"));
/// metadata.insert("run".into(), json!(2));
///
/// let mut filter = Entities::new();
/// filter.insert("run".into(), json!(2));
/// assert!(matches(&filter, &metadata));
///
/// filter.insert("session".into(), json!("pre"));
/// assert!(!matches(&filter, &metadata));
/// ```
#[must_use]
pub fn matches(filter: &Entities, metadata: &Entities) -> bool {
    filter
        .iter()
        .all(|(key, value)| metadata.get(key).is_some_and(|m| values_equal(value, m)))
}

/// Value equality with numbers compared by magnitude, so `1` equals `1.0`.
/// Strings never equal numbers. Arrays and objects compare element-wise.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Keys shared by `a` and `b` with equal values.
#[must_use]
pub fn intersection(a: &Entities, b: &Entities) -> Entities {
    a.iter()
        .filter(|(key, value)| b.get(*key).is_some_and(|other| values_equal(value, other)))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Folds [`intersection`] over every entity set. Empty input yields an empty map.
pub fn common_entities<'a, I>(sets: I) -> Entities
where
    I: IntoIterator<Item = &'a Entities>,
{
    let mut sets = sets.into_iter();
    let Some(first) = sets.next() else {
        return Entities::new();
    };
    sets.fold(first.clone(), |acc, set| intersection(&acc, set))
}

/// Renders entities as compact JSON for error messages and logs.
#[must_use]
pub fn describe(entities: &Entities) -> String {
    serde_json::to_string(entities).unwrap_or_else(|_| format!("{entities:?}"))
}
