//! Query filter evaluation for the in-memory backend.
//!
//! Covers the subset of the MongoDB query language the facade's callers
//! use: field equality (with array membership), dotted paths, comparison
//! operators, `$in`/`$nin`, `$exists`, and the `$and`/`$or`/`$nor`
//! combinators.

use crate::error::{BackendError, BackendResult};
use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

/// Returns true if `doc` satisfies `filter`.
pub(crate) fn matches(doc: &BsonDocument, filter: &BsonDocument) -> BackendResult<bool> {
    for (key, condition) in filter {
        let ok = match key.as_str() {
            "$and" => clauses(condition, key)?
                .iter()
                .map(|clause| matches(doc, clause))
                .collect::<BackendResult<Vec<_>>>()?
                .into_iter()
                .all(|m| m),
            "$or" => clauses(condition, key)?
                .iter()
                .map(|clause| matches(doc, clause))
                .collect::<BackendResult<Vec<_>>>()?
                .into_iter()
                .any(|m| m),
            "$nor" => !clauses(condition, key)?
                .iter()
                .map(|clause| matches(doc, clause))
                .collect::<BackendResult<Vec<_>>>()?
                .into_iter()
                .any(|m| m),
            op if op.starts_with('$') => {
                return Err(BackendError::rejected(format!(
                    "unknown top level operator: {op}"
                )))
            }
            path => field_matches(lookup(doc, path), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(condition: &'a Bson, op: &str) -> BackendResult<Vec<&'a BsonDocument>> {
    let Bson::Array(items) = condition else {
        return Err(BackendError::rejected(format!("{op} must be an array")));
    };
    if items.is_empty() {
        return Err(BackendError::rejected(format!("{op} must be a nonempty array")));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(clause) => Ok(clause),
            _ => Err(BackendError::rejected(format!(
                "{op} entries must be documents"
            ))),
        })
        .collect()
}

/// Resolves a dotted path inside a document.
pub(crate) fn lookup<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

fn is_operator_document(condition: &Bson) -> bool {
    match condition {
        Bson::Document(d) => d.keys().next().is_some_and(|k| k.starts_with('$')),
        _ => false,
    }
}

fn field_matches(value: Option<&Bson>, condition: &Bson) -> BackendResult<bool> {
    let Bson::Document(ops) = condition else {
        return Ok(equals(value, condition));
    };
    if !is_operator_document(condition) {
        return Ok(equals(value, condition));
    }

    for (op, arg) in ops {
        let ok = match op.as_str() {
            "$eq" => equals(value, arg),
            "$ne" => !equals(value, arg),
            "$gt" => compares(value, arg, |o| o == Ordering::Greater),
            "$gte" => compares(value, arg, |o| o != Ordering::Less),
            "$lt" => compares(value, arg, |o| o == Ordering::Less),
            "$lte" => compares(value, arg, |o| o != Ordering::Greater),
            "$in" => candidates(arg, op)?.iter().any(|c| equals(value, c)),
            "$nin" => !candidates(arg, op)?.iter().any(|c| equals(value, c)),
            "$exists" => truthy(arg) == value.is_some(),
            "$not" => !field_matches(value, arg)?,
            other => {
                return Err(BackendError::rejected(format!("unknown operator: {other}")));
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn candidates<'a>(arg: &'a Bson, op: &str) -> BackendResult<&'a [Bson]> {
    match arg {
        Bson::Array(items) => Ok(items),
        _ => Err(BackendError::rejected(format!("{op} needs an array"))),
    }
}

fn truthy(arg: &Bson) -> bool {
    match arg {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(f) => *f != 0.0,
        _ => true,
    }
}

/// Equality with array membership: `{tags: "a"}` matches `tags: ["a", "b"]`,
/// and `{field: null}` matches a missing field.
fn equals(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        None => matches!(target, Bson::Null),
        Some(v) => {
            values_equal(v, target)
                || matches!(v, Bson::Array(items) if items.iter().any(|i| values_equal(i, target)))
        }
    }
}

/// Structural equality that treats numeric types by value.
pub(crate) fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Array(x), Bson::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Bson::Document(x), Bson::Document(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .zip(y.iter())
                    .all(|((kl, vl), (kr, vr))| kl == kr && values_equal(vl, vr))
        }
        _ => match compare(a, b) {
            Some(ordering) => ordering == Ordering::Equal,
            None => a == b,
        },
    }
}

fn compares(value: Option<&Bson>, arg: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    match value {
        None => false,
        Some(Bson::Array(items)) => items
            .iter()
            .any(|item| compare(item, arg).is_some_and(&accept)),
        Some(v) => compare(v, arg).is_some_and(accept),
    }
}

/// Orders two values of comparable types; `None` across type classes.
pub(crate) fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => match (as_i64(a), as_i64(b)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => as_f64(a)?.partial_cmp(&as_f64(b)?),
        },
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use bson::oid::ObjectId;

    fn mary() -> BsonDocument {
        doc! {
            "Name": "mary",
            "Gender": "female",
            "Age": 44_i32,
            "Tags": ["admin", "ops"],
            "Address": { "City": "Cluj", "Zip": 400_000_i64 },
        }
    }

    fn check(filter: BsonDocument) -> bool {
        matches(&mary(), &filter).unwrap()
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(check(doc! {}));
    }

    #[test]
    fn field_equality() {
        assert!(check(doc! { "Name": "mary" }));
        assert!(check(doc! { "Name": "mary", "Age": 44_i32 }));
        assert!(!check(doc! { "Name": "john" }));
        assert!(!check(doc! { "name": "mary" }));
    }

    #[test]
    fn numeric_equality_across_widths() {
        assert!(check(doc! { "Age": 44_i64 }));
        assert!(check(doc! { "Age": 44.0 }));
        assert!(check(doc! { "Address.Zip": 400_000_i32 }));
    }

    #[test]
    fn array_membership() {
        assert!(check(doc! { "Tags": "ops" }));
        assert!(check(doc! { "Tags": ["admin", "ops"] }));
        assert!(!check(doc! { "Tags": "dev" }));
    }

    #[test]
    fn null_matches_missing() {
        assert!(check(doc! { "Phone": Bson::Null }));
        assert!(!check(doc! { "Name": Bson::Null }));
    }

    #[test]
    fn comparison_operators() {
        assert!(check(doc! { "Age": { "$eq": 44_i32 } }));
        assert!(check(doc! { "Age": { "$ne": 45_i32 } }));
        assert!(check(doc! { "Age": { "$gt": 40_i32, "$lt": 50_i32 } }));
        assert!(check(doc! { "Age": { "$gte": 44_i32, "$lte": 44.0 } }));
        assert!(!check(doc! { "Age": { "$gt": 44_i32 } }));
        assert!(!check(doc! { "Missing": { "$lt": 100_i32 } }));
        assert!(check(doc! { "Name": { "$gt": "john" } }));
    }

    #[test]
    fn set_operators() {
        assert!(check(doc! { "Name": { "$in": ["john", "mary"] } }));
        assert!(!check(doc! { "Name": { "$nin": ["john", "mary"] } }));
        assert!(check(doc! { "Tags": { "$in": ["dev", "ops"] } }));
    }

    #[test]
    fn exists_and_not() {
        assert!(check(doc! { "Address.City": { "$exists": true } }));
        assert!(check(doc! { "Phone": { "$exists": false } }));
        assert!(check(doc! { "Age": { "$not": { "$gt": 50_i32 } } }));
    }

    #[test]
    fn combinators() {
        assert!(check(doc! { "$or": [ { "Name": "john" }, { "Age": 44_i32 } ] }));
        assert!(!check(doc! { "$and": [ { "Name": "mary" }, { "Age": 45_i32 } ] }));
        assert!(check(doc! { "$nor": [ { "Name": "john" } ] }));
    }

    #[test]
    fn embedded_document_equality() {
        assert!(check(doc! { "Address": { "City": "Cluj", "Zip": 400_000_i64 } }));
        assert!(!check(doc! { "Address": { "City": "Cluj" } }));
    }

    #[test]
    fn object_id_equality() {
        let oid = ObjectId::new();
        let doc = doc! { "_id": oid, "Name": "john" };
        assert!(matches(&doc, &doc! { "_id": { "$eq": oid } }).unwrap());
        assert!(!matches(&doc, &doc! { "_id": ObjectId::new() }).unwrap());
    }

    #[test]
    fn rejects_unknown_operators() {
        assert!(matches(&mary(), &doc! { "Age": { "$near": 1_i32 } }).is_err());
        assert!(matches(&mary(), &doc! { "$where": "true" }).is_err());
        assert!(matches(&mary(), &doc! { "$or": [] }).is_err());
        assert!(matches(&mary(), &doc! { "Age": { "$in": 44_i32 } }).is_err());
    }
}
