//! Update operator evaluation for the in-memory backend.

use super::filter::values_equal;
use crate::error::{BackendError, BackendResult};
use bson::{Bson, Document as BsonDocument};

/// Applies `update` to `doc`. Returns true if the document changed.
///
/// The update is applied to a copy first, so a rejected update leaves `doc`
/// untouched.
pub(crate) fn apply(doc: &mut BsonDocument, update: &BsonDocument) -> BackendResult<bool> {
    validate(update)?;

    let mut next = doc.clone();
    for (op, arg) in update {
        let Bson::Document(fields) = arg else {
            return Err(BackendError::rejected(format!(
                "modifiers for {op} must be a document"
            )));
        };
        for (path, value) in fields {
            guard_id(doc, path, op, value)?;
            match op.as_str() {
                "$set" => set_path(&mut next, path, value.clone())?,
                "$unset" => unset_path(&mut next, path),
                "$inc" => increment(&mut next, path, value)?,
                other => {
                    return Err(BackendError::rejected(format!(
                        "unknown update operator: {other}"
                    )))
                }
            }
        }
    }

    let changed = !values_equal(&Bson::Document(doc.clone()), &Bson::Document(next.clone()));
    *doc = next;
    Ok(changed)
}

fn validate(update: &BsonDocument) -> BackendResult<()> {
    if update.is_empty() {
        return Err(BackendError::rejected("update document is empty"));
    }
    if let Some(key) = update.keys().find(|k| !k.starts_with('$')) {
        return Err(BackendError::rejected(format!(
            "update document requires atomic operators, found {key:?}"
        )));
    }
    Ok(())
}

fn guard_id(doc: &BsonDocument, path: &str, op: &str, value: &Bson) -> BackendResult<()> {
    if path != "_id" && !path.starts_with("_id.") {
        return Ok(());
    }
    let unchanged = op == "$set" && doc.get("_id").is_some_and(|id| values_equal(id, value));
    if unchanged {
        return Ok(());
    }
    Err(BackendError::rejected(
        "performing an update on the path '_id' would modify the immutable field '_id'",
    ))
}

fn set_path(doc: &mut BsonDocument, path: &str, value: Bson) -> BackendResult<()> {
    let (parents, leaf) = split(path);
    let mut current = doc;
    for part in parents {
        if !current.contains_key(part) {
            current.insert(part, BsonDocument::new());
        }
        current = match current.get_mut(part) {
            Some(Bson::Document(inner)) => inner,
            _ => {
                return Err(BackendError::rejected(format!(
                    "cannot create field {leaf:?} in element {part:?}"
                )))
            }
        };
    }
    current.insert(leaf, value);
    Ok(())
}

fn unset_path(doc: &mut BsonDocument, path: &str) {
    let (parents, leaf) = split(path);
    let mut current = doc;
    for part in parents {
        current = match current.get_mut(part) {
            Some(Bson::Document(inner)) => inner,
            _ => return,
        };
    }
    current.remove(leaf);
}

fn increment(doc: &mut BsonDocument, path: &str, by: &Bson) -> BackendResult<()> {
    if !is_number(by) {
        return Err(BackendError::rejected(format!(
            "cannot increment with non-numeric argument for {path:?}"
        )));
    }
    let current = super::filter::lookup(doc, path).cloned();
    let next = match current {
        None => by.clone(),
        Some(existing) => add(&existing, by).ok_or_else(|| {
            BackendError::rejected(format!(
                "cannot apply $inc to a value of non-numeric type at {path:?}"
            ))
        })?,
    };
    set_path(doc, path, next)
}

fn is_number(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

#[allow(clippy::cast_precision_loss)]
fn add(a: &Bson, b: &Bson) -> Option<Bson> {
    Some(match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => match x.checked_add(*y) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(i64::from(*x) + i64::from(*y)),
        },
        (Bson::Int32(x), Bson::Int64(y)) => Bson::Int64(i64::from(*x).checked_add(*y)?),
        (Bson::Int64(x), Bson::Int32(y)) => Bson::Int64(x.checked_add(i64::from(*y))?),
        (Bson::Int64(x), Bson::Int64(y)) => Bson::Int64(x.checked_add(*y)?),
        (Bson::Double(x), Bson::Double(y)) => Bson::Double(x + y),
        (Bson::Double(x), Bson::Int32(y)) | (Bson::Int32(y), Bson::Double(x)) => {
            Bson::Double(x + f64::from(*y))
        }
        (Bson::Double(x), Bson::Int64(y)) | (Bson::Int64(y), Bson::Double(x)) => {
            Bson::Double(x + *y as f64)
        }
        _ => return None,
    })
}

fn split(path: &str) -> (Vec<&str>, &str) {
    match path.rsplit_once('.') {
        Some((parents, leaf)) => (parents.split('.').collect(), leaf),
        None => (Vec::new(), path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use bson::oid::ObjectId;

    fn john() -> BsonDocument {
        doc! { "_id": ObjectId::new(), "Name": "john", "Age": 32_i32 }
    }

    #[test]
    fn set_replaces_and_adds_fields() {
        let mut doc = john();
        assert!(apply(&mut doc, &doc! { "$set": { "Age": 33_i32, "Gender": "male" } }).unwrap());
        assert_eq!(doc.get_i32("Age").unwrap(), 33);
        assert_eq!(doc.get_str("Gender").unwrap(), "male");
    }

    #[test]
    fn set_creates_nested_documents() {
        let mut doc = john();
        apply(&mut doc, &doc! { "$set": { "Address.City": "Cluj" } }).unwrap();
        assert_eq!(
            doc.get_document("Address").unwrap().get_str("City").unwrap(),
            "Cluj"
        );
    }

    #[test]
    fn set_through_scalar_is_rejected() {
        let mut doc = john();
        let before = doc.clone();
        let err = apply(&mut doc, &doc! { "$set": { "Age.Years": 3_i32 } }).unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
        assert_eq!(doc, before);
    }

    #[test]
    fn same_value_is_not_a_modification() {
        let mut doc = john();
        assert!(!apply(&mut doc, &doc! { "$set": { "Name": "john" } }).unwrap());
        assert!(!apply(&mut doc, &doc! { "$set": { "Age": 32_i64 } }).unwrap());
    }

    #[test]
    fn unset_removes_fields() {
        let mut doc = john();
        assert!(apply(&mut doc, &doc! { "$unset": { "Age": "" } }).unwrap());
        assert!(!doc.contains_key("Age"));
        assert!(!apply(&mut doc, &doc! { "$unset": { "Missing.Deep": "" } }).unwrap());
    }

    #[test]
    fn inc_adds_and_widens() {
        let mut doc = john();
        apply(&mut doc, &doc! { "$inc": { "Age": 1_i32 } }).unwrap();
        assert_eq!(doc.get_i32("Age").unwrap(), 33);

        apply(&mut doc, &doc! { "$inc": { "Age": 0.5 } }).unwrap();
        assert_eq!(doc.get_f64("Age").unwrap(), 33.5);

        apply(&mut doc, &doc! { "$inc": { "Visits": 2_i64 } }).unwrap();
        assert_eq!(doc.get_i64("Visits").unwrap(), 2);

        let mut big = doc! { "n": i32::MAX };
        apply(&mut big, &doc! { "$inc": { "n": 1_i32 } }).unwrap();
        assert_eq!(big.get_i64("n").unwrap(), i64::from(i32::MAX) + 1);
    }

    #[test]
    fn inc_rejects_non_numbers() {
        let mut doc = john();
        assert!(apply(&mut doc, &doc! { "$inc": { "Name": 1_i32 } }).is_err());
        assert!(apply(&mut doc, &doc! { "$inc": { "Age": "one" } }).is_err());
    }

    #[test]
    fn replacement_style_updates_are_rejected() {
        let mut doc = john();
        assert!(apply(&mut doc, &doc! { "Name": "jack" }).is_err());
        assert!(apply(&mut doc, &doc! {}).is_err());
        assert!(apply(&mut doc, &doc! { "$rename": { "Name": "n" } }).is_err());
        assert!(apply(&mut doc, &doc! { "$set": 1_i32 }).is_err());
    }

    #[test]
    fn id_is_immutable() {
        let mut doc = john();
        let id = doc.get("_id").cloned().unwrap();
        assert!(apply(&mut doc, &doc! { "$set": { "_id": ObjectId::new() } }).is_err());
        assert!(apply(&mut doc, &doc! { "$unset": { "_id": "" } }).is_err());
        assert!(!apply(&mut doc, &doc! { "$set": { "_id": id } }).unwrap());
    }
}
