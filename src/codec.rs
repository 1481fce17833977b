//! Deterministic ordered TOML read/write (`spec.md` §4.3).
//!
//! The strict-typed read path goes through `depotpm_schemas` + `serde`; the
//! write path builds a `toml_edit::DocumentMut` key-by-key in the order
//! required rather than relying on a struct's field declaration order,
//! keeping `toml` (typed consumption) and `toml_edit` (order-controlled
//! construction/mutation) on separate sides of the read/write split.

use toml_edit::{Array, DocumentMut, Item, Table, Value};

/// Fixed key priority for the Project file (`spec.md` §4.3): everything
/// else is emitted alphabetically after these, in whatever order it was
/// handed to [`build_ordered_document`].
pub const PROJECT_KEY_ORDER: &[&str] = &["name", "uuid", "keywords", "license", "desc", "deps", "compat"];

/// Build a document whose top-level keys appear in `priority` order first
/// (skipping any name absent from `fields`), then every remaining key
/// alphabetically.
pub fn build_ordered_document(fields: Vec<(String, Item)>, priority: &[&str]) -> DocumentMut {
    let mut doc = DocumentMut::new();
    let mut remaining = fields;

    for key in priority {
        if let Some(pos) = remaining.iter().position(|(k, _)| k == key) {
            let (k, v) = remaining.remove(pos);
            doc.as_table_mut().insert(&k, v);
        }
    }

    remaining.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (k, v) in remaining {
        doc.as_table_mut().insert(&k, v);
    }

    doc
}

/// Build an inline array value from string items, used when writing compact
/// `deps = ["a", "b"]` sequences.
pub fn string_array(items: impl IntoIterator<Item = impl Into<String>>) -> Array {
    let mut arr = Array::new();
    for item in items {
        arr.push(item.into());
    }
    arr
}

/// Build a table value from `(key, value)` string pairs, used for the
/// expanded `name -> uuid` form of `deps`.
pub fn string_table(items: impl IntoIterator<Item = (String, String)>) -> Table {
    let mut t = Table::new();
    for (k, v) in items {
        t.insert(&k, Item::Value(Value::from(v)));
    }
    t
}

/// Convert a parsed `toml::Value` (as preserved in a schema's `unknown`
/// bag) into a `toml_edit::Item` for re-emission.
pub fn value_to_item(v: &toml::Value) -> Item {
    Item::Value(value_to_edit_value(v))
}

fn value_to_edit_value(v: &toml::Value) -> Value {
    match v {
        toml::Value::String(s) => Value::from(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::from(*b),
        toml::Value::Datetime(d) => Value::from(d.to_string().parse::<toml_edit::Datetime>().unwrap()),
        toml::Value::Array(a) => {
            let mut arr = Array::new();
            for item in a {
                arr.push(value_to_edit_value(item));
            }
            Value::Array(arr)
        }
        toml::Value::Table(t) => {
            let mut it = toml_edit::InlineTable::new();
            for (k, v) in t {
                it.insert(k, value_to_edit_value(v));
            }
            Value::InlineTable(it)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_keys_come_first_in_order_then_the_rest_alphabetically() {
        let fields = vec![
            ("zeta".to_string(), Item::Value("z".to_string().into())),
            ("uuid".to_string(), Item::Value("u".to_string().into())),
            ("alpha".to_string(), Item::Value("a".to_string().into())),
            ("name".to_string(), Item::Value("n".to_string().into())),
        ];
        let doc = build_ordered_document(fields, &["name", "uuid"]);
        let keys: Vec<&str> = doc.as_table().iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["name", "uuid", "alpha", "zeta"]);
    }

    #[test]
    fn priority_key_absent_from_fields_is_skipped_without_error() {
        let fields = vec![("alpha".to_string(), Item::Value("a".to_string().into()))];
        let doc = build_ordered_document(fields, &["name", "uuid"]);
        let keys: Vec<&str> = doc.as_table().iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["alpha"]);
    }

    #[test]
    fn value_to_item_preserves_nested_arrays_and_tables() {
        let mut table = toml::value::Table::new();
        table.insert("a".to_string(), toml::Value::Integer(1));
        let parsed: toml::Value = toml::Value::Array(vec![toml::Value::Table(table), toml::Value::String("x".into())]);
        let item = value_to_item(&parsed);
        // Round-trip through a document to confirm it prints without panicking
        // and keeps both elements.
        let mut doc = DocumentMut::new();
        doc.as_table_mut().insert("v", item);
        let printed = doc.to_string();
        assert!(printed.contains("x"));
    }
}
