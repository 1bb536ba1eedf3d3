use serde_json::Value;

/// Strips values the store cannot hold before a write.
///
/// `null` object fields are dropped, `null` array items are removed rather
/// than leaving holes, and nested values are cleaned recursively. A `null`
/// input yields `None`.
pub fn sanitize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(Value::Array(
            items.into_iter().filter_map(sanitize).collect(),
        )),
        Value::Object(map) => Some(Value::Object(
            map.into_iter()
                .filter_map(|(k, v)| sanitize(v).map(|v| (k, v)))
                .collect(),
        )),
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_null_fields_recursively() {
        let cleaned = sanitize(json!({
            "title": "Maths",
            "color": null,
            "topics": [{ "id": "t1", "deadline": null, "links": [] }]
        }));

        assert_eq!(
            cleaned,
            Some(json!({
                "title": "Maths",
                "topics": [{ "id": "t1", "links": [] }]
            }))
        );
    }

    #[test]
    fn removes_null_array_items() {
        assert_eq!(
            sanitize(json!([1, null, { "a": null }, null])),
            Some(json!([1, {}]))
        );
    }

    #[test]
    fn keeps_falsy_scalars() {
        assert_eq!(
            sanitize(json!({ "isCompleted": false, "count": 0, "note": "" })),
            Some(json!({ "isCompleted": false, "count": 0, "note": "" }))
        );
    }

    #[test]
    fn null_document_is_rejected() {
        assert_eq!(sanitize(Value::Null), None);
    }
}
