//! NoSQL Injection Detection
//!
//! Structural matcher for document-database filters. A filter is suspicious
//! when its operator keys (`$ne`, `$gt`, `$where`, ...) can be traced back to
//! user input, meaning the client controlled the query structure rather than
//! just a value inside it.

use rustc_hash::FxHashMap;
use serde_json::Value;

/// Returns true when `filter` contains operators that originate from the
/// flattened `user_input` map, or a `$where` clause carrying code execution
/// primitives. Non-object filters are never flagged.
pub fn is_nosql_injection(user_input: &FxHashMap<String, String>, filter: &Value) -> bool {
    match filter {
        Value::Object(_) => walk(user_input, filter),
        _ => false,
    }
}

fn walk(user_input: &FxHashMap<String, String>, filter: &Value) -> bool {
    match filter {
        Value::Object(map) => {
            for (key, value) in map {
                if key == "$where" {
                    if let Value::String(code) = value {
                        let code = code.to_lowercase();
                        if code.contains("sleep") || code.contains("eval") {
                            return true;
                        }
                    }
                }
                if key.starts_with('$')
                    && user_input.keys().any(|flat_key| flat_key.ends_with(key.as_str()))
                {
                    return true;
                }
                if walk(user_input, value) {
                    return true;
                }
            }
            false
        }
        Value::Array(items) => items.iter().any(|item| walk(user_input, item)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(pairs: &[(&str, &str)]) -> FxHashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn user_supplied_operator_is_flagged() {
        let user_input = input(&[("body.username.$ne", "$ne")]);
        let filter = json!({"username": {"$ne": null}});
        assert!(is_nosql_injection(&user_input, &filter));
    }

    #[test]
    fn server_side_operator_is_fine() {
        // The $gt here was added by application code, not the request.
        let user_input = input(&[("query.min_age", "18")]);
        let filter = json!({"age": {"$gt": 18}});
        assert!(!is_nosql_injection(&user_input, &filter));
    }

    #[test]
    fn where_clause_with_sleep_or_eval() {
        let user_input = input(&[]);
        assert!(is_nosql_injection(
            &user_input,
            &json!({"$where": "sleep(1000)"})
        ));
        assert!(is_nosql_injection(
            &user_input,
            &json!({"$where": "this.x == eval('1')"})
        ));
        assert!(!is_nosql_injection(
            &user_input,
            &json!({"$where": "this.age > 18"})
        ));
    }

    #[test]
    fn nested_structures_are_walked() {
        let user_input = input(&[("body.filter.$or.0.admin.$eq", "$eq")]);
        let filter = json!({"$and": [{"name": "x"}, {"$or": [{"admin": {"$eq": true}}]}]});
        assert!(is_nosql_injection(&user_input, &filter));
    }

    #[test]
    fn non_object_filters_are_ignored() {
        let user_input = input(&[("query.q", "$ne")]);
        assert!(!is_nosql_injection(&user_input, &json!("$ne")));
        assert!(!is_nosql_injection(&user_input, &json!(["$ne"])));
        assert!(!is_nosql_injection(&user_input, &Value::Null));
    }
}
