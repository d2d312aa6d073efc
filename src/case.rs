//! Case conversion for relation names in `contain`/`count` lists and for camelCase response shaping.

use serde_json::{Map, Value};

/// Convert an identifier to camelCase. `_`, `-` and spaces separate words; the first letter is lowercased.
/// e.g. "user_posts" -> "userPosts", "Line-Items" -> "lineItems"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.trim().chars() {
        if c == '_' || c == '-' || c == ' ' {
            capitalize_next = !out.is_empty();
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else if out.is_empty() {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// "userPosts" -> "user_posts". Hyphens and spaces become underscores.
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.trim().chars() {
        match c {
            '-' | ' ' | '_' => {
                if !out.is_empty() && !out.ends_with('_') {
                    out.push('_');
                }
            }
            c if c.is_uppercase() => {
                if !out.is_empty() && !out.ends_with('_') {
                    out.push('_');
                }
                out.extend(c.to_lowercase());
            }
            c => out.push(c),
        }
    }
    out
}

/// camelCase every object key at any depth. Key order is kept.
pub fn value_keys_to_camel_case_recursive(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let renamed: Map<String, Value> = std::mem::take(map)
                .into_iter()
                .map(|(k, mut v)| {
                    value_keys_to_camel_case_recursive(&mut v);
                    (to_camel_case(&k), v)
                })
                .collect();
            *map = renamed;
        }
        Value::Array(items) => items.iter_mut().for_each(value_keys_to_camel_case_recursive),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn camel_case() {
        assert_eq!(to_camel_case("user_posts"), "userPosts");
        assert_eq!(to_camel_case("Line-Items"), "lineItems");
        assert_eq!(to_camel_case(" posts "), "posts");
        assert_eq!(to_camel_case("alreadyCamel"), "alreadyCamel");
    }

    #[test]
    fn snake_case() {
        assert_eq!(to_snake_case("userPosts"), "user_posts");
        assert_eq!(to_snake_case("posts"), "posts");
        assert_eq!(to_snake_case("Line-Items"), "line_items");
    }

    #[test]
    fn recursive_keys() {
        let mut v = json!({"user_id": 1, "line_items": [{"unit_price": 2}]});
        value_keys_to_camel_case_recursive(&mut v);
        assert_eq!(v, json!({"userId": 1, "lineItems": [{"unitPrice": 2}]}));
        let keys: Vec<&String> = v.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["userId", "lineItems"]);
    }
}
