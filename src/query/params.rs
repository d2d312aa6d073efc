//! Inbound query-string parameters, in request order.

use std::collections::HashMap;

const NAMED_FILTER_PREFIX: &str = "filters[";

/// Flat key/value parameters. A repeated key keeps its first position and its last value.
#[derive(Clone, Debug, Default)]
pub struct RequestParams {
    pairs: Vec<(String, String)>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// First present key among `keys` (e.g. `contain` then `include`).
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `filters[column]=value` entries as (column, value).
    pub fn named_filters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter_map(|(k, v)| {
            let column = k.strip_prefix(NAMED_FILTER_PREFIX)?.strip_suffix(']')?;
            if column.is_empty() || column.contains(['[', ']']) {
                return None;
            }
            Some((column, v))
        })
    }

    pub fn is_named_filter_key(key: &str) -> bool {
        key.starts_with(NAMED_FILTER_PREFIX)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl FromIterator<(String, String)> for RequestParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (k, v) in iter {
            match index.get(&k) {
                Some(&i) => pairs[i].1 = v,
                None => {
                    index.insert(k.clone(), pairs.len());
                    pairs.push((k, v));
                }
            }
        }
        RequestParams { pairs }
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for RequestParams {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        iter.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_value_wins_first_position_kept() {
        let params: RequestParams = [("a", "1"), ("b", "2"), ("a", "3")].into_iter().collect();
        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn named_filters_are_extracted() {
        let params: RequestParams = [
            ("filters[status]", "eq:active"),
            ("filters[]", "x"),
            ("filters[a][b]", "y"),
            ("status", "z"),
        ]
        .into_iter()
        .collect();
        let named: Vec<_> = params.named_filters().collect();
        assert_eq!(named, vec![("status", "eq:active")]);
    }

    #[test]
    fn first_of_prefers_earlier_keys() {
        let params: RequestParams = [("include", "b"), ("contain", "a")].into_iter().collect();
        assert_eq!(params.first_of(&["contain", "include"]), Some("a"));
        assert_eq!(params.first_of(&["missing"]), None);
    }
}
