//! The composed, not-yet-executed query handed to a `Store`.

use crate::query::Comparison;

#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    None,
    Scalar(String),
    List(Vec<String>),
}

/// One predicate. The value is the raw request string; the store coerces it to the column type.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterClause {
    pub field: String,
    pub comparison: Comparison,
    pub value: FilterValue,
    /// Timestamp columns are table-qualified so they stay unambiguous next to joined rows.
    pub qualified: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SortDirective {
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub limit: u64,
    pub offset: u64,
}

/// A request parameter that produced no clause, and why. Diagnostic only.
#[derive(Clone, Debug, PartialEq)]
pub struct Ignored {
    pub param: String,
    pub reason: &'static str,
}

/// A relation to eager-load, with nested relations loaded on its rows.
#[derive(Clone, Debug, PartialEq)]
pub struct IncludeNode {
    pub relation: String,
    pub children: Vec<IncludeNode>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AbstractQuery {
    pub filters: Vec<FilterClause>,
    /// Resolved relation paths, e.g. `["posts", "comments"]` for `posts.comments`.
    pub includes: Vec<Vec<String>>,
    pub counts: Vec<String>,
    pub sorts: Vec<SortDirective>,
    pub window: Option<Window>,
    pub ignored: Vec<Ignored>,
}

impl AbstractQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, clause: FilterClause) -> Self {
        self.filters.push(clause);
        self
    }

    pub fn include(mut self, path: Vec<String>) -> Self {
        if !path.is_empty() && !self.includes.contains(&path) {
            self.includes.push(path);
        }
        self
    }

    pub fn count(mut self, relation: String) -> Self {
        if !self.counts.contains(&relation) {
            self.counts.push(relation);
        }
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sorts.push(SortDirective {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn window(mut self, window: Option<Window>) -> Self {
        self.window = window;
        self
    }

    pub fn ignore(mut self, param: impl Into<String>, reason: &'static str) -> Self {
        let param = param.into();
        tracing::debug!(param = %param, reason, "query parameter ignored");
        self.ignored.push(Ignored { param, reason });
        self
    }

    /// Include paths folded into a tree; `a.b` also loads `a`.
    pub fn include_tree(&self) -> Vec<IncludeNode> {
        let mut roots: Vec<IncludeNode> = Vec::new();
        for path in &self.includes {
            insert_path(&mut roots, path);
        }
        roots
    }
}

fn insert_path(nodes: &mut Vec<IncludeNode>, path: &[String]) {
    let Some((head, rest)) = path.split_first() else { return };
    let idx = match nodes.iter().position(|n| &n.relation == head) {
        Some(i) => i,
        None => {
            nodes.push(IncludeNode {
                relation: head.clone(),
                children: Vec::new(),
            });
            nodes.len() - 1
        }
    };
    insert_path(&mut nodes[idx].children, rest);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> Vec<String> {
        s.split('.').map(String::from).collect()
    }

    #[test]
    fn include_tree_merges_shared_prefixes() {
        let q = AbstractQuery::new()
            .include(path("posts.comments"))
            .include(path("posts"))
            .include(path("author"))
            .include(path("posts.tags"));
        let tree = q.include_tree();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].relation, "posts");
        let children: Vec<&str> = tree[0].children.iter().map(|c| c.relation.as_str()).collect();
        assert_eq!(children, vec!["comments", "tags"]);
        assert_eq!(tree[1].relation, "author");
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn includes_and_counts_are_idempotent() {
        let q = AbstractQuery::new()
            .include(path("posts"))
            .include(path("posts"))
            .count("posts".into())
            .count("posts".into());
        assert_eq!(q.includes.len(), 1);
        assert_eq!(q.counts.len(), 1);
    }

    #[test]
    fn sort_direction_parsing() {
        assert_eq!(SortDirection::parse("DESC"), Some(SortDirection::Desc));
        assert_eq!(SortDirection::parse(" asc"), Some(SortDirection::Asc));
        assert_eq!(SortDirection::parse("sideways"), None);
    }
}
