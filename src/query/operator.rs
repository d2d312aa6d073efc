//! Fixed operator table: key suffixes (`age_gte`) and short names (`filters[age]=gte:18`).

use crate::query::FilterValue;
use std::cmp::Reverse;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Comparison {
    /// SQL operator for scalar comparisons.
    pub fn sql_operator(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Gt => ">",
            Comparison::Lt => "<",
            Comparison::Gte => ">=",
            Comparison::Lte => "<=",
            Comparison::Like => "LIKE",
            Comparison::In => "IN",
            Comparison::NotIn => "NOT IN",
            Comparison::IsNull => "IS NULL",
            Comparison::IsNotNull => "IS NOT NULL",
        }
    }
}

/// How the raw request value becomes the clause value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueShape {
    Scalar,
    /// `%v%`
    Contains,
    /// `v%`
    StartsWith,
    /// `%v`
    EndsWith,
    /// comma-separated list
    List,
    /// value is only a presence flag
    Flag,
}

#[derive(Debug)]
pub struct OperatorDescriptor {
    pub suffix: &'static str,
    pub name: &'static str,
    pub comparison: Comparison,
    pub shape: ValueShape,
}

macro_rules! op {
    ($suffix:literal, $name:literal, $cmp:ident, $shape:ident) => {
        OperatorDescriptor {
            suffix: $suffix,
            name: $name,
            comparison: Comparison::$cmp,
            shape: ValueShape::$shape,
        }
    };
}

pub const OPERATORS: &[OperatorDescriptor] = &[
    op!("_eq", "eq", Eq, Scalar),
    op!("_not", "not", Ne, Scalar),
    op!("_gt", "gt", Gt, Scalar),
    op!("_lt", "lt", Lt, Scalar),
    op!("_gte", "gte", Gte, Scalar),
    op!("_lte", "lte", Lte, Scalar),
    op!("_like", "like", Like, Contains),
    op!("_sw", "sw", Like, StartsWith),
    op!("_ew", "ew", Like, EndsWith),
    op!("_has", "has", Like, Contains),
    op!("_in", "in", In, List),
    op!("_notIn", "notIn", NotIn, List),
    op!("_isNull", "isNull", IsNull, Flag),
    op!("_isNotNull", "isNotNull", IsNotNull, Flag),
];

/// Plain equality, used for exact field-name keys and colon-less named filters.
pub const EQUALS: &OperatorDescriptor = &OPERATORS[0];

impl OperatorDescriptor {
    /// Shape the raw value. `None` when nothing usable is left (e.g. `_in=,`).
    pub fn render(&self, raw: &str) -> Option<FilterValue> {
        let value = match self.shape {
            ValueShape::Scalar => FilterValue::Scalar(raw.to_string()),
            ValueShape::Contains => FilterValue::Scalar(format!("%{}%", raw)),
            ValueShape::StartsWith => FilterValue::Scalar(format!("{}%", raw)),
            ValueShape::EndsWith => FilterValue::Scalar(format!("%{}", raw)),
            ValueShape::List => {
                let items: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
                if items.is_empty() {
                    return None;
                }
                FilterValue::List(items)
            }
            ValueShape::Flag => FilterValue::None,
        };
        Some(value)
    }
}

/// Operator by short name, case-insensitive.
pub fn by_name(name: &str) -> Option<&'static OperatorDescriptor> {
    let name = name.trim();
    OPERATORS.iter().find(|op| op.name.eq_ignore_ascii_case(name))
}

fn strip_suffix_ci<'k>(key: &'k str, suffix: &str) -> Option<&'k str> {
    let cut = key.len().checked_sub(suffix.len())?;
    if cut == 0 || !key.is_char_boundary(cut) {
        return None;
    }
    key[cut..].eq_ignore_ascii_case(suffix).then(|| &key[..cut])
}

/// Split `key` into (field, operator) where the key ends with the operator suffix (case-insensitive)
/// and the remainder satisfies `is_field`. Longer suffixes are tried first; first hit wins.
pub fn resolve_suffix<'k, F>(key: &'k str, is_field: F) -> Option<(&'k str, &'static OperatorDescriptor)>
where
    F: Fn(&str) -> bool,
{
    let mut candidates: Vec<(&'k str, &'static OperatorDescriptor)> = OPERATORS
        .iter()
        .filter_map(|op| strip_suffix_ci(key, op.suffix).map(|field| (field, op)))
        .collect();
    candidates.sort_by_key(|(_, op)| Reverse(op.suffix.len()));
    candidates.into_iter().find(|(field, _)| is_field(field))
}
