//! Node and edge attribute predicates for graph queries

use std::fmt;

/// Right-hand side of an attribute predicate.
///
/// Renders in the controller's query language: strings single-quoted,
/// booleans and null capitalised, set/negation predicates as function calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QeAttrValue {
    Str(String),
    Int(i64),
    Bool(bool),
    None,
    NotNone,
    IsIn(Vec<String>),
    NotIn(Vec<String>),
    Ne(String),
}

/// Quote a string literal, escaping backslashes and single quotes
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\\' || c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

fn quote_list(values: &[String]) -> String {
    let quoted: Vec<String> = values.iter().map(|v| quote(v)).collect();
    format!("[{}]", quoted.join(", "))
}

impl fmt::Display for QeAttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(&quote(s)),
            Self::Int(n) => write!(f, "{}", n),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::None => f.write_str("None"),
            Self::NotNone => f.write_str("not_none()"),
            Self::IsIn(values) => write!(f, "is_in({})", quote_list(values)),
            Self::NotIn(values) => write!(f, "not_in({})", quote_list(values)),
            Self::Ne(s) => write!(f, "ne({})", quote(s)),
        }
    }
}

impl From<&str> for QeAttrValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for QeAttrValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for QeAttrValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<u32> for QeAttrValue {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<bool> for QeAttrValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

pub fn is_in<I, S>(values: I) -> QeAttrValue
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    QeAttrValue::IsIn(values.into_iter().map(Into::into).collect())
}

pub fn not_in<I, S>(values: I) -> QeAttrValue
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    QeAttrValue::NotIn(values.into_iter().map(Into::into).collect())
}

pub fn ne(value: impl Into<String>) -> QeAttrValue {
    QeAttrValue::Ne(value.into())
}

pub fn not_none() -> QeAttrValue {
    QeAttrValue::NotNone
}

/// `key=value` predicate on a node or edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QeAttribute {
    pub key: String,
    pub value: QeAttrValue,
}

impl QeAttribute {
    pub fn new(key: impl Into<String>, value: impl Into<QeAttrValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Shorthand for [`QeAttribute::new`]
pub fn attr(key: impl Into<String>, value: impl Into<QeAttrValue>) -> QeAttribute {
    QeAttribute::new(key, value)
}

impl fmt::Display for QeAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_values() {
        assert_eq!(QeAttrValue::from("leaf1").to_string(), "'leaf1'");
        assert_eq!(QeAttrValue::from(42i64).to_string(), "42");
        assert_eq!(QeAttrValue::from(true).to_string(), "True");
        assert_eq!(QeAttrValue::from(false).to_string(), "False");
        assert_eq!(QeAttrValue::None.to_string(), "None");
        assert_eq!(not_none().to_string(), "not_none()");
        assert_eq!(ne("spine").to_string(), "ne('spine')");
        assert_eq!(is_in(["leaf", "spine"]).to_string(), "is_in(['leaf', 'spine'])");
        assert_eq!(not_in(Vec::<String>::new()).to_string(), "not_in([])");
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r"it's"), r"'it\'s'");
        assert_eq!(quote(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn test_render_attribute() {
        assert_eq!(attr("type", "system").to_string(), "type='system'");
        assert_eq!(attr("deploy_mode", QeAttrValue::None).to_string(), "deploy_mode=None");
        assert_eq!(attr("vn_id", 10100u32).to_string(), "vn_id=10100");
    }
}
