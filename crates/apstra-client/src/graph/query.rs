//! Graph query builders
//!
//! A path query walks the graph from a node along edges:
//!
//! ```text
//! node(type='system', name='n_system').out(type='hosted_interfaces').node(type='interface')
//! ```
//!
//! A match query combines several paths, some of them optional, and can
//! deduplicate on named nodes.

use crate::graph::attribute::{QeAttribute, quote};
use std::fmt;

/// Anything that renders to a graph query string
pub trait Query {
    fn render(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Node(Vec<QeAttribute>),
    Out(Vec<QeAttribute>),
    In(Vec<QeAttribute>),
    Where(String),
}

fn render_call(name: &str, attrs: &[QeAttribute]) -> String {
    let rendered: Vec<String> = attrs.iter().map(ToString::to_string).collect();
    format!("{}({})", name, rendered.join(", "))
}

impl Step {
    fn render(&self) -> String {
        match self {
            Self::Node(attrs) => render_call("node", attrs),
            Self::Out(attrs) => render_call("out", attrs),
            Self::In(attrs) => render_call("in_", attrs),
            Self::Where(lambda) => format!("where({})", lambda),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathQuery {
    steps: Vec<Step>,
}

impl PathQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, attrs: impl IntoIterator<Item = QeAttribute>) -> Self {
        self.steps.push(Step::Node(attrs.into_iter().collect()));
        self
    }

    /// Follow an outgoing relationship
    pub fn out(mut self, attrs: impl IntoIterator<Item = QeAttribute>) -> Self {
        self.steps.push(Step::Out(attrs.into_iter().collect()));
        self
    }

    /// Follow an incoming relationship
    pub fn in_(mut self, attrs: impl IntoIterator<Item = QeAttribute>) -> Self {
        self.steps.push(Step::In(attrs.into_iter().collect()));
        self
    }

    /// Filter with a lambda over named nodes, e.g. `lambda a, b: a.id != b.id`
    pub fn where_(mut self, lambda: impl Into<String>) -> Self {
        self.steps.push(Step::Where(lambda.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Query for PathQuery {
    fn render(&self) -> String {
        let steps: Vec<String> = self.steps.iter().map(Step::render).collect();
        steps.join(".")
    }
}

impl fmt::Display for PathQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MatchElement {
    Required(PathQuery),
    Optional(PathQuery),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchQuery {
    elements: Vec<MatchElement>,
    distinct: Option<Vec<String>>,
    wheres: Vec<String>,
}

impl MatchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: PathQuery) -> Self {
        self.elements.push(MatchElement::Required(path));
        self
    }

    /// Path that may be missing without dropping the row
    pub fn optional(mut self, path: PathQuery) -> Self {
        self.elements.push(MatchElement::Optional(path));
        self
    }

    /// Deduplicate rows on the given node names
    pub fn distinct<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.distinct = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn where_(mut self, lambda: impl Into<String>) -> Self {
        self.wheres.push(lambda.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl Query for MatchQuery {
    fn render(&self) -> String {
        if self.elements.is_empty() {
            return String::new();
        }

        let elements: Vec<String> = self
            .elements
            .iter()
            .map(|e| match e {
                MatchElement::Required(p) => p.render(),
                MatchElement::Optional(p) => format!("optional({})", p.render()),
            })
            .collect();
        let mut out = format!("match({})", elements.join(", "));

        if let Some(names) = &self.distinct {
            let quoted: Vec<String> = names.iter().map(|n| quote(n)).collect();
            out.push_str(&format!(".distinct([{}])", quoted.join(", ")));
        }
        for lambda in &self.wheres {
            out.push_str(&format!(".where({})", lambda));
        }
        out
    }
}

impl fmt::Display for MatchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl Query for str {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl Query for String {
    fn render(&self) -> String {
        self.clone()
    }
}
