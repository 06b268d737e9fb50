//! Expression tokenizer.
//!
//! Splits raw expression text into literal runs and `$(Name)` property
//! references. Literal text is preserved byte-for-byte.
//!
//! Malformed markers are literal text:
//! - an unterminated `$(` makes everything from the marker onward literal,
//! - an empty reference `$()` is kept as the literal text `$()`.

use std::fmt;

const REFERENCE_OPEN: &str = "$(";
const REFERENCE_CLOSE: char = ')';

/// Byte range within the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceSpan {
    /// Start byte offset in the source
    pub start: usize,
    /// End byte offset in the source
    pub end: usize,
}

impl SourceSpan {
    /// Create a new source span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Get the length of this span.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if this span covers no text.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move the span by `offset` bytes, e.g. from attribute-relative to
    /// document-relative positions.
    pub fn shifted(self, offset: usize) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }

    /// Extract the text covered by this span from a source string.
    pub fn extract<'a>(&self, source: &'a str) -> Option<&'a str> {
        source.get(self.start..self.end)
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One element of a parsed expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionNode {
    /// Text copied verbatim into the result.
    Literal { text: String, span: SourceSpan },
    /// A `$(Name)` reference. `span` covers the whole marker.
    PropertyReference { name: String, span: SourceSpan },
}

impl ExpressionNode {
    pub fn span(&self) -> SourceSpan {
        match self {
            ExpressionNode::Literal { span, .. } | ExpressionNode::PropertyReference { span, .. } => {
                *span
            }
        }
    }
}

/// A parsed expression: nodes in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Expression {
    nodes: Vec<ExpressionNode>,
}

impl Expression {
    /// Parse raw expression text.
    pub fn parse(text: &str) -> Self {
        let mut nodes = Vec::new();
        let mut literal_start = 0;
        let mut cursor = 0;

        while let Some(found) = text[cursor..].find(REFERENCE_OPEN) {
            let open = cursor + found;
            let name_start = open + REFERENCE_OPEN.len();

            let Some(close_rel) = text[name_start..].find(REFERENCE_CLOSE) else {
                // Unterminated marker: the remainder stays literal.
                break;
            };
            let close = name_start + close_rel;

            if close == name_start {
                // `$()` names nothing, keep scanning after it as literal text.
                cursor = close + 1;
                continue;
            }

            if literal_start < open {
                nodes.push(ExpressionNode::Literal {
                    text: text[literal_start..open].to_string(),
                    span: SourceSpan::new(literal_start, open),
                });
            }
            nodes.push(ExpressionNode::PropertyReference {
                name: text[name_start..close].to_string(),
                span: SourceSpan::new(open, close + 1),
            });

            cursor = close + 1;
            literal_start = cursor;
        }

        if literal_start < text.len() {
            nodes.push(ExpressionNode::Literal {
                text: text[literal_start..].to_string(),
                span: SourceSpan::new(literal_start, text.len()),
            });
        }

        Self { nodes }
    }

    /// Build an expression from pre-tokenized nodes.
    pub fn from_nodes(nodes: Vec<ExpressionNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[ExpressionNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True if at least one node is a property reference.
    pub fn has_references(&self) -> bool {
        self.references().next().is_some()
    }

    /// Names of all referenced properties, in node order.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|node| match node {
            ExpressionNode::PropertyReference { name, .. } => Some(name.as_str()),
            ExpressionNode::Literal { .. } => None,
        })
    }
}

impl From<&str> for Expression {
    fn from(text: &str) -> Self {
        Expression::parse(text)
    }
}
