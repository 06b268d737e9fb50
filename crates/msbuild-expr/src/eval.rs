//! Scalar evaluation.
//!
//! Each property reference is replaced by the first candidate of its value,
//! and that value is itself evaluated, until only literal text remains.
//! Expansion runs on an explicit frame stack, so deeply nested properties
//! never grow the call stack.

use std::borrow::Cow;

use indexmap::IndexSet;
use thiserror::Error;

use crate::context::{fold_name, EvaluationContext};
use crate::parser::{Expression, ExpressionNode};

/// Result type for evaluation.
pub type EvalResult<T> = Result<T, EvalError>;

/// Errors that abort an evaluation.
///
/// Unknown properties are not errors; they expand to the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// A property's expansion reached the property itself again.
    #[error("circular reference to property '{name}' ({})", .chain.join(" -> "))]
    CircularReference {
        /// The property that was re-entered.
        name: String,
        /// Properties being expanded when the cycle closed, outermost first,
        /// ending with `name`.
        chain: Vec<String>,
    },
}

impl EvalError {
    pub(crate) fn circular<'a>(active: impl IntoIterator<Item = &'a str>, name: &str) -> Self {
        let mut chain: Vec<String> = active.into_iter().map(str::to_string).collect();
        chain.push(name.to_string());
        EvalError::CircularReference {
            name: name.to_string(),
            chain,
        }
    }

    /// The property named by the error.
    pub fn property(&self) -> &str {
        match self {
            EvalError::CircularReference { name, .. } => name,
        }
    }
}

struct Frame<'e> {
    expr: Cow<'e, Expression>,
    next: usize,
    /// Folded name of the property this frame expands; `None` for the root.
    property: Option<String>,
}

/// Evaluate a parsed expression to a single string.
pub fn evaluate<C>(expr: &Expression, ctx: &C) -> EvalResult<String>
where
    C: EvaluationContext + ?Sized,
{
    let mut out = String::new();
    // Folded names being expanded, and the same names as written.
    let mut active: IndexSet<String> = IndexSet::new();
    let mut chain: Vec<String> = Vec::new();
    let mut stack = vec![Frame {
        expr: Cow::Borrowed(expr),
        next: 0,
        property: None,
    }];

    while let Some(frame) = stack.last_mut() {
        let Some(node) = frame.expr.nodes().get(frame.next) else {
            if let Some(key) = stack.pop().and_then(|done| done.property) {
                active.shift_remove(&key);
                chain.pop();
            }
            continue;
        };
        frame.next += 1;

        let name = match node {
            ExpressionNode::Literal { text, .. } => {
                out.push_str(text);
                continue;
            }
            ExpressionNode::PropertyReference { name, .. } => name.clone(),
        };

        let key = fold_name(&name);
        if active.contains(&key) {
            return Err(EvalError::circular(chain.iter().map(String::as_str), &name));
        }

        let Some(value) = ctx.try_get_property(&name) else {
            continue;
        };

        let value_expr = Expression::parse(value.first());
        if !value_expr.has_references() {
            out.push_str(value.first());
            continue;
        }

        active.insert(key.clone());
        chain.push(name);
        stack.push(Frame {
            expr: Cow::Owned(value_expr),
            next: 0,
            property: Some(key),
        });
    }

    Ok(out)
}

/// Parse and evaluate `text`.
pub fn evaluate_str<C>(text: &str, ctx: &C) -> EvalResult<String>
where
    C: EvaluationContext + ?Sized,
{
    evaluate(&Expression::parse(text), ctx)
}
