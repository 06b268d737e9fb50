//! Property expression engine for build-description files.
//!
//! Expressions are plain text with embedded `$(Name)` property references.
//! This crate turns such text into a node sequence and evaluates it
//! against an [`EvaluationContext`]:
//!
//! ```text
//! "Hello\$(Foo).targets"
//!        │
//!        ▼
//!  ┌──────────────┐
//!  │    parser    │  Literal("Hello\") PropertyReference("Foo") Literal(".targets")
//!  └──────────────┘
//!        │
//!        ├──────────────────────┐
//!        ▼                      ▼
//!  ┌──────────────┐      ┌──────────────┐
//!  │   evaluate   │      │   permute    │
//!  │ (first value)│      │ (every value)│
//!  └──────────────┘      └──────────────┘
//!        │                      │
//!        ▼                      ▼
//!     String             lazy Iterator<String>
//! ```
//!
//! Property names compare case-insensitively. Unknown properties expand to
//! the empty string. Self-referential expansion fails with
//! [`EvalError::CircularReference`].
//!
//! # Example
//!
//! ```
//! use msbuild_expr::{EvaluationContextExt, PropertyTable, PropertyValue};
//!
//! let mut props = PropertyTable::new();
//! props.define("Foo", "$(Bar)");
//! props.define("Bar", "Hello $(Baz)");
//! props.define("Baz", PropertyValue::from_candidates(["X", "Y"]).unwrap());
//!
//! assert_eq!(props.evaluate("$(Foo)").unwrap(), "Hello X");
//!
//! let all = props.evaluate_permutations("$(Foo)").unwrap().to_vec();
//! assert_eq!(all, ["Hello X", "Hello Y"]);
//! ```

mod context;
mod eval;
mod parser;
mod permute;
mod value;

pub use context::{fold_name, EvaluationContext, EvaluationContextExt, LayeredContext, PropertyTable};
pub use eval::{evaluate, evaluate_str, EvalError, EvalResult};
pub use parser::{Expression, ExpressionNode, SourceSpan};
pub use permute::{evaluate_permutations, evaluate_permutations_str, PermutationIter, Permutations};
pub use value::PropertyValue;
