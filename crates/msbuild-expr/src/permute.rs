//! Permutation evaluation.
//!
//! A multi-valued property stands for several alternative values. Evaluating
//! an expression "with permutation" yields one result per combination of
//! choices, depth-first in node order: the leftmost multi-valued reference
//! is the outermost loop.
//!
//! Cycles are found up front by walking the property reference graph over
//! every candidate, so a cycle on any branch fails the whole call before a
//! single result is produced. The enumeration itself is lazy and keeps its
//! pending branches on an explicit stack.

use std::collections::HashMap;
use std::rc::Rc;

use crate::context::{fold_name, EvaluationContext};
use crate::eval::{EvalError, EvalResult};
use crate::parser::{Expression, ExpressionNode};

/// Check `expr` for circular references reachable through any candidate.
fn check_cycles<C>(expr: &Expression, ctx: &C) -> EvalResult<()>
where
    C: EvaluationContext + ?Sized,
{
    enum Mark {
        Active,
        Done,
    }

    struct Visit {
        key: String,
        name: String,
        children: Vec<String>,
        next: usize,
    }

    let mut marks: HashMap<String, Mark> = HashMap::new();
    let mut path: Vec<Visit> = Vec::new();
    let mut roots = expr.references().map(str::to_string).collect::<Vec<_>>().into_iter();

    loop {
        let next_child = match path.last_mut() {
            Some(top) if top.next < top.children.len() => {
                top.next += 1;
                Some(top.children[top.next - 1].clone())
            }
            Some(_) => None,
            None => match roots.next() {
                Some(root) => Some(root),
                None => return Ok(()),
            },
        };

        let Some(child) = next_child else {
            if let Some(done) = path.pop() {
                marks.insert(done.key, Mark::Done);
            }
            continue;
        };

        let key = fold_name(&child);
        match marks.get(&key) {
            Some(Mark::Active) => {
                return Err(EvalError::circular(
                    path.iter().map(|visit| visit.name.as_str()),
                    &child,
                ));
            }
            Some(Mark::Done) => continue,
            None => {}
        }

        match ctx.try_get_property(&child) {
            None => {
                marks.insert(key, Mark::Done);
            }
            Some(value) => {
                let children = value
                    .candidates()
                    .iter()
                    .flat_map(|candidate| {
                        Expression::parse(candidate)
                            .references()
                            .map(str::to_string)
                            .collect::<Vec<_>>()
                    })
                    .collect();
                marks.insert(key.clone(), Mark::Active);
                path.push(Visit {
                    key,
                    name: child,
                    children,
                    next: 0,
                });
            }
        }
    }
}

/// Pending work of one branch: a persistent stack of partially evaluated
/// expressions, shared between sibling branches.
struct WorkNode {
    expr: Rc<Expression>,
    next: usize,
    rest: Work,
}

type Work = Option<Rc<WorkNode>>;

fn push_expr(text: &str, rest: &Work) -> Work {
    let expr = Expression::parse(text);
    if expr.is_empty() {
        return rest.clone();
    }
    Some(Rc::new(WorkNode {
        expr: Rc::new(expr),
        next: 0,
        rest: rest.clone(),
    }))
}

struct Branch {
    output: String,
    work: Work,
}

/// All results an expression can evaluate to. Created by
/// [`evaluate_permutations`]; iterate it with [`Permutations::iter`] as
/// many times as needed.
pub struct Permutations<'c, C: ?Sized> {
    root: Rc<Expression>,
    ctx: &'c C,
}

impl<C: ?Sized> Clone for Permutations<'_, C> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            ctx: self.ctx,
        }
    }
}

impl<'c, C> Permutations<'c, C>
where
    C: EvaluationContext + ?Sized,
{
    /// Start a fresh enumeration.
    pub fn iter(&self) -> PermutationIter<'c, C> {
        let work = if self.root.is_empty() {
            None
        } else {
            Some(Rc::new(WorkNode {
                expr: self.root.clone(),
                next: 0,
                rest: None,
            }))
        };
        PermutationIter {
            ctx: self.ctx,
            pending: vec![Branch {
                output: String::new(),
                work,
            }],
        }
    }

    /// Collect every result.
    pub fn to_vec(&self) -> Vec<String> {
        self.iter().collect()
    }

    pub fn expression(&self) -> &Expression {
        &self.root
    }
}

impl<'c, C> IntoIterator for Permutations<'c, C>
where
    C: EvaluationContext + ?Sized,
{
    type Item = String;
    type IntoIter = PermutationIter<'c, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'c, C> IntoIterator for &Permutations<'c, C>
where
    C: EvaluationContext + ?Sized,
{
    type Item = String;
    type IntoIter = PermutationIter<'c, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over permutation results.
pub struct PermutationIter<'c, C: ?Sized> {
    ctx: &'c C,
    /// Branches not yet explored; the top is explored next.
    pending: Vec<Branch>,
}

impl<C> Iterator for PermutationIter<'_, C>
where
    C: EvaluationContext + ?Sized,
{
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let ctx = self.ctx;
        let mut branch = self.pending.pop()?;

        loop {
            let Some(top) = branch.work.clone() else {
                return Some(branch.output);
            };
            let Some(node) = top.expr.nodes().get(top.next) else {
                branch.work = top.rest.clone();
                continue;
            };
            let advanced = Some(Rc::new(WorkNode {
                expr: top.expr.clone(),
                next: top.next + 1,
                rest: top.rest.clone(),
            }));

            match node {
                ExpressionNode::Literal { text, .. } => {
                    branch.output.push_str(text);
                    branch.work = advanced;
                }
                ExpressionNode::PropertyReference { name, .. } => {
                    let Some(value) = ctx.try_get_property(name) else {
                        branch.work = advanced;
                        continue;
                    };
                    let Some((first, others)) = value.candidates().split_first() else {
                        branch.work = advanced;
                        continue;
                    };
                    // Later candidates wait on the stack, first one on top.
                    for candidate in others.iter().rev() {
                        self.pending.push(Branch {
                            output: branch.output.clone(),
                            work: push_expr(candidate, &advanced),
                        });
                    }
                    branch.work = push_expr(first, &advanced);
                }
            }
        }
    }
}

/// Prepare permutation evaluation of a parsed expression.
///
/// Fails with [`EvalError::CircularReference`] if any branch would expand a
/// property inside its own expansion.
pub fn evaluate_permutations<'c, C>(
    expr: &Expression,
    ctx: &'c C,
) -> EvalResult<Permutations<'c, C>>
where
    C: EvaluationContext + ?Sized,
{
    check_cycles(expr, ctx)?;
    Ok(Permutations {
        root: Rc::new(expr.clone()),
        ctx,
    })
}

/// Parse `text` and prepare its permutation evaluation.
pub fn evaluate_permutations_str<'c, C>(text: &str, ctx: &'c C) -> EvalResult<Permutations<'c, C>>
where
    C: EvaluationContext + ?Sized,
{
    evaluate_permutations(&Expression::parse(text), ctx)
}
