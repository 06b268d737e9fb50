//! Property lookup for evaluation.
//!
//! The evaluators only ever ask one question: "what is the value of this
//! property?". [`EvaluationContext`] is that capability. [`PropertyTable`]
//! is the plain in-memory implementation and [`LayeredContext`] stacks
//! several contexts so that inner layers shadow outer ones.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::eval::{evaluate_str, EvalResult};
use crate::permute::{evaluate_permutations_str, Permutations};
use crate::value::PropertyValue;

/// Case-folded form of a property name, used as the lookup key.
pub fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

/// Read-only property lookup. Names compare case-insensitively.
pub trait EvaluationContext {
    fn try_get_property(&self, name: &str) -> Option<&PropertyValue>;
}

impl<C: EvaluationContext + ?Sized> EvaluationContext for &C {
    fn try_get_property(&self, name: &str) -> Option<&PropertyValue> {
        (**self).try_get_property(name)
    }
}

impl<C: EvaluationContext + ?Sized> EvaluationContext for Box<C> {
    fn try_get_property(&self, name: &str) -> Option<&PropertyValue> {
        (**self).try_get_property(name)
    }
}

impl<C: EvaluationContext + ?Sized> EvaluationContext for Arc<C> {
    fn try_get_property(&self, name: &str) -> Option<&PropertyValue> {
        (**self).try_get_property(name)
    }
}

/// Convenience evaluation methods on any context.
pub trait EvaluationContextExt: EvaluationContext {
    /// Scalar evaluation of `text`.
    fn evaluate(&self, text: &str) -> EvalResult<String> {
        evaluate_str(text, self)
    }

    /// Every result `text` can evaluate to, see [`Permutations`].
    fn evaluate_permutations(&self, text: &str) -> EvalResult<Permutations<'_, Self>> {
        evaluate_permutations_str(text, self)
    }
}

impl<C: EvaluationContext + ?Sized> EvaluationContextExt for C {}

/// An ordered table of property values.
///
/// Insertion order is preserved so listings are stable; lookups ignore case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyTable {
    /// folded name -> (name as first defined, value)
    bindings: IndexMap<String, (String, PropertyValue)>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self {
            bindings: IndexMap::new(),
        }
    }

    /// Define or replace a property.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        let name = name.into();
        let value = value.into();
        match self.bindings.get_mut(&fold_name(&name)) {
            Some(entry) => entry.1 = value,
            None => {
                self.bindings.insert(fold_name(&name), (name, value));
            }
        }
    }

    /// Add `candidate` to a property, making it multi-valued if it already
    /// has a different value. Duplicate candidates are ignored.
    pub fn append(&mut self, name: impl Into<String>, candidate: impl Into<String>) {
        let name = name.into();
        let candidate = candidate.into();
        match self.bindings.get_mut(&fold_name(&name)) {
            Some(entry) => entry.1 = entry.1.with_candidate(candidate),
            None => {
                self.bindings
                    .insert(fold_name(&name), (name, PropertyValue::new(candidate)));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.bindings.get(&fold_name(name)).map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(&fold_name(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.bindings
            .shift_remove(&fold_name(name))
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Properties in definition order, with their names as first defined.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.bindings
            .values()
            .map(|(name, value)| (name.as_str(), value))
    }
}

impl EvaluationContext for PropertyTable {
    fn try_get_property(&self, name: &str) -> Option<&PropertyValue> {
        self.get(name)
    }
}

impl<K, V> FromIterator<(K, V)> for PropertyTable
where
    K: Into<String>,
    V: Into<PropertyValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = PropertyTable::new();
        table.extend(iter);
        table
    }
}

impl<K, V> Extend<(K, V)> for PropertyTable
where
    K: Into<String>,
    V: Into<PropertyValue>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.define(name, value);
        }
    }
}

/// A stack of contexts searched from the innermost (last pushed) layer
/// outward.
#[derive(Clone, Default)]
pub struct LayeredContext {
    layers: Vec<Arc<dyn EvaluationContext + Send + Sync>>,
}

impl LayeredContext {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Start from a single outermost layer.
    pub fn with_base(base: Arc<dyn EvaluationContext + Send + Sync>) -> Self {
        Self { layers: vec![base] }
    }

    /// Push a layer that shadows everything below it.
    pub fn push(&mut self, layer: Arc<dyn EvaluationContext + Send + Sync>) {
        self.layers.push(layer);
    }

    /// Builder form of [`LayeredContext::push`].
    pub fn layer(mut self, layer: Arc<dyn EvaluationContext + Send + Sync>) -> Self {
        self.push(layer);
        self
    }

    /// Remove the innermost layer.
    pub fn pop(&mut self) -> Option<Arc<dyn EvaluationContext + Send + Sync>> {
        self.layers.pop()
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

impl EvaluationContext for LayeredContext {
    fn try_get_property(&self, name: &str) -> Option<&PropertyValue> {
        self.layers
            .iter()
            .rev()
            .find_map(|layer| layer.try_get_property(name))
    }
}

impl std::fmt::Debug for LayeredContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredContext")
            .field("depth", &self.layers.len())
            .finish()
    }
}
