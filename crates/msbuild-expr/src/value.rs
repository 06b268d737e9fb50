//! Property values.

use std::fmt;

/// The value of one property: an ordered, non-empty list of candidates.
///
/// Most properties have exactly one candidate. A property with more than
/// one is multi-valued; scalar evaluation uses the first candidate and
/// permutation evaluation branches over all of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyValue {
    candidates: Vec<String>,
}

impl PropertyValue {
    /// A single-valued property.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            candidates: vec![value.into()],
        }
    }

    /// Build a value from candidates in order. Returns `None` when there
    /// are no candidates.
    pub fn from_candidates<I, S>(candidates: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let candidates: Vec<String> = candidates.into_iter().map(Into::into).collect();
        if candidates.is_empty() {
            None
        } else {
            Some(Self { candidates })
        }
    }

    /// The candidate used by scalar evaluation.
    pub fn first(&self) -> &str {
        &self.candidates[0]
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Always false, a value has at least one candidate. Pairs with `len`
    /// for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn is_multi_valued(&self) -> bool {
        self.candidates.len() > 1
    }

    /// Return a value with `candidate` appended unless already present.
    pub fn with_candidate(&self, candidate: impl Into<String>) -> Self {
        let candidate = candidate.into();
        let mut candidates = self.candidates.clone();
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
        Self { candidates }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::new(value)
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::new(value)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.candidates.join(";"))
    }
}
