//! Tri-state evaluation outcome
//!
//! Evaluating a query node against local context does not always yield a
//! boolean: some conditions can only be answered by the mail server. A
//! `QueryResult` is therefore either a definite boolean or a search
//! predicate that still has to be shipped to the remote search facility.

use crate::query::predicate::SearchPredicate;

/// Outcome of evaluating a query node.
///
/// Exactly one variant is active. Callers that already know which case they
/// hold may use the accessors; calling an accessor on the wrong variant is a
/// contract violation and panics rather than coercing to a default.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// The node resolved locally to a boolean.
    Decided(bool),
    /// The node must be evaluated by the remote search facility.
    Deferred(SearchPredicate),
}

impl QueryResult {
    /// Whether this result carries a definite boolean answer.
    pub fn has_definite_answer(&self) -> bool {
        matches!(self, QueryResult::Decided(_))
    }

    /// The definite boolean answer.
    ///
    /// # Panics
    ///
    /// Panics if the result is deferred.
    pub fn boolean_value(&self) -> bool {
        match self {
            QueryResult::Decided(value) => *value,
            QueryResult::Deferred(_) => {
                panic!("boolean_value() called on a deferred query result")
            }
        }
    }

    /// The deferred search predicate.
    ///
    /// # Panics
    ///
    /// Panics if the result is definite.
    pub fn predicate(&self) -> &SearchPredicate {
        match self {
            QueryResult::Deferred(predicate) => predicate,
            QueryResult::Decided(_) => {
                panic!("predicate() called on a definite query result")
            }
        }
    }

    /// Consume the result, yielding the deferred predicate.
    ///
    /// # Panics
    ///
    /// Panics if the result is definite.
    pub fn into_predicate(self) -> SearchPredicate {
        match self {
            QueryResult::Deferred(predicate) => predicate,
            QueryResult::Decided(_) => {
                panic!("into_predicate() called on a definite query result")
            }
        }
    }
}

impl From<bool> for QueryResult {
    fn from(value: bool) -> Self {
        QueryResult::Decided(value)
    }
}

impl From<SearchPredicate> for QueryResult {
    fn from(predicate: SearchPredicate) -> Self {
        QueryResult::Deferred(predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decided_reports_definite_answer() {
        let result = QueryResult::from(true);
        assert!(result.has_definite_answer());
        assert!(result.boolean_value());

        let result = QueryResult::from(false);
        assert!(result.has_definite_answer());
        assert!(!result.boolean_value());
    }

    #[test]
    fn test_deferred_exposes_predicate() {
        let result = QueryResult::from(SearchPredicate::Subject("invoice".into()));
        assert!(!result.has_definite_answer());
        assert_eq!(
            result.predicate(),
            &SearchPredicate::Subject("invoice".into())
        );
    }

    #[test]
    #[should_panic(expected = "boolean_value() called on a deferred query result")]
    fn test_boolean_value_panics_on_deferred() {
        QueryResult::from(SearchPredicate::Body("x".into())).boolean_value();
    }

    #[test]
    #[should_panic(expected = "predicate() called on a definite query result")]
    fn test_predicate_panics_on_decided() {
        QueryResult::from(true).predicate();
    }
}
