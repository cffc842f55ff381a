//! Declarative mailbox filter queries
//!
//! A filter is a configuration-authored expression tree deciding which
//! mailboxes and messages an archiving run touches. Nodes are either
//! resolvable immediately against the local [`QueryContext`] (folder path,
//! group membership, quota usage) or must be deferred to the mail server as
//! a [`SearchPredicate`]. The evaluator walks the tree once per mailbox and
//! produces a [`QueryResult`] that is definite where it can be and minimal
//! where it cannot.

pub mod context;
pub mod date;
pub mod predicate;
pub mod result;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::query::context::{GroupId, QueryContext, QuotaResource};
use crate::query::date::DateSpec;
use crate::query::predicate::{FlagName, RecipientKind, SearchPredicate};
use crate::query::result::QueryResult;

/// Numeric comparison operator used by size, date and usage leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl Comparison {
    /// Apply the operator to an ordered pair.
    pub fn compare<T: PartialOrd>(self, left: T, right: T) -> bool {
        match self {
            Comparison::Equal => left == right,
            Comparison::NotEqual => left != right,
            Comparison::LessThan => left < right,
            Comparison::LessOrEqual => left <= right,
            Comparison::GreaterThan => left > right,
            Comparison::GreaterOrEqual => left >= right,
        }
    }
}

/// What a `Usage` leaf measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageKind {
    DiskSpace,
    FileCount,
}

impl UsageKind {
    fn resource(self) -> QuotaResource {
        match self {
            UsageKind::DiskSpace => QuotaResource::Storage,
            UsageKind::FileCount => QuotaResource::Message,
        }
    }
}

/// One node of a filter tree.
///
/// The variant tags map 1:1 to the tag names used in the configuration
/// document, so a configured tree round-trips through serde. Trees are
/// finite, acyclic and immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    /// Named root wrapper; evaluates to its child's result unchanged.
    Filter(Box<Query>),
    /// All children must hold.
    And(Vec<Query>),
    /// At least one child must hold.
    Or(Vec<Query>),
    /// The child must not hold.
    Not(Box<Query>),
    /// Message body contains the pattern (deferred).
    Body(String),
    /// The flag is set (deferred).
    Flag(FlagName),
    /// The mailbox path equals the given path exactly (local).
    Folder(String),
    /// From header contains the pattern (deferred).
    From(String),
    /// Named header contains the pattern (deferred).
    Header { name: String, pattern: String },
    /// The mailbox owner is a member of the group (local).
    MemberOf(String),
    /// Message-ID equals the value (deferred).
    MessageId(String),
    /// Message sequence number equals the value (deferred).
    MessageNumber(u32),
    /// Received date compares against a resolved instant (deferred).
    ReceivedDate {
        is: Comparison,
        #[serde(flatten)]
        date: DateSpec,
    },
    /// Recipient header of the given kind contains the pattern (deferred).
    Recipient {
        #[serde(rename = "in")]
        field: RecipientKind,
        pattern: String,
    },
    /// Sent date compares against a resolved instant (deferred).
    SentDate {
        is: Comparison,
        #[serde(flatten)]
        date: DateSpec,
    },
    /// Message size compares against the value (deferred).
    Size { is: Comparison, value: u32 },
    /// Subject header contains the pattern (deferred).
    Subject(String),
    /// Quota usage percentage compares against the value (local).
    Usage {
        of: UsageKind,
        is: Comparison,
        value: u32,
    },
}

impl Query {
    /// Evaluate this node against one mailbox's local context.
    ///
    /// Combinators short-circuit left to right: once an `And` sees a
    /// definite `false` (or an `Or` a definite `true`) the remaining
    /// children are not evaluated at all, so their directory and quota
    /// lookups never happen. Children that resolve to the combinator's
    /// identity element drop out; whatever remains deferred is collected
    /// into the smallest composite predicate (a single leftover predicate
    /// is returned unwrapped).
    ///
    /// Collaborator failures abort the evaluation and propagate unmodified.
    pub fn evaluate(&self, ctx: &dyn QueryContext) -> Result<QueryResult> {
        match self {
            Query::Filter(child) => child.evaluate(ctx),

            Query::And(children) => {
                let mut terms = Vec::new();
                for child in children {
                    match child.evaluate(ctx)? {
                        QueryResult::Decided(false) => return Ok(false.into()),
                        QueryResult::Decided(true) => {}
                        QueryResult::Deferred(term) => terms.push(term),
                    }
                }
                Ok(combine(terms, true, SearchPredicate::And))
            }

            Query::Or(children) => {
                let mut terms = Vec::new();
                for child in children {
                    match child.evaluate(ctx)? {
                        QueryResult::Decided(true) => return Ok(true.into()),
                        QueryResult::Decided(false) => {}
                        QueryResult::Deferred(term) => terms.push(term),
                    }
                }
                Ok(combine(terms, false, SearchPredicate::Or))
            }

            Query::Not(child) => Ok(match child.evaluate(ctx)? {
                QueryResult::Decided(value) => (!value).into(),
                // An unresolved remote condition is never inverted locally.
                QueryResult::Deferred(term) => SearchPredicate::Not(Box::new(term)).into(),
            }),

            Query::Folder(path) => Ok((path == ctx.path()).into()),

            Query::MemberOf(group) => Ok(ctx.is_member_of(&GroupId::parse(group))?.into()),

            Query::Usage { of, is, value } => {
                let used = ctx.quota_usage(of.resource())?;
                Ok(is.compare(used, *value).into())
            }

            Query::Body(pattern) => Ok(SearchPredicate::Body(pattern.clone()).into()),
            Query::Flag(name) => Ok(SearchPredicate::Flag(*name).into()),
            Query::From(pattern) => Ok(SearchPredicate::From(pattern.clone()).into()),
            Query::Header { name, pattern } => Ok(SearchPredicate::Header {
                name: name.clone(),
                pattern: pattern.clone(),
            }
            .into()),
            Query::MessageId(value) => Ok(SearchPredicate::MessageId(value.clone()).into()),
            Query::MessageNumber(number) => Ok(SearchPredicate::MessageNumber(*number).into()),
            Query::ReceivedDate { is, date } => Ok(SearchPredicate::ReceivedDate {
                is: *is,
                when: date.resolve_now()?,
            }
            .into()),
            Query::Recipient { field, pattern } => Ok(SearchPredicate::Recipient {
                kind: *field,
                pattern: pattern.clone(),
            }
            .into()),
            Query::SentDate { is, date } => Ok(SearchPredicate::SentDate {
                is: *is,
                when: date.resolve_now()?,
            }
            .into()),
            Query::Size { is, value } => Ok(SearchPredicate::Size {
                is: *is,
                value: *value,
            }
            .into()),
            Query::Subject(pattern) => Ok(SearchPredicate::Subject(pattern.clone()).into()),
        }
    }
}

/// Fold accumulated deferred terms into the smallest equivalent result.
fn combine(
    mut terms: Vec<SearchPredicate>,
    identity: bool,
    junction: fn(Vec<SearchPredicate>) -> SearchPredicate,
) -> QueryResult {
    match terms.len() {
        0 => identity.into(),
        1 => terms.remove(0).into(),
        _ => junction(terms).into(),
    }
}
