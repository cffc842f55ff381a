//! Deferred search predicates
//!
//! A `SearchPredicate` is the part of a filter that could not be resolved
//! against local context and must be evaluated by the mail server. The
//! evaluator only composes predicates (conjunction, disjunction, negation);
//! interpretation is left to the session, which renders the tree into an
//! RFC 3501 `SEARCH` program via [`SearchPredicate::to_imap_search`].

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::query::Comparison;

/// System flag a message may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagName {
    Answered,
    Deleted,
    Draft,
    Flagged,
    Recent,
    Seen,
}

impl FlagName {
    /// The corresponding IMAP search key.
    fn search_key(self) -> &'static str {
        match self {
            FlagName::Answered => "ANSWERED",
            FlagName::Deleted => "DELETED",
            FlagName::Draft => "DRAFT",
            FlagName::Flagged => "FLAGGED",
            FlagName::Recent => "RECENT",
            FlagName::Seen => "SEEN",
        }
    }
}

/// Which recipient header a recipient pattern applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
}

impl RecipientKind {
    fn search_key(self) -> &'static str {
        match self {
            RecipientKind::To => "TO",
            RecipientKind::Cc => "CC",
            RecipientKind::Bcc => "BCC",
        }
    }
}

/// A boolean condition the remote search facility evaluates.
///
/// Structural equality is meaningful: two predicates are equal when they
/// describe the same remote condition.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPredicate {
    /// All sub-predicates must match.
    And(Vec<SearchPredicate>),
    /// At least one sub-predicate must match.
    Or(Vec<SearchPredicate>),
    /// The sub-predicate must not match.
    Not(Box<SearchPredicate>),
    /// Message body contains the pattern.
    Body(String),
    /// Subject header contains the pattern.
    Subject(String),
    /// From header contains the pattern.
    From(String),
    /// Named header contains the pattern.
    Header { name: String, pattern: String },
    /// Recipient header of the given kind contains the pattern.
    Recipient {
        kind: RecipientKind,
        pattern: String,
    },
    /// The flag is set on the message.
    Flag(FlagName),
    /// Message-ID header equals the value.
    MessageId(String),
    /// Message sequence number equals the value.
    MessageNumber(u32),
    /// Message size compares against the value (bytes).
    Size { is: Comparison, value: u32 },
    /// Internal (received) date compares against the instant.
    ReceivedDate { is: Comparison, when: NaiveDateTime },
    /// Sent date compares against the instant.
    SentDate { is: Comparison, when: NaiveDateTime },
}

impl SearchPredicate {
    /// Render this predicate as an RFC 3501 `SEARCH` program.
    ///
    /// Conjunction is rendered as a parenthesized key list, disjunction as
    /// right-folded binary `OR` keys. Date comparisons are rendered at the
    /// day granularity the protocol offers (`BEFORE`/`ON`/`SINCE` and the
    /// `SENT*` forms); sessions that need second precision must post-filter.
    pub fn to_imap_search(&self) -> String {
        match self {
            SearchPredicate::And(terms) => {
                let keys: Vec<String> = terms.iter().map(|t| t.to_imap_search()).collect();
                format!("({})", keys.join(" "))
            }
            SearchPredicate::Or(terms) => {
                let mut keys = terms.iter().rev().map(|t| t.to_imap_search());
                // OR is a binary key; fold a disjunction list from the right.
                let mut program = keys.next().unwrap_or_default();
                for key in keys {
                    program = format!("OR {key} {program}");
                }
                program
            }
            SearchPredicate::Not(term) => format!("NOT {}", term.to_imap_search()),
            SearchPredicate::Body(pattern) => format!("BODY {}", quote(pattern)),
            SearchPredicate::Subject(pattern) => format!("SUBJECT {}", quote(pattern)),
            SearchPredicate::From(pattern) => format!("FROM {}", quote(pattern)),
            SearchPredicate::Header { name, pattern } => {
                format!("HEADER {} {}", quote(name), quote(pattern))
            }
            SearchPredicate::Recipient { kind, pattern } => {
                format!("{} {}", kind.search_key(), quote(pattern))
            }
            SearchPredicate::Flag(name) => name.search_key().to_string(),
            SearchPredicate::MessageId(value) => {
                format!("HEADER {} {}", quote("Message-ID"), quote(value))
            }
            SearchPredicate::MessageNumber(number) => number.to_string(),
            SearchPredicate::Size { is, value } => match is {
                Comparison::GreaterThan => format!("LARGER {value}"),
                Comparison::LessThan => format!("SMALLER {value}"),
                Comparison::GreaterOrEqual => format!("NOT SMALLER {value}"),
                Comparison::LessOrEqual => format!("NOT LARGER {value}"),
                Comparison::Equal => format!("(NOT SMALLER {value} NOT LARGER {value})"),
                Comparison::NotEqual => format!("OR SMALLER {value} LARGER {value}"),
            },
            SearchPredicate::ReceivedDate { is, when } => {
                date_key(*is, when, "BEFORE", "ON", "SINCE")
            }
            SearchPredicate::SentDate { is, when } => {
                date_key(*is, when, "SENTBEFORE", "SENTON", "SENTSINCE")
            }
        }
    }
}

/// Render a day-granularity date comparison from the three primitive keys.
fn date_key(
    is: Comparison,
    when: &NaiveDateTime,
    before: &str,
    on: &str,
    since: &str,
) -> String {
    let date = format_date(when);
    match is {
        Comparison::LessThan => format!("{before} {date}"),
        Comparison::Equal => format!("{on} {date}"),
        Comparison::GreaterOrEqual => format!("{since} {date}"),
        Comparison::NotEqual => format!("NOT {on} {date}"),
        Comparison::LessOrEqual => format!("OR {before} {date} {on} {date}"),
        Comparison::GreaterThan => format!("({since} {date} NOT {on} {date})"),
    }
}

/// RFC 3501 date format, e.g. `7-Feb-2020`.
fn format_date(when: &NaiveDateTime) -> String {
    when.format("%-d-%b-%Y").to_string()
}

/// Quote a search string, escaping backslash and double quote.
fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        if c == '\\' || c == '"' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
