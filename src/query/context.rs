//! Local evaluation context
//!
//! A query consults exactly three local facts: group membership of the
//! mailbox owner, quota usage of the mailbox, and the mailbox path. The
//! engine supplies one context per mailbox; the core only depends on this
//! contract.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;

/// Matches the string form of a well-known NT authority security identifier.
static SID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^S-1-5(-\d+)+$").expect("SID pattern is valid"));

/// Security identifier in its string form, e.g. `S-1-5-21-...-513`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecurityId(String);

impl SecurityId {
    pub fn new(sid: impl Into<String>) -> Self {
        SecurityId(sid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecurityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A group reference as configured in a `MemberOf` leaf.
///
/// Names in SID string form are parsed directly; anything else is an
/// account or group name the directory collaborator must translate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupId {
    Sid(SecurityId),
    Name(String),
}

impl GroupId {
    /// Classify a configured group reference.
    pub fn parse(reference: &str) -> GroupId {
        if SID_PATTERN.is_match(reference) {
            GroupId::Sid(SecurityId::new(reference))
        } else {
            GroupId::Name(reference.to_string())
        }
    }
}

/// Quota resource a `Usage` leaf asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaResource {
    /// Mailbox storage, reported as `STORAGE` by the server.
    Storage,
    /// Message count, reported as `MESSAGE` by the server.
    Message,
}

impl QuotaResource {
    /// The IMAP QUOTA resource name.
    pub fn as_str(self) -> &'static str {
        match self {
            QuotaResource::Storage => "STORAGE",
            QuotaResource::Message => "MESSAGE",
        }
    }
}

/// The local facts a query may consult during evaluation.
///
/// Implementations must report failures as errors; a failed lookup aborts
/// the evaluation of that mailbox's query and is never treated as `false`.
pub trait QueryContext {
    /// Whether the mailbox owner is a (possibly transitive) member of the
    /// given group.
    fn is_member_of(&self, group: &GroupId) -> Result<bool>;

    /// Usage of the given quota resource as a percentage (0..=100 and
    /// beyond, if the server permits overage).
    fn quota_usage(&self, resource: QuotaResource) -> Result<u32>;

    /// Fully qualified path of the mailbox under evaluation, stable for
    /// the duration of one evaluation call.
    fn path(&self) -> &str;
}
