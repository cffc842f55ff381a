//! Mail archiver with a hybrid local/remote filter engine
//!
//! Archives mailbox contents into a relational store, deciding per mailbox
//! and per message what to archive via a declarative filter tree loaded
//! from configuration. Filter nodes either resolve locally (mailbox path,
//! group membership, quota usage) or are deferred to the mail server as a
//! search predicate; the evaluator short-circuits locally where it can and
//! ships the smallest possible predicate for the rest.
//!
//! ## Module Organization
//!
//! - `config/`: TOML configuration, including the filter tree
//! - `query/`: filter nodes, tri-state results, deferred predicates,
//!   date resolution — the core
//! - `directory/`: directory collaborator contract and the transitive
//!   group-membership closure
//! - `engine/`: per-account archiving run over a mail session
//! - `store/`: SQLite message sink with replace semantics
//!
//! The mail transport and the directory service are reached through the
//! [`engine::MailSession`] and [`directory::Directory`] traits; this crate
//! ships no protocol client and installs no tracing subscriber — both are
//! the integrating binary's concern. Runs are scheduled externally (cron,
//! systemd timers); one invocation is one run.

pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod query;
pub mod store;

pub use config::AppConfig;
pub use engine::{Archiver, MailSession};
pub use error::{ArchiveError, Result};
pub use query::result::QueryResult;
pub use query::Query;
pub use store::{ArchivedMessage, MessageStore};
