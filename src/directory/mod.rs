//! Directory service collaborator
//!
//! Group membership in a directory is transitive: the owner of a mailbox is
//! in every group its direct groups are members of, and so on. The engine
//! resolves this closure breadth first over the `memberOf` edges, querying
//! each frontier of distinguished names in one batch and never re-querying
//! a name it has already seen, so membership cycles terminate.
//!
//! The wire protocol (LDAP bind, search, attribute decoding) is the
//! implementor's concern; the engine only needs the [`Directory`] trait.

use std::collections::HashSet;

use tracing::debug;

use crate::error::Result;
use crate::query::context::SecurityId;

/// Directory entry for a mailbox owner, looked up by mail address.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub sid: SecurityId,
    pub sam_account_name: String,
    pub user_principal_name: String,
    /// Distinguished names of the user's direct groups.
    pub member_of: Vec<String>,
}

/// Directory entry for a group.
#[derive(Debug, Clone)]
pub struct GroupRecord {
    pub sid: SecurityId,
    /// Distinguished names of the groups this group is a member of.
    pub member_of: Vec<String>,
}

/// The lookups the archiver needs from a directory service.
pub trait Directory {
    /// Find the user whose `mail` attribute equals the address.
    fn find_user_by_mail(&self, address: &str) -> Result<Option<UserRecord>>;

    /// Find the groups with the given distinguished names. Names without a
    /// matching group are silently absent from the result.
    fn find_groups(&self, distinguished_names: &[String]) -> Result<Vec<GroupRecord>>;

    /// Translate an account or group name into its security identifier.
    fn translate_name(&self, name: &str) -> Result<SecurityId>;
}

/// Compute the transitive group closure starting from direct memberships.
///
/// Returns the security identifiers of every group reachable over
/// `memberOf` edges from the seed distinguished names, the seeds included.
pub fn membership_closure(
    directory: &dyn Directory,
    member_of: &[String],
) -> Result<HashSet<SecurityId>> {
    let mut sids = HashSet::new();
    let mut seen: HashSet<String> = member_of.iter().cloned().collect();
    let mut frontier: Vec<String> = member_of.to_vec();

    while !frontier.is_empty() {
        debug!(groups = frontier.len(), "resolving group frontier");
        let mut next = HashSet::new();
        for group in directory.find_groups(&frontier)? {
            sids.insert(group.sid);
            next.extend(group.member_of);
        }
        frontier = next.into_iter().filter(|dn| seen.insert(dn.clone())).collect();
    }

    Ok(sids)
}

/// Escape a value for interpolation into an LDAP filter (RFC 4515).
pub fn escape_ldap(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len() * 2);
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str(r"\5c"),
            '*' => escaped.push_str(r"\2a"),
            '(' => escaped.push_str(r"\28"),
            ')' => escaped.push_str(r"\29"),
            '\0' => escaped.push_str(r"\00"),
            '/' => escaped.push_str(r"\2f"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashMap;

    use super::*;
    use crate::error::ArchiveError;

    /// In-memory directory of groups keyed by distinguished name.
    struct FakeDirectory {
        groups: HashMap<String, GroupRecord>,
        batches: Cell<u32>,
    }

    impl FakeDirectory {
        fn new(edges: &[(&str, &str, &[&str])]) -> Self {
            let groups = edges
                .iter()
                .map(|(dn, sid, parents)| {
                    (
                        dn.to_string(),
                        GroupRecord {
                            sid: SecurityId::new(*sid),
                            member_of: parents.iter().map(|p| p.to_string()).collect(),
                        },
                    )
                })
                .collect();
            FakeDirectory {
                groups,
                batches: Cell::new(0),
            }
        }
    }

    impl Directory for FakeDirectory {
        fn find_user_by_mail(&self, _address: &str) -> Result<Option<UserRecord>> {
            Ok(None)
        }

        fn find_groups(&self, distinguished_names: &[String]) -> Result<Vec<GroupRecord>> {
            self.batches.set(self.batches.get() + 1);
            Ok(distinguished_names
                .iter()
                .filter_map(|dn| self.groups.get(dn).cloned())
                .collect())
        }

        fn translate_name(&self, name: &str) -> Result<SecurityId> {
            Err(ArchiveError::Directory(format!("unknown name: {name}")))
        }
    }

    fn sids(ids: &[&str]) -> HashSet<SecurityId> {
        ids.iter().map(|s| SecurityId::new(*s)).collect()
    }

    #[test]
    fn test_closure_includes_transitive_groups() {
        let directory = FakeDirectory::new(&[
            ("cn=staff", "S-1-5-21-1-1-1-100", &["cn=everyone"]),
            ("cn=everyone", "S-1-5-21-1-1-1-101", &[]),
        ]);
        let closure = membership_closure(&directory, &["cn=staff".into()]).unwrap();
        assert_eq!(closure, sids(&["S-1-5-21-1-1-1-100", "S-1-5-21-1-1-1-101"]));
    }

    #[test]
    fn test_closure_terminates_on_cycles() {
        let directory = FakeDirectory::new(&[
            ("cn=a", "S-1-5-21-1-1-1-1", &["cn=b"]),
            ("cn=b", "S-1-5-21-1-1-1-2", &["cn=a"]),
        ]);
        let closure = membership_closure(&directory, &["cn=a".into()]).unwrap();
        assert_eq!(closure, sids(&["S-1-5-21-1-1-1-1", "S-1-5-21-1-1-1-2"]));
        // cn=a is seen from the start, cn=b once; no third batch for cn=a.
        assert_eq!(directory.batches.get(), 2);
    }

    #[test]
    fn test_closure_of_no_seeds_is_empty() {
        let directory = FakeDirectory::new(&[]);
        let closure = membership_closure(&directory, &[]).unwrap();
        assert!(closure.is_empty());
        assert_eq!(directory.batches.get(), 0);
    }

    #[test]
    fn test_escape_ldap() {
        assert_eq!(escape_ldap("plain"), "plain");
        assert_eq!(
            escape_ldap(r"a\b*c(d)e/f"),
            r"a\5cb\2ac\28d\29e\2ff"
        );
        assert_eq!(escape_ldap("nul\0byte"), r"nul\00byte");
    }
}
