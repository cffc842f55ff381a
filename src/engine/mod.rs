//! Archiving engine
//!
//! Drives one archiving run: per account, look the owner up in the
//! directory, then walk the account's mailboxes. Each mailbox gets its own
//! [`MailboxContext`] and one filter evaluation; a definite `false` skips
//! the mailbox without any remote query, a definite `true` fetches
//! everything, and a deferred result is handed to the session as a search
//! predicate. Matching messages move into the store (replace semantics) and
//! are flagged deleted on the server.
//!
//! The mail transport itself lives behind [`MailSession`]; implementations
//! wrap whatever protocol client the deployment uses.

use std::cell::RefCell;
use std::collections::HashSet;

use once_cell::unsync::OnceCell;
use tracing::{debug, info};

use crate::config::{AccountConfig, AppConfig, IdentityKind};
use crate::directory::{membership_closure, Directory, UserRecord};
use crate::error::{ArchiveError, Result};
use crate::query::context::{GroupId, QueryContext, QuotaResource, SecurityId};
use crate::query::predicate::SearchPredicate;
use crate::query::result::QueryResult;
use crate::store::{ArchivedMessage, MessageStore};

/// The mail transport collaborator.
///
/// A session is connected and authenticated for one account. How the
/// predicate is executed is the implementation's business; the engine only
/// assumes the semantics described on [`SearchPredicate`].
pub trait MailSession {
    /// Fully qualified paths of all mailboxes of the account.
    fn list_mailboxes(&mut self) -> Result<Vec<String>>;

    /// Quota usage of the mailbox as a percentage.
    fn quota_usage(&mut self, mailbox: &str, resource: QuotaResource) -> Result<u32>;

    /// Every message in the mailbox.
    fn fetch_all(&mut self, mailbox: &str) -> Result<Vec<ArchivedMessage>>;

    /// The messages in the mailbox matching the predicate.
    fn search(
        &mut self,
        mailbox: &str,
        predicate: &SearchPredicate,
    ) -> Result<Vec<ArchivedMessage>>;

    /// Flag an archived message as deleted on the server.
    fn mark_deleted(&mut self, mailbox: &str, message_id: &str) -> Result<()>;
}

/// Local evaluation context for one mailbox.
///
/// Group membership is resolved lazily through the directory and cached for
/// the lifetime of this context only; quota lookups go to the session on
/// demand. A short-circuited evaluation therefore never touches either
/// collaborator.
pub struct MailboxContext<'a, S> {
    directory: &'a dyn Directory,
    session: RefCell<&'a mut S>,
    path: &'a str,
    member_of: &'a [String],
    groups: OnceCell<HashSet<SecurityId>>,
}

impl<'a, S: MailSession> MailboxContext<'a, S> {
    pub fn new(
        directory: &'a dyn Directory,
        session: &'a mut S,
        path: &'a str,
        member_of: &'a [String],
    ) -> Self {
        MailboxContext {
            directory,
            session: RefCell::new(session),
            path,
            member_of,
            groups: OnceCell::new(),
        }
    }
}

impl<S: MailSession> QueryContext for MailboxContext<'_, S> {
    fn is_member_of(&self, group: &GroupId) -> Result<bool> {
        let sid = match group {
            GroupId::Sid(sid) => sid.clone(),
            GroupId::Name(name) => self.directory.translate_name(name)?,
        };
        let groups = self
            .groups
            .get_or_try_init(|| membership_closure(self.directory, self.member_of))?;
        Ok(groups.contains(&sid))
    }

    fn quota_usage(&self, resource: QuotaResource) -> Result<u32> {
        self.session.borrow_mut().quota_usage(self.path, resource)
    }

    fn path(&self) -> &str {
        self.path
    }
}

/// Counters for one account's run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AccountRun {
    pub mailboxes_visited: u32,
    pub mailboxes_skipped: u32,
    pub messages_archived: u64,
}

/// The login name to present to the mail server for an account.
pub fn login_name(identity: IdentityKind, account: &AccountConfig, user: &UserRecord) -> String {
    match identity {
        IdentityKind::LocalPart => account.local_part().to_string(),
        IdentityKind::EmailAddress => account.email.clone(),
        IdentityKind::SamAccountName => user.sam_account_name.clone(),
        IdentityKind::UserPrincipalName => user.user_principal_name.clone(),
    }
}

/// One archiving run over the configured accounts.
pub struct Archiver<'a> {
    config: &'a AppConfig,
    directory: &'a dyn Directory,
    store: &'a mut MessageStore,
}

impl<'a> Archiver<'a> {
    pub fn new(
        config: &'a AppConfig,
        directory: &'a dyn Directory,
        store: &'a mut MessageStore,
    ) -> Self {
        Archiver {
            config,
            directory,
            store,
        }
    }

    /// Archive every matching message of one account.
    ///
    /// The session must already be connected and authenticated for the
    /// account (see [`login_name`] for deriving the login).
    pub fn archive_account<S: MailSession>(
        &mut self,
        account: &AccountConfig,
        session: &mut S,
    ) -> Result<AccountRun> {
        info!(account = %account.email, "archiving account");

        let user = self
            .directory
            .find_user_by_mail(&account.email)?
            .ok_or_else(|| ArchiveError::AccountNotFound(account.email.clone()))?;

        let mut run = AccountRun::default();
        for mailbox in session.list_mailboxes()? {
            run.mailboxes_visited += 1;

            let outcome = {
                let ctx =
                    MailboxContext::new(self.directory, &mut *session, &mailbox, &user.member_of);
                self.config.filter.evaluate(&ctx)?
            };

            let messages = match outcome {
                QueryResult::Decided(false) => {
                    debug!(mailbox = %mailbox, "filtered out, skipping");
                    run.mailboxes_skipped += 1;
                    continue;
                }
                QueryResult::Decided(true) => session.fetch_all(&mailbox)?,
                QueryResult::Deferred(predicate) => session.search(&mailbox, &predicate)?,
            };

            info!(mailbox = %mailbox, count = messages.len(), "archiving messages");
            for message in messages {
                self.store.replace_message(&mailbox, &user.sid, &message)?;
                session.mark_deleted(&mailbox, &message.message_id)?;
                run.messages_archived += 1;
            }
        }

        Ok(run)
    }
}
