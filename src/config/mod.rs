//! Archiver configuration
//!
//! One TOML document describes the whole run: the relational sink, the mail
//! server, how login names derive from mail addresses, the accounts to
//! archive, and the filter tree deciding what gets archived. The filter's
//! tag names map 1:1 to [`Query`](crate::query::Query) variants, so a
//! configured tree round-trips through serde.
//!
//! ```toml
//! database = "/var/lib/mail-archiver/archive.db"
//! host = "imap.example.com"
//! security = "Tls"
//! identity = "SamAccountName"
//!
//! [[accounts]]
//! email = "user@example.com"
//! password = { command = "pass show mail/user" }
//!
//! [filter.Filter]
//! And = [
//!     { Not = { Flag = "Deleted" } },
//!     { Or = [
//!         { Usage = { of = "DiskSpace", is = "GreaterThan", value = 80 } },
//!         { MemberOf = "Archived Users" },
//!     ] },
//! ]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ArchiveError, Result};
use crate::query::Query;

/// Connection security for the mail server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityLevel {
    /// Plain connection.
    None,
    /// Implicit TLS (imaps).
    Ssl,
    /// STARTTLS upgrade, required.
    Tls,
}

/// Which login name to present for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityKind {
    /// The part of the mail address before the `@`.
    LocalPart,
    /// The full mail address.
    EmailAddress,
    /// The directory's `userPrincipalName` attribute.
    UserPrincipalName,
    /// The directory's `sAMAccountName` attribute.
    SamAccountName,
}

/// Password source, either inline or produced by a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PasswordSource {
    /// Raw password value.
    Raw(String),
    /// Command whose trimmed stdout is the password.
    Command { command: String },
}

impl PasswordSource {
    /// Resolve the password, running the command if configured.
    pub fn resolve(&self) -> Result<String> {
        match self {
            PasswordSource::Raw(password) => Ok(password.clone()),
            PasswordSource::Command { command } => {
                let output = Command::new("sh")
                    .arg("-c")
                    .arg(command)
                    .output()
                    .map_err(|e| {
                        ArchiveError::Credential(format!("password command failed: {e}"))
                    })?;
                if !output.status.success() {
                    return Err(ArchiveError::Credential(format!(
                        "password command exited with {}",
                        output.status
                    )));
                }
                let password = String::from_utf8(output.stdout).map_err(|_| {
                    ArchiveError::Credential("password command produced invalid UTF-8".into())
                })?;
                Ok(password.trim_end_matches(['\r', '\n']).to_string())
            }
        }
    }
}

/// One account to archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Mail address of the mailbox owner.
    pub email: String,

    /// Password for the mail server login.
    pub password: PasswordSource,
}

impl AccountConfig {
    /// The part of the address before the `@`.
    pub fn local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }

    /// The part of the address after the `@`.
    pub fn host(&self) -> &str {
        self.email.rsplit('@').next().unwrap_or("")
    }
}

/// Top-level archiver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path of the SQLite database the messages are archived into.
    pub database: PathBuf,

    /// Mail server hostname.
    pub host: String,

    /// Mail server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connection security.
    #[serde(default = "default_security")]
    pub security: SecurityLevel,

    /// Login name derivation.
    #[serde(default = "default_identity")]
    pub identity: IdentityKind,

    /// Accounts to archive.
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,

    /// The filter tree evaluated per mailbox.
    pub filter: Query,
}

fn default_port() -> u16 {
    993
}

fn default_security() -> SecurityLevel {
    SecurityLevel::Ssl
}

fn default_identity() -> IdentityKind {
    IdentityKind::LocalPart
}

impl AppConfig {
    /// Reject configurations that cannot possibly run.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(ArchiveError::Config("host not specified".into()));
        }
        if self.accounts.is_empty() {
            return Err(ArchiveError::Config("no accounts are specified".into()));
        }
        for account in &self.accounts {
            let (local, host) = match account.email.split_once('@') {
                Some(parts) => parts,
                None => {
                    return Err(ArchiveError::Config(format!(
                        "not a mail address: {}",
                        account.email
                    )))
                }
            };
            if local.is_empty() || host.is_empty() {
                return Err(ArchiveError::Config(format!(
                    "not a mail address: {}",
                    account.email
                )));
            }
        }
        Ok(())
    }
}

/// Default config paths, most specific first.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("mail-archiver").join("config.toml"));
    }

    if let Some(home_dir) = dirs::home_dir() {
        paths.push(
            home_dir
                .join(".config")
                .join("mail-archiver")
                .join("config.toml"),
        );
    }

    paths
}

/// Load and validate the configuration from the first default path that
/// exists.
pub fn load() -> Result<AppConfig> {
    for path in default_config_paths() {
        if path.exists() {
            return load_from_path(&path);
        }
    }
    Err(ArchiveError::Config("no configuration file found".into()))
}

/// Load and validate the configuration from a specific path.
pub fn load_from_path(path: &Path) -> Result<AppConfig> {
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .map_err(|e| ArchiveError::Config(format!("failed to read config: {e}")))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| ArchiveError::Config(format!("failed to parse config: {e}")))?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::date::DateSpec;
    use crate::query::predicate::FlagName;
    use crate::query::{Comparison, UsageKind};

    const SAMPLE: &str = r#"
database = "archive.db"
host = "imap.example.com"
port = 143
security = "Tls"
identity = "SamAccountName"

[[accounts]]
email = "user@example.com"
password = "hunter2"

[filter.Filter]
And = [
    { Not = { Flag = "Deleted" } },
    { Folder = "INBOX" },
    { Usage = { of = "DiskSpace", is = "GreaterThan", value = 80 } },
    { ReceivedDate = { is = "LessThan", year = 2020, offset_seconds = -3600 } },
]
"#;

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 143);
        assert_eq!(config.security, SecurityLevel::Tls);
        assert_eq!(config.identity, IdentityKind::SamAccountName);
        assert_eq!(config.accounts.len(), 1);
        assert_eq!(
            config.filter,
            Query::Filter(Box::new(Query::And(vec![
                Query::Not(Box::new(Query::Flag(FlagName::Deleted))),
                Query::Folder("INBOX".into()),
                Query::Usage {
                    of: UsageKind::DiskSpace,
                    is: Comparison::GreaterThan,
                    value: 80,
                },
                Query::ReceivedDate {
                    is: Comparison::LessThan,
                    date: DateSpec {
                        year: Some(2020),
                        offset_seconds: -3600,
                        ..Default::default()
                    },
                },
            ])))
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let minimal = r#"
database = "archive.db"
host = "imap.example.com"

[[accounts]]
email = "a@b.example"
password = "x"

[filter]
Folder = "INBOX"
"#;
        let config: AppConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.port, 993);
        assert_eq!(config.security, SecurityLevel::Ssl);
        assert_eq!(config.identity, IdentityKind::LocalPart);
    }

    #[test]
    fn test_filter_round_trips() {
        let config: AppConfig = toml::from_str(SAMPLE).unwrap();
        let rendered = toml::to_string(&config).unwrap();
        let reparsed: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed.filter, config.filter);
    }

    #[test]
    fn test_validate_rejects_empty_accounts() {
        let mut config: AppConfig = toml::from_str(SAMPLE).unwrap();
        config.accounts.clear();
        assert!(matches!(config.validate(), Err(ArchiveError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_address() {
        let mut config: AppConfig = toml::from_str(SAMPLE).unwrap();
        config.accounts[0].email = "not-an-address".into();
        assert!(matches!(config.validate(), Err(ArchiveError::Config(_))));
    }

    #[test]
    fn test_account_address_parts() {
        let account = AccountConfig {
            email: "user@example.com".into(),
            password: PasswordSource::Raw("x".into()),
        };
        assert_eq!(account.local_part(), "user");
        assert_eq!(account.host(), "example.com");
    }

    #[test]
    fn test_command_password_source() {
        let source = PasswordSource::Command {
            command: "printf 'secret\\n'".into(),
        };
        assert_eq!(source.resolve().unwrap(), "secret");
    }
}
