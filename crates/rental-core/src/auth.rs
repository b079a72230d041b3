//! Directory-backed authorization.
//!
//! A user's groups come from the `groupMembership` attribute of their
//! directory entry. Every known user may read; members of a privileged group
//! may also update.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::directory::{Directory, DirectoryError, Filter, Scope};
use crate::error::InventoryError;
use crate::model::Operation;

/// Object class of personal accounts in the directory.
pub const USER_OBJECT_CLASS: &str = "urrzUser";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A user's identity, groups and granted operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermissions {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub groups: Vec<String>,
    pub allowed: Vec<Operation>,
}

impl UserPermissions {
    #[must_use]
    pub fn can(&self, op: Operation) -> bool {
        self.allowed.contains(&op)
    }
}

/// Turn a group DN into dotted form: `cn=a,ou=b,o=c,c=d` becomes `a.b.c.d`.
#[must_use]
pub fn normalize_group_dn(dn: &str) -> String {
    dn.split(',')
        .map(|rdn| {
            let rdn = rdn.trim();
            rdn.split_once('=').map_or(rdn, |(_, value)| value.trim())
        })
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Resolves users to [`UserPermissions`] through a [`Directory`].
pub struct AuthLookup {
    directory: Arc<dyn Directory>,
    base_dn: String,
    scope: Scope,
    timeout: Duration,
    privileged: BTreeSet<String>,
}

impl AuthLookup {
    pub fn new(directory: Arc<dyn Directory>, base_dn: impl Into<String>) -> Self {
        Self {
            directory,
            base_dn: base_dn.into(),
            scope: Scope::default(),
            timeout: DEFAULT_TIMEOUT,
            privileged: BTreeSet::new(),
        }
    }

    #[must_use]
    pub const fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Groups (dotted form) whose members get the write set.
    #[must_use]
    pub fn with_privileged_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.privileged = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Look up `user_id` and derive its permissions.
    ///
    /// Returns `Ok(None)` when the user is unknown or the directory times out.
    ///
    /// # Errors
    ///
    /// [`InventoryError::DataIntegrity`] if more than one entry matches, and
    /// [`InventoryError::Directory`] for directory failures other than a timeout.
    pub fn lookup_user(&self, user_id: &str) -> Result<Option<UserPermissions>, InventoryError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Ok(None);
        }

        let filter = Filter::And(vec![
            Filter::equals("cn", user_id),
            Filter::equals("objectClass", USER_OBJECT_CLASS),
        ]);
        tracing::debug!(base_dn = %self.base_dn, %filter, "directory search");

        let mut entries =
            match self
                .directory
                .search(&self.base_dn, self.scope, &filter, self.timeout)
            {
                Ok(entries) => entries,
                Err(DirectoryError::Timeout(waited)) => {
                    tracing::warn!(user_id, ?waited, "directory lookup timed out");
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };

        if entries.len() > 1 {
            return Err(InventoryError::DataIntegrity(format!(
                "{} directory entries match user {user_id}",
                entries.len()
            )));
        }
        let Some(entry) = entries.pop() else {
            tracing::debug!(user_id, "no directory entry");
            return Ok(None);
        };

        let groups: Vec<String> = entry
            .values("groupMembership")
            .iter()
            .map(|dn| normalize_group_dn(dn))
            .collect();

        let mut allowed = Operation::READ.to_vec();
        if groups.iter().any(|g| self.privileged.contains(g)) {
            allowed.extend(Operation::WRITE);
        }

        Ok(Some(UserPermissions {
            user_id: user_id.to_string(),
            name: entry.first("fullName").map(str::to_string),
            email: entry.first("mail").map(str::to_string),
            groups,
            allowed,
        }))
    }

    /// Whether `user_id` may perform `op`. Any failure denies.
    pub fn is_allowed(&self, user_id: &str, op: Operation) -> bool {
        match self.lookup_user(user_id) {
            Ok(Some(user)) => user.can(op),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(user_id, %op, "authorization lookup failed, denying: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_dn_is_dotted() {
        assert_eq!(
            normalize_group_dn("cn=mi-staff,ou=mi,ou=sprachlit,o=uni-regensburg,c=de"),
            "mi-staff.mi.sprachlit.uni-regensburg.de"
        );
        assert_eq!(normalize_group_dn("cn=a,ou=b,o=c,c=d"), "a.b.c.d");
    }

    #[test]
    fn malformed_rdn_keeps_its_text() {
        assert_eq!(normalize_group_dn("plain, ou=x"), "plain.x");
    }
}
