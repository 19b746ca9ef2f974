// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Collaborators shared by every node of a tree

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ramfs_proto::{FileMode, OpenMode};
use tracing::debug;

use crate::config::RamFsConfig;
use crate::error::{FsError, FsResult};
use crate::ident::{IdAllocator, SequentialIds};
use crate::perm::{AllowAll, OwnerOtherPermissions, PermissionPredicate};

/// Identifier source and permission predicate handed to node constructors
pub struct TreeContext {
    ids: Arc<dyn IdAllocator>,
    perms: Arc<dyn PermissionPredicate>,
}

impl TreeContext {
    pub fn new(ids: Arc<dyn IdAllocator>, perms: Arc<dyn PermissionPredicate>) -> Arc<Self> {
        Arc::new(Self { ids, perms })
    }

    pub fn from_config(config: &RamFsConfig) -> Arc<Self> {
        let perms: Arc<dyn PermissionPredicate> = if config.security.enforce_permissions {
            Arc::new(OwnerOtherPermissions)
        } else {
            Arc::new(AllowAll)
        };
        Self::new(Arc::new(SequentialIds::starting_at(config.first_id)), perms)
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.ids.next_id()
    }

    /// Gate `requested` access to node `node` owned by `owner`.
    pub(crate) fn check(
        &self,
        node: u64,
        owner: &str,
        user: &str,
        mode: FileMode,
        requested: OpenMode,
    ) -> FsResult<()> {
        if self.perms.allowed(owner == user, mode, requested) {
            return Ok(());
        }
        debug!(node, user, owner, ?mode, ?requested, "access denied");
        Err(FsError::AccessDenied)
    }
}

impl Default for TreeContext {
    fn default() -> Self {
        Self {
            ids: Arc::new(SequentialIds::new()),
            perms: Arc::new(OwnerOtherPermissions),
        }
    }
}

/// Seconds since the epoch, truncated to the width of the stat fields
pub(crate) fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
