// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Permission decisions
//!
//! Nodes never interpret mode bits themselves; they ask the predicate
//! held by their `TreeContext` whether the requester may have the
//! requested access.

use ramfs_proto::{FileMode, OpenMode};

/// Maps ownership, node mode and requested access to allow/deny
#[cfg_attr(test, mockall::automock)]
pub trait PermissionPredicate: Send + Sync {
    fn allowed(&self, is_owner: bool, mode: FileMode, requested: OpenMode) -> bool;
}

/// Owner bits for the owning user, "other" bits for everyone else.
///
/// Group bits are never consulted: nodes carry a group name but there is
/// no membership data to evaluate it against. Open modifiers such as
/// truncate do not affect the decision.
#[derive(Clone, Copy, Debug, Default)]
pub struct OwnerOtherPermissions;

impl PermissionPredicate for OwnerOtherPermissions {
    fn allowed(&self, is_owner: bool, mode: FileMode, requested: OpenMode) -> bool {
        let shift = if is_owner { 6 } else { 0 };
        let class = (mode.perm() >> shift) & 0o7;
        let (r, w, x) = (class & 0o4 != 0, class & 0o2 != 0, class & 0o1 != 0);

        match requested.access() {
            OpenMode::READ => r,
            OpenMode::WRITE => w,
            OpenMode::RDWR => r && w,
            _ => x,
        }
    }
}

/// Allows every request; used when permission enforcement is disabled
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl PermissionPredicate for AllowAll {
    fn allowed(&self, _is_owner: bool, _mode: FileMode, _requested: OpenMode) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_uses_owner_bits() {
        let p = OwnerOtherPermissions;
        let mode = FileMode::new(0o604);

        assert!(p.allowed(true, mode, OpenMode::RDWR));
        assert!(!p.allowed(true, mode, OpenMode::EXEC));
        assert!(p.allowed(false, mode, OpenMode::READ));
        assert!(!p.allowed(false, mode, OpenMode::WRITE));
        assert!(!p.allowed(false, mode, OpenMode::RDWR));
    }

    #[test]
    fn group_bits_are_ignored() {
        let p = OwnerOtherPermissions;
        let mode = FileMode::new(0o070);
        assert!(!p.allowed(false, mode, OpenMode::READ));
        assert!(!p.allowed(true, mode, OpenMode::READ));
    }

    #[test]
    fn truncate_modifier_does_not_change_decision() {
        let p = OwnerOtherPermissions;
        let mode = FileMode::new(0o200);
        assert!(p.allowed(true, mode, OpenMode::WRITE.with_truncate()));
        assert!(!p.allowed(false, mode, OpenMode::WRITE.with_truncate()));
    }

    #[test]
    fn directory_flag_does_not_leak_into_bits() {
        let p = OwnerOtherPermissions;
        assert!(p.allowed(false, FileMode::dir(0o001), OpenMode::EXEC));
        assert!(!p.allowed(false, FileMode::dir(0o001), OpenMode::READ));
    }

    #[test]
    fn allow_all_allows() {
        assert!(AllowAll.allowed(false, FileMode::new(0), OpenMode::RDWR));
    }
}
