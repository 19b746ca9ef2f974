// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! RamFS Core: in-memory file tree behind a 9P-style file server
//!
//! The tree is made of [`RamFile`] and [`RamDir`] nodes, each guarded by
//! its own reader/writer lock so that unrelated nodes never contend.
//! Opening a node yields a session with an independent cursor; directory
//! sessions stream a snapshot of their children's encoded stats.
//!
//! Identifier allocation and access decisions are injected through a
//! [`TreeContext`], so embedders and tests can supply their own.

pub mod config;
pub mod context;
pub mod dir;
pub mod error;
pub mod file;
pub mod fs;
pub mod ident;
pub mod node;
pub mod perm;

// Re-export key types
pub use config::{RamFsConfig, RootConfig, SecurityPolicy};
pub use context::TreeContext;
pub use dir::{DirSession, RamDir};
pub use error::{FsError, FsResult};
pub use file::{FileSession, RamFile};
pub use fs::RamFs;
pub use ident::{IdAllocator, SequentialIds};
pub use node::{Node, SeekOrigin, Session, SessionHandle};
pub use perm::{AllowAll, OwnerOtherPermissions, PermissionPredicate};

pub use ramfs_proto;
