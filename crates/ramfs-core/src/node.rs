// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Node and session capabilities shared by files and directories

use std::sync::{Arc, Weak};

use ramfs_proto::{FileMode, OpenMode, Qid, Stat};

use crate::dir::{DirSession, RamDir};
use crate::error::{FsError, FsResult};
use crate::file::{FileSession, RamFile};

/// Seek origin of a session cursor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekOrigin {
    Start,
    Current,
    End,
}

impl TryFrom<u32> for SeekOrigin {
    type Error = FsError;

    fn try_from(whence: u32) -> FsResult<Self> {
        match whence {
            0 => Ok(SeekOrigin::Start),
            1 => Ok(SeekOrigin::Current),
            2 => Ok(SeekOrigin::End),
            _ => Err(FsError::InvalidSeek),
        }
    }
}

/// Resolve a seek request against the current cursor and stream length.
///
/// Only the arithmetic and the negative-offset rule live here; each
/// session applies its own upper-bound policy to the result.
pub(crate) fn seek_target(current: i64, len: i64, offset: i64, origin: SeekOrigin) -> FsResult<i64> {
    let target = match origin {
        SeekOrigin::Start => Some(offset),
        SeekOrigin::Current => current.checked_add(offset),
        SeekOrigin::End => len.checked_add(offset),
    };
    match target {
        Some(t) if t >= 0 => Ok(t),
        _ => Err(FsError::InvalidSeek),
    }
}

/// Cursor-based access to an opened node
pub trait Session {
    /// Move the cursor and return its new position.
    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> FsResult<i64>;
    /// Copy bytes at the cursor into `buf`; zero at end of stream.
    fn read(&mut self, buf: &mut [u8]) -> FsResult<usize>;
    fn write(&mut self, data: &[u8]) -> FsResult<usize>;
    /// Release the node. Any later call fails with `NotOpen`.
    fn close(&mut self) -> FsResult<()>;
}

/// Mutable fields common to both node kinds, guarded by the node's lock
#[derive(Debug)]
pub(crate) struct NodeMeta {
    pub name: String,
    pub owner: String,
    pub group: String,
    pub muser: String,
    pub mode: FileMode,
    pub version: u32,
    pub mtime: u32,
    pub opens: u32,
    pub parent: Option<Weak<RamDir>>,
}

impl NodeMeta {
    pub fn new(name: String, mode: FileMode, owner: String, group: String, now: u32) -> Self {
        Self {
            name,
            muser: owner.clone(),
            owner,
            group,
            mode,
            version: 0,
            mtime: now,
            opens: 0,
            parent: None,
        }
    }

    /// Record an observable mutation.
    pub fn bump(&mut self, now: u32) {
        self.mtime = now;
        self.version = self.version.wrapping_add(1);
    }

    /// Take owner, group and mode from `stat`. The name is left alone:
    /// renames must also re-key the parent's entry.
    pub fn apply_stat(&mut self, stat: &Stat) {
        self.owner = stat.uid.clone();
        self.group = stat.gid.clone();
        self.mode = stat.mode;
    }

    pub fn parent(&self) -> Option<Arc<RamDir>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }
}

/// Names must be a single non-special path component.
pub(crate) fn validate_name(name: &str) -> FsResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(FsError::InvalidName);
    }
    Ok(())
}

/// Name a metadata write asks for, or `None` when it keeps the current
/// one (as stored, or as `shown` in the node's stat).
pub(crate) fn requested_name<'a>(current: &str, shown: &str, requested: &'a str) -> FsResult<Option<&'a str>> {
    if requested == current || requested == shown {
        return Ok(None);
    }
    validate_name(requested)?;
    Ok(Some(requested))
}

/// A file or a directory
///
/// Directory-only operations are reached through [`Node::as_dir`].
#[derive(Clone)]
pub enum Node {
    File(Arc<RamFile>),
    Dir(Arc<RamDir>),
}

impl Node {
    pub fn id(&self) -> u64 {
        match self {
            Node::File(f) => f.id(),
            Node::Dir(d) => d.id(),
        }
    }

    pub fn open(&self, user: &str, mode: OpenMode) -> FsResult<SessionHandle> {
        match self {
            Node::File(f) => f.open(user, mode).map(SessionHandle::File),
            Node::Dir(d) => d.open(user, mode).map(SessionHandle::Dir),
        }
    }

    pub fn stat(&self) -> Stat {
        match self {
            Node::File(f) => f.stat(),
            Node::Dir(d) => d.stat(),
        }
    }

    pub fn write_stat(&self, stat: &Stat) -> FsResult<()> {
        match self {
            Node::File(f) => f.write_stat(stat),
            Node::Dir(d) => d.write_stat(stat),
        }
    }

    pub fn qid(&self) -> Qid {
        match self {
            Node::File(f) => f.qid(),
            Node::Dir(d) => d.qid(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Node::File(f) => f.name(),
            Node::Dir(d) => d.name(),
        }
    }

    /// Containing directory. Always present for directories (the root is
    /// its own parent); absent for files that were never linked.
    pub fn parent(&self) -> Option<Arc<RamDir>> {
        match self {
            Node::File(f) => f.parent(),
            Node::Dir(d) => Some(d.parent()),
        }
    }

    pub fn set_parent(&self, parent: &Arc<RamDir>) {
        match self {
            Node::File(f) => f.set_parent(parent),
            Node::Dir(d) => d.set_parent(parent),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Dir(_))
    }

    pub fn can_remove(&self) -> bool {
        match self {
            Node::File(f) => f.can_remove(),
            Node::Dir(d) => d.can_remove(),
        }
    }

    pub fn open_count(&self) -> u32 {
        match self {
            Node::File(f) => f.open_count(),
            Node::Dir(d) => d.open_count(),
        }
    }

    pub fn as_dir(&self) -> Option<&Arc<RamDir>> {
        match self {
            Node::Dir(d) => Some(d),
            Node::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&Arc<RamFile>> {
        match self {
            Node::File(f) => Some(f),
            Node::Dir(_) => None,
        }
    }

    pub(crate) fn set_name(&self, name: &str) {
        match self {
            Node::File(f) => f.set_name(name),
            Node::Dir(d) => d.set_name(name),
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_dir() { "Dir" } else { "File" };
        f.debug_struct(kind).field("id", &self.id()).field("name", &self.name()).finish()
    }
}

impl From<Arc<RamFile>> for Node {
    fn from(file: Arc<RamFile>) -> Self {
        Node::File(file)
    }
}

impl From<Arc<RamDir>> for Node {
    fn from(dir: Arc<RamDir>) -> Self {
        Node::Dir(dir)
    }
}

/// Session over either node kind, as returned by [`Node::open`]
#[derive(Debug)]
pub enum SessionHandle {
    File(FileSession),
    Dir(DirSession),
}

impl Session for SessionHandle {
    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> FsResult<i64> {
        match self {
            SessionHandle::File(s) => s.seek(offset, origin),
            SessionHandle::Dir(s) => s.seek(offset, origin),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        match self {
            SessionHandle::File(s) => s.read(buf),
            SessionHandle::Dir(s) => s.read(buf),
        }
    }

    fn write(&mut self, data: &[u8]) -> FsResult<usize> {
        match self {
            SessionHandle::File(s) => s.write(data),
            SessionHandle::Dir(s) => s.write(data),
        }
    }

    fn close(&mut self) -> FsResult<()> {
        match self {
            SessionHandle::File(s) => s.close(),
            SessionHandle::Dir(s) => s.close(),
        }
    }
}
