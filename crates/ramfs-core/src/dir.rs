// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Directory nodes and directory sessions
//!
//! A directory owns its children through a name-ordered map; children
//! point back at it through a weak reference. Structural operations lock
//! only the directory itself and touch a child's lock only to query
//! removability or rewrite its metadata, so locks are always taken
//! parent-before-child. Grafts that would make a directory its own
//! descendant are refused, which keeps parent links acyclic.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use ramfs_proto::{FileMode, OpenMode, Qid, QidKind, Stat};
use tracing::{debug, trace};

use crate::context::{now, TreeContext};
use crate::error::{FsError, FsResult};
use crate::file::RamFile;
use crate::node::{
    requested_name, seek_target, validate_name, Node, NodeMeta, SeekOrigin, Session,
};

struct DirState {
    meta: NodeMeta,
    entries: BTreeMap<String, Node>,
}

/// Container node mapping unique names to child nodes
pub struct RamDir {
    ctx: Arc<TreeContext>,
    id: u64,
    atime: AtomicU32,
    state: RwLock<DirState>,
}

impl RamDir {
    pub fn new(
        ctx: &Arc<TreeContext>,
        name: impl Into<String>,
        mode: FileMode,
        owner: impl Into<String>,
        group: impl Into<String>,
    ) -> Arc<Self> {
        let now = now();
        Arc::new(Self {
            ctx: Arc::clone(ctx),
            id: ctx.next_id(),
            atime: AtomicU32::new(now),
            state: RwLock::new(DirState {
                meta: NodeMeta::new(name.into(), mode.with_dir(), owner.into(), group.into(), now),
                entries: BTreeMap::new(),
            }),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn open(self: &Arc<Self>, user: &str, mode: OpenMode) -> FsResult<DirSession> {
        let mut state = self.state.write();
        self.ctx
            .check(self.id, &state.meta.owner, user, state.meta.mode, mode)?;
        state.meta.opens += 1;
        self.touch();
        trace!(node = self.id, user, ?mode, opens = state.meta.opens, "directory opened");

        Ok(DirSession {
            dir: Some(Arc::clone(self)),
            offset: 0,
            listing: Listing::Unfetched,
        })
    }

    pub fn stat(&self) -> Stat {
        let state = self.state.read();
        let meta = &state.meta;
        Stat {
            typ: 0,
            dev: 0,
            qid: Qid::new(QidKind::Directory, meta.version, self.id),
            mode: meta.mode.with_dir(),
            atime: self.atime.load(Ordering::Relaxed),
            mtime: meta.mtime,
            length: 0,
            name: display_name(&meta.name),
            uid: meta.owner.clone(),
            gid: meta.group.clone(),
            muid: meta.muser.clone(),
        }
    }

    /// Replace name, owner, group and mode. Directories have no length,
    /// so `stat.length` is ignored. A new name re-keys the parent's entry.
    pub fn write_stat(&self, stat: &Stat) -> FsResult<()> {
        let (current, parent) = {
            let state = self.state.read();
            (state.meta.name.clone(), state.meta.parent())
        };
        match (requested_name(&current, &display_name(&current), &stat.name)?, parent) {
            (Some(name), Some(parent)) => {
                parent.rekey_child(self.id, name, || self.update_meta(stat, Some(name)))
            }
            (name, _) => self.update_meta(stat, name),
        }
    }

    fn update_meta(&self, stat: &Stat, name: Option<&str>) -> FsResult<()> {
        let mut state = self.state.write();
        state.meta.apply_stat(stat);
        if let Some(name) = name {
            state.meta.name = name.to_string();
        }
        state.meta.bump(now());
        self.touch();
        Ok(())
    }

    pub fn qid(&self) -> Qid {
        Qid::new(QidKind::Directory, self.state.read().meta.version, self.id)
    }

    /// Stored name, or `/` for an unnamed directory such as the root
    pub fn name(&self) -> String {
        display_name(&self.state.read().meta.name)
    }

    /// Containing directory; the root is its own parent.
    pub fn parent(self: &Arc<Self>) -> Arc<RamDir> {
        self.state.read().meta.parent().unwrap_or_else(|| Arc::clone(self))
    }

    pub fn set_parent(&self, parent: &Arc<RamDir>) {
        self.state.write().meta.parent = Some(Arc::downgrade(parent));
    }

    pub fn can_remove(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn open_count(&self) -> u32 {
        self.state.read().meta.opens
    }

    /// Child names in listing order
    pub fn names(&self) -> Vec<String> {
        self.state.read().entries.keys().cloned().collect()
    }

    /// Create an empty file, or a directory when `perms` carries the
    /// directory flag. The child inherits this directory's owner and group
    /// and its permission bits are clipped to this directory's: rw bits
    /// for files, rwx bits for directories.
    pub fn create(self: &Arc<Self>, user: &str, name: &str, perms: FileMode) -> FsResult<Node> {
        validate_name(name)?;
        let mut state = self.state.write();
        self.ctx
            .check(self.id, &state.meta.owner, user, state.meta.mode, OpenMode::WRITE)?;
        if state.entries.contains_key(name) {
            debug!(dir = self.id, name, "create: name exists");
            return Err(FsError::NameConflict);
        }

        let (owner, group) = (state.meta.owner.clone(), state.meta.group.clone());
        let child: Node = if perms.is_dir() {
            let perms = perms.clip(FileMode::PERM_MASK, state.meta.mode);
            RamDir::new(&self.ctx, name, perms, owner, group).into()
        } else {
            let perms = perms.clip(FileMode::RW_MASK, state.meta.mode);
            RamFile::new(&self.ctx, name, perms, owner, group).into()
        };
        child.set_parent(self);
        state.entries.insert(name.to_string(), child.clone());

        state.meta.muser = user.to_string();
        state.meta.bump(now());
        self.touch();
        trace!(dir = self.id, child = child.id(), name, user, "created");
        Ok(child)
    }

    /// Graft an externally built node under `name` without permission
    /// checks or permission clipping.
    pub fn add(self: &Arc<Self>, name: &str, node: impl Into<Node>) -> FsResult<()> {
        validate_name(name)?;
        let node = node.into();
        if let Node::Dir(dir) = &node {
            if self.descends_from(dir) {
                debug!(dir = self.id, graft = dir.id, name, "add: would create a cycle");
                return Err(FsError::WouldCycle);
            }
        }
        let mut state = self.state.write();
        if state.entries.contains_key(name) {
            debug!(dir = self.id, name, "add: name exists");
            return Err(FsError::NameConflict);
        }
        node.set_parent(self);
        state.entries.insert(name.to_string(), node);
        state.meta.bump(now());
        self.touch();
        trace!(dir = self.id, name, "added");
        Ok(())
    }

    /// True if `ancestor` is this directory or lies on its parent chain.
    fn descends_from(self: &Arc<Self>, ancestor: &Arc<RamDir>) -> bool {
        let mut current = Arc::clone(self);
        loop {
            if Arc::ptr_eq(&current, ancestor) {
                return true;
            }
            let Some(parent) = current.state.read().meta.parent() else {
                return false;
            };
            current = parent;
        }
    }

    /// Move the entry holding node `child` to `new` on behalf of the
    /// child's own metadata write. `apply` runs with this directory
    /// locked and updates the child; the entry moves only if it succeeds.
    pub(crate) fn rekey_child<F>(&self, child: u64, new: &str, apply: F) -> FsResult<()>
    where
        F: FnOnce() -> FsResult<()>,
    {
        let mut state = self.state.write();
        let key = state
            .entries
            .iter()
            .find(|(_, node)| node.id() == child)
            .map(|(key, _)| key.clone());
        // Unlinked children keep a stale parent link; nothing to re-key.
        let Some(key) = key.filter(|key| key != new) else {
            return apply();
        };
        if state.entries.contains_key(new) {
            debug!(dir = self.id, child, new, "metadata rename: target exists");
            return Err(FsError::NameConflict);
        }

        apply()?;
        if let Some(node) = state.entries.remove(&key) {
            state.entries.insert(new.to_string(), node);
        }
        state.meta.bump(now());
        self.touch();
        trace!(dir = self.id, child, old = key.as_str(), new, "renamed by metadata write");
        Ok(())
    }

    /// Rename a child within this directory.
    pub fn rename(&self, user: &str, old: &str, new: &str) -> FsResult<()> {
        validate_name(new)?;
        let mut state = self.state.write();
        self.ctx
            .check(self.id, &state.meta.owner, user, state.meta.mode, OpenMode::WRITE)?;
        if !state.entries.contains_key(old) {
            debug!(dir = self.id, old, "rename: source missing");
            return Err(FsError::NameNotFound);
        }
        if state.entries.contains_key(new) {
            debug!(dir = self.id, new, "rename: target exists");
            return Err(FsError::NameConflict);
        }

        if let Some(node) = state.entries.remove(old) {
            node.set_name(new);
            state.entries.insert(new.to_string(), node);
        }
        state.meta.muser = user.to_string();
        state.meta.bump(now());
        self.touch();
        trace!(dir = self.id, old, new, user, "renamed");
        Ok(())
    }

    /// Unlink a child. Open sessions on the child do not block removal.
    pub fn remove(&self, user: &str, name: &str) -> FsResult<()> {
        let mut state = self.state.write();
        self.ctx
            .check(self.id, &state.meta.owner, user, state.meta.mode, OpenMode::WRITE)?;
        let Some(child) = state.entries.get(name) else {
            debug!(dir = self.id, name, "remove: not found");
            return Err(FsError::NameNotFound);
        };
        if !child.can_remove() {
            debug!(dir = self.id, name, "remove: not removable");
            return Err(FsError::NotRemovable);
        }

        state.entries.remove(name);
        state.meta.muser = user.to_string();
        state.meta.bump(now());
        self.touch();
        trace!(dir = self.id, name, user, "removed");
        Ok(())
    }

    /// Look up one name. A missing name is `Ok(None)`, not an error.
    /// `.` is this directory and `..` its parent.
    pub fn walk(self: &Arc<Self>, user: &str, name: &str) -> FsResult<Option<Node>> {
        let state = self.state.read();
        self.ctx
            .check(self.id, &state.meta.owner, user, state.meta.mode, OpenMode::EXEC)?;
        self.touch();

        let found = match name {
            "." => Some(Node::Dir(Arc::clone(self))),
            ".." => Some(Node::Dir(
                state.meta.parent().unwrap_or_else(|| Arc::clone(self)),
            )),
            _ => state.entries.get(name).cloned(),
        };
        Ok(found)
    }

    /// Encoded stats of every child, in name order
    pub(crate) fn listing(&self) -> FsResult<Vec<u8>> {
        let state = self.state.read();
        let mut buf = Vec::new();
        for child in state.entries.values() {
            child.stat().write_to(&mut buf)?;
        }
        Ok(buf)
    }

    pub(crate) fn set_name(&self, name: &str) {
        self.state.write().meta.name = name.to_string();
    }

    fn touch(&self) {
        self.atime.store(now(), Ordering::Relaxed);
    }

    fn release(&self) {
        let mut state = self.state.write();
        state.meta.opens = state.meta.opens.saturating_sub(1);
        trace!(node = self.id, opens = state.meta.opens, "directory closed");
    }
}

fn display_name(name: &str) -> String {
    if name.is_empty() {
        "/".to_string()
    } else {
        name.to_string()
    }
}

impl fmt::Debug for RamDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("RamDir")
            .field("id", &self.id)
            .field("name", &state.meta.name)
            .field("entries", &state.entries.len())
            .field("version", &state.meta.version)
            .finish()
    }
}

/// Listing bytes held by a directory session
#[derive(Debug)]
enum Listing {
    /// Nothing read since open
    Unfetched,
    /// Taken on the first read or at the last rewind
    Snapshot(Vec<u8>),
}

impl Listing {
    fn bytes(&self) -> &[u8] {
        match self {
            Listing::Unfetched => &[],
            Listing::Snapshot(bytes) => bytes,
        }
    }
}

/// Open handle over a [`RamDir`]
///
/// Reads stream a snapshot of the encoded child stats. The snapshot is
/// stable until the cursor is rewound to 0; changes to the directory in
/// between are not observed.
pub struct DirSession {
    dir: Option<Arc<RamDir>>,
    offset: i64,
    listing: Listing,
}

impl DirSession {
    fn dir(&self) -> FsResult<Arc<RamDir>> {
        self.dir.as_ref().map(Arc::clone).ok_or(FsError::NotOpen)
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn is_open(&self) -> bool {
        self.dir.is_some()
    }
}

impl Session for DirSession {
    /// Only a rewind to 0 (which re-snapshots) or a seek to the current
    /// offset are accepted.
    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> FsResult<i64> {
        let dir = self.dir()?;
        let len = self.listing.bytes().len() as i64;

        let target = seek_target(self.offset, len, offset, origin)?;
        if target != 0 && target != self.offset {
            debug!(node = dir.id, requested = target, current = self.offset, "directory seek rejected");
            return Err(FsError::InvalidSeek);
        }
        if target == 0 {
            self.listing = Listing::Snapshot(dir.listing()?);
        }
        self.offset = target;
        dir.touch();
        Ok(target)
    }

    fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        let dir = self.dir()?;
        if let Listing::Unfetched = self.listing {
            self.listing = Listing::Snapshot(dir.listing()?);
        }

        let bytes = self.listing.bytes();
        let start = self.offset as usize;
        let n = buf.len().min(bytes.len() - start);
        buf[..n].copy_from_slice(&bytes[start..start + n]);

        self.offset += n as i64;
        dir.touch();
        Ok(n)
    }

    fn write(&mut self, _data: &[u8]) -> FsResult<usize> {
        self.dir()?;
        Err(FsError::IsADirectory)
    }

    fn close(&mut self) -> FsResult<()> {
        let dir = self.dir.take().ok_or(FsError::NotOpen)?;
        dir.release();
        Ok(())
    }
}

impl Drop for DirSession {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            dir.release();
        }
    }
}

impl fmt::Debug for DirSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirSession")
            .field("node", &self.dir.as_ref().map(|dir| dir.id))
            .field("offset", &self.offset)
            .field("snapshot_len", &self.listing.bytes().len())
            .finish()
    }
}
