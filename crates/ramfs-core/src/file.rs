// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! File nodes and file sessions

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use ramfs_proto::{FileMode, OpenMode, Qid, QidKind, Stat};
use tracing::{debug, trace};

use crate::context::{now, TreeContext};
use crate::dir::RamDir;
use crate::error::{FsError, FsResult};
use crate::node::{requested_name, seek_target, NodeMeta, SeekOrigin, Session};

struct FileState {
    meta: NodeMeta,
    content: Vec<u8>,
}

/// Leaf node holding a byte buffer
pub struct RamFile {
    ctx: Arc<TreeContext>,
    id: u64,
    atime: AtomicU32,
    state: RwLock<FileState>,
}

impl RamFile {
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
            state: RwLock::new(FileState {
                meta: NodeMeta::new(name.into(), mode, owner.into(), group.into(), now),
                content: Vec::new(),
            }),
        })
    }

    /// Build a file with initial content, e.g. for grafting with `RamDir::add`.
    pub fn with_content(
        ctx: &Arc<TreeContext>,
        name: impl Into<String>,
        mode: FileMode,
        owner: impl Into<String>,
        group: impl Into<String>,
        content: Vec<u8>,
    ) -> Arc<Self> {
        let file = Self::new(ctx, name, mode, owner, group);
        file.state.write().content = content;
        file
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Open a session with its cursor at 0.
    ///
    /// A truncating open empties the buffer, which counts as a content
    /// mutation.
    pub fn open(self: &Arc<Self>, user: &str, mode: OpenMode) -> FsResult<FileSession> {
        let mut state = self.state.write();
        self.ctx
            .check(self.id, &state.meta.owner, user, state.meta.mode, mode)?;

        let now = now();
        if mode.truncate() && mode.wants_write() {
            state.content.clear();
            state.meta.muser = user.to_string();
            state.meta.bump(now);
        }
        state.meta.opens += 1;
        self.atime.store(now, Ordering::Relaxed);
        trace!(node = self.id, user, ?mode, opens = state.meta.opens, "file opened");

        Ok(FileSession {
            file: Some(Arc::clone(self)),
            offset: 0,
            user: user.to_string(),
        })
    }

    pub fn stat(&self) -> Stat {
        let state = self.state.read();
        let meta = &state.meta;
        Stat {
            typ: 0,
            dev: 0,
            qid: Qid::new(QidKind::File, meta.version, self.id),
            mode: meta.mode,
            atime: self.atime.load(Ordering::Relaxed),
            mtime: meta.mtime,
            length: state.content.len() as u64,
            name: meta.name.clone(),
            uid: meta.owner.clone(),
            gid: meta.group.clone(),
            muid: meta.muser.clone(),
        }
    }

    /// Replace name, owner, group and mode; truncate when `stat.length`
    /// is not [`Stat::KEEP_LENGTH`]. Authorization is the caller's job.
    ///
    /// A new name also re-keys the parent's entry and fails with
    /// `NameConflict` if a sibling already holds it.
    pub fn write_stat(&self, stat: &Stat) -> FsResult<()> {
        let (current, parent) = {
            let state = self.state.read();
            (state.meta.name.clone(), state.meta.parent())
        };
        match (requested_name(&current, &current, &stat.name)?, parent) {
            (Some(name), Some(parent)) => {
                parent.rekey_child(self.id, name, || self.update_meta(stat, Some(name)))
            }
            (name, _) => self.update_meta(stat, name),
        }
    }

    fn update_meta(&self, stat: &Stat, name: Option<&str>) -> FsResult<()> {
        let mut state = self.state.write();
        if stat.length != Stat::KEEP_LENGTH {
            let current = state.content.len() as u64;
            if stat.length > current {
                debug!(node = self.id, requested = stat.length, current, "length extension rejected");
                return Err(FsError::LengthExtensionNotAllowed);
            }
            state.content.truncate(stat.length as usize);
        }
        state.meta.apply_stat(stat);
        if let Some(name) = name {
            state.meta.name = name.to_string();
        }

        let now = now();
        state.meta.bump(now);
        self.atime.store(now, Ordering::Relaxed);
        Ok(())
    }

    pub fn qid(&self) -> Qid {
        Qid::new(QidKind::File, self.state.read().meta.version, self.id)
    }

    pub fn name(&self) -> String {
        self.state.read().meta.name.clone()
    }

    pub fn parent(&self) -> Option<Arc<RamDir>> {
        self.state.read().meta.parent()
    }

    pub fn set_parent(&self, parent: &Arc<RamDir>) {
        self.state.write().meta.parent = Some(Arc::downgrade(parent));
    }

    /// Files are removable even while sessions hold them open.
    pub fn can_remove(&self) -> bool {
        true
    }

    pub fn len(&self) -> u64 {
        self.state.read().content.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn open_count(&self) -> u32 {
        self.state.read().meta.opens
    }

    pub(crate) fn set_name(&self, name: &str) {
        self.state.write().meta.name = name.to_string();
    }

    fn release(&self) {
        let mut state = self.state.write();
        state.meta.opens = state.meta.opens.saturating_sub(1);
        trace!(node = self.id, opens = state.meta.opens, "file closed");
    }
}

impl fmt::Debug for RamFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("RamFile")
            .field("id", &self.id)
            .field("name", &state.meta.name)
            .field("len", &state.content.len())
            .field("version", &state.meta.version)
            .finish()
    }
}

/// Open handle over a [`RamFile`] with its own cursor
pub struct FileSession {
    file: Option<Arc<RamFile>>,
    offset: i64,
    user: String,
}

impl FileSession {
    fn file(&self) -> FsResult<&Arc<RamFile>> {
        self.file.as_ref().ok_or(FsError::NotOpen)
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Node this session was opened on, if still open
    pub fn node(&self) -> Option<Weak<RamFile>> {
        self.file.as_ref().map(Arc::downgrade)
    }
}

impl Session for FileSession {
    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> FsResult<i64> {
        let file = self.file()?;
        let state = file.state.read();
        let len = state.content.len() as i64;

        let target = seek_target(self.offset, len, offset, origin)?;
        if target > len {
            return Err(FsError::SeekPastEnd);
        }
        file.atime.store(now(), Ordering::Relaxed);
        drop(state);

        self.offset = target;
        Ok(target)
    }

    fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        let file = self.file()?;
        let state = file.state.read();

        // A metadata write may have truncated the buffer below the cursor.
        let start = (self.offset as usize).min(state.content.len());
        let n = buf.len().min(state.content.len() - start);
        buf[..n].copy_from_slice(&state.content[start..start + n]);
        file.atime.store(now(), Ordering::Relaxed);
        drop(state);

        self.offset += n as i64;
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> FsResult<usize> {
        let file = self.file()?;
        let mut state = file.state.write();

        let start = self.offset as usize;
        let end = start + data.len();
        if end > state.content.len() {
            state.content.resize(end, 0);
        }
        state.content[start..end].copy_from_slice(data);

        let now = now();
        state.meta.muser.clone_from(&self.user);
        state.meta.bump(now);
        file.atime.store(now, Ordering::Relaxed);
        drop(state);

        self.offset = end as i64;
        Ok(data.len())
    }

    fn close(&mut self) -> FsResult<()> {
        let file = self.file.take().ok_or(FsError::NotOpen)?;
        file.release();
        Ok(())
    }
}

impl Drop for FileSession {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            file.release();
        }
    }
}

impl fmt::Debug for FileSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSession")
            .field("node", &self.file.as_ref().map(|file| file.id))
            .field("offset", &self.offset)
            .field("user", &self.user)
            .finish()
    }
}
