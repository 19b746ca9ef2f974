// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Identity and permission value types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind byte carried in a `Qid`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QidKind {
    File,
    Directory,
}

impl QidKind {
    const QTDIR: u8 = 0x80;
    const QTFILE: u8 = 0x00;

    pub fn as_wire(self) -> u8 {
        match self {
            QidKind::File => Self::QTFILE,
            QidKind::Directory => Self::QTDIR,
        }
    }

    /// Any kind byte with the directory bit set decodes as a directory.
    pub fn from_wire(byte: u8) -> Self {
        if byte & Self::QTDIR != 0 {
            QidKind::Directory
        } else {
            QidKind::File
        }
    }
}

/// Identity and change-generation of a node as seen by clients
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Qid {
    pub kind: QidKind,
    /// Bumped on every observable mutation of the node
    pub version: u32,
    /// Globally unique node identifier, never reused
    pub path: u64,
}

impl Qid {
    /// Encoded size in bytes: kind[1] version[4] path[8]
    pub const WIRE_LEN: usize = 13;

    pub fn new(kind: QidKind, version: u32, path: u64) -> Self {
        Self {
            kind,
            version,
            path,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == QidKind::Directory
    }
}

/// Node mode: directory flag plus owner/group/other permission bits
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileMode(pub u32);

impl FileMode {
    pub const DIR: u32 = 0x8000_0000;
    /// Append-only. Carried in stats but not enforced by RamFS writes.
    pub const APPEND: u32 = 0x4000_0000;
    /// Exclusive use. Carried in stats but not enforced by RamFS opens.
    pub const EXCL: u32 = 0x2000_0000;
    /// Not backed up. Carried in stats only.
    pub const TMP: u32 = 0x0400_0000;

    /// All nine rwx bits
    pub const PERM_MASK: u32 = 0o777;
    /// The rw bits of every class; execute excluded
    pub const RW_MASK: u32 = 0o666;

    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn dir(perm: u32) -> Self {
        Self(Self::DIR | (perm & Self::PERM_MASK))
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_dir(self) -> bool {
        self.0 & Self::DIR != 0
    }

    pub const fn perm(self) -> u32 {
        self.0 & Self::PERM_MASK
    }

    pub const fn with_dir(self) -> Self {
        Self(self.0 | Self::DIR)
    }

    /// Limit the bits selected by `mask` to those also set in `ceiling`.
    ///
    /// Bits outside `mask` pass through untouched.
    pub const fn clip(self, mask: u32, ceiling: FileMode) -> Self {
        Self(self.0 & (!mask | (ceiling.0 & mask)))
    }
}

impl fmt::Debug for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileMode({}{:04o})", if self.is_dir() { "d" } else { "" }, self.perm())
    }
}

impl From<u32> for FileMode {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

/// Requested access for an open: one of read, write, read-write or
/// execute, plus optional modifier bits
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpenMode(pub u8);

impl OpenMode {
    pub const READ: OpenMode = OpenMode(0);
    pub const WRITE: OpenMode = OpenMode(1);
    pub const RDWR: OpenMode = OpenMode(2);
    pub const EXEC: OpenMode = OpenMode(3);

    pub const TRUNC: u8 = 0x10;
    /// Remove on close. Decoded for the serving layer, which owns
    /// removal; RamFS sessions do not act on it.
    pub const RCLOSE: u8 = 0x40;

    const ACCESS_MASK: u8 = 0x03;

    /// The access part with all modifiers stripped
    pub const fn access(self) -> OpenMode {
        OpenMode(self.0 & Self::ACCESS_MASK)
    }

    pub const fn with_truncate(self) -> OpenMode {
        OpenMode(self.0 | Self::TRUNC)
    }

    pub const fn truncate(self) -> bool {
        self.0 & Self::TRUNC != 0
    }

    /// Whether the serving layer should remove the node once this open is
    /// clunked
    pub const fn remove_on_close(self) -> bool {
        self.0 & Self::RCLOSE != 0
    }

    pub const fn wants_read(self) -> bool {
        matches!(self.access().0, 0 | 2)
    }

    pub const fn wants_write(self) -> bool {
        matches!(self.access().0, 1 | 2)
    }

    pub const fn wants_exec(self) -> bool {
        self.access().0 == 3
    }
}

impl fmt::Debug for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = match self.access().0 {
            0 => "read",
            1 => "write",
            2 => "rdwr",
            _ => "exec",
        };
        write!(f, "OpenMode({access}")?;
        if self.truncate() {
            f.write_str("|trunc")?;
        }
        if self.remove_on_close() {
            f.write_str("|rclose")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_limits_only_masked_bits() {
        let parent = FileMode::dir(0o750);
        let requested = FileMode::new(0o777);

        assert_eq!(requested.clip(FileMode::RW_MASK, parent).perm(), 0o751);
        assert_eq!(requested.clip(FileMode::PERM_MASK, parent).perm(), 0o750);
        assert!(FileMode::dir(0o777).clip(FileMode::PERM_MASK, parent).is_dir());
    }

    #[test]
    fn open_mode_access_ignores_modifiers() {
        let mode = OpenMode::WRITE.with_truncate();
        assert_eq!(mode.access(), OpenMode::WRITE);
        assert!(mode.truncate());
        assert!(mode.wants_write());
        assert!(!mode.wants_read());
        assert!(OpenMode::RDWR.wants_read() && OpenMode::RDWR.wants_write());
        assert!(OpenMode::EXEC.wants_exec());
        assert!(OpenMode(OpenMode::READ.0 | OpenMode::RCLOSE).remove_on_close());
        assert!(!OpenMode::RDWR.remove_on_close());
    }

    #[test]
    fn qid_kind_wire_byte() {
        assert_eq!(QidKind::Directory.as_wire(), 0x80);
        assert_eq!(QidKind::from_wire(0x80 | 0x40), QidKind::Directory);
        assert_eq!(QidKind::from_wire(0x00), QidKind::File);
    }

    #[test]
    fn file_mode_serializes_as_plain_number() {
        let json = serde_json::to_string(&FileMode::new(0o644)).unwrap();
        assert_eq!(json, "420");
    }
}
