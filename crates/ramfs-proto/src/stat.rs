// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Stat record and its wire encoding
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! size[2] type[2] dev[4] qid[13] mode[4] atime[4] mtime[4] length[8]
//! name[s] uid[s] gid[s] muid[s]
//! ```
//!
//! `size` counts the bytes that follow it; `[s]` is a `u16` length
//! followed by that many UTF-8 bytes.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::types::{FileMode, Qid};
use crate::wire::{read_str, write_str, WireError};

/// Metadata snapshot of a node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    /// Server-private type, 0 for RamFS
    pub typ: u16,
    /// Server-private device, 0 for RamFS
    pub dev: u32,
    pub qid: Qid,
    pub mode: FileMode,
    pub atime: u32,
    pub mtime: u32,
    pub length: u64,
    pub name: String,
    pub uid: String,
    pub gid: String,
    pub muid: String,
}

impl Stat {
    /// `length` value meaning "leave the length unchanged" in a metadata write
    pub const KEEP_LENGTH: u64 = u64::MAX;

    /// Bytes of the fixed-width part, including the size prefix
    const FIXED_LEN: usize = 2 + 2 + 4 + Qid::WIRE_LEN + 4 + 4 + 4 + 8;

    /// Encoded size of this record including its two-byte size prefix
    pub fn wire_len(&self) -> usize {
        Self::FIXED_LEN
            + [&self.name, &self.uid, &self.gid, &self.muid]
                .iter()
                .map(|s| 2 + s.len())
                .sum::<usize>()
    }

    /// Append the encoded record to `w`.
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<(), WireError> {
        let body = self.wire_len() - 2;
        let size = u16::try_from(body).map_err(|_| WireError::RecordTooLong(body))?;

        w.write_u16::<LittleEndian>(size)?;
        w.write_u16::<LittleEndian>(self.typ)?;
        w.write_u32::<LittleEndian>(self.dev)?;
        self.qid.write_to(&mut w)?;
        w.write_u32::<LittleEndian>(self.mode.bits())?;
        w.write_u32::<LittleEndian>(self.atime)?;
        w.write_u32::<LittleEndian>(self.mtime)?;
        w.write_u64::<LittleEndian>(self.length)?;
        write_str(&mut w, &self.name)?;
        write_str(&mut w, &self.uid)?;
        write_str(&mut w, &self.gid)?;
        write_str(&mut w, &self.muid)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        let mut buf = Vec::with_capacity(self.wire_len());
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Read one record, checking the size prefix against what was consumed.
    pub fn read_from<R: Read>(mut r: R) -> Result<Self, WireError> {
        let declared = r.read_u16::<LittleEndian>()? as usize;
        let typ = r.read_u16::<LittleEndian>()?;
        let dev = r.read_u32::<LittleEndian>()?;
        let qid = Qid::read_from(&mut r)?;
        let mode = FileMode::new(r.read_u32::<LittleEndian>()?);
        let atime = r.read_u32::<LittleEndian>()?;
        let mtime = r.read_u32::<LittleEndian>()?;
        let length = r.read_u64::<LittleEndian>()?;
        let name = read_str(&mut r)?;
        let uid = read_str(&mut r)?;
        let gid = read_str(&mut r)?;
        let muid = read_str(&mut r)?;

        let stat = Self {
            typ,
            dev,
            qid,
            mode,
            atime,
            mtime,
            length,
            name,
            uid,
            gid,
            muid,
        };
        let actual = stat.wire_len() - 2;
        if actual != declared {
            return Err(WireError::SizeMismatch { declared, actual });
        }
        Ok(stat)
    }
}

/// Decode a directory listing: a concatenation of encoded stat records.
pub fn decode_listing(mut bytes: &[u8]) -> Result<Vec<Stat>, WireError> {
    let mut entries = Vec::new();
    while !bytes.is_empty() {
        entries.push(Stat::read_from(&mut bytes)?);
    }
    Ok(entries)
}
