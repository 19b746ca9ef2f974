// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Little-endian primitives shared by the Qid and Stat codecs

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

use crate::types::{Qid, QidKind};

/// Encoding / decoding error
#[derive(Error, Debug)]
pub enum WireError {
    #[error("string of {0} bytes does not fit a u16 length prefix")]
    StringTooLong(usize),
    #[error("stat record of {0} bytes does not fit a u16 size prefix")]
    RecordTooLong(usize),
    #[error("stat record size {declared} disagrees with {actual} encoded bytes")]
    SizeMismatch { declared: usize, actual: usize },
    #[error("string is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub(crate) fn write_str<W: Write>(mut w: W, s: &str) -> Result<(), WireError> {
    let len = u16::try_from(s.len()).map_err(|_| WireError::StringTooLong(s.len()))?;
    w.write_u16::<LittleEndian>(len)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

pub(crate) fn read_str<R: Read>(mut r: R) -> Result<String, WireError> {
    let len = r.read_u16::<LittleEndian>()? as usize;
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes)?;
    Ok(String::from_utf8(bytes)?)
}

impl Qid {
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_u8(self.kind.as_wire())?;
        w.write_u32::<LittleEndian>(self.version)?;
        w.write_u64::<LittleEndian>(self.path)?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut r: R) -> io::Result<Self> {
        let kind = QidKind::from_wire(r.read_u8()?);
        let version = r.read_u32::<LittleEndian>()?;
        let path = r.read_u64::<LittleEndian>()?;
        Ok(Self {
            kind,
            version,
            path,
        })
    }
}
