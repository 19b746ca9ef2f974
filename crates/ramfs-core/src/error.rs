// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for RamFS Core

use std::io;

use ramfs_proto::WireError;

/// Core filesystem error type
#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("access denied")]
    AccessDenied,
    #[error("session not open")]
    NotOpen,
    #[error("invalid seek")]
    InvalidSeek,
    #[error("seek past end of file")]
    SeekPastEnd,
    #[error("name already exists")]
    NameConflict,
    #[error("name not found")]
    NameNotFound,
    #[error("not removable")]
    NotRemovable,
    #[error("metadata write cannot extend file length")]
    LengthExtensionNotAllowed,
    #[error("is a directory")]
    IsADirectory,
    #[error("not a directory")]
    NotADirectory,
    #[error("name not allowed")]
    InvalidName,
    #[error("directory cannot be grafted beneath itself")]
    WouldCycle,
    #[error("stat encoding failed: {0}")]
    Encoding(#[from] WireError),
}

pub type FsResult<T> = Result<T, FsError>;

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        let kind = match &err {
            FsError::AccessDenied => io::ErrorKind::PermissionDenied,
            FsError::NameConflict => io::ErrorKind::AlreadyExists,
            FsError::NameNotFound => io::ErrorKind::NotFound,
            FsError::InvalidSeek
            | FsError::SeekPastEnd
            | FsError::LengthExtensionNotAllowed
            | FsError::NotADirectory
            | FsError::InvalidName
            | FsError::WouldCycle => io::ErrorKind::InvalidInput,
            FsError::IsADirectory => io::ErrorKind::Unsupported,
            FsError::Encoding(_) => io::ErrorKind::InvalidData,
            FsError::NotOpen | FsError::NotRemovable => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
