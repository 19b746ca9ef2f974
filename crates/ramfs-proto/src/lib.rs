// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! RamFS Protocol: value types shared with the file-serving layer
//!
//! This crate defines the identity (`Qid`), metadata (`Stat`) and
//! access-mode types the RamFS core consumes, together with the stat
//! wire encoding used verbatim when directory listings are streamed.

pub mod stat;
pub mod types;
pub mod wire;

// Re-export key types
pub use stat::{decode_listing, Stat};
pub use types::{FileMode, OpenMode, Qid, QidKind};
pub use wire::WireError;
