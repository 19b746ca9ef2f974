// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use ramfs_core::ramfs_proto::{decode_listing, FileMode, OpenMode, Stat};
use ramfs_core::*;

fn listing_names(session: &mut SessionHandle) -> Vec<String> {
    let mut bytes = Vec::new();
    let mut chunk = [0u8; 16];
    loop {
        let n = session.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
    }
    decode_listing(&bytes)
        .unwrap()
        .into_iter()
        .map(|stat| stat.name)
        .collect()
}

fn open_tree() -> RamFs {
    let mut config = RamFsConfig::default();
    config.root.owner = "glenda".to_string();
    config.root.mode = 0o777;
    RamFs::new(&config)
}

#[test]
fn directory_listing_snapshot_isolation() {
    let fs = open_tree();
    let root = fs.root();
    root.create("glenda", "a", FileMode::new(0o644)).unwrap();
    root.create("glenda", "b", FileMode::new(0o644)).unwrap();

    let mut session = Node::Dir(Arc::clone(root)).open("glenda", OpenMode::READ).unwrap();
    assert_eq!(listing_names(&mut session), vec!["a", "b"]);

    root.create("glenda", "c", FileMode::new(0o644)).unwrap();
    assert!(listing_names(&mut session).is_empty());

    session.seek(0, SeekOrigin::Start).unwrap();
    assert_eq!(listing_names(&mut session), vec!["a", "b", "c"]);
}

#[test]
fn listing_carries_live_child_stats() {
    let fs = open_tree();
    let file = fs.root().create("glenda", "data", FileMode::new(0o640)).unwrap();
    let mut writer = file.open("glenda", OpenMode::WRITE).unwrap();
    writer.write(b"0123456789").unwrap();

    let mut session = fs.root().open("glenda", OpenMode::READ).unwrap();
    let mut buf = vec![0u8; 512];
    let n = session.read(&mut buf).unwrap();
    let stats = decode_listing(&buf[..n]).unwrap();

    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0], file.stat());
    assert_eq!(stats[0].length, 10);
    assert_eq!(stats[0].qid.version, 1);
}

#[test]
fn permission_enforcement_on_open() {
    let fs = open_tree();
    let file = fs.root().create("glenda", "notes", FileMode::new(0o644)).unwrap();

    assert!(matches!(
        file.open("bob", OpenMode::WRITE),
        Err(FsError::AccessDenied)
    ));
    assert!(file.open("bob", OpenMode::READ).is_ok());
    assert!(file.open("glenda", OpenMode::RDWR).is_ok());
}

#[test]
fn file_seek_boundaries() {
    let fs = open_tree();
    let file = fs.root().create("glenda", "f", FileMode::new(0o644)).unwrap();
    let mut session = file.open("glenda", OpenMode::RDWR).unwrap();
    session.write(b"hello").unwrap();

    assert_eq!(session.seek(5, SeekOrigin::Start).unwrap(), 5);
    assert!(matches!(session.seek(6, SeekOrigin::Start), Err(FsError::SeekPastEnd)));
    assert!(matches!(session.seek(-1, SeekOrigin::Start), Err(FsError::InvalidSeek)));
    assert_eq!(session.seek(-5, SeekOrigin::End).unwrap(), 0);
}

#[test]
fn failed_operations_leave_version_alone() {
    let fs = open_tree();
    let root = fs.root();
    let file = root.create("glenda", "f", FileMode::new(0o644)).unwrap();
    let (root_v, file_v) = (root.qid().version, file.qid().version);

    assert!(root.create("glenda", "f", FileMode::new(0o644)).is_err());
    assert!(root.remove("glenda", "missing").is_err());
    assert!(root.rename("glenda", "missing", "g").is_err());
    let too_long = Stat {
        length: 99,
        ..file.stat()
    };
    assert!(matches!(
        file.write_stat(&too_long),
        Err(FsError::LengthExtensionNotAllowed)
    ));
    let _ = file.stat();
    let _ = root.walk("glenda", "f").unwrap();

    assert_eq!(root.qid().version, root_v);
    assert_eq!(file.qid().version, file_v);
}

#[test]
fn removed_file_stays_usable_through_open_session() {
    let fs = open_tree();
    let file = fs.root().create("glenda", "tmp", FileMode::new(0o644)).unwrap();
    let mut session = file.open("glenda", OpenMode::RDWR).unwrap();

    fs.root().remove("glenda", "tmp").unwrap();
    assert!(fs.resolve("glenda", "/tmp").unwrap().is_none());

    session.write(b"still here").unwrap();
    session.seek(0, SeekOrigin::Start).unwrap();
    let mut buf = [0u8; 10];
    assert_eq!(session.read(&mut buf).unwrap(), 10);
    assert_eq!(&buf, b"still here");
    session.close().unwrap();
    assert_eq!(file.open_count(), 0);
}

#[test]
fn concurrent_writers_serialize_on_one_file() {
    let fs = open_tree();
    let file = fs.root().create("glenda", "shared", FileMode::new(0o666)).unwrap();
    let writers = 8usize;
    let rounds = 200usize;

    let total = writers * rounds * 4;
    file.open("glenda", OpenMode::WRITE)
        .unwrap()
        .write(&vec![0u8; total])
        .unwrap();

    thread::scope(|s| {
        for w in 0..writers {
            let file = file.clone();
            s.spawn(move || {
                let mut session = file.open("glenda", OpenMode::WRITE).unwrap();
                let block = [b'a' + w as u8; 4];
                for round in 0..rounds {
                    let offset = ((round * writers + w) * block.len()) as i64;
                    session.seek(offset, SeekOrigin::Start).unwrap();
                    session.write(&block).unwrap();
                }
            });
        }
    });

    let stat = file.stat();
    assert_eq!(stat.length as usize, total);

    let mut reader = file.open("glenda", OpenMode::READ).unwrap();
    let mut content = vec![0u8; stat.length as usize];
    assert_eq!(reader.read(&mut content).unwrap(), content.len());
    for (i, block) in content.chunks(4).enumerate() {
        let expected = b'a' + (i % writers) as u8;
        assert!(block.iter().all(|&b| b == expected), "block {i} corrupted: {block:?}");
    }
}

#[test]
fn concurrent_creators_get_unique_ids_and_names() {
    let fs = open_tree();
    let root = fs.root();
    let before = root.qid().version;

    let ids: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|t| {
                s.spawn(move || {
                    (0..50)
                        .map(|i| {
                            root.create("glenda", &format!("t{t}-{i}"), FileMode::new(0o644))
                                .unwrap()
                                .id()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(ids.len(), 400);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 400);
    assert_eq!(root.len(), 400);
    assert_eq!(root.qid().version, before + 400);
}

#[test]
fn racing_creates_of_one_name_admit_a_single_winner() {
    let fs = open_tree();
    let root = fs.root();

    let wins = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(move || root.create("glenda", "only", FileMode::new(0o644)).is_ok()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count()
    });

    assert_eq!(wins, 1);
    assert_eq!(root.names(), vec!["only"]);
}

#[test]
fn nested_tree_removal_requires_empty_directories() {
    let fs = open_tree();
    let a = fs.root().create("glenda", "a", FileMode::dir(0o755)).unwrap();
    let b = a.as_dir().unwrap().create("glenda", "b", FileMode::dir(0o755)).unwrap();
    b.as_dir().unwrap().create("glenda", "leaf", FileMode::new(0o644)).unwrap();

    assert!(matches!(fs.root().remove("glenda", "a"), Err(FsError::NotRemovable)));
    let leaf_parent = fs.resolve("glenda", "a/b/leaf").unwrap().unwrap().parent().unwrap();
    assert_eq!(leaf_parent.id(), b.id());

    b.as_dir().unwrap().remove("glenda", "leaf").unwrap();
    a.as_dir().unwrap().remove("glenda", "b").unwrap();
    fs.root().remove("glenda", "a").unwrap();
    assert!(fs.root().is_empty());
}
