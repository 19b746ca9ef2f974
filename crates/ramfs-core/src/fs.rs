// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Tree facade tying a root directory to its shared context

use std::fmt;
use std::sync::Arc;

use ramfs_proto::FileMode;
use tracing::debug;

use crate::config::RamFsConfig;
use crate::context::TreeContext;
use crate::dir::RamDir;
use crate::error::{FsError, FsResult};
use crate::node::Node;

/// An in-memory file tree
#[derive(Clone)]
pub struct RamFs {
    ctx: Arc<TreeContext>,
    root: Arc<RamDir>,
}

impl RamFs {
    /// Build an empty tree whose root follows `config`.
    pub fn new(config: &RamFsConfig) -> Self {
        let ctx = TreeContext::from_config(config);
        let root = RamDir::new(
            &ctx,
            "",
            FileMode::dir(config.root.mode),
            config.root.owner.as_str(),
            config.root.group.as_str(),
        );
        Self { ctx, root }
    }

    /// Wrap an existing root built against `ctx`.
    pub fn with_context(ctx: Arc<TreeContext>, root: Arc<RamDir>) -> Self {
        Self { ctx, root }
    }

    pub fn root(&self) -> &Arc<RamDir> {
        &self.root
    }

    pub fn context(&self) -> &Arc<TreeContext> {
        &self.ctx
    }

    /// Walk a `/`-separated path from the root as `user`.
    ///
    /// Empty components are skipped, so `""` and `"/"` name the root.
    /// A missing component yields `Ok(None)`.
    pub fn resolve(&self, user: &str, path: &str) -> FsResult<Option<Node>> {
        let mut current = Node::Dir(Arc::clone(&self.root));
        for component in path.split('/').filter(|c| !c.is_empty()) {
            let Some(dir) = current.as_dir() else {
                debug!(path, component, "resolve: not a directory");
                return Err(FsError::NotADirectory);
            };
            match dir.walk(user, component)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

impl fmt::Debug for RamFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RamFs").field("root", &self.root).finish()
    }
}

impl Default for RamFs {
    fn default() -> Self {
        Self::new(&RamFsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::MockIdAllocator;
    use crate::perm::AllowAll;
    use crate::Session;
    use ramfs_proto::OpenMode;

    fn tree() -> RamFs {
        let fs = RamFs::default();
        let usr = fs.root().create("root", "usr", FileMode::dir(0o755)).unwrap();
        usr.as_dir()
            .unwrap()
            .create("root", "motd", FileMode::new(0o644))
            .unwrap();
        fs
    }

    #[test]
    fn root_follows_config() {
        let mut config = RamFsConfig::default();
        config.root.owner = "glenda".to_string();
        config.root.mode = 0o700;
        config.first_id = 42;

        let fs = RamFs::new(&config);
        let stat = fs.root().stat();
        assert_eq!(stat.uid, "glenda");
        assert_eq!(stat.mode, FileMode::dir(0o700));
        assert_eq!(stat.qid.path, 42);
        assert_eq!(stat.name, "/");
    }

    #[test]
    fn resolve_walks_components() {
        let fs = tree();
        let motd = fs.resolve("glenda", "/usr/motd").unwrap().unwrap();
        assert_eq!(motd.name(), "motd");
        assert!(!motd.is_dir());

        let root = fs.resolve("glenda", "/").unwrap().unwrap();
        assert_eq!(root.id(), fs.root().id());
        let back = fs.resolve("glenda", "usr/../usr/./motd").unwrap().unwrap();
        assert_eq!(back.id(), motd.id());
    }

    #[test]
    fn resolve_miss_and_file_component() {
        let fs = tree();
        assert!(fs.resolve("glenda", "/usr/absent").unwrap().is_none());
        assert!(matches!(
            fs.resolve("glenda", "/usr/motd/more"),
            Err(FsError::NotADirectory)
        ));
    }

    #[test]
    fn disabled_enforcement_allows_everyone() {
        let mut config = RamFsConfig::default();
        config.root.mode = 0o700;
        config.security.enforce_permissions = false;

        let fs = RamFs::new(&config);
        fs.root().create("nobody", "f", FileMode::new(0o600)).unwrap();
        let node = fs.resolve("nobody", "f").unwrap().unwrap();
        let mut session = node.open("nobody", OpenMode::RDWR).unwrap();
        assert_eq!(session.write(b"hi").unwrap(), 2);
    }

    #[test]
    fn injected_allocator_controls_ids() {
        let mut ids = MockIdAllocator::new();
        let mut seq = 100;
        ids.expect_next_id().times(2).returning(move || {
            seq += 1;
            seq
        });

        let ctx = TreeContext::new(Arc::new(ids), Arc::new(AllowAll));
        let root = RamDir::new(&ctx, "", FileMode::dir(0o755), "root", "root");
        let fs = RamFs::with_context(ctx, root);
        let file = fs.root().create("root", "f", FileMode::new(0o644)).unwrap();

        assert_eq!(fs.root().id(), 101);
        assert_eq!(file.qid().path, 102);
    }
}
