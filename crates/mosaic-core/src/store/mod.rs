//! Object store contract consumed by the persistence layer.
//!
//! The remote backend is version-controlled and content-addressable, reachable
//! only through these primitives: read the branch pointer, create an immutable
//! blob, snapshot a tree, create a commit, advance the pointer, and read a
//! file by path. An HTTP implementation lives with the embedding application;
//! this crate ships [`memory::MemoryStore`] as the in-process backend.

pub mod memory;

pub use memory::MemoryStore;

use std::fmt;
use std::future::Future;

use crate::Result;

/// Identifier of a blob, tree, or commit object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid(String);

impl Oid {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One path in a tree snapshot. Entries are regular files; the backend owns
/// any file-mode details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub blob: Oid,
}

/// Backend-agnostic object store primitives.
///
/// All operations are asynchronous round trips; none of them is transactional
/// beyond its own object. The write pipeline builds atomicity on top by only
/// advancing the branch pointer as its final step.
pub trait ObjectStore: Send + Sync {
    /// Current head commit of a branch. Fails with `NotFound` when the branch
    /// is absent.
    fn get_branch_head(&self, branch: &str) -> impl Future<Output = Result<Oid>> + Send;

    /// Store an immutable blob. Content-addressed: the same content always
    /// yields the same id.
    fn create_blob(&self, content: &[u8]) -> impl Future<Output = Result<Oid>> + Send;

    /// Snapshot a tree: `entries` overlaid on the tree of the `base` commit.
    fn create_tree(
        &self,
        entries: &[TreeEntry],
        base: &Oid,
    ) -> impl Future<Output = Result<Oid>> + Send;

    /// Create a commit referencing a tree and its parents.
    fn create_commit(
        &self,
        message: &str,
        tree: &Oid,
        parents: &[Oid],
    ) -> impl Future<Output = Result<Oid>> + Send;

    /// Advance the branch pointer. Fails with `RefConflict` when the backend
    /// enforces fast-forward updates and the branch moved.
    fn update_ref(&self, branch: &str, commit: &Oid) -> impl Future<Output = Result<()>> + Send;

    /// Read a file at the branch head. Absence is `None`, never an error.
    fn read_path(
        &self,
        branch: &str,
        path: &str,
    ) -> impl Future<Output = Result<Option<String>>> + Send;
}
