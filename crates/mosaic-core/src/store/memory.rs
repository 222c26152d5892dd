//! In-memory object store.
//!
//! Implements the full [`ObjectStore`] contract with sha-256 content
//! addressing, git-style tree overlays, and fast-forward enforcement on ref
//! updates. Primarily the test backend, but also usable as an offline store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sha2::{Digest, Sha256};

use super::{ObjectStore, Oid, TreeEntry};
use crate::{Error, Result};

/// Primitive operations a test can make fail exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    GetBranchHead,
    CreateBlob,
    CreateTree,
    CreateCommit,
    UpdateRef,
    ReadPath,
}

#[derive(Clone)]
struct CommitNode {
    tree: Oid,
    parents: Vec<Oid>,
    message: String,
}

#[derive(Default)]
struct Inner {
    blobs: HashMap<Oid, Vec<u8>>,
    trees: HashMap<Oid, BTreeMap<String, Oid>>,
    commits: HashMap<Oid, CommitNode>,
    branches: HashMap<String, Oid>,
    fail_next: HashMap<FailPoint, Error>,
    reject_updates: u32,
}

/// Shared in-memory store; clones operate on the same objects.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with a branch already pointing at an empty root commit.
    #[must_use]
    pub fn with_branch(branch: &str) -> Self {
        let store = Self::new();
        {
            let mut inner = store.lock();
            let tree = insert_tree(&mut inner, BTreeMap::new());
            let commit = insert_commit(
                &mut inner,
                CommitNode {
                    tree,
                    parents: Vec::new(),
                    message: "init".to_string(),
                },
            );
            inner.branches.insert(branch.to_string(), commit);
        }
        store
    }

    /// Write a file directly, bypassing the pipeline: one blob, tree overlay,
    /// commit, branch advance. Lets tests seed shards (including corrupt
    /// content) and simulate competing writers.
    pub fn seed_file(&self, branch: &str, path: &str, content: &str) -> Result<Oid> {
        let mut inner = self.lock();
        let head = inner
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("branch {branch}")))?;

        let blob = hash_object("blob", content.as_bytes());
        inner.blobs.insert(blob.clone(), content.as_bytes().to_vec());

        let mut tree = tree_of_commit(&inner, &head)?;
        tree.insert(path.to_string(), blob);
        let tree = insert_tree(&mut inner, tree);

        let commit = insert_commit(
            &mut inner,
            CommitNode {
                tree,
                parents: vec![head],
                message: format!("seed {path}"),
            },
        );
        inner.branches.insert(branch.to_string(), commit.clone());
        Ok(commit)
    }

    /// Make the next call to the given primitive fail with `error`.
    pub fn fail_once(&self, point: FailPoint, error: Error) {
        self.lock().fail_next.insert(point, error);
    }

    /// Make the next `count` ref updates fail with `RefConflict`, as a
    /// fast-forward-enforcing backend would under a competing writer.
    pub fn reject_updates(&self, count: u32) {
        self.lock().reject_updates = count;
    }

    /// Current head of a branch, if any.
    #[must_use]
    pub fn head(&self, branch: &str) -> Option<Oid> {
        self.lock().branches.get(branch).cloned()
    }

    /// Message of the head commit of a branch.
    #[must_use]
    pub fn head_message(&self, branch: &str) -> Option<String> {
        let inner = self.lock();
        let head = inner.branches.get(branch)?;
        inner.commits.get(head).map(|commit| commit.message.clone())
    }

    /// Number of commits reachable from the branch head.
    #[must_use]
    pub fn commit_count(&self, branch: &str) -> usize {
        let inner = self.lock();
        let Some(head) = inner.branches.get(branch) else {
            return 0;
        };
        let mut seen = Vec::new();
        let mut stack = vec![head.clone()];
        while let Some(oid) = stack.pop() {
            if seen.contains(&oid) {
                continue;
            }
            if let Some(commit) = inner.commits.get(&oid) {
                stack.extend(commit.parents.iter().cloned());
            }
            seen.push(oid);
        }
        seen.len()
    }

    /// File content at the branch head, without going through the trait.
    #[must_use]
    pub fn file(&self, branch: &str, path: &str) -> Option<String> {
        let inner = self.lock();
        let head = inner.branches.get(branch)?;
        let tree = tree_of_commit(&inner, head).ok()?;
        let blob = tree.get(path)?;
        inner
            .blobs
            .get(blob)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_failure(&self, point: FailPoint) -> Result<()> {
        match self.lock().fail_next.remove(&point) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl ObjectStore for MemoryStore {
    async fn get_branch_head(&self, branch: &str) -> Result<Oid> {
        self.take_failure(FailPoint::GetBranchHead)?;
        self.lock()
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("branch {branch}")))
    }

    async fn create_blob(&self, content: &[u8]) -> Result<Oid> {
        self.take_failure(FailPoint::CreateBlob)?;
        let oid = hash_object("blob", content);
        self.lock().blobs.insert(oid.clone(), content.to_vec());
        Ok(oid)
    }

    async fn create_tree(&self, entries: &[TreeEntry], base: &Oid) -> Result<Oid> {
        self.take_failure(FailPoint::CreateTree)?;
        let mut inner = self.lock();
        let mut tree = tree_of_commit(&inner, base)?;
        for entry in entries {
            if !inner.blobs.contains_key(&entry.blob) {
                return Err(Error::NotFound(format!("blob {}", entry.blob)));
            }
            tree.insert(entry.path.clone(), entry.blob.clone());
        }
        Ok(insert_tree(&mut inner, tree))
    }

    async fn create_commit(&self, message: &str, tree: &Oid, parents: &[Oid]) -> Result<Oid> {
        self.take_failure(FailPoint::CreateCommit)?;
        let mut inner = self.lock();
        if !inner.trees.contains_key(tree) {
            return Err(Error::NotFound(format!("tree {tree}")));
        }
        Ok(insert_commit(
            &mut inner,
            CommitNode {
                tree: tree.clone(),
                parents: parents.to_vec(),
                message: message.to_string(),
            },
        ))
    }

    async fn update_ref(&self, branch: &str, commit: &Oid) -> Result<()> {
        self.take_failure(FailPoint::UpdateRef)?;
        let mut inner = self.lock();
        if inner.reject_updates > 0 {
            inner.reject_updates -= 1;
            return Err(Error::RefConflict(
                "update rejected by fast-forward check".to_string(),
            ));
        }
        if !inner.commits.contains_key(commit) {
            return Err(Error::NotFound(format!("commit {commit}")));
        }
        let current = inner
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("branch {branch}")))?;
        if !is_ancestor(&inner, &current, commit) {
            return Err(Error::RefConflict(format!(
                "{commit} is not a fast-forward of {current}"
            )));
        }
        inner.branches.insert(branch.to_string(), commit.clone());
        Ok(())
    }

    async fn read_path(&self, branch: &str, path: &str) -> Result<Option<String>> {
        self.take_failure(FailPoint::ReadPath)?;
        let inner = self.lock();
        let head = inner
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("branch {branch}")))?;
        let tree = tree_of_commit(&inner, &head)?;
        Ok(tree.get(path).and_then(|blob| {
            inner
                .blobs
                .get(blob)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        }))
    }
}

fn hash_object(kind: &str, payload: &[u8]) -> Oid {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b"\0");
    hasher.update(payload);
    Oid::new(hex::encode(hasher.finalize()))
}

fn tree_payload(tree: &BTreeMap<String, Oid>) -> Vec<u8> {
    let mut payload = Vec::new();
    for (path, blob) in tree {
        payload.extend_from_slice(path.as_bytes());
        payload.push(0);
        payload.extend_from_slice(blob.as_str().as_bytes());
        payload.push(b'\n');
    }
    payload
}

fn commit_payload(node: &CommitNode) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(node.tree.as_str().as_bytes());
    for parent in &node.parents {
        payload.push(0);
        payload.extend_from_slice(parent.as_str().as_bytes());
    }
    payload.push(0);
    payload.extend_from_slice(node.message.as_bytes());
    payload
}

fn insert_tree(inner: &mut Inner, tree: BTreeMap<String, Oid>) -> Oid {
    let oid = hash_object("tree", &tree_payload(&tree));
    inner.trees.insert(oid.clone(), tree);
    oid
}

fn insert_commit(inner: &mut Inner, node: CommitNode) -> Oid {
    let oid = hash_object("commit", &commit_payload(&node));
    inner.commits.insert(oid.clone(), node);
    oid
}

fn tree_of_commit(inner: &Inner, commit: &Oid) -> Result<BTreeMap<String, Oid>> {
    let node = inner
        .commits
        .get(commit)
        .ok_or_else(|| Error::NotFound(format!("commit {commit}")))?;
    inner
        .trees
        .get(&node.tree)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("tree {}", node.tree)))
}

fn is_ancestor(inner: &Inner, ancestor: &Oid, descendant: &Oid) -> bool {
    let mut stack = vec![descendant.clone()];
    while let Some(oid) = stack.pop() {
        if &oid == ancestor {
            return true;
        }
        if let Some(commit) = inner.commits.get(&oid) {
            stack.extend(commit.parents.iter().cloned());
        }
    }
    false
}
