//! The multi-step write pipeline.
//!
//! The backend offers no multi-object transaction primitive, so durability is
//! built from ordering: blobs, tree, and commit are created first (all inert
//! until referenced), and the branch pointer is advanced last. Any failure
//! before the final step leaves the remote collection unchanged from a
//! reader's perspective; orphaned objects are content-addressed garbage and
//! are not cleaned up.

use std::fmt;

use futures_util::future::try_join_all;

use crate::store::{ObjectStore, Oid, TreeEntry};
use crate::{Error, Result};

/// How many times the pipeline restarts after losing the branch head to a
/// competing writer.
pub const MAX_REF_ATTEMPTS: u32 = 3;

/// Steps of one pipeline attempt, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPhase {
    FetchingRef,
    BuildingBlobs,
    BuildingTree,
    Committing,
    UpdatingRef,
}

impl fmt::Display for CommitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FetchingRef => "fetching-ref",
            Self::BuildingBlobs => "building-blobs",
            Self::BuildingTree => "building-tree",
            Self::Committing => "committing",
            Self::UpdatingRef => "updating-ref",
        };
        write!(f, "{name}")
    }
}

/// Commit the given `(path, content)` files to the branch in one snapshot.
///
/// Advances the branch pointer only if it still equals the head observed at
/// the start of the attempt; on a lost race the whole pipeline re-runs from
/// the new head, up to [`MAX_REF_ATTEMPTS`] times, then surfaces
/// [`Error::RefConflict`].
pub async fn commit_files<S: ObjectStore>(
    store: &S,
    branch: &str,
    message: &str,
    files: &[(String, Vec<u8>)],
) -> Result<Oid> {
    for attempt in 1..=MAX_REF_ATTEMPTS {
        match commit_once(store, branch, message, files).await {
            Ok(commit) => return Ok(commit),
            Err(Error::RefConflict(cause)) => {
                tracing::warn!(
                    "commit attempt {attempt}/{MAX_REF_ATTEMPTS} on {branch} lost the head ({cause}), retrying"
                );
            }
            Err(error) => return Err(error),
        }
    }
    Err(Error::RefConflict(format!(
        "branch {branch} kept moving; gave up after {MAX_REF_ATTEMPTS} attempts"
    )))
}

async fn commit_once<S: ObjectStore>(
    store: &S,
    branch: &str,
    message: &str,
    files: &[(String, Vec<u8>)],
) -> Result<Oid> {
    tracing::debug!(phase = %CommitPhase::FetchingRef, branch, "reading branch head");
    let head = store.get_branch_head(branch).await?;

    tracing::debug!(phase = %CommitPhase::BuildingBlobs, files = files.len(), "creating blobs");
    let entries = try_join_all(files.iter().map(|(path, content)| async move {
        let blob = store.create_blob(content).await?;
        Ok::<_, Error>(TreeEntry {
            path: path.clone(),
            blob,
        })
    }))
    .await?;

    tracing::debug!(phase = %CommitPhase::BuildingTree, "snapshotting tree");
    let tree = store.create_tree(&entries, &head).await?;

    tracing::debug!(phase = %CommitPhase::Committing, "creating commit");
    let commit = store
        .create_commit(message, &tree, std::slice::from_ref(&head))
        .await?;

    // Compare-and-swap: the head must not have moved since the tree was based
    // on it, otherwise advancing the pointer would discard the other writer.
    let current = store.get_branch_head(branch).await?;
    if current != head {
        return Err(Error::RefConflict(format!(
            "expected head {head}, found {current}"
        )));
    }

    tracing::debug!(phase = %CommitPhase::UpdatingRef, %commit, "advancing branch");
    store.update_ref(branch, &commit).await?;
    Ok(commit)
}
