use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::AdaptersError;

/// Identity used for synthetic commits published by the Repair Worker
/// (spec.md §4.5).
#[derive(Debug, Clone)]
pub struct Committer {
    pub name: String,
    pub email: String,
}

impl Default for Committer {
    fn default() -> Self {
        Self { name: "SDLC Repair Worker".to_string(), email: "sdlc-repair@localhost".to_string() }
    }
}

/// Boundary around `git` (spec.md §4.3 clone, §4.5 branch/commit/push).
/// Blocking `git2` calls run on `spawn_blocking` so callers stay async
/// without holding a lock across the operation (spec.md §5).
#[async_trait]
pub trait GitAdapter: Send + Sync {
    /// Shallow (depth 1), single-branch clone into `dest`, which must not
    /// already exist (spec.md §4.3).
    async fn shallow_clone(&self, repo_url: &str, branch: &str, dest: &Path) -> Result<(), AdaptersError>;

    /// Creates `new_branch` from the currently checked-out branch, stages
    /// every change under `repo_dir`, commits with `message` under
    /// `committer`, and pushes with upstream tracking (spec.md §4.5).
    async fn publish_branch(
        &self,
        repo_dir: &Path,
        new_branch: &str,
        message: &str,
        committer: &Committer,
    ) -> Result<(), AdaptersError>;
}

pub struct RealGitAdapter;

#[async_trait]
impl GitAdapter for RealGitAdapter {
    async fn shallow_clone(&self, repo_url: &str, branch: &str, dest: &Path) -> Result<(), AdaptersError> {
        let repo_url = repo_url.to_string();
        let branch = branch.to_string();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || clone_blocking(&repo_url, &branch, &dest))
            .await
            .map_err(|e| AdaptersError::permanent("clone", e.to_string()))?
    }

    async fn publish_branch(
        &self,
        repo_dir: &Path,
        new_branch: &str,
        message: &str,
        committer: &Committer,
    ) -> Result<(), AdaptersError> {
        let repo_dir = repo_dir.to_path_buf();
        let new_branch = new_branch.to_string();
        let message = message.to_string();
        let committer = committer.clone();
        tokio::task::spawn_blocking(move || publish_blocking(&repo_dir, &new_branch, &message, &committer))
            .await
            .map_err(|e| AdaptersError::permanent("publish branch", e.to_string()))?
    }
}

fn clone_blocking(repo_url: &str, branch: &str, dest: &Path) -> Result<(), AdaptersError> {
    let mut fetch_options = git2::FetchOptions::new();
    fetch_options.depth(1);
    git2::build::RepoBuilder::new()
        .branch(branch)
        .fetch_options(fetch_options)
        .clone(repo_url, dest)
        .map_err(|e| {
            if e.class() == git2::ErrorClass::Net {
                AdaptersError::transient("git clone", e)
            } else {
                AdaptersError::Git(e)
            }
        })?;
    Ok(())
}

fn publish_blocking(repo_dir: &Path, new_branch: &str, message: &str, committer: &Committer) -> Result<(), AdaptersError> {
    let repo = git2::Repository::open(repo_dir)?;
    let head_commit = repo.head()?.peel_to_commit()?;
    let branch = repo.branch(new_branch, &head_commit, true)?;
    repo.set_head(branch.get().name().ok_or_else(|| AdaptersError::permanent("publish branch", "unnamed branch ref"))?)?;
    repo.checkout_head(Some(git2::build::CheckoutBuilder::new().force()))?;

    let mut index = repo.index()?;
    index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    let signature = git2::Signature::now(&committer.name, &committer.email)?;
    let parent = repo.head()?.peel_to_commit()?;
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])?;

    let mut remote = repo.find_remote("origin")?;
    let refspec = format!("refs/heads/{new_branch}:refs/heads/{new_branch}");
    remote.push(&[refspec.as_str()], None).map_err(|e| match e.code() {
        git2::ErrorCode::Auth | git2::ErrorCode::Certificate => {
            AdaptersError::permanent("push", format!("push denied: {e}"))
        }
        _ if e.class() == git2::ErrorClass::Net => AdaptersError::transient("push", e),
        _ => AdaptersError::Git(e),
    })?;
    Ok(())
}

/// Records every clone/publish call instead of touching a real remote.
/// `shallow_clone` materializes `fixture_files` under `dest` so worker
/// tests can exercise packaging/scanning against realistic content.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeGitAdapter {
    pub fixture_files: std::collections::BTreeMap<PathBuf, String>,
    pub clones: parking_lot::Mutex<Vec<(String, String)>>,
    pub published: parking_lot::Mutex<Vec<(String, String)>>,
    pub fail_push: bool,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeGitAdapter {
    pub fn new(fixture_files: std::collections::BTreeMap<PathBuf, String>) -> Self {
        Self { fixture_files, clones: Default::default(), published: Default::default(), fail_push: false }
    }

    pub fn failing_push(mut self) -> Self {
        self.fail_push = true;
        self
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl GitAdapter for FakeGitAdapter {
    async fn shallow_clone(&self, repo_url: &str, branch: &str, dest: &Path) -> Result<(), AdaptersError> {
        self.clones.lock().push((repo_url.to_string(), branch.to_string()));
        for (relative, content) in &self.fixture_files {
            let path = dest.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, content)?;
        }
        Ok(())
    }

    async fn publish_branch(
        &self,
        _repo_dir: &Path,
        new_branch: &str,
        message: &str,
        _committer: &Committer,
    ) -> Result<(), AdaptersError> {
        if self.fail_push {
            return Err(AdaptersError::permanent("push", "push denied: permission denied"));
        }
        self.published.lock().push((new_branch.to_string(), message.to_string()));
        Ok(())
    }
}
