//! Bridge over the git object graph
//!
//! Content is read from and written to the tree of the commit a ref points
//! at. No working directory or index is involved: every write builds new
//! blob and tree objects, writes a commit whose parent is the current tip,
//! and only then moves the ref.
//!
//! ```text
//! refs/heads/main ──▶ commit ──▶ tree ──▶ content/ ──▶ posts/ ──▶ a.md (blob)
//! ```
//!
//! The ref update is forced. Two processes writing the same ref race and the
//! last writer wins.

use async_trait::async_trait;
use git2::{Commit, ErrorCode, FileMode, ObjectType, Oid, Repository, Signature, Tree, TreeWalkMode, TreeWalkResult};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{join_path, Bridge, Glob};
use crate::error::{Error, Result};
use crate::validation::validate_relative_path;

/// Identity recorded on commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

impl Default for CommitAuthor {
    fn default() -> Self {
        Self {
            name: "mdgraph".to_string(),
            email: "mdgraph@local".to_string(),
        }
    }
}

pub struct GitBridge {
    repo: Mutex<Repository>,
    reference: String,
    /// Location of the content root inside the tree, `""` for the top
    prefix: String,
    author: CommitAuthor,
    commit_message: Option<String>,
}

impl GitBridge {
    /// Use an existing repository
    pub fn open(path: &Path, reference: impl Into<String>) -> Result<Self> {
        Ok(Self::with_repository(Repository::open(path)?, reference))
    }

    /// Create a repository if needed; the ref may stay unborn until the first write
    pub fn init(path: &Path, reference: impl Into<String>) -> Result<Self> {
        let repo = match Repository::open(path) {
            Ok(repo) => repo,
            Err(_) => Repository::init(path)?,
        };
        Ok(Self::with_repository(repo, reference))
    }

    /// Discover the repository enclosing `root` and bridge its current branch
    ///
    /// The content root's position inside the repository becomes the path
    /// prefix, and the repository's configured identity signs commits.
    pub fn from_workdir(root: &Path) -> Result<Self> {
        let repo = Repository::discover(root)?;

        let reference = repo
            .find_reference("HEAD")?
            .symbolic_target()
            .map(str::to_string)
            .ok_or_else(|| Error::GitError {
                message: "HEAD is detached; a branch is required".to_string(),
                source: None,
            })?;

        let prefix = match repo.workdir() {
            Some(workdir) => {
                let workdir = workdir.canonicalize()?;
                let root = root.canonicalize()?;
                root.strip_prefix(&workdir)
                    .map(|p| {
                        p.components()
                            .map(|c| c.as_os_str().to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/")
                    })
                    .unwrap_or_default()
            }
            None => String::new(),
        };

        let author = match repo.signature() {
            Ok(sig) => CommitAuthor {
                name: sig.name().unwrap_or("mdgraph").to_string(),
                email: sig.email().unwrap_or("mdgraph@local").to_string(),
            },
            Err(_) => CommitAuthor::default(),
        };

        let mut bridge = Self::with_repository(repo, reference);
        bridge.prefix = prefix;
        bridge.author = author;
        Ok(bridge)
    }

    fn with_repository(repo: Repository, reference: impl Into<String>) -> Self {
        Self {
            repo: Mutex::new(repo),
            reference: reference.into(),
            prefix: String::new(),
            author: CommitAuthor::default(),
            commit_message: None,
        }
    }

    pub fn with_author(mut self, author: CommitAuthor) -> Self {
        self.author = author;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into().trim_matches('/').to_string();
        self
    }

    /// Fixed message for every commit instead of `Update <path>`
    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = Some(message.into());
        self
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Commit the ref currently points at, if it exists
    pub fn head(&self) -> Result<Option<Oid>> {
        let repo = self.lock()?;
        let head = tip(&repo, &self.reference)?.map(|c| c.id());
        Ok(head)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Repository>> {
        self.repo.lock().map_err(|_| Error::GitError {
            message: "repository lock poisoned".to_string(),
            source: None,
        })
    }

    fn full_path(&self, path: &str) -> Result<String> {
        validate_relative_path(path)?;
        Ok(join_path(&self.prefix, path))
    }

    fn message(&self, verb: &str, path: &str) -> String {
        self.commit_message
            .clone()
            .unwrap_or_else(|| format!("{} {}", verb, path))
    }

    /// Write a commit for `tree_id` on top of `parent`, then move the ref
    fn commit(&self, repo: &Repository, parent: Option<&Commit<'_>>, tree_id: Oid, message: &str) -> Result<Oid> {
        let tree = repo.find_tree(tree_id)?;
        let sig = Signature::now(&self.author.name, &self.author.email)?;
        let parents: Vec<&Commit<'_>> = parent.into_iter().collect();
        let oid = repo.commit(None, &sig, &sig, message, &tree, &parents)?;
        repo.reference(&self.reference, oid, true, message)?;
        tracing::debug!(reference = %self.reference, commit = %oid, "{}", message);
        Ok(oid)
    }
}

#[async_trait]
impl Bridge for GitBridge {
    async fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let glob = Glob::new(pattern)?;
        let repo = self.lock()?;
        let commit = match tip(&repo, &self.reference)? {
            Some(commit) => commit,
            None => return Ok(Vec::new()),
        };
        let tree = commit.tree()?;
        let prefix = if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        };

        let mut paths = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    let full = format!("{}{}", dir, name);
                    if let Some(path) = full.strip_prefix(&prefix) {
                        if glob.is_match(path) {
                            paths.push(path.to_string());
                        }
                    }
                }
            }
            TreeWalkResult::Ok
        })?;
        paths.sort();
        Ok(paths)
    }

    async fn get(&self, path: &str) -> Result<String> {
        let full = self.full_path(path)?;
        let repo = self.lock()?;
        let commit = tip(&repo, &self.reference)?.ok_or_else(|| Error::not_found(path))?;
        let entry = match commit.tree()?.get_path(Path::new(&full)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Err(Error::not_found(path)),
            Err(e) => return Err(e.into()),
        };
        let object = entry.to_object(&repo)?;
        let blob = object.as_blob().ok_or_else(|| Error::not_found(path))?;
        String::from_utf8(blob.content().to_vec()).map_err(|_| Error::GitError {
            message: format!("{} is not valid UTF-8", path),
            source: None,
        })
    }

    async fn put(&self, path: &str, content: &str) -> Result<()> {
        let full = self.full_path(path)?;
        let segments: Vec<&str> = full.split('/').collect();
        let repo = self.lock()?;

        let parent = tip(&repo, &self.reference)?;
        let root = parent.as_ref().map(|c| c.tree()).transpose()?;
        let entries = resolve_path_entries(&repo, root, &segments)?;

        let oid = Oid::hash_object(ObjectType::Blob, content.as_bytes())?;
        if entries.leaf == Some(oid) {
            tracing::debug!(path, "content unchanged, skipping commit");
            return Ok(());
        }

        let blob = repo.blob(content.as_bytes())?;
        let tree = update_tree(&repo, &entries.trees, &segments, Some(blob))?;
        self.commit(&repo, parent.as_ref(), tree, &self.message("Update", path))?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.full_path(path)?;
        let segments: Vec<&str> = full.split('/').collect();
        let repo = self.lock()?;

        let parent = tip(&repo, &self.reference)?.ok_or_else(|| Error::not_found(path))?;
        let entries = resolve_path_entries(&repo, Some(parent.tree()?), &segments)?;
        if entries.leaf.is_none() {
            return Err(Error::not_found(path));
        }

        let tree = update_tree(&repo, &entries.trees, &segments, None)?;
        self.commit(&repo, Some(&parent), tree, &self.message("Delete", path))?;
        Ok(())
    }

    fn supports_building(&self) -> bool {
        false
    }
}

// ============================================================================
// Tree plumbing
// ============================================================================

/// Trees along a path, one per directory level, `None` where it does not exist yet
struct PathEntries<'r> {
    trees: Vec<Option<Tree<'r>>>,
    /// Blob currently stored at the path
    leaf: Option<Oid>,
}

fn tip<'r>(repo: &'r Repository, reference: &str) -> Result<Option<Commit<'r>>> {
    match repo.find_reference(reference) {
        Ok(r) => Ok(Some(r.peel_to_commit()?)),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn resolve_path_entries<'r>(repo: &'r Repository, root: Option<Tree<'r>>, segments: &[&str]) -> Result<PathEntries<'r>> {
    let mut trees = Vec::with_capacity(segments.len());
    let mut current = root;

    for (depth, name) in segments.iter().enumerate() {
        let entry = current
            .as_ref()
            .and_then(|tree| tree.get_name(name).map(|e| (e.id(), e.kind())));
        trees.push(current);

        if depth + 1 == segments.len() {
            let leaf = match entry {
                Some((id, Some(ObjectType::Blob))) => Some(id),
                Some(_) => return Err(not_a_file(segments)),
                None => None,
            };
            return Ok(PathEntries { trees, leaf });
        }

        current = match entry {
            Some((id, Some(ObjectType::Tree))) => Some(repo.find_tree(id)?),
            Some(_) => return Err(not_a_directory(&segments[..=depth])),
            None => None,
        };
    }

    Ok(PathEntries { trees, leaf: None })
}

fn not_a_directory(segments: &[&str]) -> Error {
    Error::GitError {
        message: format!("{} is a file, not a directory", segments.join("/")),
        source: None,
    }
}

fn not_a_file(segments: &[&str]) -> Error {
    Error::GitError {
        message: format!("{} is a directory, not a file", segments.join("/")),
        source: None,
    }
}

/// Rewrite the trees along `segments` bottom-up and return the new root tree
///
/// `leaf` is the new blob, or `None` to remove the entry. Directories left
/// empty by a removal are removed from their parent too.
fn update_tree(repo: &Repository, trees: &[Option<Tree<'_>>], segments: &[&str], leaf: Option<Oid>) -> Result<Oid> {
    let mut child: Option<(Oid, i32)> = leaf.map(|oid| (oid, i32::from(FileMode::Blob)));

    for depth in (0..segments.len()).rev() {
        let name = segments[depth];
        let mut builder = repo.treebuilder(trees[depth].as_ref())?;
        match child {
            Some((oid, mode)) => {
                builder.insert(name, oid, mode)?;
            }
            None => {
                if builder.get(name)?.is_some() {
                    builder.remove(name)?;
                }
            }
        }

        child = if builder.len() == 0 && depth > 0 {
            None
        } else {
            Some((builder.write()?, i32::from(FileMode::Tree)))
        };
    }

    match child {
        Some((oid, _)) => Ok(oid),
        None => Ok(repo.treebuilder(None)?.write()?),
    }
}
