use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::{Repository, Signature};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::errors::StoreError;

/// Ignore list seeded into a fresh repository.
pub const DEFAULT_IGNORE: &str = "*.swp\n*.bak\n*.tmp\n*.orig\n*~\n";

// Process-local: the design presumes a single process owns each
// repository at a time.
static REPO_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Exclusive lock for the repository at `repo_path`, keyed by absolute
/// path. Every mutating operation runs under this lock.
pub(crate) fn repo_lock<P: AsRef<Path>>(repo_path: P) -> Arc<Mutex<()>> {
    let key = std::path::absolute(repo_path.as_ref())
        .unwrap_or_else(|_| repo_path.as_ref().to_path_buf());
    REPO_LOCKS.lock().entry(key).or_default().clone()
}

pub(crate) fn open_existing(repo_path: &Path) -> Result<Repository, StoreError> {
    Repository::open(repo_path)
        .map_err(|err| StoreError::internal(format!("invalid repository: {}", err.message())))
}

pub(crate) fn signature<'a>(author: &str, email: &str) -> Result<Signature<'a>, StoreError> {
    Signature::now(author, email).map_err(StoreError::from)
}

/// Open the repository at `repo_path`, initialising it when absent.
///
/// Initialisation records the commit identity, seeds the default ignore
/// list, and commits it as the initial revision so the history is never
/// empty.
pub fn open<P: AsRef<Path>>(repo_path: P, author: &str, email: &str) -> Result<(), StoreError> {
    let repo_path = repo_path.as_ref();
    fs::create_dir_all(repo_path)?;

    let lock = repo_lock(repo_path);
    let _guard = lock.lock();

    if Repository::open(repo_path).is_ok() {
        return Ok(());
    }

    let repo = Repository::init(repo_path)
        .map_err(|err| StoreError::internal(format!("invalid repository: {}", err.message())))?;

    let mut config = repo.config()?;
    config.set_str("user.name", author)?;
    config.set_str("user.email", email)?;

    let ignore_path = repo_path.join(".gitignore");
    if !ignore_path.exists() {
        fs::write(&ignore_path, DEFAULT_IGNORE)?;

        let mut index = repo.index()?;
        index.add_path(Path::new(".gitignore"))?;
        index.write()?;
        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;
        let sig = signature(author, email)?;
        repo.commit(
            Some("HEAD"),
            &sig,
            &sig,
            "Initial commit: add ignore list",
            &tree,
            &[],
        )?;
    }

    Ok(())
}
