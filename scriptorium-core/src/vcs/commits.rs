use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, FixedOffset};
use git2::{Commit, ErrorCode, Index, IndexAddOption, Repository, Sort};
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

use super::normalize_pathspec;
use super::repo::{open_existing, repo_lock, signature};

/// One revision in `log` output, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    /// `name <email>`
    pub author: String,
    /// `%Y-%m-%d %H:%M:%S %z`
    pub date: String,
    pub timestamp: i64,
    pub message: String,
}

/// Stage the given relative paths. Directories recurse; a missing path
/// is an error.
pub fn stage<P: AsRef<Path>>(repo_path: P, paths: &[&str]) -> Result<(), StoreError> {
    let lock = repo_lock(&repo_path);
    let _guard = lock.lock();

    let repo = open_existing(repo_path.as_ref())?;
    let mut index = repo.index()?;

    for raw in paths {
        let norm = normalize_pathspec(raw);
        let full = repo_path.as_ref().join(&norm);
        if full.is_dir() {
            index.add_all([norm.as_str()], IndexAddOption::DEFAULT, None)?;
        } else if let Err(err) = index.add_path(Path::new(&norm)) {
            if err.code() == ErrorCode::NotFound {
                return Err(StoreError::not_found(format!(
                    "cannot stage missing path `{norm}`"
                )));
            }
            return Err(err.into());
        }
    }

    index.write()?;
    Ok(())
}

fn remove_path_allow_missing(index: &mut Index, path: &Path) -> Result<(), git2::Error> {
    match index.remove_path(path) {
        Ok(()) => Ok(()),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

// Stage a path whether it was modified or deleted in the working tree.
fn stage_allow_missing(index: &mut Index, raw: &str) -> Result<(), git2::Error> {
    let norm = normalize_pathspec(raw);
    let p = Path::new(&norm);
    match index.add_path(p) {
        Ok(()) => Ok(()),
        Err(err) if err.code() == ErrorCode::NotFound => remove_path_allow_missing(index, p),
        Err(err) => Err(err),
    }
}

/// Remove a file from the index and, if still present, the working
/// tree. The removal is left staged for the next commit.
pub fn remove_file<P: AsRef<Path>>(repo_path: P, file: &str) -> Result<(), StoreError> {
    let lock = repo_lock(&repo_path);
    let _guard = lock.lock();

    let repo = open_existing(repo_path.as_ref())?;
    let norm = normalize_pathspec(file);

    let full = repo_path.as_ref().join(&norm);
    if full.exists() {
        fs::remove_file(&full)?;
    }

    let mut index = repo.index()?;
    remove_path_allow_missing(&mut index, Path::new(&norm))?;
    index.write()?;
    Ok(())
}

fn commit_staged_impl(
    repo: &Repository,
    message: &str,
    author: &str,
    email: &str,
) -> Result<git2::Oid, StoreError> {
    let mut index = repo.index()?;
    index.write()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;

    let sig = signature(author, email)?;
    let parent_commit = repo.head().ok().and_then(|h| h.peel_to_commit().ok());

    if let Some(ref parent) = parent_commit {
        if parent.tree_id() == tree_id {
            return Err(StoreError::precondition("nothing to commit"));
        }
    } else if index.is_empty() {
        return Err(StoreError::precondition("nothing to commit"));
    }

    let parents: Vec<&Commit> = parent_commit.iter().collect();
    let oid = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
    Ok(oid)
}

/// Commit the staged changes, returning the revision identifier.
pub fn commit<P: AsRef<Path>>(
    repo_path: P,
    message: &str,
    author: &str,
    email: &str,
) -> Result<String, StoreError> {
    let lock = repo_lock(&repo_path);
    let _guard = lock.lock();

    let repo = open_existing(repo_path.as_ref())?;
    commit_staged_impl(&repo, message, author, email).map(|oid| oid.to_string())
}

/// A batch commit that failed mid-sequence. Earlier commits are durable
/// and listed in `completed`.
#[derive(Debug)]
pub struct BatchCommitError {
    pub completed: Vec<String>,
    pub error: StoreError,
}

impl fmt::Display for BatchCommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch commit failed after {} group(s): {}",
            self.completed.len(),
            self.error
        )
    }
}

impl std::error::Error for BatchCommitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Commit `groups` of files as one revision per non-empty group, with
/// messages `"<template> (batch <i>/<n>)"`. Each group commits
/// independently; a failure keeps the earlier commits.
pub fn batch_commit<P: AsRef<Path>>(
    repo_path: P,
    groups: &[Vec<String>],
    message_template: &str,
    author: &str,
    email: &str,
) -> Result<Vec<String>, BatchCommitError> {
    let lock = repo_lock(&repo_path);
    let _guard = lock.lock();

    let mut completed = Vec::new();
    let total = groups.len();

    let repo = match open_existing(repo_path.as_ref()) {
        Ok(repo) => repo,
        Err(error) => return Err(BatchCommitError { completed, error }),
    };

    for (i, group) in groups.iter().enumerate() {
        if group.is_empty() {
            continue;
        }

        let staged = (|| -> Result<(), StoreError> {
            let mut index = repo.index()?;
            for file in group {
                stage_allow_missing(&mut index, file)?;
            }
            index.write()?;
            Ok(())
        })();
        if let Err(error) = staged {
            return Err(BatchCommitError { completed, error });
        }

        let message = format!("{message_template} (batch {}/{})", i + 1, total);
        match commit_staged_impl(&repo, &message, author, email) {
            Ok(oid) => completed.push(oid.to_string()),
            Err(error) => return Err(BatchCommitError { completed, error }),
        }
    }

    Ok(completed)
}

/// Empty the staging area without touching the working tree or HEAD.
pub fn reset<P: AsRef<Path>>(repo_path: P) -> Result<(), StoreError> {
    let lock = repo_lock(&repo_path);
    let _guard = lock.lock();

    let repo = open_existing(repo_path.as_ref())?;
    let head_tree = repo.head().ok().and_then(|h| h.peel_to_tree().ok());
    let mut index = repo.index()?;

    match head_tree {
        Some(tree) => index.read_tree(&tree)?,
        None => index.clear()?,
    }
    index.write()?;
    Ok(())
}

pub(crate) fn format_commit_date(seconds: i64, offset_minutes: i32) -> String {
    let Some(utc) = DateTime::from_timestamp(seconds, 0) else {
        return String::new();
    };
    match FixedOffset::east_opt(offset_minutes * 60) {
        Some(offset) => utc
            .with_timezone(&offset)
            .format("%Y-%m-%d %H:%M:%S %z")
            .to_string(),
        None => utc.format("%Y-%m-%d %H:%M:%S %z").to_string(),
    }
}

fn blob_id_at(commit: &Commit, path: &Path) -> Option<git2::Oid> {
    commit
        .tree()
        .ok()
        .and_then(|tree| tree.get_path(path).ok())
        .map(|entry| entry.id())
}

// Mirrors `git log -- <path>`: a commit counts when the blob at `path`
// differs from the first parent's.
fn commit_touches(commit: &Commit, path: &Path) -> bool {
    let current = blob_id_at(commit, path);
    match commit.parent(0) {
        Ok(parent) => current != blob_id_at(&parent, path),
        Err(_) => current.is_some(),
    }
}

/// Newest-first commit log, optionally restricted to revisions touching
/// `file`. An unborn HEAD yields an empty list.
pub fn log<P: AsRef<Path>>(
    repo_path: P,
    max_count: usize,
    file: Option<&str>,
) -> Result<Vec<LogEntry>, StoreError> {
    let repo = open_existing(repo_path.as_ref())?;

    let mut walk = match repo.revwalk() {
        Ok(walk) => walk,
        Err(_) => return Ok(Vec::new()),
    };
    if walk.push_head().is_err() {
        return Ok(Vec::new());
    }
    walk.set_sorting(Sort::TIME)?;

    let pathspec = file.map(normalize_pathspec);
    let mut entries = Vec::new();

    for oid_res in walk {
        let oid = oid_res?;
        let commit = repo.find_commit(oid)?;

        if let Some(ref spec) = pathspec
            && !commit_touches(&commit, Path::new(spec))
        {
            continue;
        }

        let author = commit.author();
        let name = author.name().unwrap_or("<unknown>");
        let email = author.email().unwrap_or("");
        let seconds = commit.time().seconds();

        entries.push(LogEntry {
            id: oid.to_string(),
            author: format!("{name} <{email}>"),
            date: format_commit_date(seconds, commit.time().offset_minutes()),
            timestamp: seconds,
            message: commit.message().unwrap_or_default().trim().to_string(),
        });

        if entries.len() >= max_count {
            break;
        }
    }

    Ok(entries)
}

/// File body as recorded at `revision`.
pub fn show<P: AsRef<Path>>(
    repo_path: P,
    file: &str,
    revision: &str,
) -> Result<String, StoreError> {
    let repo = open_existing(repo_path.as_ref())?;

    let object = repo
        .revparse_single(revision)
        .map_err(|_| StoreError::not_found(format!("revision `{revision}` not found")))?;
    let commit = object
        .peel_to_commit()
        .map_err(|_| StoreError::not_found(format!("revision `{revision}` not found")))?;

    let norm = normalize_pathspec(file);
    let entry = commit
        .tree()?
        .get_path(Path::new(&norm))
        .map_err(|_| StoreError::not_found(format!("`{norm}` not present at {revision}")))?;
    let blob = repo.find_blob(entry.id())?;

    Ok(String::from_utf8_lossy(blob.content()).into_owned())
}

/// Write the blob content at `revision` back into the working tree.
pub fn restore_at_revision<P: AsRef<Path>>(
    repo_path: P,
    file: &str,
    revision: &str,
) -> Result<(), StoreError> {
    let content = show(&repo_path, file, revision)?;

    let lock = repo_lock(&repo_path);
    let _guard = lock.lock();

    let full = repo_path.as_ref().join(normalize_pathspec(file));
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&full, content)?;
    Ok(())
}
