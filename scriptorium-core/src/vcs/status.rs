use std::path::Path;

use git2::{
    Diff, DiffFormat, DiffLine, DiffOptions, ErrorCode, Repository, Status, StatusOptions,
    StatusShow, Tree,
};
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

use super::normalize_pathspec;
use super::repo::open_existing;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoStatus {
    pub current_branch: String,
    /// True when nothing is staged or modified. Untracked files do not
    /// make the tree dirty.
    pub clean: bool,
    pub staged: Vec<String>,
    pub unstaged: Vec<String>,
    pub untracked: Vec<String>,
}

fn entry_path(entry: &git2::StatusEntry<'_>) -> String {
    entry
        .head_to_index()
        .or_else(|| entry.index_to_workdir())
        .and_then(|d| d.new_file().path().or(d.old_file().path()))
        .and_then(|p| p.to_str())
        .or_else(|| entry.path())
        .unwrap_or_default()
        .to_string()
}

pub fn status<P: AsRef<Path>>(repo_path: P) -> Result<RepoStatus, StoreError> {
    let repo = open_existing(repo_path.as_ref())?;

    let current_branch = match repo.head() {
        Ok(head) if head.is_branch() => head.shorthand().unwrap_or("HEAD").to_string(),
        _ => "HEAD".to_string(),
    };

    let mut opts = StatusOptions::new();
    opts.show(StatusShow::IndexAndWorkdir)
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_unmodified(false)
        .include_ignored(false);

    let statuses = repo.statuses(Some(&mut opts))?;
    let mut staged = Vec::new();
    let mut unstaged = Vec::new();
    let mut untracked = Vec::new();

    for entry in statuses.iter() {
        let s = entry.status();
        let path = entry_path(&entry);
        if path.is_empty() {
            continue;
        }

        if s.contains(Status::WT_NEW) {
            untracked.push(path.clone());
        } else if s.intersects(
            Status::WT_MODIFIED | Status::WT_DELETED | Status::WT_RENAMED | Status::WT_TYPECHANGE,
        ) {
            unstaged.push(path.clone());
        }

        if s.intersects(
            Status::INDEX_NEW
                | Status::INDEX_MODIFIED
                | Status::INDEX_DELETED
                | Status::INDEX_RENAMED
                | Status::INDEX_TYPECHANGE,
        ) {
            staged.push(path);
        }
    }

    staged.sort();
    unstaged.sort();
    untracked.sort();

    Ok(RepoStatus {
        current_branch,
        clean: staged.is_empty() && unstaged.is_empty(),
        staged,
        unstaged,
        untracked,
    })
}

fn configure_diff_options(pathspec: Option<&str>) -> DiffOptions {
    let mut opts = DiffOptions::new();
    opts.ignore_submodules(true).id_abbrev(40);
    if let Some(spec) = pathspec {
        opts.pathspec(normalize_pathspec(spec));
    }
    opts
}

fn diff_tree_to_workdir_tolerant<'repo>(
    repo: &'repo Repository,
    base: Option<&Tree<'repo>>,
    pathspec: Option<&str>,
) -> Result<Diff<'repo>, git2::Error> {
    let mut opts = configure_diff_options(pathspec);

    match repo.diff_tree_to_workdir_with_index(base, Some(&mut opts)) {
        Ok(diff) => Ok(diff),
        Err(err) if err.code() == ErrorCode::NotFound => {
            // Staged deletions can make the combined diff stat-fail;
            // merge the two halves instead.
            let mut staged_opts = configure_diff_options(pathspec);
            let mut workdir_opts = configure_diff_options(pathspec);

            let index = repo.index()?;
            let mut staged_diff =
                repo.diff_tree_to_index(base, Some(&index), Some(&mut staged_opts))?;
            let workdir_diff = repo.diff_index_to_workdir(Some(&index), Some(&mut workdir_opts))?;

            staged_diff.merge(&workdir_diff)?;
            Ok(staged_diff)
        }
        Err(err) => Err(err),
    }
}

fn print_patch(diff: &Diff<'_>) -> Result<String, git2::Error> {
    let mut buf = Vec::new();
    diff.print(DiffFormat::Patch, |_, _, line: DiffLine<'_>| {
        let origin = line.origin();
        if matches!(origin, '+' | '-' | ' ') {
            buf.push(origin as u8);
        }
        buf.extend_from_slice(line.content());
        true
    })?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn resolve_tree<'repo>(
    repo: &'repo Repository,
    revision: &str,
) -> Result<Tree<'repo>, StoreError> {
    repo.revparse_single(revision)
        .and_then(|obj| obj.peel_to_tree())
        .map_err(|_| StoreError::not_found(format!("revision `{revision}` not found")))
}

/// Unified patch of the working tree (plus index) against HEAD, or
/// against `target` when given, optionally restricted to one path.
pub fn diff<P: AsRef<Path>>(
    repo_path: P,
    target: Option<&str>,
    pathspec: Option<&str>,
) -> Result<String, StoreError> {
    let repo = open_existing(repo_path.as_ref())?;

    let base = match target {
        Some(revision) => Some(resolve_tree(&repo, revision)?),
        None => repo.head().ok().and_then(|h| h.peel_to_tree().ok()),
    };

    let diff = diff_tree_to_workdir_tolerant(&repo, base.as_ref(), pathspec)?;
    Ok(print_patch(&diff)?)
}

/// Unified patch between two revisions; `to` accepts `"HEAD"`.
pub fn diff_between<P: AsRef<Path>>(
    repo_path: P,
    from: &str,
    to: &str,
    pathspec: Option<&str>,
) -> Result<String, StoreError> {
    let repo = open_existing(repo_path.as_ref())?;

    let from_tree = resolve_tree(&repo, from)?;
    let to_tree = resolve_tree(&repo, to)?;

    let mut opts = configure_diff_options(pathspec);
    let diff = repo.diff_tree_to_tree(Some(&from_tree), Some(&to_tree), Some(&mut opts))?;
    Ok(print_patch(&diff)?)
}
