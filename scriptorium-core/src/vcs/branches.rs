use std::fs;
use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{BranchType, ErrorCode, Repository};
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

use super::commits::format_commit_date;
use super::repo::{open_existing, repo_lock, signature};

/// Create `name` from `base` (or from HEAD when `base` is `None`).
pub fn create_branch<P: AsRef<Path>>(
    repo_path: P,
    name: &str,
    base: Option<&str>,
) -> Result<(), StoreError> {
    let lock = repo_lock(&repo_path);
    let _guard = lock.lock();

    let repo = open_existing(repo_path.as_ref())?;
    let commit = match base {
        Some(base_name) => repo
            .find_branch(base_name, BranchType::Local)
            .map_err(|_| {
                StoreError::invalid(format!("base branch `{base_name}` does not exist"))
            })?
            .into_reference()
            .peel_to_commit()?,
        None => repo.head()?.peel_to_commit()?,
    };

    repo.branch(name, &commit, false)?;
    Ok(())
}

pub fn checkout_branch<P: AsRef<Path>>(
    repo_path: P,
    name: &str,
    create: bool,
) -> Result<(), StoreError> {
    let lock = repo_lock(&repo_path);
    let _guard = lock.lock();

    let repo = open_existing(repo_path.as_ref())?;

    let exists = match repo.find_branch(name, BranchType::Local) {
        Ok(_) => true,
        Err(err) if err.code() == ErrorCode::NotFound => false,
        Err(err) => return Err(err.into()),
    };

    if !exists {
        if !create {
            return Err(StoreError::not_found(format!(
                "branch `{name}` does not exist"
            )));
        }
        let head = repo.head()?.peel_to_commit()?;
        repo.branch(name, &head, false)?;
    }

    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.set_head(&format!("refs/heads/{name}"))?;
    repo.checkout_head(Some(&mut checkout))?;
    Ok(())
}

pub fn delete_branch<P: AsRef<Path>>(repo_path: P, name: &str) -> Result<(), StoreError> {
    let lock = repo_lock(&repo_path);
    let _guard = lock.lock();

    let repo = open_existing(repo_path.as_ref())?;
    match repo.find_branch(name, BranchType::Local) {
        Ok(mut branch) => Ok(branch.delete()?),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Clone `url` into `local_path`, creating parent directories.
pub fn clone_repository<P: AsRef<Path>>(url: &str, local_path: P) -> Result<(), StoreError> {
    let local_path = local_path.as_ref();
    if let Some(parent) = local_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let lock = repo_lock(local_path);
    let _guard = lock.lock();

    Repository::clone(url, local_path)
        .map_err(|err| StoreError::internal(format!("failed to clone `{url}`: {}", err.message())))?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagInfo {
    pub name: String,
    pub commit: String,
    pub date: String,
}

/// Tag `target` (a revision, `"HEAD"` included). With a message the tag
/// is annotated; without, lightweight.
pub fn create_tag<P: AsRef<Path>>(
    repo_path: P,
    name: &str,
    message: Option<&str>,
    target: &str,
    author: &str,
    email: &str,
) -> Result<(), StoreError> {
    let lock = repo_lock(&repo_path);
    let _guard = lock.lock();

    let repo = open_existing(repo_path.as_ref())?;
    let object = repo
        .revparse_single(target)
        .map_err(|_| StoreError::not_found(format!("revision `{target}` not found")))?;

    match message {
        Some(message) => {
            let sig = signature(author, email)?;
            repo.tag(name, &object, &sig, message, false)?;
        }
        None => {
            repo.tag_lightweight(name, &object, false)?;
        }
    }
    Ok(())
}

pub fn list_tags<P: AsRef<Path>>(repo_path: P) -> Result<Vec<TagInfo>, StoreError> {
    let repo = open_existing(repo_path.as_ref())?;
    let names = repo.tag_names(None)?;

    let mut tags = Vec::new();
    for name in names.iter().flatten() {
        let reference = match repo.find_reference(&format!("refs/tags/{name}")) {
            Ok(reference) => reference,
            Err(_) => continue,
        };
        let Ok(commit) = reference.peel_to_commit() else {
            continue;
        };

        tags.push(TagInfo {
            name: name.to_string(),
            commit: commit.id().to_string(),
            date: format_commit_date(commit.time().seconds(), commit.time().offset_minutes()),
        });
    }

    Ok(tags)
}
