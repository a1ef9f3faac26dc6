mod branches;
mod commits;
mod repo;
mod status;

pub use branches::{
    TagInfo, checkout_branch, clone_repository, create_branch, create_tag, delete_branch,
    list_tags,
};
pub use commits::{
    BatchCommitError, LogEntry, batch_commit, commit, log, remove_file, reset,
    restore_at_revision, show, stage,
};
pub use repo::{DEFAULT_IGNORE, open};
pub use status::{RepoStatus, diff, diff_between, status};

/// Normalise a caller-supplied relative path into the forward-slash,
/// no-leading-`./`, no-trailing-slash form the index expects.
fn normalize_pathspec(path: &str) -> String {
    let mut s = path
        .trim()
        .trim_end_matches('/')
        .trim_end_matches('\\')
        .replace('\\', "/");

    if let Some(stripped) = s.strip_prefix("./") {
        s = stripped.to_string();
    }

    while s.contains("//") {
        s = s.replace("//", "/");
    }

    s
}

#[cfg(test)]
mod tests;
