use super::*;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const AUTHOR: &str = "Tester";
const EMAIL: &str = "tester@example.com";

struct TestRepo {
    tempdir: tempfile::TempDir,
}

impl TestRepo {
    fn new() -> Self {
        let tempdir = tempfile::TempDir::new().expect("tempdir");
        open(tempdir.path(), AUTHOR, EMAIL).expect("open repo");
        Self { tempdir }
    }

    fn path(&self) -> &Path {
        self.tempdir.path()
    }

    fn join(&self, rel: &str) -> PathBuf {
        self.tempdir.path().join(rel)
    }

    fn write(&self, rel: &str, contents: &str) {
        let path = self.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f.sync_all().unwrap();
    }

    fn commit_file(&self, rel: &str, contents: &str, message: &str) -> String {
        self.write(rel, contents);
        stage(self.path(), &[rel]).expect("stage");
        commit(self.path(), message, AUTHOR, EMAIL).expect("commit")
    }
}

#[test]
fn open_initialises_once_with_ignore_list() {
    let repo = TestRepo::new();

    assert_eq!(
        fs::read_to_string(repo.join(".gitignore")).unwrap(),
        DEFAULT_IGNORE
    );

    let entries = log(repo.path(), 10, None).expect("log");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, "Initial commit: add ignore list");
    assert_eq!(entries[0].author, format!("{AUTHOR} <{EMAIL}>"));

    // Re-opening an existing repository neither re-inits nor re-commits.
    open(repo.path(), AUTHOR, EMAIL).expect("re-open");
    assert_eq!(log(repo.path(), 10, None).unwrap().len(), 1);
}

#[test]
fn stage_missing_path_is_not_found() {
    let repo = TestRepo::new();
    let err = stage(repo.path(), &["nope.txt"]).unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
}

#[test]
fn commit_with_nothing_staged_fails() {
    let repo = TestRepo::new();
    let err = commit(repo.path(), "noop", AUTHOR, EMAIL).unwrap_err();
    assert!(
        err.to_string().contains("nothing to commit"),
        "unexpected error: {err}"
    );
}

#[test]
fn commit_then_show_round_trips_content() {
    let repo = TestRepo::new();
    let rev = repo.commit_file("notes/a.txt", "first body\n", "add a");

    assert_eq!(
        show(repo.path(), "notes/a.txt", &rev).expect("show"),
        "first body\n"
    );
    assert!(show(repo.path(), "notes/a.txt", "0000000").is_err());
    assert!(show(repo.path(), "missing.txt", &rev).unwrap_err().is_not_found());
}

#[test]
fn log_is_newest_first_and_file_filtered() {
    let repo = TestRepo::new();
    let first = repo.commit_file("a.txt", "a0\n", "add a");
    let second = repo.commit_file("b.txt", "b0\n", "add b");
    let third = repo.commit_file("a.txt", "a1\n", "edit a");

    let all = log(repo.path(), 10, None).expect("log");
    assert_eq!(all.len(), 4); // three commits + the init commit
    assert_eq!(all[0].id, third);
    assert_eq!(all[1].id, second);
    assert_eq!(all[2].id, first);

    let only_a = log(repo.path(), 10, Some("a.txt")).expect("log a");
    let ids: Vec<_> = only_a.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec![third.as_str(), first.as_str()]);

    let capped = log(repo.path(), 1, None).expect("capped log");
    assert_eq!(capped.len(), 1);
    assert_eq!(capped[0].id, third);
}

#[test]
fn reset_empties_the_staging_area() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "a0\n", "add a");

    repo.write("a.txt", "a1\n");
    stage(repo.path(), &["a.txt"]).expect("stage");
    assert_eq!(status(repo.path()).unwrap().staged, vec!["a.txt"]);

    reset(repo.path()).expect("reset");
    let st = status(repo.path()).unwrap();
    assert!(st.staged.is_empty());
    // the edit is still in the working tree
    assert_eq!(st.unstaged, vec!["a.txt"]);
}

#[test]
fn status_reports_branch_and_buckets() {
    let repo = TestRepo::new();
    repo.commit_file("keep.txt", "keep\n", "base");

    let st = status(repo.path()).expect("status");
    assert!(st.clean);
    assert!(!st.current_branch.is_empty());

    repo.write("keep.txt", "changed\n");
    repo.write("fresh.txt", "new\n");

    let st = status(repo.path()).expect("status");
    assert!(!st.clean);
    assert_eq!(st.unstaged, vec!["keep.txt"]);
    assert_eq!(st.untracked, vec!["fresh.txt"]);

    stage(repo.path(), &["fresh.txt"]).expect("stage fresh");
    let st = status(repo.path()).expect("status");
    assert_eq!(st.staged, vec!["fresh.txt"]);
}

#[test]
fn diff_reports_working_tree_changes() {
    let repo = TestRepo::new();
    repo.commit_file("x.txt", "x0\n", "base");

    repo.write("x.txt", "x0\nx1\n");
    let patch = diff(repo.path(), None, None).expect("diff");
    assert!(patch.contains("x.txt"));
    assert!(patch.contains("+x1"));

    // restricted to another path, the change disappears
    let other = diff(repo.path(), None, Some("y.txt")).expect("diff y");
    assert!(other.is_empty());
}

#[test]
fn diff_between_revisions_is_scoped_to_the_file() {
    let repo = TestRepo::new();
    let first = repo.commit_file("a.txt", "a0\n", "add a");
    repo.commit_file("b.txt", "b0\n", "add b");
    let third = repo.commit_file("a.txt", "a0\na1\n", "edit a");

    let patch = diff_between(repo.path(), &first, &third, Some("a.txt")).expect("diff between");
    assert!(patch.contains("+a1"));
    assert!(!patch.contains("b.txt"));

    let head_patch = diff_between(repo.path(), &first, "HEAD", Some("a.txt")).expect("vs HEAD");
    assert!(head_patch.contains("+a1"));

    assert!(diff_between(repo.path(), "badbadbad", "HEAD", None)
        .unwrap_err()
        .is_not_found());
}

#[test]
fn restore_writes_the_old_content_back() {
    let repo = TestRepo::new();
    let first = repo.commit_file("a.txt", "original\n", "add a");
    repo.commit_file("a.txt", "rewritten\n", "edit a");

    restore_at_revision(repo.path(), "a.txt", &first).expect("restore");
    assert_eq!(fs::read_to_string(repo.join("a.txt")).unwrap(), "original\n");
}

#[test]
fn remove_file_stages_the_deletion() {
    let repo = TestRepo::new();
    repo.commit_file("gone.txt", "data\n", "add");

    remove_file(repo.path(), "gone.txt").expect("remove");
    assert!(!repo.join("gone.txt").exists());

    let rev = commit(repo.path(), "drop gone.txt", AUTHOR, EMAIL).expect("commit removal");
    assert!(show(repo.path(), "gone.txt", &rev).unwrap_err().is_not_found());
}

#[test]
fn batch_commit_one_revision_per_non_empty_group() {
    let repo = TestRepo::new();
    repo.write("a.txt", "a\n");
    repo.write("b.txt", "b\n");

    let groups = vec![
        vec!["a.txt".to_string()],
        vec![],
        vec!["b.txt".to_string()],
    ];
    let revisions =
        batch_commit(repo.path(), &groups, "Import", AUTHOR, EMAIL).expect("batch commit");
    assert_eq!(revisions.len(), 2);

    let entries = log(repo.path(), 10, None).expect("log");
    assert_eq!(entries[0].message, "Import (batch 3/3)");
    assert_eq!(entries[1].message, "Import (batch 1/3)");
}

#[test]
fn batch_commit_failure_keeps_earlier_commits() {
    let repo = TestRepo::new();
    repo.write("a.txt", "a\n");

    // Second group stages nothing new, so its commit fails while the
    // first group's revision stays durable.
    let groups = vec![vec!["a.txt".to_string()], vec!["a.txt".to_string()]];
    let err = batch_commit(repo.path(), &groups, "Import", AUTHOR, EMAIL).unwrap_err();
    assert_eq!(err.completed.len(), 1);
    assert!(err.error.to_string().contains("nothing to commit"));

    let entries = log(repo.path(), 10, None).expect("log");
    assert_eq!(entries[0].id, err.completed[0]);
}

#[test]
fn branches_and_tags_mirror_the_standard_meanings() {
    let repo = TestRepo::new();
    let base = repo.commit_file("a.txt", "a\n", "base");

    create_branch(repo.path(), "feature", None).expect("create branch");
    checkout_branch(repo.path(), "feature", false).expect("checkout");
    assert_eq!(status(repo.path()).unwrap().current_branch, "feature");

    assert!(create_branch(repo.path(), "broken", Some("missing")).is_err());

    create_tag(repo.path(), "v0.1.0", Some("first cut"), "HEAD", AUTHOR, EMAIL).expect("tag");
    create_tag(repo.path(), "light", None, &base, AUTHOR, EMAIL).expect("lightweight tag");

    let tags = list_tags(repo.path()).expect("list tags");
    let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
    assert!(names.contains(&"v0.1.0"));
    assert!(names.contains(&"light"));
    assert!(tags.iter().all(|t| !t.commit.is_empty()));

    checkout_branch(repo.path(), "master", false)
        .or_else(|_| checkout_branch(repo.path(), "main", false))
        .expect("back to primary");
    delete_branch(repo.path(), "feature").expect("delete branch");
    delete_branch(repo.path(), "feature").expect("idempotent delete");
}

#[test]
fn clone_copies_history() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "cloned\n", "base");

    let dest = tempfile::TempDir::new().expect("dest tempdir");
    let target = dest.path().join("copy");
    clone_repository(repo.path().to_str().unwrap(), &target).expect("clone");

    let entries = log(&target, 10, None).expect("clone log");
    assert!(entries.iter().any(|e| e.message == "base"));
    assert_eq!(
        fs::read_to_string(target.join("a.txt")).unwrap(),
        "cloned\n"
    );
}

#[test]
fn normalize_pathspec_variants() {
    assert_eq!(super::normalize_pathspec(" src//utils/// "), "src/utils");
    assert_eq!(super::normalize_pathspec("./a/b/"), "a/b");
    assert_eq!(super::normalize_pathspec(r"a\win\path\"), "a/win/path");
}
