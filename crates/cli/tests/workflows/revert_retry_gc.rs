//! revert, retry and gc

use crate::common::TestRepo;
use crate::pd;
use anyhow::Result;

#[test]
fn test_revert_restores_previous_tree() -> Result<()> {
    let repo = TestRepo::initialized()?;
    repo.write_file("config.txt", "v1\n")?;
    repo.write_file("obsolete.txt", "bye\n")?;

    let first = repo.write_patch(
        "first.patch.txt",
        "START UPSERT config.txt\nv2\n\nEND UPSERT\nSTART INSERT added.txt\nnew\nEND INSERT\n",
    )?;
    pd!(repo.path(), "apply", &first).assert_success()?;
    let second = repo.write_patch("second.patch.txt", "START DELETE obsolete.txt\nEND DELETE\n")?;
    pd!(repo.path(), "apply", &second).assert_success()?;

    assert!(!repo.exists("obsolete.txt"));

    let result = pd!(repo.path(), "revert", "2").assert_success()?;
    assert!(result.contains_stdout("2 patch(es)"));

    assert_eq!(repo.read_file("config.txt").as_deref(), Some("v1\n"));
    assert_eq!(repo.read_file("obsolete.txt").as_deref(), Some("bye\n"));
    assert!(!repo.exists("added.txt"));

    // Reverted entries are not reverted twice
    let again = pd!(repo.path(), "revert").assert_failure()?;
    assert!(again.contains_stderr("nothing to revert"));
    Ok(())
}

#[test]
fn test_revert_defaults_to_latest() -> Result<()> {
    let repo = TestRepo::initialized()?;
    for (name, value) in [("a.patch.txt", "one"), ("b.patch.txt", "two")] {
        let patch = repo.write_patch(name, &format!("START UPSERT value.txt\n{value}\nEND UPSERT\n"))?;
        pd!(repo.path(), "apply", &patch).assert_success()?;
    }

    pd!(repo.path(), "revert").assert_success()?;
    assert_eq!(repo.read_file("value.txt").as_deref(), Some("one"));

    let log = pd!(repo.path(), "log").assert_success()?;
    assert!(log.contains_stdout("(3 total)"));
    assert!(log.contains_stdout("reverted"));
    Ok(())
}

#[test]
fn test_revert_without_history() -> Result<()> {
    let repo = TestRepo::initialized()?;

    let result = pd!(repo.path(), "revert").assert_failure()?;
    assert!(result.contains_stderr("nothing to revert"));

    let zero = pd!(repo.path(), "revert", "0").assert_failure()?;
    assert!(zero.contains_stderr("at least 1"));
    Ok(())
}

#[test]
fn test_failed_patch_then_retry() -> Result<()> {
    let repo = TestRepo::initialized()?;
    let patch = repo.write_patch("fixme.patch.txt", "START INSERT out.txt\ndata\nEND UPSERT\n")?;

    let failed = pd!(repo.path(), "apply", &patch).assert_failure()?;
    assert!(failed.contains_stderr("line 3"));
    assert!(repo.exists(&patch));
    assert!(!repo.exists("out.txt"));

    let status = pd!(repo.path(), "status").assert_success()?;
    assert!(status.contains_stdout("patches/fixme.patch.txt"));

    repo.write_patch("fixme.patch.txt", "START INSERT out.txt\ndata\nEND INSERT\n")?;
    pd!(repo.path(), "retry").assert_success()?;

    assert_eq!(repo.read_file("out.txt").as_deref(), Some("data"));
    assert!(!repo.exists(&patch));

    let none = pd!(repo.path(), "retry").assert_failure()?;
    assert!(none.contains_stderr("no failed patch recorded"));
    Ok(())
}

#[test]
fn test_retry_when_patch_removed() -> Result<()> {
    let repo = TestRepo::initialized()?;
    let patch = repo.write_patch("gone.patch.txt", "START BOGUS a.txt\nEND BOGUS\n")?;
    pd!(repo.path(), "apply", &patch).assert_failure()?;

    std::fs::remove_file(repo.path().join(&patch))?;

    let result = pd!(repo.path(), "retry").assert_failure()?;
    assert!(result.contains_stderr("no longer exists"));

    // The stale record was cleared
    let again = pd!(repo.path(), "retry").assert_failure()?;
    assert!(again.contains_stderr("no failed patch recorded"));
    Ok(())
}

#[test]
fn test_gc_prunes_to_retention() -> Result<()> {
    let repo = TestRepo::initialized()?;
    repo.write_file(
        ".st-patches/config.toml",
        "[history]\nmax_entries = 2\n",
    )?;

    for i in 0..4 {
        let patch = repo.write_patch(
            &format!("p{i}.patch.txt"),
            &format!("START UPSERT n.txt\n{i}\nEND UPSERT\n"),
        )?;
        pd!(repo.path(), "apply", &patch).assert_success()?;
    }
    let reverts = std::fs::read_dir(repo.path().join(".st-patches/reverts"))?.count();
    assert_eq!(reverts, 4);

    let result = pd!(repo.path(), "gc").assert_success()?;
    assert!(result.contains_stdout("GC Complete"));

    let log = pd!(repo.path(), "log").assert_success()?;
    assert!(log.contains_stdout("(2 total)"));
    let reverts = std::fs::read_dir(repo.path().join(".st-patches/reverts"))?.count();
    assert_eq!(reverts, 2);

    // The newest two can still be reverted
    pd!(repo.path(), "revert", "2").assert_success()?;
    assert_eq!(repo.read_file("n.txt").as_deref(), Some("1"));
    Ok(())
}
