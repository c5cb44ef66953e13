//! init, apply, check and log

use crate::common::TestRepo;
use crate::pd;
use anyhow::Result;

#[test]
fn test_init_creates_layout() -> Result<()> {
    let repo = TestRepo::new()?;

    let result = pd!(repo.path(), "init").assert_success()?;
    assert!(result.contains_stdout("Initialized patchd"));
    assert!(repo.exists(".st-patches/config.toml"));
    assert!(repo.exists(".st-patches/reverts"));
    assert!(repo.exists(".st-patches/logs"));
    assert!(repo.exists("patches"));

    let again = pd!(repo.path(), "init").assert_success()?;
    assert!(again.contains_stdout("already initialized"));
    Ok(())
}

#[test]
fn test_apply_writes_tree_and_consumes_patch() -> Result<()> {
    let repo = TestRepo::initialized()?;
    let patch = repo.write_patch(
        "greeting.patch.txt",
        "commit: add greeting\n\
         START INSERT docs/hello.txt\nhello\n\nEND INSERT\n\
         /* COMMAND UPSERT PATH src/lib.rs */\npub fn answer() -> u32 { 42 }\n/* COMMAND UPSERT END */\n",
    )?;

    let result = pd!(repo.path(), "apply", &patch).assert_success()?;
    assert!(result.contains_stdout("greeting"));
    assert!(result.contains_stdout("docs/hello.txt"));

    assert_eq!(repo.read_file("docs/hello.txt").as_deref(), Some("hello\n"));
    assert_eq!(
        repo.read_file("src/lib.rs").as_deref(),
        Some("pub fn answer() -> u32 { 42 }")
    );
    assert!(!repo.exists(&patch));

    let log = pd!(repo.path(), "log").assert_success()?;
    assert!(log.contains_stdout("(1 total)"));
    assert!(log.contains_stdout("add greeting"));
    assert_eq!(log.entry_ids().len(), 1);
    Ok(())
}

#[test]
fn test_delete_of_missing_file_is_noop() -> Result<()> {
    let repo = TestRepo::initialized()?;
    let patch = repo.write_patch("cleanup.patch.txt", "START DELETE never/there.txt\nEND DELETE\n")?;

    pd!(repo.path(), "apply", &patch).assert_success()?;
    assert!(!repo.exists(&patch));
    Ok(())
}

#[test]
fn test_check_leaves_tree_untouched() -> Result<()> {
    let repo = TestRepo::initialized()?;
    repo.write_file("existing.txt", "old")?;
    let patch = repo.write_patch(
        "plan.patch.txt",
        "START UPSERT existing.txt\nnew\nEND UPSERT\nSTART INSERT fresh.txt\nx\nEND INSERT\n",
    )?;

    let result = pd!(repo.path(), "check", &patch).assert_success()?;
    assert!(result.contains_stdout("Patch is valid"));
    assert!(result.contains_stdout("existing.txt"));
    assert!(result.contains_stdout("fresh.txt"));

    assert_eq!(repo.read_file("existing.txt").as_deref(), Some("old"));
    assert!(!repo.exists("fresh.txt"));
    assert!(repo.exists(&patch));
    Ok(())
}

#[test]
fn test_check_reports_parse_error_line() -> Result<()> {
    let repo = TestRepo::initialized()?;
    let patch = repo.write_patch("broken.patch.txt", "START INSERT a.txt\nx\nEND UPSERT\n")?;

    let result = pd!(repo.path(), "check", &patch).assert_failure()?;
    assert!(result.contains_stderr("line 3"));
    assert!(repo.exists(&patch));
    Ok(())
}

#[test]
fn test_log_without_history() -> Result<()> {
    let repo = TestRepo::initialized()?;

    let result = pd!(repo.path(), "log").assert_success()?;
    assert!(result.contains_stdout("No patches applied yet"));
    Ok(())
}

#[test]
fn test_log_limit() -> Result<()> {
    let repo = TestRepo::initialized()?;
    for i in 0..3 {
        let patch = repo.write_patch(
            &format!("p{i}.patch.txt"),
            &format!("START UPSERT counter.txt\n{i}\nEND UPSERT\n"),
        )?;
        pd!(repo.path(), "apply", &patch).assert_success()?;
    }

    let result = pd!(repo.path(), "log", "--limit", "2").assert_success()?;
    assert!(result.contains_stdout("(3 total)"));
    assert_eq!(result.entry_ids().len(), 2);
    assert_eq!(repo.read_file("counter.txt").as_deref(), Some("2"));
    Ok(())
}

#[test]
fn test_status_without_dispatcher() -> Result<()> {
    let repo = TestRepo::initialized()?;

    let result = pd!(repo.path(), "status").assert_success()?;
    assert!(result.contains_stdout("Not running"));
    assert!(result.contains_stdout("No patches applied yet"));
    Ok(())
}
