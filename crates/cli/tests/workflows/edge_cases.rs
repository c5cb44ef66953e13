//! Refusals and commands run in odd places

use crate::common::TestRepo;
use crate::pd;
use anyhow::Result;
use tempfile::TempDir;

#[test]
fn test_outside_repository_fails() -> Result<()> {
    let temp = TempDir::new()?;

    let result = pd!(temp.path(), "status").assert_failure()?;
    assert!(result.contains_stderr("Not inside a repository"));
    Ok(())
}

#[test]
fn test_path_escaping_root_refused() -> Result<()> {
    let repo = TestRepo::initialized()?;
    let patch = repo.write_patch(
        "escape.patch.txt",
        "START INSERT inside.txt\nok\nEND INSERT\nSTART INSERT ../outside.txt\nno\nEND INSERT\n",
    )?;

    let result = pd!(repo.path(), "apply", &patch).assert_failure()?;
    assert!(result.contains_stderr("escapes the repository root"));

    // Refused during planning, before anything was written
    assert!(!repo.exists("inside.txt"));
    assert!(repo.exists(&patch));
    Ok(())
}

#[test]
fn test_reserved_dir_target_refused() -> Result<()> {
    let repo = TestRepo::initialized()?;
    let patch = repo.write_patch(
        "sneaky.patch.txt",
        "START UPSERT .st-patches/state.json\n{}\nEND UPSERT\n",
    )?;

    let result = pd!(repo.path(), "check", &patch).assert_failure()?;
    assert!(result.contains_stderr("reserved directory"));
    Ok(())
}

#[test]
fn test_inline_revert_not_supported() -> Result<()> {
    let repo = TestRepo::initialized()?;
    let patch = repo.write_patch("undo.patch.txt", "START REVERT last\nEND REVERT\n")?;

    let result = pd!(repo.path(), "apply", &patch).assert_failure()?;
    assert!(result.contains_stderr("pd revert"));
    Ok(())
}

#[test]
fn test_stop_without_dispatcher() -> Result<()> {
    let repo = TestRepo::initialized()?;

    let result = pd!(repo.path(), "stop").assert_success()?;
    assert!(result.contains_stdout("No running dispatcher found"));
    Ok(())
}

#[test]
fn test_stale_lock_cleared_by_stop() -> Result<()> {
    let repo = TestRepo::initialized()?;
    repo.write_file(
        ".st-patches/watcher.pid",
        r#"{"pid":999999,"started_at":1,"watch_dir":"patches"}"#,
    )?;

    let status = pd!(repo.path(), "status").assert_success()?;
    assert!(status.contains_stdout("stale lock"));

    pd!(repo.path(), "stop").assert_success()?;
    assert!(!repo.exists(".st-patches/watcher.pid"));

    // Apply can take the lock again
    let patch = repo.write_patch("after.patch.txt", "START INSERT a.txt\nx\nEND INSERT\n")?;
    pd!(repo.path(), "apply", &patch).assert_success()?;
    Ok(())
}

#[test]
fn test_lock_taking_commands_say_so_in_help() -> Result<()> {
    let repo = TestRepo::initialized()?;

    let result = pd!(repo.path(), "--help").assert_success()?;
    for command in ["apply", "retry", "revert", "gc"] {
        let line = result
            .stdout
            .lines()
            .find(|l| l.trim_start().starts_with(command))
            .unwrap_or_default();
        assert!(line.contains("dispatcher to be stopped"), "{command}: {line}");
    }
    Ok(())
}
