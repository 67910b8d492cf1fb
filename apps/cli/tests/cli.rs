use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

struct Workspace {
    _dir: TempDir,
    folder: PathBuf,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Result<Self, Box<dyn Error>> {
        let dir = tempdir()?;
        let folder = dir.path().join("project");
        let config = dir.path().join("config");
        fs::create_dir_all(folder.join("src"))?;
        fs::write(folder.join("src").join("main.rs"), "fn main() {}\n")?;
        fs::write(folder.join("README.md"), "# project\n")?;
        Ok(Self {
            _dir: dir,
            folder,
            config,
        })
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.folder.join(relative)
    }

    /// Command bound to the config dir only; the folder comes from the
    /// persisted grant.
    fn restored(&self) -> Result<Command, Box<dyn Error>> {
        let mut cmd = Command::cargo_bin("treepad")?;
        cmd.env_remove("TREEPAD_LOG")
            .arg("--config-dir")
            .arg(&self.config);
        Ok(cmd)
    }

    fn cmd(&self) -> Result<Command, Box<dyn Error>> {
        let mut cmd = self.restored()?;
        cmd.arg("--folder").arg(&self.folder);
        Ok(cmd)
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("read file")
}

#[test]
fn tree_lists_directories_first_and_expands_on_request() -> Result<(), Box<dyn Error>> {
    let ws = Workspace::new()?;

    ws.cmd()?
        .arg("tree")
        .assert()
        .success()
        .stdout("src/\nREADME.md\n");

    ws.cmd()?
        .args(["tree", "--expand", "src"])
        .assert()
        .success()
        .stdout("src/\n  main.rs\nREADME.md\n");
    Ok(())
}

#[test]
fn files_honours_gitignore_and_fuzzy_query() -> Result<(), Box<dyn Error>> {
    let ws = Workspace::new()?;
    fs::write(ws.path(".gitignore"), "target/\n*.log\n")?;
    fs::create_dir_all(ws.path("target/debug"))?;
    fs::write(ws.path("target/debug/app"), "")?;
    fs::write(ws.path("build.log"), "")?;

    ws.cmd()?
        .arg("files")
        .assert()
        .success()
        .stdout(".gitignore\nREADME.md\nsrc/main.rs\n");

    ws.cmd()?
        .args(["files", "--query", "smr"])
        .assert()
        .success()
        .stdout("src/main.rs\n");
    Ok(())
}

#[test]
fn write_then_cat_round_trips_and_records_the_session() -> Result<(), Box<dyn Error>> {
    let ws = Workspace::new()?;

    ws.cmd()?
        .args(["write", "src/main.rs", "--content", "fn main() { run(); }\r\n"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved src/main.rs"));
    assert_eq!(read(&ws.path("src/main.rs")), "fn main() { run(); }\r\n");

    ws.restored()?
        .args(["cat", "./src/main.rs"])
        .assert()
        .success()
        .stdout("fn main() { run(); }\r\n");

    ws.restored()?
        .arg("session")
        .assert()
        .success()
        .stdout(predicate::str::contains("Folder: project"))
        .stdout(predicate::str::contains("Document: src/main.rs"))
        .stdout(predicate::str::contains("  - src/main.rs"));
    Ok(())
}

#[test]
fn create_rename_and_delete_entries_on_disk() -> Result<(), Box<dyn Error>> {
    let ws = Workspace::new()?;

    ws.cmd()?
        .args(["new-folder", ".", "docs"])
        .assert()
        .success()
        .stdout("Created docs\n");
    ws.cmd()?
        .args(["new-file", "docs", "guide.md"])
        .assert()
        .success()
        .stdout("Created docs/guide.md\n");
    assert!(ws.path("docs/guide.md").is_file());

    ws.cmd()?
        .args(["rename", "docs", "manual"])
        .assert()
        .success()
        .stdout("Renamed docs -> manual\n");
    assert!(!ws.path("docs").exists());
    assert!(ws.path("manual/guide.md").is_file());

    ws.cmd()?
        .args(["rm", "manual"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Deleted manual"));
    assert!(!ws.path("manual").exists());
    assert!(ws.path("README.md").is_file());
    Ok(())
}

#[test]
fn rename_onto_an_existing_name_fails_without_changes() -> Result<(), Box<dyn Error>> {
    let ws = Workspace::new()?;
    fs::write(ws.path("NOTES.md"), "notes")?;

    ws.cmd()?
        .args(["rename", "README.md", "NOTES.md"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("Error: failed to rename README.md"));
    assert_eq!(read(&ws.path("README.md")), "# project\n");
    assert_eq!(read(&ws.path("NOTES.md")), "notes");
    Ok(())
}

#[test]
fn invalid_names_are_rejected() -> Result<(), Box<dyn Error>> {
    let ws = Workspace::new()?;

    ws.cmd()?
        .args(["new-file", ".", "../escape.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
    assert!(!ws.folder.parent().map_or(false, |p| p.join("escape.txt").exists()));
    Ok(())
}

#[test]
fn missing_file_reports_an_error() -> Result<(), Box<dyn Error>> {
    let ws = Workspace::new()?;

    ws.cmd()?
        .args(["cat", "nope.txt"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error: failed to open nope.txt"));
    Ok(())
}

#[test]
fn binary_files_are_refused() -> Result<(), Box<dyn Error>> {
    let ws = Workspace::new()?;
    fs::write(ws.path("blob.bin"), [0u8, 159, 146, 150, 0, 1])?;

    ws.cmd()?
        .args(["cat", "blob.bin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: failed to open blob.bin"));
    Ok(())
}

#[test]
fn commands_without_a_folder_fail() -> Result<(), Box<dyn Error>> {
    let ws = Workspace::new()?;

    ws.restored()?
        .arg("files")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no folder is open"));
    Ok(())
}

#[test]
fn deleted_folder_is_not_restored() -> Result<(), Box<dyn Error>> {
    let ws = Workspace::new()?;
    ws.cmd()?.arg("files").assert().success();
    assert!(ws.config.join("root_handle.json").is_file());

    fs::remove_dir_all(&ws.folder)?;
    ws.restored()?
        .arg("session")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no folder is open"));
    assert!(!ws.config.join("root_handle.json").exists());
    Ok(())
}

#[test]
fn prefs_set_clamps_and_persists() -> Result<(), Box<dyn Error>> {
    let ws = Workspace::new()?;

    ws.restored()?
        .args(["prefs", "show"])
        .assert()
        .success()
        .stdout("theme: dark\nfontSize: 14\ntabSize: 4\n");

    ws.restored()?
        .args(["prefs", "set", "--theme", "light", "--font-size", "99"])
        .assert()
        .success()
        .stdout("theme: light\nfontSize: 28\ntabSize: 4\n");

    ws.restored()?
        .args(["prefs", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fontSize: 28"));

    let settings = read(&ws.config.join("settings.json"));
    assert!(settings.contains("\"theme\": \"light\""));
    Ok(())
}

#[test]
fn prefs_set_rejects_unknown_theme() -> Result<(), Box<dyn Error>> {
    let ws = Workspace::new()?;

    ws.restored()?
        .args(["prefs", "set", "--theme", "Solarized"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown theme 'solarized'"));
    assert!(!ws.config.join("settings.json").exists());

    ws.restored()?
        .args(["prefs", "set", "--theme", "LIGHT"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("theme: light\n"));
    Ok(())
}

#[test]
fn paths_above_the_folder_are_refused() -> Result<(), Box<dyn Error>> {
    let ws = Workspace::new()?;
    let outside = ws.folder.parent().ok_or("folder has no parent")?.join("outside.txt");
    fs::write(&outside, "outside")?;

    ws.cmd()?
        .args(["cat", "../outside.txt"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("outside").not());
    ws.cmd()?
        .args(["rm", "../outside.txt"])
        .assert()
        .failure()
        .code(1);
    ws.cmd()?
        .args(["new-file", "..", "planted.txt"])
        .assert()
        .failure()
        .code(1);

    assert_eq!(read(&outside), "outside");
    assert!(!outside.with_file_name("planted.txt").exists());
    Ok(())
}
