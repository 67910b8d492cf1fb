use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::tempdir;
use treepad_access::{DirectoryAccess, EntryKind, JsonHandleStore, MemoryBackend, NativeBackend};
use treepad_core::{Edit, ErrorClass, RestoreOutcome, TabId, Workbench};
use treepad_settings::{JsonFileStore, Settings};

fn workbench(backend: &Arc<MemoryBackend>, config: &Path) -> Workbench {
    let access = DirectoryAccess::new(
        backend.clone(),
        Box::new(JsonHandleStore::new(config.join("root_handle.json"))),
    );
    let store = JsonFileStore::open(config.join("settings.json")).expect("settings store");
    Workbench::new(access, Settings::new(Box::new(store)))
}

fn backend_with(files: &[(&str, &str)]) -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::new("project"));
    for (path, contents) in files {
        backend.add_file(path, contents);
    }
    backend
}

fn active_text(wb: &Workbench) -> String {
    wb.tabs()
        .active_state()
        .map(|state| state.text.clone())
        .unwrap_or_default()
}

#[test]
fn opening_the_same_path_twice_reuses_the_tab() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[("a.txt", "alpha"), ("b.txt", "beta")]);
    let mut wb = workbench(&backend, temp.path());
    wb.open_folder().expect("open folder");

    let a = wb.open_file("a.txt").expect("open a");
    wb.edit_active(Edit::Insert { at: 0, text: ">".into() })
        .expect("edit");
    wb.open_file("b.txt").expect("open b");
    let again = wb.open_file("a.txt").expect("reopen a");

    assert_eq!(a, again);
    assert_eq!(wb.tabs().len(), 2);
    assert_eq!(wb.tabs().active_id(), Some(&a));
    assert!(wb.tabs().tab(&a).expect("tab a").is_dirty());
    assert_eq!(active_text(&wb), ">alpha");
}

#[test]
fn failed_save_keeps_the_document_dirty() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[("notes.md", "# notes")]);
    let mut wb = workbench(&backend, temp.path());
    wb.open_folder().expect("open folder");
    let id = wb.open_file("notes.md").expect("open");
    assert!(!wb.tabs().tab(&id).expect("tab").is_dirty());

    wb.edit_active(Edit::Replace {
        text: "# notes\n- item".into(),
    })
    .expect("edit");
    backend.fail_writes(true);
    let err = wb.save_active().expect_err("save must fail");
    assert_eq!(err.class(), ErrorClass::WriteFailure);
    assert!(wb.tabs().tab(&id).expect("tab").is_dirty());
    assert_eq!(
        backend.file_contents("notes.md").expect("file"),
        b"# notes".to_vec()
    );

    backend.fail_writes(false);
    wb.save_active().expect("save");
    assert!(!wb.tabs().tab(&id).expect("tab").is_dirty());
    assert_eq!(
        backend.file_contents("notes.md").expect("file"),
        b"# notes\n- item".to_vec()
    );
}

#[test]
fn revoked_permission_is_reported_on_save() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[("a.txt", "a")]);
    let mut wb = workbench(&backend, temp.path());
    wb.open_folder().expect("open folder");
    let id = wb.open_file("a.txt").expect("open");
    wb.edit_active(Edit::Replace { text: "b".into() })
        .expect("edit");

    backend.revoke_permission(false);
    let err = wb.save_active().expect_err("save must fail");
    assert_eq!(err.class(), ErrorClass::PermissionDenied);
    assert!(wb.tabs().tab(&id).expect("tab").is_dirty());
}

#[test]
fn closing_the_active_tab_selects_its_left_neighbour() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[("A", "a"), ("B", "b"), ("C", "c")]);
    let mut wb = workbench(&backend, temp.path());
    wb.open_folder().expect("open folder");
    let a = wb.open_file("A").expect("open A");
    let b = wb.open_file("B").expect("open B");
    let c = wb.open_file("C").expect("open C");

    wb.activate_tab(&b).expect("activate B");
    let outcome = wb.close_tab(&b).expect("close B");
    assert_eq!(outcome.active, Some(a.clone()));

    let b = wb.open_file("B").expect("reopen B");
    wb.activate_tab(&c).expect("activate C");
    let order: Vec<_> = wb.tabs().tabs().iter().map(|tab| tab.id().clone()).collect();
    assert_eq!(order, vec![a.clone(), c.clone(), b.clone()]);
    let outcome = wb.close_tab(&c).expect("close C");
    assert_eq!(outcome.active, Some(a.clone()));
}

#[test]
fn closing_the_first_active_tab_selects_the_new_first_tab() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[("A", "a"), ("B", "b"), ("C", "c")]);
    let mut wb = workbench(&backend, temp.path());
    wb.open_folder().expect("open folder");
    let a = wb.open_file("A").expect("open A");
    let b = wb.open_file("B").expect("open B");
    let c = wb.open_file("C").expect("open C");

    wb.activate_tab(&c).expect("activate C");
    assert_eq!(wb.close_tab(&c).expect("close C").active, Some(b.clone()));
    wb.activate_tab(&a).expect("activate A");
    assert_eq!(wb.close_tab(&a).expect("close A").active, Some(b.clone()));

    let outcome = wb.close_tab(&b).expect("close B");
    assert_eq!(outcome.active, None);
    assert!(wb.tabs().active_state().is_none());
    assert!(wb.settings().session().is_none());
}

#[test]
fn partial_rename_is_surfaced_and_both_entries_are_listed() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[("draft.txt", "content")]);
    let mut wb = workbench(&backend, temp.path());
    wb.open_folder().expect("open folder");

    backend.fail_next_removes(1);
    let err = wb
        .rename_entry("draft.txt", "final.txt")
        .expect_err("rename must fail");
    assert_eq!(err.class(), ErrorClass::NonAtomicRename);

    wb.refresh_tree().expect("refresh");
    assert!(wb.tree().entry("draft.txt").is_some());
    assert!(wb.tree().entry("final.txt").is_some());
    assert_eq!(
        backend.file_contents("final.txt").expect("copy"),
        b"content".to_vec()
    );
}

#[test]
fn atomic_rename_keeps_open_tabs_bound() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[("src/main.rs", "fn main() {}")]);
    backend.set_atomic_rename(true);
    let mut wb = workbench(&backend, temp.path());
    wb.open_folder().expect("open folder");
    wb.open_file("src/main.rs").expect("open");
    wb.edit_active(Edit::Insert { at: 0, text: "// app\n".into() })
        .expect("edit");

    let new_path = wb.rename_entry("src", "app").expect("rename");
    assert_eq!(new_path, "app");
    assert!(wb.tree().entry("app").is_some());
    assert!(wb.tree().entry("src").is_none());

    let id = TabId::for_path("app/main.rs");
    assert_eq!(wb.tabs().active_id(), Some(&id));
    wb.save_active().expect("save renamed");
    assert_eq!(
        backend.file_contents("app/main.rs").expect("file"),
        b"// app\nfn main() {}".to_vec()
    );
    assert_eq!(
        wb.settings().session().and_then(|record| record.current_file_path),
        Some("app/main.rs".to_string())
    );
}

#[test]
fn create_and_delete_keep_tree_tabs_and_session_consistent() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[]);
    let mut wb = workbench(&backend, temp.path());
    wb.open_folder().expect("open folder");

    assert_eq!(wb.new_folder("", "docs").expect("mkdir"), "docs");
    wb.expand("docs").expect("expand");
    assert_eq!(wb.new_file("docs", "guide.md").expect("touch"), "docs/guide.md");
    let guide = wb.tree().entry("docs/guide.md").expect("listed after create");
    assert_eq!(guide.kind, EntryKind::File);

    wb.open_file("docs/guide.md").expect("open");
    let closed = wb.delete_entry("docs").expect("delete");
    assert_eq!(closed, vec![TabId::for_path("docs/guide.md")]);
    assert!(wb.tabs().is_empty());
    assert!(wb.tree().entry("docs").is_none());
    assert!(!backend.exists("docs"));
    assert!(wb.settings().session().is_none());
    assert!(wb.settings().recent_files().is_empty());
}

#[test]
fn rename_of_an_entry_replaced_on_disk_leaves_no_stray_copy() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[("a.txt", "old")]);
    let mut wb = workbench(&backend, temp.path());
    wb.open_folder().expect("open folder");

    backend.remove_path("a.txt");
    backend.add_file("a.txt", "new");
    let err = wb
        .rename_entry("a.txt", "b.txt")
        .expect_err("rename through a stale handle must fail");
    assert_eq!(err.class(), ErrorClass::EntryNotFound);
    assert!(!backend.exists("b.txt"));
    assert!(wb.tree().entry("b.txt").is_none());

    wb.rename_entry("a.txt", "b.txt").expect("rename after refresh");
    assert_eq!(backend.file_contents("b.txt").expect("renamed"), b"new".to_vec());
}

#[test]
fn relative_paths_never_leave_the_granted_folder() {
    let temp = tempdir().expect("tempdir");
    let outside = temp.path().join("outside");
    let folder = outside.join("project");
    fs::create_dir_all(&folder).expect("folder");
    fs::write(outside.join("secret.txt"), "outside").expect("secret");
    fs::write(outside.join("victim.txt"), "keep").expect("victim");
    fs::write(folder.join("inside.txt"), "inside").expect("inside");

    let access = DirectoryAccess::new(
        Arc::new(NativeBackend::new()),
        Box::new(JsonHandleStore::new(temp.path().join("config/root_handle.json"))),
    );
    let store = JsonFileStore::open(temp.path().join("config/settings.json")).expect("settings");
    let mut wb = Workbench::new(access, Settings::new(Box::new(store)));
    let root = NativeBackend::directory_handle(&folder).expect("root handle");
    wb.open_folder_handle(root).expect("open folder");

    assert!(wb.open_file("../secret.txt").is_err());
    assert!(wb.open_file("./../secret.txt").is_err());
    assert!(wb.tabs().is_empty());

    assert!(wb.new_file("..", "planted.txt").is_err());
    assert!(wb.new_folder("../..", "planted").is_err());
    assert!(!outside.join("planted.txt").exists());

    assert!(wb.delete_entry("../victim.txt").is_err());
    assert!(wb.delete_entry("..").is_err());
    assert!(wb.rename_entry("../victim.txt", "moved.txt").is_err());
    assert_eq!(fs::read_to_string(outside.join("victim.txt")).expect("victim"), "keep");
    assert_eq!(fs::read_to_string(outside.join("secret.txt")).expect("secret"), "outside");

    let inside = wb.open_file("inside.txt").expect("open inside");
    assert_eq!(inside, TabId::for_path("inside.txt"));
}

#[test]
fn invalid_names_are_rejected() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[("a.txt", "")]);
    let mut wb = workbench(&backend, temp.path());
    wb.open_folder().expect("open folder");
    assert!(wb.new_file("", "../escape").is_err());
    assert!(wb.rename_entry("a.txt", "").is_err());
    assert!(backend.exists("a.txt"));
}

#[test]
fn missing_entries_trigger_a_tree_refresh() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[("old.txt", "x"), ("kept.txt", "y")]);
    let mut wb = workbench(&backend, temp.path());
    wb.open_folder().expect("open folder");
    assert!(wb.tree().entry("old.txt").is_some());

    backend.remove_path("old.txt");
    let err = wb.open_file("old.txt").expect_err("open must fail");
    assert_eq!(err.class(), ErrorClass::EntryNotFound);
    assert!(wb.tree().entry("old.txt").is_none());
    assert!(wb.tree().entry("kept.txt").is_some());
}

#[test]
fn list_all_files_applies_ignore_rules() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[
        (".gitignore", "target/\n*.log\n!keep.log\n"),
        ("target/debug/app", ""),
        ("src/lib.rs", ""),
        ("debug.log", ""),
        ("keep.log", ""),
    ]);
    let mut wb = workbench(&backend, temp.path());
    wb.open_folder().expect("open folder");

    let paths: Vec<_> = wb
        .list_all_files()
        .expect("list")
        .into_iter()
        .map(|file| file.path)
        .collect();
    assert_eq!(paths, vec![".gitignore", "keep.log", "src/lib.rs"]);
}

#[test]
fn cancelled_folder_prompt_is_a_quiet_no_op() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[]);
    backend.cancel_picks(true);
    let mut wb = workbench(&backend, temp.path());
    let err = wb.open_folder().expect_err("cancelled");
    assert_eq!(err.class(), ErrorClass::UserCancelled);
    assert!(wb.root().is_none());
    assert!(wb.settings().folder_hint().is_none());
}

#[test]
fn restore_reopens_the_last_document() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[("src/main.rs", "fn main() {}")]);
    {
        let mut wb = workbench(&backend, temp.path());
        wb.open_folder().expect("open folder");
        wb.open_file("src/main.rs").expect("open");
        assert_eq!(
            wb.settings().folder_hint().map(|hint| hint.name),
            Some("project".to_string())
        );
    }

    let mut wb = workbench(&backend, temp.path());
    let outcome = wb.restore();
    assert_eq!(outcome.folder.as_deref(), Some("project"));
    assert_eq!(outcome.document, Some(TabId::for_path("src/main.rs")));
    assert_eq!(active_text(&wb), "fn main() {}");
    assert_eq!(
        wb.settings().recent_files().to_vec(),
        vec!["src/main.rs".to_string()]
    );
}

#[test]
fn restore_with_a_vanished_document_starts_without_one() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[("src/gone.rs", ""), ("README.md", "")]);
    {
        let mut wb = workbench(&backend, temp.path());
        wb.open_folder().expect("open folder");
        wb.open_file("src/gone.rs").expect("open");
    }
    backend.remove_path("src/gone.rs");

    let mut wb = workbench(&backend, temp.path());
    let outcome = wb.restore();
    assert_eq!(outcome.folder.as_deref(), Some("project"));
    assert_eq!(outcome.document, None);
    assert!(wb.tabs().is_empty());
    assert!(wb.tree().entry("README.md").is_some());
    let record = wb.settings().session().expect("session record");
    assert_eq!(record.current_file_path, None);
}

#[test]
fn restore_without_permission_leaves_no_folder_open() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[("a.txt", "")]);
    {
        let mut wb = workbench(&backend, temp.path());
        wb.open_folder().expect("open folder");
        wb.open_file("a.txt").expect("open");
    }
    backend.revoke_permission(false);

    let mut wb = workbench(&backend, temp.path());
    let outcome = wb.restore();
    assert_eq!(outcome, RestoreOutcome::default());
    assert!(wb.root().is_none());
    assert!(wb.tabs().is_empty());
}

#[test]
fn close_folder_forgets_everything() {
    let temp = tempdir().expect("tempdir");
    let backend = backend_with(&[("a.txt", "")]);
    let mut wb = workbench(&backend, temp.path());
    wb.open_folder().expect("open folder");
    wb.open_file("a.txt").expect("open");
    wb.close_folder();
    assert!(wb.root().is_none());
    assert!(wb.tree().root().is_none());
    assert!(wb.settings().session().is_none());
    assert!(wb.settings().folder_hint().is_none());

    let mut next = workbench(&backend, temp.path());
    assert_eq!(next.restore(), RestoreOutcome::default());
}
