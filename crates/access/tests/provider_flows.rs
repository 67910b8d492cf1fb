use std::fs;
use std::sync::Arc;

use tempfile::tempdir;
use treepad_access::{
    AccessError, DirectoryAccess, DirectoryBackend, EntryKind, JsonHandleStore, MemoryBackend, MemoryHandleStore,
    NativeBackend, RootHandleStore,
};

#[test]
fn open_persists_and_restores_root_across_sessions() {
    let temp = tempdir().expect("tempdir");
    let workspace = temp.path().join("workspace");
    fs::create_dir(&workspace).expect("workspace dir");
    fs::write(workspace.join("notes.txt"), "hello").expect("seed file");
    let store_path = temp.path().join("config").join("root_handle.json");

    let picked = workspace.clone();
    let backend = Arc::new(NativeBackend::with_picker(move || Some(picked.clone())));
    let mut first = DirectoryAccess::new(backend.clone(), Box::new(JsonHandleStore::new(&store_path)));
    let root = first.open_directory().expect("open").expect("picked");
    assert_eq!(root.name(), "workspace");
    assert!(store_path.exists());

    let mut second = DirectoryAccess::new(
        Arc::new(NativeBackend::new()),
        Box::new(JsonHandleStore::new(&store_path)),
    );
    let restored = second.load_last_opened_folder().expect("restored");
    assert_eq!(restored.name(), "workspace");
    let level = second.read_directory_level(&restored, "").expect("level");
    assert_eq!(level.len(), 1);
    assert_eq!(level[0].path, "notes.txt");
}

#[test]
fn restore_of_deleted_folder_yields_nothing_and_clears_store() {
    let temp = tempdir().expect("tempdir");
    let workspace = temp.path().join("gone");
    fs::create_dir(&workspace).expect("workspace dir");
    let store_path = temp.path().join("root_handle.json");

    let picked = workspace.clone();
    let mut access = DirectoryAccess::new(
        Arc::new(NativeBackend::with_picker(move || Some(picked.clone()))),
        Box::new(JsonHandleStore::new(&store_path)),
    );
    access.open_directory().expect("open").expect("picked");
    fs::remove_dir(&workspace).expect("remove workspace");

    let mut next = DirectoryAccess::new(
        Arc::new(NativeBackend::new()),
        Box::new(JsonHandleStore::new(&store_path)),
    );
    assert!(next.load_last_opened_folder().is_none());
    assert!(next.root().is_none());
    assert!(JsonHandleStore::new(&store_path).load().expect("load").is_none());
}

#[test]
fn restore_with_corrupt_store_yields_nothing() {
    let temp = tempdir().expect("tempdir");
    let store_path = temp.path().join("root_handle.json");
    fs::write(&store_path, "{ not json").expect("corrupt store");

    let mut access = DirectoryAccess::new(
        Arc::new(NativeBackend::new()),
        Box::new(JsonHandleStore::new(&store_path)),
    );
    assert!(access.load_last_opened_folder().is_none());
}

#[test]
fn restore_fails_quietly_when_permission_is_refused() {
    let backend = Arc::new(MemoryBackend::new("project"));
    let store = MemoryHandleStore::new();
    store
        .save(&backend.export(&backend.root()).expect("export root"))
        .expect("seed persisted handle");
    backend.revoke_permission(false);

    let mut access = DirectoryAccess::new(backend.clone(), Box::new(store));
    assert!(access.load_last_opened_folder().is_none());
    assert!(access.root().is_none());

    backend.revoke_permission(true);
    assert!(access.load_last_opened_folder().is_some());
}

#[test]
fn native_rename_is_atomic_and_create_is_idempotent() {
    let temp = tempdir().expect("tempdir");
    let root = NativeBackend::directory_handle(temp.path()).expect("root handle");
    let mut access = DirectoryAccess::new(
        Arc::new(NativeBackend::new()),
        Box::new(MemoryHandleStore::new()),
    );
    access.grant_root(root.clone()).expect("grant");

    let dir = access.create_directory(&root, "src").expect("mkdir");
    let again = access.create_directory(&root, "src").expect("mkdir again");
    assert_eq!(dir, again);
    let file = access.create_file(&dir, "main.rs").expect("touch");
    access.write_file(&file, b"fn main() {}").expect("write");

    let renamed = access.rename_entry(&dir, "app", &root).expect("rename");
    assert_eq!(renamed.name(), "app");
    assert!(!temp.path().join("src").exists());
    assert_eq!(
        fs::read_to_string(temp.path().join("app").join("main.rs")).expect("moved file"),
        "fn main() {}"
    );

    let err = access.create_file(&root, "app").unwrap_err();
    assert!(matches!(err, AccessError::KindConflict { existing: EntryKind::Directory, .. }));
}

#[test]
fn resolve_path_walks_nested_directories() {
    let backend = Arc::new(MemoryBackend::new("project"));
    backend.add_file("a/b/c.txt", "deep");
    let mut access = DirectoryAccess::new(backend.clone(), Box::new(MemoryHandleStore::new()));
    let root = access.open_directory().expect("open").expect("picked");

    let file = access
        .resolve_path(&root, "a/b/c.txt", EntryKind::File)
        .expect("resolve");
    assert_eq!(access.read_file(&file).expect("read"), b"deep");
    assert!(access
        .resolve_path(&root, "a/missing.txt", EntryKind::File)
        .unwrap_err()
        .is_not_found());
    assert_eq!(
        access.resolve_path(&root, "", EntryKind::Directory).expect("root"),
        root
    );
}
