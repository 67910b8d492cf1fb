mod logging;

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use treepad_access::{DirectoryAccess, EntryKind, JsonHandleStore, NativeBackend};
use treepad_core::{Edit, RestoreOutcome, Workbench};
use treepad_project::fuzzy_filter;
use treepad_settings::{JsonFileStore, Settings, Theme};

const DEFAULT_CONFIG_DIR: &str = ".treepad";
const SETTINGS_FILE: &str = "settings.json";
const ROOT_HANDLE_FILE: &str = "root_handle.json";

#[derive(Parser)]
#[command(
    name = "treepad",
    about = "Browse and edit the files of a local folder",
    author,
    version
)]
struct Cli {
    /// 要開啟的資料夾；略過時還原上次的資料夾。 / Folder to open; the last folder is restored when omitted.
    #[arg(long, global = true, value_name = "PATH")]
    folder: Option<PathBuf>,

    /// 設定檔所在目錄。 / Directory holding settings and the persisted folder grant.
    #[arg(long, global = true, value_name = "PATH")]
    config_dir: Option<PathBuf>,

    /// 提高日誌詳細程度。 / Increase log verbosity (`TREEPAD_LOG` overrides).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 顯示資料夾樹。 / Print the folder tree.
    Tree(TreeArgs),
    /// 列出所有未被忽略的檔案。 / List every file not excluded by `.gitignore`.
    Files(FilesArgs),
    /// 輸出檔案內容。 / Print a file's contents.
    Cat(PathArg),
    /// 以新內容覆寫檔案並儲存。 / Replace a file's contents and save it.
    Write(WriteArgs),
    /// 建立空白檔案。 / Create an empty file.
    NewFile(CreateArgs),
    /// 建立資料夾。 / Create a folder.
    NewFolder(CreateArgs),
    /// 重新命名檔案或資料夾。 / Rename a file or folder in place.
    Rename(RenameArgs),
    /// 刪除檔案或資料夾。 / Delete a file or folder recursively.
    Rm(PathArg),
    /// 顯示還原的工作階段。 / Show the restored session.
    Session,
    /// 檢視或修改偏好設定。 / Show or change preferences.
    #[command(subcommand)]
    Prefs(PrefsCommand),
}

#[derive(Args)]
struct TreeArgs {
    /// 先展開的資料夾路徑。 / Folder paths to expand before printing.
    #[arg(long, value_name = "PATH")]
    expand: Vec<String>,
}

#[derive(Args)]
struct FilesArgs {
    /// 模糊比對的查詢字串。 / Fuzzy query to filter paths.
    #[arg(long, short)]
    query: Option<String>,
}

#[derive(Args)]
struct PathArg {
    /// 相對於資料夾根目錄的路徑。 / Path relative to the folder root.
    path: String,
}

#[derive(Args)]
struct WriteArgs {
    path: String,
    /// 新的檔案內容。 / New file contents.
    #[arg(long)]
    content: String,
}

#[derive(Args)]
struct CreateArgs {
    /// 上層資料夾；根目錄用 "." 表示。 / Parent folder; use "." for the root.
    parent: String,
    name: String,
}

#[derive(Args)]
struct RenameArgs {
    path: String,
    new_name: String,
}

#[derive(Subcommand)]
enum PrefsCommand {
    /// 顯示偏好設定。 / Print the current preferences.
    Show,
    /// 更新偏好設定；超出範圍的值會被修正。 / Update preferences; out-of-range values are clamped.
    Set(PrefsSetArgs),
}

#[derive(Args)]
struct PrefsSetArgs {
    /// 佈景主題：dark 或 light。 / Theme: dark or light.
    #[arg(long)]
    theme: Option<Theme>,
    #[arg(long)]
    font_size: Option<u32>,
    #[arg(long)]
    tab_size: Option<u32>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        folder,
        config_dir,
        verbose,
        command,
    } = Cli::parse();
    logging::init_logging(verbose);
    let config_dir = resolve_config_dir(config_dir)?;

    if let Commands::Prefs(subcommand) = command {
        let mut settings = open_settings(&config_dir)?;
        return execute_prefs(subcommand, &mut settings);
    }

    let (mut workbench, restored) = open_workbench(folder.as_deref(), &config_dir)?;
    match command {
        Commands::Tree(args) => print_tree(&mut workbench, &args),
        Commands::Files(args) => print_files(&mut workbench, args.query.as_deref()),
        Commands::Cat(args) => cat_file(&mut workbench, &normalize_path(&args.path)),
        Commands::Write(args) => write_file(&mut workbench, &normalize_path(&args.path), args.content),
        Commands::NewFile(args) => create_entry(&mut workbench, &args, EntryKind::File),
        Commands::NewFolder(args) => create_entry(&mut workbench, &args, EntryKind::Directory),
        Commands::Rename(args) => {
            let path = normalize_path(&args.path);
            let new_path = workbench
                .rename_entry(&path, &args.new_name)
                .with_context(|| format!("failed to rename {path}"))?;
            println!("Renamed {path} -> {new_path}");
            Ok(())
        }
        Commands::Rm(args) => {
            let path = normalize_path(&args.path);
            let closed = workbench
                .delete_entry(&path)
                .with_context(|| format!("failed to delete {path}"))?;
            println!("Deleted {path}");
            for id in closed {
                println!("  closed {}", id.path());
            }
            Ok(())
        }
        Commands::Session => print_session(&workbench, &restored),
        Commands::Prefs(_) => Ok(()),
    }
}

fn resolve_config_dir(config_dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = config_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR));
    if dir.is_absolute() {
        return Ok(dir);
    }
    let cwd = env::current_dir().context("failed to determine current directory")?;
    Ok(cwd.join(dir))
}

fn open_settings(config_dir: &Path) -> Result<Settings> {
    let path = config_dir.join(SETTINGS_FILE);
    let store = JsonFileStore::open(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    Ok(Settings::new(Box::new(store)))
}

/// Restores the last session, then switches folders when `--folder` names a
/// different one.
fn open_workbench(folder: Option<&Path>, config_dir: &Path) -> Result<(Workbench, RestoreOutcome)> {
    let access = DirectoryAccess::new(
        Arc::new(NativeBackend::new()),
        Box::new(JsonHandleStore::new(config_dir.join(ROOT_HANDLE_FILE))),
    );
    let mut workbench = Workbench::new(access, open_settings(config_dir)?);
    let mut restored = workbench.restore();

    if let Some(folder) = folder {
        let handle = NativeBackend::directory_handle(folder)
            .with_context(|| format!("failed to open folder {}", folder.display()))?;
        let already_open = workbench
            .root()
            .is_some_and(|root| workbench.access().same_entry(root, &handle));
        if already_open {
            debug!(folder = handle.name(), "folder already restored");
        } else {
            workbench
                .open_folder_handle(handle)
                .with_context(|| format!("failed to open folder {}", folder.display()))?;
            restored = RestoreOutcome {
                folder: workbench.root().map(|root| root.name().to_string()),
                document: None,
            };
        }
    }

    if workbench.root().is_none() {
        bail!("no folder is open; pass --folder PATH");
    }
    Ok((workbench, restored))
}

/// Accepts `.`, `./a` and `/a` style paths relative to the root.
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    if trimmed == "." {
        String::new()
    } else {
        trimmed.to_string()
    }
}

fn print_tree(workbench: &mut Workbench, args: &TreeArgs) -> Result<()> {
    for path in &args.expand {
        let path = normalize_path(path);
        workbench
            .expand(&path)
            .with_context(|| format!("failed to expand {path}"))?;
    }
    for row in workbench.tree().visible_rows() {
        let indent = "  ".repeat(row.depth);
        let suffix = if row.kind.is_directory() { "/" } else { "" };
        println!("{indent}{}{suffix}", row.name);
    }
    Ok(())
}

fn print_files(workbench: &mut Workbench, query: Option<&str>) -> Result<()> {
    let files = workbench.list_all_files().context("failed to list files")?;
    match query {
        Some(query) => {
            let matches = fuzzy_filter(&files, query);
            if matches.is_empty() {
                println!("No matching files.");
            }
            for file in matches {
                println!("{}", file.path);
            }
        }
        None => {
            for file in &files {
                println!("{}", file.path);
            }
        }
    }
    Ok(())
}

fn cat_file(workbench: &mut Workbench, path: &str) -> Result<()> {
    workbench
        .open_file(path)
        .with_context(|| format!("failed to open {path}"))?;
    if let Some(state) = workbench.tabs().active_state() {
        print!("{}", state.text);
    }
    Ok(())
}

fn write_file(workbench: &mut Workbench, path: &str, content: String) -> Result<()> {
    workbench
        .open_file(path)
        .with_context(|| format!("failed to open {path}"))?;
    workbench.edit_active(Edit::Replace { text: content })?;
    workbench
        .save_active()
        .with_context(|| format!("failed to save {path}"))?;
    println!("Saved {path}");
    Ok(())
}

fn create_entry(workbench: &mut Workbench, args: &CreateArgs, kind: EntryKind) -> Result<()> {
    let parent = normalize_path(&args.parent);
    let created = match kind {
        EntryKind::File => workbench.new_file(&parent, &args.name),
        EntryKind::Directory => workbench.new_folder(&parent, &args.name),
    }
    .with_context(|| format!("failed to create {kind} '{}'", args.name))?;
    println!("Created {created}");
    Ok(())
}

fn print_session(workbench: &Workbench, restored: &RestoreOutcome) -> Result<()> {
    let folder = restored.folder.as_deref().unwrap_or("(none)");
    println!("Folder: {folder}");
    match &restored.document {
        Some(id) => println!("Document: {}", id.path()),
        None => println!("Document: (none)"),
    }
    let recent = workbench.settings().recent_files();
    if recent.is_empty() {
        println!("Recent files: (none)");
    } else {
        println!("Recent files:");
        for path in recent.iter() {
            println!("  - {path}");
        }
    }
    Ok(())
}

fn execute_prefs(command: PrefsCommand, settings: &mut Settings) -> Result<()> {
    let prefs = match command {
        PrefsCommand::Show => settings.preferences(),
        PrefsCommand::Set(args) => settings
            .update_preferences(|prefs| {
                if let Some(theme) = args.theme {
                    prefs.theme = theme;
                }
                if let Some(size) = args.font_size {
                    prefs.font_size = size;
                }
                if let Some(size) = args.tab_size {
                    prefs.tab_size = size;
                }
            })
            .context("failed to save preferences")?,
    };
    println!("theme: {}", prefs.theme);
    println!("fontSize: {}", prefs.font_size);
    println!("tabSize: {}", prefs.tab_size);
    Ok(())
}
