use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Language id used when the extension is unknown.
pub const PLAIN_TEXT: &str = "plaintext";

static EXTENSION_LANGUAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let table: &[(&[&str], &str)] = &[
        (&["rs"], "rust"),
        (&["js", "mjs", "cjs", "jsx"], "javascript"),
        (&["ts", "tsx"], "typescript"),
        (&["py", "pyw"], "python"),
        (&["go"], "go"),
        (&["java"], "java"),
        (&["kt", "kts"], "kotlin"),
        (&["c", "h"], "c"),
        (&["cc", "cpp", "cxx", "hpp", "hh", "hxx"], "cpp"),
        (&["cs"], "csharp"),
        (&["rb"], "ruby"),
        (&["php"], "php"),
        (&["swift"], "swift"),
        (&["sh", "bash", "zsh"], "shell"),
        (&["html", "htm"], "html"),
        (&["css"], "css"),
        (&["scss", "sass"], "scss"),
        (&["json"], "json"),
        (&["toml"], "toml"),
        (&["yaml", "yml"], "yaml"),
        (&["xml", "svg"], "xml"),
        (&["md", "markdown"], "markdown"),
        (&["sql"], "sql"),
        (&["lua"], "lua"),
    ];
    table
        .iter()
        .flat_map(|(extensions, language)| extensions.iter().map(move |ext| (*ext, *language)))
        .collect()
});

/// Language id for a file name, looked up by extension (case-insensitive).  
/// 依副檔名判斷語言；未知副檔名回傳 `plaintext`。
pub fn detect_language(file_name: &str) -> &'static str {
    let Some((stem, extension)) = file_name.rsplit_once('.') else {
        return PLAIN_TEXT;
    };
    if stem.is_empty() {
        return PLAIN_TEXT;
    }
    EXTENSION_LANGUAGES
        .get(extension.to_ascii_lowercase().as_str())
        .copied()
        .unwrap_or(PLAIN_TEXT)
}
