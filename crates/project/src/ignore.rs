use regex::Regex;
use tracing::debug;

/// One parsed exclusion pattern.  
/// 單一排除規則。
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    pattern: String,
    negated: bool,
    directory_only: bool,
    path_scoped: bool,
    matcher: Regex,
}

impl IgnoreRule {
    /// Parses one line of an ignore file. Blank lines and `#` comments yield `None`.  
    /// 解析忽略檔中的一行；空白行與註解回傳 `None`。
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (negated, body) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let (directory_only, body) = match body.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, body),
        };
        let (anchored, body) = match body.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, body),
        };
        if body.is_empty() {
            return None;
        }
        let matcher = match Regex::new(&glob_to_regex(body)) {
            Ok(matcher) => matcher,
            Err(err) => {
                debug!(pattern = body, %err, "skipping unparsable ignore pattern");
                return None;
            }
        };
        Some(Self {
            pattern: body.to_string(),
            negated,
            directory_only,
            path_scoped: anchored || body.contains('/'),
            matcher,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn is_directory_only(&self) -> bool {
        self.directory_only
    }

    /// Tests `path` (relative, `/`-separated, no leading slash).
    pub fn matches(&self, path: &str, is_dir: bool) -> bool {
        if self.directory_only && !is_dir {
            return false;
        }
        let path = path.trim_start_matches('/');
        if self.path_scoped {
            self.matcher.is_match(path)
        } else {
            let base = path.rsplit('/').next().unwrap_or(path);
            self.matcher.is_match(base)
        }
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    for ch in glob.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
    }
    out.push('$');
    out
}

/// Ordered rule set where the last matching rule decides.  
/// 依序評估的規則集合，以最後一條符合的規則為準。
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses the contents of an ignore file.  
    /// 解析忽略檔內容。
    pub fn parse(text: &str) -> Self {
        Self {
            rules: text.lines().filter_map(IgnoreRule::parse_line).collect(),
        }
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// `Some(true)` if the last matching rule excludes, `Some(false)` if it
    /// re-includes, `None` if nothing matches.
    fn verdict(&self, path: &str, is_dir: bool) -> Option<bool> {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matches(path, is_dir))
            .map(|rule| !rule.negated)
    }

    /// Whether `path` survives the rules. An excluded ancestor directory
    /// excludes everything below it.  
    /// 判斷路徑是否保留；祖先目錄被排除時其下所有項目皆被排除。
    pub fn is_included(&self, path: &str, is_dir: bool) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        let path = path.trim_matches('/');
        let excluded_ancestor = path
            .match_indices('/')
            .any(|(idx, _)| self.verdict(&path[..idx], true) == Some(true));
        !excluded_ancestor && self.verdict(path, is_dir) != Some(true)
    }

    pub fn is_ignored(&self, path: &str, is_dir: bool) -> bool {
        !self.is_included(path, is_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_negation_overrides_exclusion() {
        let rules = IgnoreRules::parse("*.log\n!keep.log\n");
        assert!(rules.is_included("keep.log", false));
        assert!(rules.is_ignored("debug.log", false));
        assert!(rules.is_ignored("logs/nested/debug.log", false));
        assert!(rules.is_included("logs/keep.log", false));
    }

    #[test]
    fn last_match_wins_in_both_directions() {
        let rules = IgnoreRules::parse("!keep.log\n*.log\n");
        assert!(rules.is_ignored("keep.log", false));
    }

    #[test]
    fn directory_rule_excludes_descendants_but_not_files() {
        let rules = IgnoreRules::parse("build/\n");
        assert!(rules.is_ignored("build", true));
        assert!(rules.is_ignored("build/out.txt", false));
        assert!(rules.is_ignored("nested/build/deep/out.txt", false));
        assert!(rules.is_included("build", false));
    }

    #[test]
    fn comments_blanks_and_whitespace_are_skipped() {
        let rules = IgnoreRules::parse("# comment\n\n   \n  target  \n");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.rules()[0].pattern(), "target");
    }

    #[test]
    fn anchored_and_slashed_patterns_match_full_path() {
        let rules = IgnoreRules::parse("/dist\ndocs/*.tmp\n");
        assert!(rules.is_ignored("dist", true));
        assert!(rules.is_included("app/dist", true));
        assert!(rules.is_ignored("docs/draft.tmp", false));
        assert!(rules.is_ignored("/docs/draft.tmp", false));
        assert!(rules.is_included("other/docs/draft.tmp", false));
    }

    #[test]
    fn wildcards_translate_and_metacharacters_escape() {
        let rules = IgnoreRules::parse("file?.c\n[x]+.rs\n");
        assert!(rules.is_ignored("file1.c", false));
        assert!(rules.is_included("file10.c", false));
        assert!(rules.is_ignored("[x]+.rs", false));
        assert!(rules.is_included("x.rs", false));
    }

    #[test]
    fn no_rules_means_everything_included() {
        let rules = IgnoreRules::empty();
        assert!(rules.is_empty());
        assert!(rules.is_included("anything/at/all", false));
    }
}
