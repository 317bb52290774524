//! Ignore pattern matching for working tree walks
//!
//! Patterns come from two sources:
//! 1. The control directory (always ignored, cannot be overridden)
//! 2. `.snap/ignore` plus `[ignore] additional_patterns` from the config,
//!    one glob per line, `#` starting a comment

use crate::error::{Result, SnapError};
use crate::store::{Store, CONTROL_DIR};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Component, Path};

pub struct IgnoreRules {
    patterns: Gitignore,
    count: usize,
}

impl IgnoreRules {
    /// Rules for a store: its ignore file and configured extras
    pub fn load(store: &Store) -> Result<Self> {
        let path = store.ignore_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(SnapError::io(&path, e)),
        };

        let mut patterns: Vec<String> = parse_lines(&content).map(str::to_string).collect();
        patterns.extend(store.config().ignore.additional_patterns.iter().cloned());
        Self::from_patterns(store.root(), patterns)
    }

    /// Build from explicit patterns, relative to `root`
    pub fn from_patterns<I, S>(root: &Path, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GitignoreBuilder::new(root);
        let mut count = 0;
        for pattern in patterns {
            builder
                .add_line(None, pattern.as_ref())
                .map_err(|e| SnapError::invalid("ignore pattern", e.to_string()))?;
            count += 1;
        }

        let patterns = builder
            .build()
            .map_err(|e| SnapError::invalid("ignore pattern", e.to_string()))?;
        Ok(Self { patterns, count })
    }

    /// Nothing but the control directory
    pub fn empty() -> Self {
        Self {
            patterns: Gitignore::empty(),
            count: 0,
        }
    }

    /// Whether a root-relative path is excluded from tracking
    pub fn matches(&self, path: &Path, is_dir: bool) -> bool {
        if is_control_path(path) {
            return true;
        }
        self.patterns.matched(path, is_dir).is_ignore()
    }

    /// Number of user patterns (the control directory rule not included)
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Strip comments and blank lines from an ignore file
pub fn parse_lines(content: &str) -> impl Iterator<Item = &str> {
    content.lines().filter_map(|line| {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };
        let line = line.trim();
        (!line.is_empty()).then_some(line)
    })
}

fn is_control_path(path: &Path) -> bool {
    matches!(
        path.components().find(|c| !matches!(c, Component::CurDir)),
        Some(Component::Normal(first)) if first == CONTROL_DIR
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines() {
        let content = "*.log\n\n   # full comment\nbuild/  # trailing\n  tmp  \n#\n";
        let lines: Vec<_> = parse_lines(content).collect();
        assert_eq!(lines, vec!["*.log", "build/", "tmp"]);
    }

    #[test]
    fn test_control_dir_always_ignored() {
        let rules = IgnoreRules::empty();

        assert!(rules.matches(Path::new(".snap"), true));
        assert!(rules.matches(Path::new(".snap/storage/ab/cd"), false));
        assert!(rules.matches(Path::new("./.snap/ignore"), false));
        assert!(!rules.matches(Path::new("src/.snap"), true));
        assert!(!rules.matches(Path::new("src/main.rs"), false));
        assert!(rules.is_empty());
    }

    #[test]
    fn test_glob_patterns() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let rules = IgnoreRules::from_patterns(temp_dir.path(), ["*.log", "target/", "/secret.txt"])?;

        assert!(rules.matches(Path::new("debug.log"), false));
        assert!(rules.matches(Path::new("nested/trace.log"), false));
        assert!(rules.matches(Path::new("target"), true));
        assert!(!rules.matches(Path::new("target"), false));
        assert!(rules.matches(Path::new("secret.txt"), false));
        assert!(!rules.matches(Path::new("sub/secret.txt"), false));
        assert!(!rules.matches(Path::new("README.md"), false));
        assert_eq!(rules.len(), 3);
        Ok(())
    }

    #[test]
    fn test_load_from_store() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::init(temp_dir.path())?;
        std::fs::write(store.ignore_path(), "*.tmp # scratch files\n\n").unwrap();

        let rules = IgnoreRules::load(&store)?;
        assert!(rules.matches(Path::new("x.tmp"), false));
        assert!(!rules.matches(Path::new("x.txt"), false));
        Ok(())
    }
}
