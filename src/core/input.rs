//! Input enumeration
//!
//! Produces the ordered sequence of raw inputs for a run, either from a
//! top-down directory walk or from a delimited text stream. Directory order
//! never depends on the filesystem: subdirectories and entries are sorted
//! ascending at every level before anything is handed on.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How raw inputs are produced and resolved into substitution strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Entry names, executed inside the directory that holds them
    File,
    /// Paths relative to the base directory, executed in the base directory
    Path,
    /// Absolute paths, executed in the base directory
    Abspath,
    /// Delimited tokens from standard input or an item file
    Stdin,
}

impl InputMode {
    /// Whether this mode walks the base directory
    pub fn is_walk(&self) -> bool {
        !matches!(self, Self::Stdin)
    }
}

impl std::fmt::Display for InputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::Path => "path",
            Self::Abspath => "abspath",
            Self::Stdin => "stdin",
        };
        f.write_str(name)
    }
}

/// One enumerated item before command construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputItem {
    /// Directory the item was found in (the base directory for stream tokens)
    pub dir: PathBuf,
    /// Entry name for directory walks
    pub name: Option<String>,
    /// Already-resolved text for stream tokens
    pub text: Option<String>,
}

impl InputItem {
    pub fn entry(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: Some(name.into()),
            text: None,
        }
    }

    pub fn token(dir: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: None,
            text: Some(text.into()),
        }
    }

    /// Full path of a walked entry; `.` names the directory itself
    pub fn path(&self) -> Option<PathBuf> {
        match self.name.as_deref() {
            Some(".") => Some(self.dir.clone()),
            Some(name) => Some(self.dir.join(name)),
            None => None,
        }
    }
}

/// Options for directory walks
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Enumerate directories instead of files, the base directory first
    pub folders: bool,
    /// Do not descend below the base directory
    pub top_level_only: bool,
    /// Descend into symbolic links that point at directories
    pub follow_symlinks: bool,
}

/// Separator used to split stream input into tokens
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Delimiter {
    /// Any run of whitespace; empty tokens are discarded
    #[default]
    Whitespace,
    Null,
    Newline,
    Literal(String),
}

impl Delimiter {
    /// Create a literal delimiter, rejecting the empty string
    pub fn literal<S: Into<String>>(delimiter: S) -> Result<Self> {
        let delimiter = delimiter.into();
        if delimiter.is_empty() {
            return Err(Error::invalid_input("delimiter must not be empty"));
        }
        Ok(Self::Literal(delimiter))
    }

    fn separator(&self) -> Option<&str> {
        match self {
            Self::Whitespace => None,
            Self::Null => Some("\0"),
            Self::Newline => Some("\n"),
            Self::Literal(s) => Some(s.as_str()),
        }
    }

    /// Split text into tokens.
    ///
    /// Explicit separators trim trailing whitespace first and then drop a
    /// single trailing empty token; interior empty tokens are kept.
    pub fn split(&self, text: &str) -> Vec<String> {
        let Some(separator) = self.separator() else {
            return text.split_whitespace().map(String::from).collect();
        };

        let trimmed = text.trim_end();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let mut tokens: Vec<String> = trimmed.split(separator).map(String::from).collect();
        if tokens.last().is_some_and(|t| t.is_empty()) {
            tokens.pop();
        }
        tokens
    }
}

/// Where stream tokens are read from
#[derive(Debug, Clone, Default)]
pub enum StreamSource {
    #[default]
    Stdin,
    File(PathBuf),
    /// Content already drained from standard input
    Text(String),
}

/// Options for stream mode
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    pub source: StreamSource,
    pub delimiter: Delimiter,
    /// Input after the first occurrence of this marker is ignored
    pub eof_str: Option<String>,
}

/// Read and split the whole stream eagerly
pub fn read_stream(options: &StreamOptions) -> Result<Vec<String>> {
    let text = match &options.source {
        StreamSource::Stdin => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            String::from_utf8_lossy(&buf).into_owned()
        }
        StreamSource::File(path) => {
            if !path.is_file() {
                return Err(Error::enumeration(format!(
                    "input file not found: {}",
                    path.display()
                )));
            }
            String::from_utf8_lossy(&fs::read(path)?).into_owned()
        }
        StreamSource::Text(text) => text.clone(),
    };

    let text = match &options.eof_str {
        Some(eof) => text
            .split_once(eof.as_str())
            .map(|(head, _)| head)
            .unwrap_or(text.as_str()),
        None => text.as_str(),
    };

    Ok(options.delimiter.split(text))
}

/// Lazy top-down directory walk
#[derive(Debug)]
pub struct DirWalker {
    base: PathBuf,
    options: WalkOptions,
    pending_dirs: Vec<PathBuf>,
    ready: VecDeque<InputItem>,
    visited: HashSet<PathBuf>,
}

impl DirWalker {
    pub fn new(base: impl Into<PathBuf>, options: WalkOptions) -> Self {
        let base = base.into();
        Self {
            pending_dirs: vec![base.clone()],
            base,
            options,
            ready: VecDeque::new(),
            visited: HashSet::new(),
        }
    }

    fn visit(&mut self, dir: PathBuf) {
        if self.options.follow_symlinks {
            if let Ok(canonical) = fs::canonicalize(&dir) {
                if !self.visited.insert(canonical) {
                    debug!("Skipping already visited directory {}", dir.display());
                    return;
                }
            }
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot read directory {}: {}", dir.display(), e);
                return;
            }
        };

        let mut files = Vec::new();
        let mut subdirs = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_symlink = entry.file_type().map(|t| t.is_symlink()).unwrap_or(false);
            let is_dir = fs::metadata(entry.path())
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if is_dir {
                subdirs.push((name, is_symlink));
            } else {
                files.push(name);
            }
        }
        files.sort();
        subdirs.sort();

        if self.options.folders {
            let item = self.folder_item(&dir);
            self.ready.push_back(item);
            if self.options.top_level_only {
                for (name, _) in subdirs {
                    self.ready.push_back(InputItem::entry(&dir, name));
                }
                return;
            }
        } else {
            for name in files {
                self.ready.push_back(InputItem::entry(&dir, name));
            }
        }

        if self.options.top_level_only {
            return;
        }
        // Reversed so the smallest name is popped first.
        for (name, is_symlink) in subdirs.into_iter().rev() {
            if is_symlink && !self.options.follow_symlinks {
                continue;
            }
            self.pending_dirs.push(dir.join(name));
        }
    }

    fn folder_item(&self, dir: &Path) -> InputItem {
        match (dir.parent(), dir.file_name()) {
            (Some(parent), Some(name)) if dir != self.base => {
                InputItem::entry(parent, name.to_string_lossy().into_owned())
            }
            _ => InputItem::entry(dir, "."),
        }
    }
}

impl Iterator for DirWalker {
    type Item = InputItem;

    fn next(&mut self) -> Option<InputItem> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }
            let dir = self.pending_dirs.pop()?;
            self.visit(dir);
        }
    }
}

/// Combined options for [`enumerate`]
#[derive(Debug, Clone, Default)]
pub struct EnumerateOptions {
    pub walk: WalkOptions,
    pub stream: StreamOptions,
}

/// Finite, single-pass sequence of input items
#[derive(Debug)]
pub enum Enumeration {
    Walk(DirWalker),
    Stream {
        dir: PathBuf,
        tokens: std::vec::IntoIter<String>,
    },
}

impl Iterator for Enumeration {
    type Item = InputItem;

    fn next(&mut self) -> Option<InputItem> {
        match self {
            Self::Walk(walker) => walker.next(),
            Self::Stream { dir, tokens } => tokens.next().map(|t| InputItem::token(dir.clone(), t)),
        }
    }
}

/// Start enumerating inputs for the given mode.
///
/// Stream mode reads its whole source here, so a missing item file fails
/// before any command is built.
pub fn enumerate(mode: InputMode, base: &Path, options: &EnumerateOptions) -> Result<Enumeration> {
    if mode.is_walk() {
        return Ok(Enumeration::Walk(DirWalker::new(base, options.walk.clone())));
    }

    let tokens = read_stream(&options.stream)?;
    debug!("Read {} stream tokens", tokens.len());
    Ok(Enumeration::Stream {
        dir: base.to_path_buf(),
        tokens: tokens.into_iter(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("b_dir/inner")).unwrap();
        fs::create_dir_all(root.join("a_dir")).unwrap();
        for file in ["z.txt", "a.py", "m.md", "b_dir/y.txt", "b_dir/inner/x.txt", "a_dir/c.rs"] {
            fs::write(root.join(file), "").unwrap();
        }
        temp
    }

    fn names(items: impl Iterator<Item = InputItem>, base: &Path) -> Vec<String> {
        items
            .map(|item| {
                let path = item.path().unwrap();
                path.strip_prefix(base).unwrap().to_string_lossy().into_owned()
            })
            .collect()
    }

    #[test]
    fn test_walk_is_sorted_top_down() {
        let temp = tree();
        let walker = DirWalker::new(temp.path(), WalkOptions::default());
        assert_eq!(
            names(walker, temp.path()),
            vec![
                "a.py",
                "m.md",
                "z.txt",
                "a_dir/c.rs",
                "b_dir/y.txt",
                "b_dir/inner/x.txt",
            ]
        );
    }

    #[test]
    fn test_walk_top_level_only() {
        let temp = tree();
        let options = WalkOptions {
            top_level_only: true,
            ..Default::default()
        };
        let walker = DirWalker::new(temp.path(), options);
        assert_eq!(names(walker, temp.path()), vec!["a.py", "m.md", "z.txt"]);
    }

    #[test]
    fn test_walk_folders() {
        let temp = tree();
        let options = WalkOptions {
            folders: true,
            ..Default::default()
        };
        let walker = DirWalker::new(temp.path(), options);
        assert_eq!(
            names(walker, temp.path()),
            vec!["", "a_dir", "b_dir", "b_dir/inner"]
        );
    }

    #[test]
    fn test_walk_folders_preorder_with_base_first() {
        let temp = tree();
        fs::create_dir_all(temp.path().join("a_dir/deep")).unwrap();
        let options = WalkOptions {
            folders: true,
            ..Default::default()
        };
        let items: Vec<InputItem> = DirWalker::new(temp.path(), options).collect();

        assert_eq!(items[0], InputItem::entry(temp.path(), "."));
        assert_eq!(items[0].path().unwrap(), temp.path());
        assert_eq!(
            names(items.into_iter().skip(1), temp.path()),
            vec!["a_dir", "a_dir/deep", "b_dir", "b_dir/inner"]
        );
    }

    #[test]
    fn test_walk_top_level_folders() {
        let temp = tree();
        let options = WalkOptions {
            folders: true,
            top_level_only: true,
            ..Default::default()
        };
        let walker = DirWalker::new(temp.path(), options);
        assert_eq!(names(walker, temp.path()), vec!["", "a_dir", "b_dir"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_symlinks_are_opt_in() {
        let temp = tree();
        std::os::unix::fs::symlink(temp.path().join("a_dir"), temp.path().join("link")).unwrap();

        let plain = DirWalker::new(temp.path(), WalkOptions::default());
        assert!(!names(plain, temp.path()).contains(&"link/c.rs".to_string()));

        let options = WalkOptions {
            follow_symlinks: true,
            ..Default::default()
        };
        let following = DirWalker::new(temp.path(), options);
        let found = names(following, temp.path());
        // a_dir and link resolve to the same directory, visited once
        assert_eq!(found.iter().filter(|n| n.ends_with("c.rs")).count(), 1);
    }

    #[test]
    fn test_whitespace_split_drops_empties() {
        let tokens = Delimiter::Whitespace.split("  hello \n world\t\n\n");
        assert_eq!(tokens, vec!["hello", "world"]);
    }

    #[test]
    fn test_explicit_delimiter_keeps_interior_empties() {
        let delimiter = Delimiter::literal(",").unwrap();
        assert_eq!(
            delimiter.split("hello,,world,\n"),
            vec!["hello", "", "world"]
        );
        assert_eq!(
            delimiter.split("hello,world,bye,world ,\n"),
            vec!["hello", "world", "bye", "world "]
        );
    }

    #[test]
    fn test_null_and_newline_delimiters() {
        assert_eq!(Delimiter::Null.split("a b\0c\0"), vec!["a b", "c"]);
        assert_eq!(Delimiter::Newline.split("one two\nthree\n"), vec!["one two", "three"]);
        assert!(Delimiter::Newline.split("\n\n").is_empty());
    }

    #[test]
    fn test_empty_literal_delimiter_rejected() {
        assert!(matches!(Delimiter::literal(""), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_eof_str_truncates() {
        let options = StreamOptions {
            source: StreamSource::Text("a b STOP c d".to_string()),
            eof_str: Some("STOP".to_string()),
            ..Default::default()
        };
        assert_eq!(read_stream(&options).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_item_file_is_fatal() {
        let temp = TempDir::new().unwrap();
        let options = EnumerateOptions {
            stream: StreamOptions {
                source: StreamSource::File(temp.path().join("missing.txt")),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = enumerate(InputMode::Stdin, temp.path(), &options);
        assert!(matches!(result, Err(Error::Enumeration(_))));
    }

    #[test]
    fn test_item_file_tokens_carry_base_dir() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("items.txt");
        fs::write(&file, "Hello\nWorld\n192.168.0.1\n").unwrap();
        let options = EnumerateOptions {
            stream: StreamOptions {
                source: StreamSource::File(file),
                delimiter: Delimiter::Newline,
                eof_str: None,
            },
            ..Default::default()
        };
        let items: Vec<InputItem> = enumerate(InputMode::Stdin, temp.path(), &options)
            .unwrap()
            .collect();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2], InputItem::token(temp.path(), "192.168.0.1"));
    }
}
