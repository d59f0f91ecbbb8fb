use std::collections::BTreeMap;

use crate::{EntryKind, RemoteEntry};

pub const SEPARATOR: char = '/';

const EDITABLE_EXTENSIONS: &[&str] = &[
    "py", "txt", "md", "json", "html", "htm", "css", "js", "csv", "cfg", "ini", "conf",
];

/// Cached view of the board's file system, keyed by absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileTree {
    entries: BTreeMap<String, EntryKind>,
    loaded: bool,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cache with a fresh listing. Ancestors of listed paths are
    /// recorded as directories even when the listing omits them.
    pub fn set(&mut self, listing: Vec<RemoteEntry>) {
        self.entries.clear();
        for entry in listing {
            let path = normalize(&entry.path);
            for dir in parent_dirs(&path) {
                self.entries.entry(dir).or_insert(EntryKind::Dir);
            }
            self.entries.insert(path, entry.kind);
        }
        self.loaded = true;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.loaded = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn exists(&self, path: &str) -> bool {
        let path = normalize(path);
        path == "/" || self.entries.contains_key(&path)
    }

    /// Size of a file; `None` for directories and unknown paths.
    pub fn size(&self, path: &str) -> Option<u64> {
        match self.entries.get(&normalize(path)) {
            Some(EntryKind::File { size }) => Some(*size),
            _ => None,
        }
    }

    /// Every file path in the cache, in traversal order.
    pub fn all_files(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, kind)| matches!(kind, EntryKind::File { .. }))
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn file_count(&self) -> usize {
        self.entries
            .values()
            .filter(|kind| matches!(kind, EntryKind::File { .. }))
            .count()
    }

    pub fn add_file(&mut self, path: &str, size: u64) {
        let path = normalize(path);
        for dir in parent_dirs(&path) {
            self.entries.entry(dir).or_insert(EntryKind::Dir);
        }
        self.entries.insert(path, EntryKind::File { size });
    }

    pub fn add_dir(&mut self, path: &str) {
        self.entries.insert(normalize(path), EntryKind::Dir);
    }

    /// Removes `path` and, for directories, everything below it.
    pub fn remove(&mut self, path: &str) {
        let path = normalize(path);
        let prefix = format!("{path}{SEPARATOR}");
        self.entries
            .retain(|key, _| key != &path && !key.starts_with(&prefix));
    }

    /// Moves `from` (and its subtree) to `to`.
    pub fn rename(&mut self, from: &str, to: &str) {
        let from = normalize(from);
        let to = normalize(to);
        let prefix = format!("{from}{SEPARATOR}");
        let moved: Vec<(String, EntryKind)> = self
            .entries
            .iter()
            .filter(|(key, _)| **key == from || key.starts_with(&prefix))
            .map(|(key, kind)| (format!("{to}{}", &key[from.len()..]), *kind))
            .collect();
        self.remove(&from);
        self.entries.extend(moved);
    }
}

/// Absolute form of a remote path: one leading separator, no trailing one.
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches(SEPARATOR);
    format!("{SEPARATOR}{trimmed}")
}

/// Ancestor directories of `path`, outermost first: `/a/b/c.py` gives `/a`, `/a/b`.
pub fn parent_dirs(path: &str) -> Vec<String> {
    let parts: Vec<&str> = path
        .split(SEPARATOR)
        .filter(|part| !part.is_empty())
        .collect();
    let mut dirs = Vec::new();
    let mut current = String::new();
    for part in parts.iter().take(parts.len().saturating_sub(1)) {
        current.push(SEPARATOR);
        current.push_str(part);
        dirs.push(current.clone());
    }
    dirs
}

/// Whether a file should be opened in an editor buffer after import.
pub fn is_editable(path: &str) -> bool {
    let file_name = path.rsplit(SEPARATOR).next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((_, ext)) => EDITABLE_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Last path component, used for status lines.
pub fn base_name(path: &str) -> &str {
    path.rsplit(SEPARATOR).next().unwrap_or(path)
}
