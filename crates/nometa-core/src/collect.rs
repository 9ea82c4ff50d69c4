//! Input discovery: turns user-supplied file and folder paths into an ordered,
//! deduplicated list of image files.

use crate::{StripError, extension_of, is_image_extension};
use indexmap::IndexSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A path whose extension is one of [`crate::IMAGE_EXTENSIONS`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImagePath {
    path: PathBuf,
    extension: String,
}

impl ImagePath {
    /// Returns `None` when the extension is missing or not recognized.
    pub fn new(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let extension = extension_of(&path)?;
        is_image_extension(&extension).then_some(Self { path, extension })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercase extension without the leading dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}

impl fmt::Display for ImagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Insertion-ordered set of images queued for a batch.
#[derive(Debug, Clone, Default)]
pub struct FileList {
    entries: IndexSet<ImagePath>,
}

impl FileList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &ImagePath) -> bool {
        self.entries.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImagePath> {
        self.entries.iter()
    }

    /// Appends `path` unless it is already queued. Returns whether it was added.
    pub fn push(&mut self, path: ImagePath) -> bool {
        self.entries.insert(path)
    }

    /// Removes the most recently added entry.
    pub fn remove_last(&mut self) -> Option<ImagePath> {
        self.entries.pop()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops the first `count` entries, keeping the order of the rest.
    pub(crate) fn remove_front(&mut self, count: usize) {
        let count = count.min(self.entries.len());
        self.entries.drain(..count);
    }
}

impl<'a> IntoIterator for &'a FileList {
    type Item = &'a ImagePath;
    type IntoIter = indexmap::set::Iter<'a, ImagePath>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// What a call to [`PathCollector::add_paths`] did to the list.
#[derive(Debug, Default)]
pub struct AddOutcome {
    pub added: usize,
    /// Inputs or directory entries that could not be read and were skipped.
    pub skipped: Vec<StripError>,
}

impl AddOutcome {
    pub fn status_message(&self) -> String {
        if self.added > 0 {
            format!("Added {} items", self.added)
        } else {
            "No valid images found".to_string()
        }
    }
}

/// Expands files and folders into [`FileList`] entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathCollector;

impl PathCollector {
    pub fn new() -> Self {
        Self
    }

    /// Adds every image reachable from `inputs` to `list`.
    ///
    /// Directories are walked recursively in the order the filesystem yields
    /// entries. Unreadable inputs are recorded in [`AddOutcome::skipped`] and
    /// never abort collection.
    pub fn add_paths<I, S>(&self, list: &mut FileList, inputs: I) -> AddOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut outcome = AddOutcome::default();
        for raw in inputs {
            let Some(path) = normalize_input(raw.as_ref()) else {
                continue;
            };
            match std::fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => self.add_directory(list, &path, &mut outcome),
                Ok(_) => offer(list, path, &mut outcome),
                Err(err) => skip(&mut outcome, path, err.to_string()),
            }
        }
        debug!(added = outcome.added, skipped = outcome.skipped.len(), "collected inputs");
        outcome
    }

    fn add_directory(&self, list: &mut FileList, dir: &Path, outcome: &mut AddOutcome) {
        for entry in WalkDir::new(dir) {
            match entry {
                Ok(entry) if is_regular_file(&entry) => {
                    offer(list, entry.into_path(), outcome);
                }
                Ok(_) => {}
                Err(err) => {
                    let path = err.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
                    skip(outcome, path, err.to_string());
                }
            }
        }
    }
}

/// Regular files, plus symlinks that resolve to one. Linked directories are
/// not descended into.
fn is_regular_file(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
}

fn offer(list: &mut FileList, path: PathBuf, outcome: &mut AddOutcome) {
    if let Some(image) = ImagePath::new(path) {
        if list.push(image) {
            outcome.added += 1;
        }
    }
}

fn skip(outcome: &mut AddOutcome, path: PathBuf, message: String) {
    warn!(path = %path.display(), %message, "skipping unreadable input");
    outcome.skipped.push(StripError::Discovery { path, message });
}

/// Cleans one raw input string: surrounding quotes and braces, `~`, and
/// `.`/`..` components.
pub(crate) fn normalize_input(raw: &str) -> Option<PathBuf> {
    let trimmed = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim_matches(|c| c == '{' || c == '}');
    if trimmed.is_empty() {
        return None;
    }
    Some(normalize_lexically(&expand_home(trimmed)))
}

fn expand_home(raw: &str) -> PathBuf {
    let rest = if raw == "~" {
        Some("")
    } else {
        raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\"))
    };
    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(raw),
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir if depth > 0 => {
                out.pop();
                depth -= 1;
            }
            // `..` above the root stays at the root
            Component::ParentDir if out.has_root() => {}
            Component::ParentDir => out.push(".."),
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
            Component::RootDir | Component::Prefix(_) => out.push(component.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Splits a drag-and-drop payload into individual paths.
///
/// Entries are separated by whitespace; an entry containing spaces may be
/// wrapped in `{}` or quotes. Unbalanced quoting falls back to plain
/// whitespace splitting with braces removed.
pub fn split_drop_payload(payload: &str) -> Vec<String> {
    tokenize(payload).unwrap_or_else(|| {
        payload
            .split_whitespace()
            .map(|part| part.trim_matches(|c| c == '{' || c == '}').to_string())
            .filter(|part| !part.is_empty())
            .collect()
    })
}

fn tokenize(payload: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = payload.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '{' if !in_token => {
                read_group(&mut chars, '}', &mut current)?;
                in_token = true;
            }
            '"' | '\'' => {
                read_group(&mut chars, c, &mut current)?;
                in_token = true;
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    Some(tokens)
}

/// Copies characters up to `close` into `out`. `None` if `close` never appears.
fn read_group(chars: &mut std::str::Chars<'_>, close: char, out: &mut String) -> Option<()> {
    for next in chars.by_ref() {
        if next == close {
            return Some(());
        }
        out.push(next);
    }
    None
}
