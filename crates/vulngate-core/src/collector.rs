use crate::error::{FileError, ScanError};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Source suffixes admitted to the scan. Case-sensitive.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".py", ".js", ".java", ".php", ".cpp", ".cs"];

/// Directory names never descended into: version control metadata,
/// artifact storage and tooling scripts.
pub const EXCLUDED_DIRS: &[&str] = &[".git", "models", "scripts"];

/// One admitted file, before its contents are read.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFile {
    pub path: PathBuf,
    /// Root-relative path with `/` separators; the file's identifier in reports.
    pub relative_path: String,
    /// Text after the last `.` of the file name, e.g. `py`.
    pub extension: String,
}

/// Walks a repository and yields admitted source files in directory order.
#[derive(Debug, Clone)]
pub struct FileCollector {
    root: PathBuf,
    /// Root-relative directories pruned by exact path.
    excluded_paths: Vec<String>,
    exclude_patterns: Vec<glob::Pattern>,
}

impl FileCollector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excluded_paths: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }

    /// Also skip the one directory at `path`, if it lives strictly inside
    /// the root. Paths outside the root, the root itself and paths that do
    /// not exist add nothing.
    pub fn exclude_path(mut self, path: &Path) -> Self {
        let (Ok(root), Ok(target)) = (self.root.canonicalize(), path.canonicalize()) else {
            return self;
        };
        if let Ok(rel) = target.strip_prefix(&root) {
            let rel = slash_joined(rel);
            if !rel.is_empty() && !self.excluded_paths.contains(&rel) {
                self.excluded_paths.push(rel);
            }
        }
        self
    }

    /// Skip any entry whose root-relative path matches one of `patterns`.
    pub fn exclude_patterns(mut self, patterns: &[String]) -> Result<Self, ScanError> {
        for p in patterns {
            let pattern = glob::Pattern::new(p)
                .map_err(|e| ScanError::Config(format!("bad exclude pattern '{}': {}", p, e)))?;
            self.exclude_patterns.push(pattern);
        }
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk the tree. Traversal errors surface as `Err` items and
    /// the caller is expected to stop on the first one.
    pub fn candidates(&self) -> impl Iterator<Item = Result<CandidateFile, ScanError>> + '_ {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| !self.is_pruned(e))
            .filter_map(move |entry| match entry {
                Ok(entry) => self.admit(&entry).map(Ok),
                Err(source) => Some(Err(ScanError::Traverse {
                    path: source
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone()),
                    source,
                })),
            })
    }

    /// Collect every candidate, failing on the first traversal error.
    pub fn collect(&self) -> Result<Vec<CandidateFile>, ScanError> {
        self.candidates().collect()
    }

    fn relative(&self, path: &Path) -> String {
        slash_joined(path.strip_prefix(&self.root).unwrap_or(path))
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        if entry.file_type().is_dir() {
            let name = entry.file_name().to_string_lossy();
            if EXCLUDED_DIRS.iter().any(|d| *d == name) {
                tracing::debug!(dir = %entry.path().display(), "skipping excluded directory");
                return true;
            }
            if !self.excluded_paths.is_empty()
                && self.excluded_paths.contains(&self.relative(entry.path()))
            {
                tracing::debug!(dir = %entry.path().display(), "skipping models directory");
                return true;
            }
        }
        if !self.exclude_patterns.is_empty() {
            let rel = self.relative(entry.path());
            if self.exclude_patterns.iter().any(|p| p.matches(&rel)) {
                tracing::debug!(path = %rel, "skipping path matched by exclude pattern");
                return true;
            }
        }
        false
    }

    fn admit(&self, entry: &DirEntry) -> Option<CandidateFile> {
        // Non-directories only. Broken symlinks are admitted so the read
        // fails loudly instead of the file silently disappearing.
        if entry.file_type().is_dir() {
            return None;
        }
        let name = entry.file_name().to_string_lossy();
        if !is_admitted(&name) {
            return None;
        }
        Some(CandidateFile {
            path: entry.path().to_path_buf(),
            relative_path: self.relative(entry.path()),
            extension: extension_of(&name).to_string(),
        })
    }
}

fn slash_joined(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether a file name ends in one of the allowed source suffixes.
pub fn is_admitted(file_name: &str) -> bool {
    ALLOWED_EXTENSIONS.iter().any(|ext| file_name.ends_with(ext))
}

/// Everything after the last `.` in a file name.
pub fn extension_of(file_name: &str) -> &str {
    file_name.rsplit('.').next().unwrap_or(file_name)
}

/// Read a source file as text, dropping bytes that are not valid UTF-8.
pub fn read_source(candidate: &CandidateFile) -> Result<String, FileError> {
    let bytes = std::fs::read(&candidate.path).map_err(|source| FileError::Read {
        path: candidate.relative_path.clone(),
        source,
    })?;

    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    Ok(text)
}
