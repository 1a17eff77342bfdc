use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use trawl_core::{collect_files_with_extension, FileId};

/// Compiled view of a project: the files it declares and what each file can see.
pub trait CompiledProject: Send + Sync {
    fn declared_files(&self) -> &[FileId];

    /// Whether `namespace` is reachable from `file` (declared in it or imported by it).
    ///
    /// Used to narrow candidate files, so answering `true` when unsure is always safe.
    fn can_reach(&self, file: &FileId, namespace: &str) -> bool {
        let _ = (file, namespace);
        true
    }
}

/// A project assembled in memory, with optional per-file namespace information.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProject {
    files: Vec<FileId>,
    namespaces: HashMap<FileId, Vec<String>>,
}

impl InMemoryProject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file whose reachable namespaces are unknown; it is treated as reaching all of
    /// them.
    pub fn add_file(&mut self, file: impl Into<FileId>) -> &mut Self {
        let file = file.into();
        if !self.files.contains(&file) {
            self.files.push(file);
        }
        self
    }

    /// Add a file that declares or imports exactly `namespaces`.
    pub fn add_file_with_namespaces<I, S>(&mut self, file: impl Into<FileId>, namespaces: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let file = file.into();
        self.add_file(file.clone());
        self.namespaces
            .insert(file, namespaces.into_iter().map(Into::into).collect());
        self
    }
}

impl CompiledProject for InMemoryProject {
    fn declared_files(&self) -> &[FileId] {
        &self.files
    }

    fn can_reach(&self, file: &FileId, namespace: &str) -> bool {
        match self.namespaces.get(file) {
            Some(namespaces) => namespaces.iter().any(|ns| ns == namespace),
            None => true,
        }
    }
}

/// Every file under a directory with one of the given extensions.
#[derive(Debug, Clone)]
pub struct DirectoryProject {
    root: PathBuf,
    files: Vec<FileId>,
}

impl DirectoryProject {
    /// Walk `root` once and record matching files in path order.
    pub fn scan(root: impl Into<PathBuf>, extensions: &[&str]) -> io::Result<Self> {
        let root = root.into();
        let mut paths = Vec::new();
        for extension in extensions {
            paths.extend(collect_files_with_extension(&root, extension.trim_start_matches('.'))?);
        }
        paths.sort();
        paths.dedup();

        tracing::debug!(
            target: "trawl.search",
            root = %root.display(),
            files = paths.len(),
            "scanned project directory"
        );

        Ok(Self {
            root,
            files: paths.into_iter().map(FileId::from).collect(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl CompiledProject for DirectoryProject {
    fn declared_files(&self) -> &[FileId] {
        &self.files
    }
}
