//! Reading corpus source documents from the file library.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::error::{RagError, Result};

/// Default directory holding library files.
pub const DEFAULT_FILES_ROOT: &str = "files";

/// Extensions (lowercase, without the dot) accepted as corpus sources.
pub const CORPUS_SOURCE_EXTENSIONS: &[&str] = &["txt", "json"];

fn is_corpus_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| CORPUS_SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// List the library files that can be used as corpus sources, sorted by name.
///
/// A missing library directory is treated as empty.
pub fn list_corpus_sources(files_root: impl AsRef<Path>) -> Result<Vec<String>> {
    let root = files_root.as_ref();
    let read_dir = match fs::read_dir(root) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RagError::io(root, e)),
    };

    let mut names = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| RagError::io(root, e))?;
        let path = entry.path();
        if path.is_file() && is_corpus_source(&path) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    debug!(root = %root.display(), count = names.len(), "listed corpus sources");
    Ok(names)
}

/// Read library files as UTF-8 text, in the order given.
///
/// # Errors
///
/// - [`RagError::InvalidArgument`] for a name that is not a plain `.txt` or
///   `.json` file name
/// - [`RagError::Io`] if a file cannot be read
/// - [`RagError::Decode`] if a file is not valid UTF-8
pub fn read_documents(files_root: impl AsRef<Path>, file_names: &[String]) -> Result<Vec<String>> {
    let root = files_root.as_ref();
    file_names
        .iter()
        .map(|name| {
            let relative = Path::new(name);
            if relative.components().count() != 1 || !is_corpus_source(relative) {
                return Err(RagError::InvalidArgument(format!(
                    "'{name}' is not a .txt or .json file in the library"
                )));
            }
            let path: PathBuf = root.join(relative);
            let bytes = fs::read(&path).map_err(|e| RagError::io(&path, e))?;
            String::from_utf8(bytes).map_err(|_| {
                error!(path = %path.display(), "library file is not UTF-8 text");
                RagError::Decode { path }
            })
        })
        .collect()
}
