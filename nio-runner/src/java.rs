// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structural reading of Java sources.
//!
//! Evidence collection and relevance ranking only need declaration boundaries: which types,
//! methods and constructors a file declares, and which lines each one spans. The
//! [`DeclarationParser`] trait is that seam; [`JavaDeclarationParser`] is the built-in
//! implementation.

mod extract;
mod lexer;
mod parser;

pub use extract::*;
pub use lexer::BraceTracker;
pub use parser::*;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Returns every `.java` file under `root`, in path order.
///
/// A missing root yields no files.
pub fn java_files(root: &Utf8Path) -> Vec<Utf8PathBuf> {
    let mut files = Vec::new();
    if !root.is_dir() {
        return files;
    }
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!("skipping unreadable entry under {root}: {error}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match Utf8PathBuf::try_from(entry.into_path()) {
            Ok(path) if path.extension() == Some("java") => files.push(path),
            Ok(_) => {}
            Err(error) => warn!("skipping non-UTF-8 path {}", error.as_path().display()),
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;
    use pretty_assertions::assert_eq;

    #[test]
    fn java_files_in_path_order() {
        let dir = tempdir().expect("created temp dir");
        for file in ["b/Z.java", "a/Y.java", "a/X.java", "a/notes.txt", "Root.java"] {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().expect("has parent")).expect("created dirs");
            std::fs::write(&path, "").expect("wrote file");
        }
        let files: Vec<_> = java_files(dir.path())
            .into_iter()
            .map(|path| path.strip_prefix(dir.path()).expect("under root").to_string())
            .collect();
        assert_eq!(files, vec!["Root.java", "a/X.java", "a/Y.java", "b/Z.java"]);
        assert!(java_files(&dir.path().join("missing")).is_empty());
    }
}
