use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

use crate::model::snippet::{
    DEFAULT_FOLDER, DEFAULT_LANGUAGE, DEFAULT_NAME, Snippet, SnippetIndex,
};

/// Seed body written on first run so a fresh install has something to open.
const SEED_SNIPPET: &str = r#"## Quick Start

* n/N - next/prev pane
* j/k - cursor down/up
* c/d - copy code block
* i - edit snippet
* s - toggle snippet pane
* use "---" to separate sections

```bash {copyable}
echo "hello from snipmark"
```

```bash {title="Custom Title"}
echo "titled blocks get a centered border"
```

---

## Sections

Separate sections with a `---` line surrounded by blank lines. The first
heading in each section becomes its title.

```bash {copyable}
snipmark list snippets
```
"#;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snippet home scan failed: {0}")]
    Scan(#[source] std::io::Error),
    #[error("index write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("index encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Owns the on-disk snippet home: a two-level `folder/file` tree plus the
/// JSON index file at its root.
pub struct SnippetStore {
    home: PathBuf,
    index_path: PathBuf,
}

impl SnippetStore {
    pub fn new(home: PathBuf, index_file: &str) -> Self {
        let index_path = home.join(index_file);
        Self { home, index_path }
    }

    /// Absolute path of a snippet's markdown file.
    pub fn snippet_path(&self, snippet: &Snippet) -> PathBuf {
        self.home.join(&snippet.folder).join(&snippet.file)
    }

    /// First-run setup: the home directory, an empty index, and a default
    /// folder with a quick-start snippet. Existing files are left alone.
    pub fn ensure_seeded(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.home).map_err(StoreError::Write)?;

        if !self.index_path.exists() {
            self.save(&[])?;

            let folder = self.home.join(DEFAULT_FOLDER);
            fs::create_dir_all(&folder).map_err(StoreError::Write)?;
            let seed = folder.join(format!("{DEFAULT_NAME}.{DEFAULT_LANGUAGE}"));
            if !seed.exists() {
                fs::write(&seed, SEED_SNIPPET).map_err(StoreError::Write)?;
            }
        }

        Ok(())
    }

    /// Reads the index permissively: a missing file yields an empty list,
    /// and corrupt JSON resets to empty rather than being partially trusted.
    pub fn load(&self) -> Vec<Snippet> {
        let raw = match fs::read_to_string(&self.index_path) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::info!("index not readable, starting empty: {err}");
                return Vec::new();
            }
        };

        match serde_json::from_str::<SnippetIndex>(&raw) {
            Ok(index) => index.snippet_list,
            Err(err) => {
                tracing::warn!("index corrupt, resetting to empty: {err}");
                Vec::new()
            }
        }
    }

    /// Writes the full index with stable 2-space indentation and a trailing
    /// newline.
    pub fn save(&self, snippets: &[Snippet]) -> Result<(), StoreError> {
        let index = SnippetIndex {
            snippet_list: snippets.to_vec(),
        };
        let mut out = serde_json::to_string_pretty(&index)?;
        out.push('\n');
        fs::write(&self.index_path, out).map_err(StoreError::Write)
    }

    /// Syncs the in-memory index against the filesystem.
    ///
    /// Two passes: first append entries for files on disk that the index
    /// does not know, then drop entries whose file is gone, keeping survivor
    /// order. The scan is exactly two levels deep (folder/file); dotted
    /// directory names and anything nested deeper are ignored. Returns
    /// whether the index changed.
    pub fn reconcile(&self, snippets: &mut Vec<Snippet>) -> Result<bool, StoreError> {
        let known: HashSet<String> = snippets.iter().map(Snippet::path).collect();
        let mut changed = false;

        let entries = fs::read_dir(&self.home).map_err(StoreError::Scan)?;
        let mut folders: Vec<(String, PathBuf)> = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !path.is_dir() || name.starts_with('.') {
                continue;
            }
            folders.push((name, path));
        }
        folders.sort();

        for (folder, folder_path) in folders {
            let files = match fs::read_dir(&folder_path) {
                Ok(files) => files,
                Err(err) => {
                    tracing::warn!("could not scan {}: {err}", folder_path.display());
                    continue;
                }
            };

            let mut names: Vec<String> = files
                .flatten()
                .filter(|e| e.path().is_file())
                .filter_map(|e| e.file_name().to_str().map(str::to_string))
                .collect();
            names.sort();

            for file in names {
                if known.contains(&format!("{folder}/{file}")) {
                    continue;
                }
                let stem = Path::new(&file)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(&file)
                    .to_string();
                let language = Path::new(&file)
                    .extension()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                snippets.push(Snippet {
                    folder: folder.clone(),
                    date: Utc::now(),
                    name: stem,
                    file,
                    language,
                });
                changed = true;
            }
        }

        let before = snippets.len();
        snippets.retain(|s| self.snippet_path(s).is_file());
        if snippets.len() != before {
            changed = true;
        }

        Ok(changed)
    }

    /// Raw file content of a snippet; unreadable files read as empty, per
    /// the degrade-to-empty error policy.
    pub fn read_content(&self, snippet: &Snippet) -> String {
        let path = self.snippet_path(snippet);
        match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("could not read {}: {err}", path.display());
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SnippetStore {
        SnippetStore::new(dir.path().to_path_buf(), "index.json")
    }

    fn write_snippet(dir: &TempDir, folder: &str, file: &str, body: &str) {
        let folder_path = dir.path().join(folder);
        fs::create_dir_all(&folder_path).unwrap();
        fs::write(folder_path.join(file), body).unwrap();
    }

    #[test]
    fn reconcile_discovers_new_files() {
        let dir = TempDir::new().unwrap();
        write_snippet(&dir, "a", "x.md", "# x");
        write_snippet(&dir, "a", "y.md", "# y");
        write_snippet(&dir, "b", "z.txt", "z");

        let store = store_in(&dir);
        let mut snippets = Vec::new();
        let changed = store.reconcile(&mut snippets).unwrap();

        assert!(changed);
        assert_eq!(snippets.len(), 3);
        let folders: Vec<&str> = snippets.iter().map(|s| s.folder.as_str()).collect();
        assert_eq!(folders, vec!["a", "a", "b"]);
        let languages: Vec<&str> = snippets.iter().map(|s| s.language.as_str()).collect();
        assert_eq!(languages, vec!["md", "md", "txt"]);
        assert_eq!(snippets[0].name, "x");
    }

    #[test]
    fn reconcile_is_idempotent() {
        let dir = TempDir::new().unwrap();
        write_snippet(&dir, "a", "x.md", "# x");

        let store = store_in(&dir);
        let mut snippets = Vec::new();
        assert!(store.reconcile(&mut snippets).unwrap());
        let first = snippets.clone();

        let changed = store.reconcile(&mut snippets).unwrap();
        assert!(!changed);
        assert_eq!(snippets, first);
    }

    #[test]
    fn reconcile_prunes_deleted_files_preserving_order() {
        let dir = TempDir::new().unwrap();
        write_snippet(&dir, "a", "x.md", "# x");
        write_snippet(&dir, "a", "y.md", "# y");
        write_snippet(&dir, "a", "z.md", "# z");

        let store = store_in(&dir);
        let mut snippets = Vec::new();
        store.reconcile(&mut snippets).unwrap();

        fs::remove_file(dir.path().join("a").join("y.md")).unwrap();
        let changed = store.reconcile(&mut snippets).unwrap();

        assert!(changed);
        let names: Vec<&str> = snippets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["x", "z"]);
    }

    #[test]
    fn reconcile_skips_hidden_dirs_and_nested_levels() {
        let dir = TempDir::new().unwrap();
        write_snippet(&dir, ".git", "config.md", "hidden");
        write_snippet(&dir, "a", "x.md", "# x");
        fs::create_dir_all(dir.path().join("a").join("nested")).unwrap();
        fs::write(dir.path().join("a").join("nested").join("deep.md"), "deep").unwrap();

        let store = store_in(&dir);
        let mut snippets = Vec::new();
        store.reconcile(&mut snippets).unwrap();

        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].path(), "a/x.md");
    }

    #[test]
    fn scan_failure_leaves_loaded_entries_untouched() {
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("home");
        fs::write(&not_a_dir, "plain file").unwrap();

        let store = SnippetStore::new(not_a_dir, "index.json");
        let mut snippets = vec![Snippet {
            folder: "a".into(),
            date: Utc::now(),
            name: "x".into(),
            file: "x.md".into(),
            language: "md".into(),
        }];

        assert!(store.reconcile(&mut snippets).is_err());
        // Callers warn and keep listing what the index already had.
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].name, "x");
    }

    #[test]
    fn save_uses_two_space_indent_and_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .save(&[Snippet {
                folder: "a".into(),
                date: Utc::now(),
                name: "x".into(),
                file: "x.md".into(),
                language: "md".into(),
            }])
            .unwrap();

        let raw = fs::read_to_string(dir.path().join("index.json")).unwrap();
        assert!(raw.ends_with("\n"));
        assert!(raw.contains("  \"snippet_list\""));
        assert!(raw.contains("    {"));
    }

    #[test]
    fn corrupt_index_resets_to_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.json"), "{not json").unwrap();
        let store = store_in(&dir);
        assert!(store.load().is_empty());
    }

    #[test]
    fn seeding_creates_default_folder_and_example() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.ensure_seeded().unwrap();

        assert!(dir.path().join("index.json").exists());
        assert!(dir.path().join(DEFAULT_FOLDER).join("Example.md").exists());

        let mut snippets = store.load();
        assert!(snippets.is_empty());
        assert!(store.reconcile(&mut snippets).unwrap());
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].name, "Example");
    }
}
