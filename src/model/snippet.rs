use chrono::{DateTime, Utc};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::{Deserialize, Serialize};

pub const DEFAULT_FOLDER: &str = "misc";
pub const DEFAULT_LANGUAGE: &str = "md";
pub const DEFAULT_NAME: &str = "Example";

/// One markdown snippet file plus its metadata record.
///
/// `folder/file` is the on-disk location and the identity used for
/// reconciliation; `file` is unique within its folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub folder: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "title")]
    pub name: String,
    pub file: String,
    pub language: String,
}

/// Root structure of the persisted snippet index.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SnippetIndex {
    pub snippet_list: Vec<Snippet>,
}

impl Snippet {
    /// Relative path `folder/file` under the snippet home.
    pub fn path(&self) -> String {
        format!("{}/{}", self.folder, self.file)
    }

    /// Canonical `folder/name.language` string used for fuzzy search.
    pub fn display(&self) -> String {
        format!("{}/{}.{}", self.folder, self.name, self.language)
    }
}

/// Sorted list of the distinct folders across all snippets.
pub fn folder_names(snippets: &[Snippet]) -> Vec<String> {
    let mut folders: Vec<String> = snippets.iter().map(|s| s.folder.clone()).collect();
    folders.sort();
    folders.dedup();
    folders
}

/// Best fuzzy match for `query` against each snippet's `folder/name.ext`
/// string. Ties keep the earliest snippet, matching the matcher's stable
/// ranking; no match above the matcher's cutoff yields `None`.
pub fn find_snippet<'a>(query: &str, snippets: &'a [Snippet]) -> Option<&'a Snippet> {
    let matcher = SkimMatcherV2::default();
    let mut best: Option<(i64, &Snippet)> = None;

    for snippet in snippets {
        if let Some(score) = matcher.fuzzy_match(&snippet.display(), query)
            && best.is_none_or(|(top, _)| score > top)
        {
            best = Some((score, snippet));
        }
    }

    best.map(|(_, snippet)| snippet)
}
