// Reference material matched into chat turns by keyword
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Hard cap on injected reference content, in characters.
const CONTENT_CAP: usize = 3000;
const TRUNCATION_MARKER: &str = "\n\n[... truncated]";

#[derive(Debug, Clone)]
struct ReferenceEntry {
    key: String,
    /// Lowercased tokens that match this entry inside a message.
    tokens: Vec<String>,
    path: PathBuf,
    label: String,
}

/// One piece of reference content selected for injection into a user turn.
#[derive(Debug, Clone)]
pub struct ReferenceMatch {
    pub key: String,
    pub content: String,
}

/// Collections of reference files matched against chat messages. Scanned
/// once at startup; matching is checked blueprints first, then documents,
/// then courses, and the first hit wins, so at most one piece of reference
/// content is injected per turn.
#[derive(Debug, Default)]
pub struct ReferenceLibrary {
    blueprints: Vec<ReferenceEntry>,
    documents: Vec<ReferenceEntry>,
    courses: Vec<ReferenceEntry>,
}

impl ReferenceLibrary {
    /// Scan the three collection directories. Missing directories yield
    /// empty collections, not errors.
    pub fn scan(blueprint_dir: &Path, document_dir: &Path, course_dir: &Path) -> Self {
        let library = Self {
            blueprints: scan_blueprints(blueprint_dir),
            documents: scan_documents(document_dir),
            courses: scan_courses(course_dir),
        };
        info!(
            target: "chat_reference",
            blueprints = library.blueprints.len(),
            documents = library.documents.len(),
            courses = library.courses.len(),
            "reference library loaded"
        );
        library
    }

    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty() && self.documents.is_empty() && self.courses.is_empty()
    }

    /// Directory of available resources, appended to the system prompt so
    /// the assistant can point users at them.
    pub fn resource_directory(&self) -> String {
        let mut out = String::from("\n\n=== AVAILABLE RESOURCES ===\n");
        if !self.blueprints.is_empty() {
            let keys: Vec<&str> = self.blueprints.iter().map(|e| e.key.as_str()).collect();
            out.push_str(&format!("Blueprints: {}\n", keys.join(", ")));
        }
        if !self.documents.is_empty() {
            let names: Vec<&str> = self.documents.iter().map(|e| e.label.as_str()).collect();
            out.push_str(&format!("Documents: {}\n", names.join(", ")));
        }
        if !self.courses.is_empty() {
            out.push_str(&format!("Courses: {} files in total\n", self.courses.len()));
        }
        out
    }

    /// First entry whose tokens appear in the message, collection priority
    /// order. Returns the loaded, truncated content.
    pub fn match_message(&self, message: &str) -> Option<ReferenceMatch> {
        let msg = message.to_lowercase();
        self.blueprints
            .iter()
            .chain(&self.documents)
            .chain(&self.courses)
            .find(|entry| entry.tokens.iter().any(|token| msg.contains(token)))
            .and_then(load_entry)
    }
}

fn load_entry(entry: &ReferenceEntry) -> Option<ReferenceMatch> {
    let content = match fs::read_to_string(&entry.path) {
        Ok(content) => content,
        Err(e) => {
            warn!(
                target: "chat_reference",
                key = %entry.key,
                error = %e,
                "failed to read reference file"
            );
            return None;
        }
    };
    Some(ReferenceMatch {
        key: entry.key.clone(),
        content: format!("{}\n\n{}", entry.label, truncate(&content, CONTENT_CAP)),
    })
}

fn truncate(content: &str, cap: usize) -> String {
    if content.chars().count() <= cap {
        return content.to_string();
    }
    let cut: String = content.chars().take(cap).collect();
    format!("{cut}{TRUNCATION_MARKER}")
}

fn sorted_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(read) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = read
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();
    paths
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Blueprints: flat directory of .txt files, keyed by file stem.
fn scan_blueprints(dir: &Path) -> Vec<ReferenceEntry> {
    let mut entries = Vec::new();
    for path in sorted_files(dir) {
        if extension(&path) != Some("txt") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let key = stem.to_lowercase();
        entries.push(ReferenceEntry {
            tokens: vec![key.clone()],
            label: format!("Blueprint: {stem}"),
            key,
            path,
        });
    }
    entries
}

/// Documents: flat directory keyed doc-01, doc-02, ... in filename order.
/// The filename itself also matches.
fn scan_documents(dir: &Path) -> Vec<ReferenceEntry> {
    let mut entries = Vec::new();
    for path in sorted_files(dir) {
        if !matches!(extension(&path), Some("txt") | Some("md")) {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        let key = format!("doc-{:02}", entries.len() + 1);
        entries.push(ReferenceEntry {
            tokens: vec![key.clone(), file_name.to_lowercase()],
            label: format!("Document: {file_name}"),
            key,
            path,
        });
    }
    entries
}

/// Courses: recursive directory; entries match on any path segment of the
/// file's location.
fn scan_courses(dir: &Path) -> Vec<ReferenceEntry> {
    let mut entries = Vec::new();
    walk_courses(dir, dir, &mut entries);
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    entries
}

fn walk_courses(root: &Path, dir: &Path, entries: &mut Vec<ReferenceEntry>) {
    let Ok(read) = fs::read_dir(dir) else {
        return;
    };
    for entry in read.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_courses(root, &path, entries);
            continue;
        }
        if !matches!(extension(&path), Some("txt") | Some("md") | Some("js") | Some("html")) {
            continue;
        }
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        let mut tokens: Vec<String> = rel
            .iter()
            .filter_map(|part| Path::new(part).file_stem().and_then(|s| s.to_str()))
            .map(str::to_lowercase)
            .collect();
        tokens.dedup();
        let rel_key = rel
            .iter()
            .filter_map(|part| part.to_str())
            .collect::<Vec<_>>()
            .join("-")
            .to_lowercase();
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        entries.push(ReferenceEntry {
            key: format!("course-{rel_key}"),
            tokens,
            label: format!("Course File: {file_name}"),
            path,
        });
    }
}
