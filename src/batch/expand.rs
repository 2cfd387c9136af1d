//! Target expansion: turn CLI target strings (paths, directories, or glob patterns) into a
//! de-duplicated, first-seen-order list of candidate files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use crate::batch::BatchConfig;

const GLOB_METACHARACTERS: [char; 3] = ['*', '?', '['];

/// Expand every target in `targets` into a flat, de-duplicated file list honoring `config`'s
/// depth, extension, and ignore-pattern filters.
pub fn expand_targets(targets: &[String], config: &BatchConfig) -> Vec<PathBuf> {
    let ignore_set = build_glob_set(&config.ignore_patterns);
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for target in targets {
        for root in expand_one(target) {
            collect(&root, config, &ignore_set, &mut seen, &mut out);
        }
    }

    out
}

fn expand_one(target: &str) -> Vec<PathBuf> {
    if target.chars().any(|c| GLOB_METACHARACTERS.contains(&c)) {
        match glob::glob(target) {
            Ok(paths) => paths.filter_map(Result::ok).collect(),
            Err(_) => Vec::new(),
        }
    } else {
        vec![PathBuf::from(target)]
    }
}

fn build_glob_set(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().expect("empty glob set always builds"))
}

fn collect(root: &Path, config: &BatchConfig, ignore_set: &GlobSet, seen: &mut HashSet<PathBuf>, out: &mut Vec<PathBuf>) {
    if !root.is_dir() {
        push_if_allowed(root, config, ignore_set, seen, out);
        return;
    }

    let mut builder = WalkBuilder::new(root);
    builder.standard_filters(false);
    builder.follow_links(false);
    builder.max_depth(config.max_depth);

    for entry in builder.build().flatten() {
        if entry.file_type().is_some_and(|file_type| file_type.is_file()) {
            push_if_allowed(entry.path(), config, ignore_set, seen, out);
        }
    }
}

fn push_if_allowed(path: &Path, config: &BatchConfig, ignore_set: &GlobSet, seen: &mut HashSet<PathBuf>, out: &mut Vec<PathBuf>) {
    if !extension_allowed(path, &config.allowed_extensions) {
        return;
    }
    if is_ignored(path, ignore_set) {
        return;
    }
    if seen.insert(path.to_path_buf()) {
        out.push(path.to_path_buf());
    }
}

fn extension_allowed(path: &Path, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let dotted = format!(".{}", extension.to_ascii_lowercase());
    allowed.iter().any(|candidate| candidate.to_ascii_lowercase() == dotted)
}

fn is_ignored(path: &Path, ignore_set: &GlobSet) -> bool {
    if ignore_set.is_empty() {
        return false;
    }
    let basename_matches = path.file_name().and_then(|name| name.to_str()).is_some_and(|name| ignore_set.is_match(name));
    basename_matches || ignore_set.is_match(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn expands_directory_recursively_with_extension_filter() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("book.epub"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("doc.pdf"), b"x").unwrap();

        let config = BatchConfig {
            workers: 1,
            queue_size: 1,
            max_depth: None,
            allowed_extensions: vec![".epub".to_owned(), ".pdf".to_owned()],
            ignore_patterns: Vec::new(),
        };
        let targets = vec![dir.path().to_string_lossy().into_owned()];
        let found = expand_targets(&targets, &config);

        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|p| p.ends_with("book.epub")));
        assert!(found.iter().any(|p| p.ends_with("doc.pdf")));
    }

    #[test]
    fn ignore_pattern_excludes_matching_basenames() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.epub"), b"x").unwrap();
        fs::write(dir.path().join("draft.epub"), b"x").unwrap();

        let config = BatchConfig {
            workers: 1,
            queue_size: 1,
            max_depth: None,
            allowed_extensions: vec![".epub".to_owned()],
            ignore_patterns: vec!["draft.*".to_owned()],
        };
        let targets = vec![dir.path().to_string_lossy().into_owned()];
        let found = expand_targets(&targets, &config);

        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("keep.epub"));
    }

    #[test]
    fn deduplicates_targets_by_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("book.epub");
        fs::write(&file, b"x").unwrap();

        let config = BatchConfig {
            workers: 1,
            queue_size: 1,
            max_depth: None,
            allowed_extensions: Vec::new(),
            ignore_patterns: Vec::new(),
        };
        let path_str = file.to_string_lossy().into_owned();
        let targets = vec![path_str.clone(), path_str];
        let found = expand_targets(&targets, &config);

        assert_eq!(found.len(), 1);
    }
}
