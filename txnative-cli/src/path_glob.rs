use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobMatcher};
use ignore::WalkBuilder;
use rayon::prelude::*;

fn has_glob_meta(s: &str) -> bool {
    s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
}

/// Deepest directory of `pattern` that contains no glob meta-character.
fn walk_root(pattern: &str) -> PathBuf {
    let end = pattern
        .find(['*', '?', '[', '{'])
        .unwrap_or(pattern.len());
    let prefix = Path::new(&pattern[..end]);
    if prefix.is_dir() {
        prefix.to_path_buf()
    } else {
        prefix
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn matcher(pattern: &str) -> Result<GlobMatcher, String> {
    // Walks from "." yield "./"-prefixed paths.
    let pattern = if Path::new(pattern).is_relative() && !pattern.starts_with("./") {
        format!("./{}", pattern)
    } else {
        pattern.to_string()
    };
    GlobBuilder::new(&pattern)
        .literal_separator(true)
        .build()
        .map(|glob: Glob| glob.compile_matcher())
        .map_err(|e| format!("Invalid glob pattern '{}': {}", pattern, e))
}

fn matching_files(pattern: &str) -> Result<Vec<String>, String> {
    let matcher = matcher(pattern)?;
    let walker = WalkBuilder::new(walk_root(pattern))
        .hidden(false)
        .git_ignore(true)
        .parents(true)
        .build();

    let mut files: Vec<String> = walker
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .filter_map(|entry| {
            let path = entry.path();
            let candidate = if path.is_relative() && !path.starts_with(".") {
                Path::new(".").join(path)
            } else {
                path.to_path_buf()
            };
            matcher
                .is_match(&candidate)
                .then(|| path.to_string_lossy().to_string())
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Expands the source-file arguments of `push` into concrete paths.
///
/// Literal paths are kept as given (a missing file is reported when it is
/// read). Glob patterns are matched in parallel with a `.gitignore`-aware
/// walk; a pattern matching nothing is an error.
pub fn expand_input_globs(inputs: &[String]) -> Result<Vec<String>, String> {
    let expanded: Vec<Result<Vec<String>, String>> = inputs
        .par_iter()
        .map(|input| {
            if !has_glob_meta(input) {
                return Ok(vec![input.clone()]);
            }
            let files = matching_files(input)?;
            if files.is_empty() {
                return Err(format!("No files match '{}'", input));
            }
            Ok(files)
        })
        .collect();

    let mut seen = HashSet::new();
    let mut results = Vec::new();
    for files in expanded {
        for file in files? {
            if seen.insert(file.clone()) {
                results.push(file);
            }
        }
    }
    Ok(results)
}
