//! Glob-style include/exclude matching for source discovery.
//!
//! Pattern semantics follow Sphinx's `include_patterns`/`exclude_patterns`:
//! `**` crosses directories, `*` and `?` stay within one path segment, and
//! `[seq]`/`[!seq]` are character classes.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

lazy_static::lazy_static! {
    static ref PATTERN_CACHE: Mutex<HashMap<String, Regex>> = Mutex::new(HashMap::new());
}

/// Translate a glob pattern into an anchored regular expression.
pub fn translate_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("^");
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:[^/]+/)*");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push('[');
                    let mut k = i + 1;
                    if matches!(chars[k], '!' | '^') {
                        out.push('^');
                        k += 1;
                    }
                    for &ch in &chars[k..end] {
                        if ch == '\\' || ch == '[' {
                            out.push('\\');
                        }
                        out.push(ch);
                    }
                    out.push(']');
                    i = end + 1;
                }
                None => {
                    out.push_str("\\[");
                    i += 1;
                }
            },
            c => {
                if "\\.^$+{}|()]".contains(c) {
                    out.push('\\');
                }
                out.push(c);
                i += 1;
            }
        }
    }

    out.push('$');
    out
}

/// Index of the `]` closing the class opened at `start`, if any.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if j < chars.len() && matches!(chars[j], '!' | '^') {
        j += 1;
    }
    // A leading ']' is literal
    if j < chars.len() && chars[j] == ']' {
        j += 1;
    }
    (j..chars.len()).find(|&k| chars[k] == ']')
}

pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let mut cache = PATTERN_CACHE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }
    let regex = Regex::new(&translate_pattern(pattern))?;
    cache.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

pub fn pattern_match(name: &str, pattern: &str) -> Result<bool, regex::Error> {
    Ok(compile_pattern(pattern)?.is_match(name))
}

/// Forward-slash form of a path, used for matching and docnames.
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Files under `dirname` matching any include pattern and no exclude pattern.
///
/// Paths are returned absolute (under the canonicalized `dirname`) and sorted.
/// An empty include list means `**`.
pub fn get_matching_files(
    dirname: &Path,
    include_patterns: &[String],
    exclude_patterns: &[String],
) -> Result<Vec<PathBuf>> {
    let base = dirname
        .canonicalize()
        .with_context(|| format!("Failed to resolve directory: {}", dirname.display()))?;

    let compile_all = |patterns: &[String]| -> Result<Vec<Regex>> {
        patterns
            .iter()
            .map(|p| compile_pattern(p).with_context(|| format!("Invalid pattern '{}'", p)))
            .collect()
    };
    let includes = if include_patterns.is_empty() {
        compile_all(&["**".to_string()])?
    } else {
        compile_all(include_patterns)?
    };
    let excludes = compile_all(exclude_patterns)?;

    let mut matched = Vec::new();
    for entry in WalkDir::new(&base).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed to walk {}", base.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = normalize_path(entry.path().strip_prefix(&base)?);
        if includes.iter().any(|re| re.is_match(&relative))
            && !excludes.iter().any(|re| re.is_match(&relative))
        {
            matched.push(entry.into_path());
        }
    }

    matched.sort();
    Ok(matched)
}
