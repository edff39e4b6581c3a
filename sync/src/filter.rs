//! Glob pattern sets used for source expansion and ignore resolution

use std::path::Path;
use serde::{Deserialize, Serialize};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::{Result, SyncError};
use crate::paths::to_slash;

/// Pattern matching options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterOptions {
    /// Patterns to match; a leading `!` turns a pattern into an exclusion
    pub patterns: Vec<String>,
    /// Case sensitive matching
    pub case_sensitive: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            case_sensitive: true,
        }
    }
}

/// Compiled include/exclude globs, matched against root-relative paths.
///
/// `*` never crosses a `/`, `**` spans any number of directories, and a
/// trailing `/**` also matches the directory itself.
#[derive(Debug, Clone)]
pub struct PatternSet {
    include_set: GlobSet,
    exclude_set: Option<GlobSet>,
    patterns: Vec<String>,
}

impl PatternSet {
    /// Compile a pattern set from options
    pub fn new(options: &FilterOptions) -> Result<Self> {
        let (excludes, includes): (Vec<&str>, Vec<&str>) = options
            .patterns
            .iter()
            .map(String::as_str)
            .partition(|pattern| pattern.starts_with('!'));

        let excludes: Vec<&str> = excludes.iter().map(|pattern| &pattern[1..]).collect();

        let include_set = Self::build_globset(&includes, options.case_sensitive)?;
        let exclude_set = if excludes.is_empty() {
            None
        } else {
            Some(Self::build_globset(&excludes, options.case_sensitive)?)
        };

        Ok(Self {
            include_set,
            exclude_set,
            patterns: options.patterns.clone(),
        })
    }

    /// Compile case-sensitive patterns
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        Self::new(&FilterOptions {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            ..Default::default()
        })
    }

    /// Check a root-relative path against the set
    pub fn is_match(&self, relative: &Path) -> bool {
        let candidate = to_slash(relative);
        if !self.include_set.is_match(&candidate) {
            return false;
        }

        match &self.exclude_set {
            Some(exclude_set) => !exclude_set.is_match(&candidate),
            None => true,
        }
    }

    /// The patterns this set was built from
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Build a globset from patterns
    fn build_globset(patterns: &[&str], case_sensitive: bool) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let trimmed = pattern.trim_start_matches("./");

            // `dir/**` should select `dir` as well as its contents.
            let mut expanded = vec![trimmed];
            if let Some(dir) = trimmed.strip_suffix("/**") {
                if !dir.is_empty() {
                    expanded.push(dir);
                }
            }

            for glob_source in expanded {
                let glob = GlobBuilder::new(glob_source)
                    .literal_separator(true)
                    .case_insensitive(!case_sensitive)
                    .build()
                    .map_err(|e| SyncError::glob_error(*pattern, e.to_string()))?;
                builder.add(glob);
            }
        }

        builder
            .build()
            .map_err(|e| SyncError::glob_error(patterns.join(", "), e.to_string()))
    }
}
