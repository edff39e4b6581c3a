//! Mapping rules, their expansion into definitions, and the pairs they yield

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::config::OneOrMany;
use crate::error::{Result, SyncError};
use crate::filter::PatternSet;
use crate::fs::FileSystem;
use crate::paths::{canonical_root, normalize_path};

/// One unit of synchronization work
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncPair {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// A files rule as written in a task file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRule {
    /// Directory the source patterns are relative to
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Source glob patterns; `!pattern` excludes
    pub src: OneOrMany,
    /// Destination root
    pub dest: PathBuf,
    /// Map every match to its own destination file
    #[serde(default)]
    pub expand: bool,
}

/// A resolved rule: concrete matched sources plus how to place them
#[derive(Debug, Clone, PartialEq)]
pub struct MappingDefinition {
    pub cwd: Option<PathBuf>,
    /// Matched sources, relative to `cwd`
    pub sources: Vec<PathBuf>,
    /// The destination root as declared
    pub destination_root: PathBuf,
    /// Precomputed destination for expanded and compact definitions
    pub destination: Option<PathBuf>,
    pub expanded: bool,
    pub compact_form: bool,
}

impl MappingDefinition {
    /// Canonical key of the destination root
    pub fn root(&self) -> PathBuf {
        canonical_root(&self.destination_root)
    }

    /// Pairs for every matched source.
    ///
    /// Expanded and compact definitions send each source to the precomputed
    /// destination; otherwise the source's relative path is joined under the
    /// destination root.
    pub fn pairs(&self) -> Vec<SyncPair> {
        let cwd = self.cwd.as_deref().unwrap_or(Path::new("."));

        self.sources
            .iter()
            .map(|source| {
                let destination = if self.expanded || self.compact_form {
                    normalize_path(self.destination.as_deref().unwrap_or(&self.destination_root))
                } else {
                    normalize_path(&self.destination_root.join(source))
                };

                SyncPair {
                    source: normalize_path(&cwd.join(source)),
                    destination,
                }
            })
            .collect()
    }
}

/// Resolves mapping rules against the filesystem
pub struct MappingExpander<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
}

impl<'a, F: FileSystem + ?Sized> MappingExpander<'a, F> {
    pub fn new(fs: &'a F) -> Self {
        Self { fs }
    }

    /// Expand a `files` rule
    pub async fn expand(&self, rule: &MappingRule) -> Result<Vec<MappingDefinition>> {
        let sources = self.matches(rule.cwd.as_deref(), rule.src.as_slice()).await?;

        if !rule.expand {
            return Ok(vec![MappingDefinition {
                cwd: rule.cwd.clone(),
                sources,
                destination_root: rule.dest.clone(),
                destination: None,
                expanded: false,
                compact_form: false,
            }]);
        }

        // An expanded rule with nothing matched still owns its root, so a
        // fully emptied source prunes the destination.
        if sources.is_empty() {
            return Ok(vec![MappingDefinition {
                cwd: rule.cwd.clone(),
                sources,
                destination_root: rule.dest.clone(),
                destination: None,
                expanded: true,
                compact_form: false,
            }]);
        }

        Ok(sources
            .into_iter()
            .map(|source| MappingDefinition {
                cwd: rule.cwd.clone(),
                destination: Some(rule.dest.join(&source)),
                sources: vec![source],
                destination_root: rule.dest.clone(),
                expanded: true,
                compact_form: false,
            })
            .collect())
    }

    /// Expand the task-level `src` + `dest` shorthand
    pub async fn expand_compact(&self, src: &[String], dest: &Path) -> Result<MappingDefinition> {
        let sources = self.matches(None, src).await?;

        Ok(MappingDefinition {
            cwd: None,
            sources,
            destination_root: dest.to_path_buf(),
            destination: Some(dest.to_path_buf()),
            expanded: false,
            compact_form: true,
        })
    }

    /// Sorted, de-duplicated matches relative to `cwd`
    async fn matches(&self, cwd: Option<&Path>, patterns: &[String]) -> Result<Vec<PathBuf>> {
        if patterns.is_empty() {
            return Err(SyncError::glob_error("", "a mapping needs at least one source pattern"));
        }

        let cwd = cwd.unwrap_or(Path::new("."));
        let pattern_set = PatternSet::from_patterns(patterns)?;

        let mut sources = self.fs.list_recursive(cwd, &pattern_set, true).await?;
        sources.sort();
        sources.dedup();

        if sources.is_empty() {
            tracing::debug!(cwd = %cwd.display(), patterns = ?patterns, "source patterns matched nothing");
        }

        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFileSystem;
    use std::fs;
    use tempfile::TempDir;

    fn source_tree() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("lib")).unwrap();
        fs::write(src.join("a.txt"), b"a").unwrap();
        fs::write(src.join("lib").join("b.js"), b"b").unwrap();
        temp_dir
    }

    #[test]
    fn test_pairs_join_relative_source_under_root() {
        let definition = MappingDefinition {
            cwd: Some(PathBuf::from("src")),
            sources: vec![PathBuf::from("lib").join("b.js")],
            destination_root: PathBuf::from("out/"),
            destination: None,
            expanded: false,
            compact_form: false,
        };

        let pairs = definition.pairs();

        assert_eq!(
            pairs,
            vec![SyncPair {
                source: Path::new("src").join("lib").join("b.js"),
                destination: Path::new("out").join("lib").join("b.js"),
            }]
        );
        assert_eq!(definition.root(), PathBuf::from("out"));
    }

    #[test]
    fn test_compact_pairs_use_explicit_destination() {
        let definition = MappingDefinition {
            cwd: None,
            sources: vec![PathBuf::from("a.txt")],
            destination_root: PathBuf::from("copy.txt"),
            destination: Some(PathBuf::from("copy.txt")),
            expanded: false,
            compact_form: true,
        };

        let pairs = definition.pairs();

        assert_eq!(pairs[0].source, PathBuf::from("a.txt"));
        assert_eq!(pairs[0].destination, PathBuf::from("copy.txt"));
    }

    #[tokio::test]
    async fn test_expand_rule_yields_one_definition_per_match() {
        let temp_dir = source_tree();
        let dest = temp_dir.path().join("out");
        let rule = MappingRule {
            cwd: Some(temp_dir.path().join("src")),
            src: OneOrMany::One("**/*.*".to_string()),
            dest: dest.clone(),
            expand: true,
        };

        let local = LocalFileSystem::new();
        let definitions = MappingExpander::new(&local).expand(&rule).await.unwrap();

        assert_eq!(definitions.len(), 2);
        assert!(definitions.iter().all(|d| d.expanded && d.root() == normalize_path(&dest)));
        let destinations: Vec<PathBuf> = definitions.iter().flat_map(|d| d.pairs()).map(|p| p.destination).collect();
        assert!(destinations.contains(&dest.join("a.txt")));
        assert!(destinations.contains(&dest.join("lib").join("b.js")));
    }

    #[tokio::test]
    async fn test_plain_rule_yields_single_definition_with_directories() {
        let temp_dir = source_tree();
        let rule = MappingRule {
            cwd: Some(temp_dir.path().join("src")),
            src: OneOrMany::Many(vec!["**".to_string(), "!**/*.js".to_string()]),
            dest: temp_dir.path().join("out"),
            expand: false,
        };

        let local = LocalFileSystem::new();
        let definitions = MappingExpander::new(&local).expand(&rule).await.unwrap();

        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].sources, vec![PathBuf::from("a.txt"), PathBuf::from("lib")]);
    }

    #[tokio::test]
    async fn test_expanded_rule_without_matches_keeps_its_root() {
        let temp_dir = source_tree();
        let rule = MappingRule {
            cwd: Some(temp_dir.path().join("src")),
            src: OneOrMany::One("**/*.md".to_string()),
            dest: temp_dir.path().join("out"),
            expand: true,
        };

        let local = LocalFileSystem::new();
        let definitions = MappingExpander::new(&local).expand(&rule).await.unwrap();

        assert_eq!(definitions.len(), 1);
        assert!(definitions[0].pairs().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_source_pattern_is_fatal() {
        let temp_dir = source_tree();
        let rule = MappingRule {
            cwd: Some(temp_dir.path().join("src")),
            src: OneOrMany::One("[oops".to_string()),
            dest: temp_dir.path().join("out"),
            expand: false,
        };

        let local = LocalFileSystem::new();
        let err = MappingExpander::new(&local).expand(&rule).await.unwrap_err();

        assert!(err.is_fatal());
    }
}
