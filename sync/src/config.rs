//! Task file format
//!
//! ```toml
//! [tasks.assets]
//! update_and_delete = true
//! ignore_in_dest = ["*.keep"]
//!
//! [[tasks.assets.files]]
//! cwd = "assets"
//! src = ["**"]
//! dest = "public/assets"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::filter::PatternSet;
use crate::fs::FileSystem;
use crate::mapping::{MappingDefinition, MappingExpander, MappingRule};
use crate::sync_engine::SyncOptions;

/// A single string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn as_slice(&self) -> &[String] {
        match self {
            OneOrMany::One(value) => std::slice::from_ref(value),
            OneOrMany::Many(values) => values,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        OneOrMany::One(value.to_string())
    }
}

impl From<Vec<String>> for OneOrMany {
    fn from(values: Vec<String>) -> Self {
        OneOrMany::Many(values)
    }
}

/// One named sync task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(flatten)]
    pub options: SyncOptions,
    /// Compact form source patterns
    #[serde(default)]
    pub src: Option<OneOrMany>,
    /// Compact form destination
    #[serde(default)]
    pub dest: Option<PathBuf>,
    /// Files rules
    #[serde(default)]
    pub files: Vec<MappingRule>,
}

impl TaskConfig {
    /// Check the task without touching the filesystem
    pub fn validate(&self) -> Result<()> {
        match (&self.src, &self.dest, self.files.is_empty()) {
            (Some(src), Some(dest), true) => {
                check_patterns(src.as_slice())?;
                check_destination(dest)?;
            }
            (None, None, false) => {
                for rule in &self.files {
                    check_patterns(rule.src.as_slice())?;
                    check_destination(&rule.dest)?;
                }
            }
            (None, None, true) => {
                return Err(SyncError::config_error("task has neither `src`/`dest` nor `files`"));
            }
            (Some(_), None, _) | (None, Some(_), _) => {
                return Err(SyncError::config_error("compact form needs both `src` and `dest`"));
            }
            (Some(_), Some(_), false) => {
                return Err(SyncError::config_error("use either `src`/`dest` or `files`, not both"));
            }
        }

        if let Some(ignore) = &self.options.ignore_in_dest {
            PatternSet::from_patterns(ignore.as_slice())?;
        }

        Ok(())
    }

    /// Resolve the task's rules into mapping definitions
    pub async fn expand<F: FileSystem + ?Sized>(&self, fs: &F) -> Result<Vec<MappingDefinition>> {
        self.validate()?;
        let expander = MappingExpander::new(fs);

        if let (Some(src), Some(dest)) = (&self.src, &self.dest) {
            return Ok(vec![expander.expand_compact(src.as_slice(), dest).await?]);
        }

        let mut definitions = Vec::new();
        for rule in &self.files {
            definitions.extend(expander.expand(rule).await?);
        }
        Ok(definitions)
    }
}

/// A task file: named tasks run independently
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFile {
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskConfig>,
}

impl TaskFile {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            SyncError::config_error(format!("cannot read task file '{}': {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: TaskFile = toml::from_str(content)?;
        Ok(file)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tasks.is_empty() {
            return Err(SyncError::config_error("task file defines no tasks"));
        }

        for (name, task) in &self.tasks {
            task.validate()
                .map_err(|e| SyncError::config_error(format!("task '{}': {}", name, e)))?;
        }

        Ok(())
    }

    pub fn task(&self, name: &str) -> Result<&TaskConfig> {
        self.tasks
            .get(name)
            .ok_or_else(|| SyncError::config_error(format!("no task named '{}'", name)))
    }
}

fn check_patterns(patterns: &[String]) -> Result<()> {
    if patterns.is_empty() {
        return Err(SyncError::config_error("`src` must name at least one pattern"));
    }
    PatternSet::from_patterns(patterns).map(|_| ())
}

fn check_destination(dest: &Path) -> Result<()> {
    if dest.as_os_str().is_empty() {
        return Err(SyncError::config_error("`dest` cannot be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::ComparisonMethod;

    const TASKS: &str = r#"
        [tasks.assets]
        updateAndDelete = true
        pretend = true
        ignoreInDest = "*.keep"
        compareUsing = "hash"

        [[tasks.assets.files]]
        cwd = "assets"
        src = ["**"]
        dest = "public/assets/"

        [tasks.single]
        src = "README.md"
        dest = "dist/README.md"
        fail_on_error = true
        ignore_in_dest = ["a", "b/**"]
    "#;

    #[test]
    fn test_parse_task_file() {
        let file = TaskFile::parse(TASKS).unwrap();
        file.validate().unwrap();

        let assets = file.task("assets").unwrap();
        assert!(assets.options.update_and_delete);
        assert!(assets.options.pretend);
        assert!(!assets.options.fail_on_error);
        assert_eq!(assets.options.ignore_in_dest, Some(OneOrMany::from("*.keep")));
        assert_eq!(assets.options.comparison_method(|_| panic!("valid")), ComparisonMethod::ContentHash);
        assert_eq!(assets.files[0].dest, PathBuf::from("public/assets/"));
        assert!(!assets.files[0].expand);

        let single = file.task("single").unwrap();
        assert!(single.options.fail_on_error);
        assert!(!single.options.update_and_delete);
        assert_eq!(single.options.ignore_in_dest.as_ref().unwrap().as_slice().len(), 2);
        assert_eq!(single.src, Some(OneOrMany::from("README.md")));
    }

    #[test]
    fn test_validate_rejects_mixed_forms() {
        let file = TaskFile::parse(
            r#"
            [tasks.bad]
            src = "a"
            dest = "b"
            [[tasks.bad.files]]
            src = "c"
            dest = "d"
            "#,
        )
        .unwrap();

        let err = file.validate().unwrap_err();
        assert!(err.to_string().contains("task 'bad'"));
    }

    #[test]
    fn test_validate_rejects_bad_ignore_pattern() {
        let file = TaskFile::parse(
            r#"
            [tasks.bad]
            src = "a"
            dest = "b"
            ignore_in_dest = "[unclosed"
            "#,
        )
        .unwrap();

        assert!(file.validate().is_err());
    }

    #[test]
    fn test_missing_task_is_config_error() {
        let file = TaskFile::parse(TASKS).unwrap();
        assert!(matches!(file.task("nope"), Err(SyncError::Config(_))));
    }
}
