//! Filesystem Paths
//!
//! A `Path` is an ordered sequence of components. The string form is a `/`-delimited
//! sequence prefixed by `/`; the root directory is rendered as a single `/`.
//!
//! Neither `/` (the separator) nor `:` (reserved for application use) may appear inside a
//! component, and components are never empty.

use super::error::FsError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SEPARATOR: char = '/';
pub const RESERVED_DELIMITER: char = ':';

/// Raised when a path or a path component fails validation, or when an operation that
/// needs at least one component is applied to the root.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("invalid path component {0:?}: components must be non-empty and contain neither '/' nor ':'")]
    InvalidComponent(String),

    #[error("invalid path {0:?}: must begin with '/'")]
    MissingLeadingSeparator(String),

    #[error("invalid path {0:?}: ':' is reserved")]
    ReservedDelimiter(String),

    #[error("the root directory has no {0}")]
    Root(&'static str),
}

/// Immutable hierarchical identifier for files and directories.
///
/// Two paths are equal when their component sequences are equal. Ordering is
/// component-wise, so sorted listings are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path {
    components: Vec<String>,
}

impl Path {
    /// The root directory.
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds a path from a sequence of components, validating each one.
    pub fn from_components<I, S>(components: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        components
            .into_iter()
            .try_fold(Self::root(), |path, component| path.join(component))
    }

    /// Returns a new path with `component` appended.
    pub fn join(&self, component: impl Into<String>) -> Result<Self, PathError> {
        let component = component.into();
        validate_component(&component)?;

        let mut components = self.components.clone();
        components.push(component);
        Ok(Self { components })
    }

    pub fn components(&self) -> impl Iterator<Item = &str> + '_ {
        self.components.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    pub fn parent(&self) -> Result<Path, PathError> {
        match self.components.split_last() {
            Some((_, init)) => Ok(Self {
                components: init.to_vec(),
            }),
            None => Err(PathError::Root("parent")),
        }
    }

    pub fn last(&self) -> Result<&str, PathError> {
        self.components
            .last()
            .map(String::as_str)
            .ok_or(PathError::Root("last component"))
    }

    /// True when `other` is a prefix of this path.
    ///
    /// Every path is a subpath of itself and the root is a subpath of every path.
    pub fn is_subpath(&self, other: &Path) -> bool {
        other.components.len() <= self.components.len()
            && other
                .components
                .iter()
                .zip(&self.components)
                .all(|(a, b)| a == b)
    }

    /// Maps this path onto a directory of the local filesystem.
    pub fn to_local(&self, root: &std::path::Path) -> std::path::PathBuf {
        let mut local = root.to_path_buf();
        for component in &self.components {
            local.push(component);
        }
        local
    }

    /// Lists every regular file beneath `directory`, relative to it.
    ///
    /// The result is sorted. Fails with `NotFound` if `directory` does not exist and with
    /// `InvalidArgument` if it exists but is not a directory.
    pub fn list_local(directory: &std::path::Path) -> Result<Vec<Path>, FsError> {
        if !directory.exists() {
            return Err(FsError::not_found(directory.display()));
        }
        if !directory.is_dir() {
            return Err(FsError::invalid_argument(format!(
                "{} is not a directory",
                directory.display()
            )));
        }

        let mut files = Vec::new();
        collect_local(&Path::root(), directory, &mut files)?;
        files.sort();
        Ok(files)
    }
}

fn collect_local(
    prefix: &Path,
    directory: &std::path::Path,
    files: &mut Vec<Path>,
) -> Result<(), FsError> {
    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let name = entry.file_name().to_string_lossy().into_owned();

        let path = match prefix.join(name) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };

        if file_type.is_dir() {
            collect_local(&path, &entry.path(), files)?;
        } else if file_type.is_file() {
            files.push(path);
        }
    }

    Ok(())
}

fn validate_component(component: &str) -> Result<(), PathError> {
    if component.is_empty()
        || component.contains(SEPARATOR)
        || component.contains(RESERVED_DELIMITER)
    {
        return Err(PathError::InvalidComponent(component.to_string()));
    }
    Ok(())
}

impl FromStr for Path {
    type Err = PathError;

    /// Parses a `/`-delimited path. Empty components are dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with(SEPARATOR) {
            return Err(PathError::MissingLeadingSeparator(s.to_string()));
        }
        if s.contains(RESERVED_DELIMITER) {
            return Err(PathError::ReservedDelimiter(s.to_string()));
        }

        Self::from_components(s.split(SEPARATOR).filter(|c| !c.is_empty()))
    }
}

impl TryFrom<String> for Path {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_string()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "{}", SEPARATOR);
        }
        for component in &self.components {
            write!(f, "{}{}", SEPARATOR, component)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a str;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, String>, fn(&'a String) -> &'a str>;

    fn into_iter(self) -> Self::IntoIter {
        self.components
            .iter()
            .map(String::as_str as fn(&'a String) -> &'a str)
    }
}
