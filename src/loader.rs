//! Loading `.elsql` resource text from wherever it lives.
//!
//! [`ResourceSource`] is the seam between the parser and storage: the
//! default [`FsResourceSource`] reads plain files, but a caller embedding
//! resources in a binary (via `include_str!`) or fetching them from a
//! packaged archive only needs to implement the trait.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ElsqlError, Result};

/// Resolves `<type>.elsql` base resources and `<type>-<dialect>.elsql`
/// overlay resources to their text content.
pub trait ResourceSource {
    /// Returns the resource's text, or `Ok(None)` if it doesn't exist. A
    /// missing overlay is not an error; a missing base resource is (the
    /// caller turns that into [`ElsqlError::ResourceNotFound`]).
    fn read(&self, resource_name: &str) -> Result<Option<String>>;
}

/// Reads `.elsql` resources from a directory on disk.
#[derive(Debug, Clone)]
pub struct FsResourceSource {
    base_dir: PathBuf,
}

impl FsResourceSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        FsResourceSource {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, resource_name: &str) -> PathBuf {
        self.base_dir.join(format!("{resource_name}.elsql"))
    }
}

impl ResourceSource for FsResourceSource {
    fn read(&self, resource_name: &str) -> Result<Option<String>> {
        let path = self.path_for(resource_name);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ElsqlError::Io { path, source }),
        }
    }
}

/// Resolves the pair of resource names for a given `<type>` and optional
/// dialect overlay, e.g. `("Person", Some("postgres"))` ->
/// `["Person", "Person-postgres"]`.
pub(crate) fn resource_names(resource_type: &str, dialect_name: &str) -> Vec<String> {
    let mut names = vec![resource_type.to_string()];
    if !dialect_name.is_empty() {
        names.push(format!("{resource_type}-{dialect_name}"));
    }
    names
}
