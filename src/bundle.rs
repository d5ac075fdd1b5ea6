//! [`Bundle`]: a parsed, ready-to-render collection of named SQL fragments.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::DialectConfig;
use crate::error::{ElsqlError, Result};
use crate::fragment::Fragment;
use crate::loader::{resource_names, ResourceSource};
use crate::params::{EmptyParams, ParamSource};
use crate::parser::{parse_resource_with_options, split_lines, ParserOptions};
use crate::render::render_sql;

/// A set of named SQL fragments parsed from one or more layered `.elsql`
/// resources, bound to a [`DialectConfig`].
///
/// Layering lets a dialect-specific overlay resource redefine individual
/// `@NAME` blocks from the base resource without touching the rest; see
/// [`Bundle::of`].
#[derive(Clone)]
pub struct Bundle {
    fragments: Arc<IndexMap<String, Fragment>>,
    config: Arc<dyn DialectConfig>,
}

impl Bundle {
    /// Parses already-loaded resource texts, in layering order (later
    /// resources override `@NAME` blocks from earlier ones).
    pub fn parse(config: impl DialectConfig + 'static, resources: &[&str]) -> Result<Bundle> {
        Self::parse_with_options(config, resources, ParserOptions::default())
    }

    /// Like [`Bundle::parse`], but with explicit [`ParserOptions`] controlling
    /// parser leniency.
    pub fn parse_with_options(
        config: impl DialectConfig + 'static,
        resources: &[&str],
        options: ParserOptions,
    ) -> Result<Bundle> {
        let config: Arc<dyn DialectConfig> = Arc::new(config);
        Self::parse_with_config(config, resources, options)
    }

    fn parse_with_config(
        config: Arc<dyn DialectConfig>,
        resources: &[&str],
        options: ParserOptions,
    ) -> Result<Bundle> {
        let mut fragments = IndexMap::new();
        for (resource_index, text) in resources.iter().enumerate() {
            let lines = split_lines(text);
            let parsed = parse_resource_with_options(config.as_ref(), &lines, resource_index, options)?;
            fragments.extend(parsed);
        }
        Ok(Bundle {
            fragments: Arc::new(fragments),
            config,
        })
    }

    /// Loads `<resource_type>.elsql` (required) and
    /// `<resource_type>-<dialect>.elsql` (optional overlay, looked up by
    /// `config.name()`) from `source`, then parses both layers.
    pub fn of(
        source: &dyn ResourceSource,
        config: impl DialectConfig + 'static,
        resource_type: &str,
    ) -> Result<Bundle> {
        let config: Arc<dyn DialectConfig> = Arc::new(config);
        let names = resource_names(resource_type, config.name());

        let mut texts = Vec::new();
        for (i, name) in names.iter().enumerate() {
            match source.read(name)? {
                Some(text) => texts.push(text),
                None if i == 0 => return Err(ElsqlError::ResourceNotFound(name.clone())),
                None => {}
            }
        }

        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        Self::parse_with_config(config, &refs, ParserOptions::default())
    }

    /// Returns a copy of this bundle bound to a different dialect. The
    /// fragment tree is shared (an `Arc` clone); only the config pointer
    /// changes.
    pub fn with_config(&self, config: impl DialectConfig + 'static) -> Bundle {
        Bundle {
            fragments: Arc::clone(&self.fragments),
            config: Arc::new(config),
        }
    }

    /// Renders `name` with no parameters. Fails if any fragment in its tree
    /// requires one.
    pub fn get_sql(&self, name: &str) -> Result<String> {
        self.get_sql_with_params(name, &EmptyParams)
    }

    /// Renders `name` against `params`.
    pub fn get_sql_with_params(&self, name: &str, params: &dyn ParamSource) -> Result<String> {
        render_sql(&self.fragments, self.config.as_ref(), name, params)
    }

    /// Names of every `@NAME` block known to this bundle.
    pub fn fragment_names(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().map(String::as_str)
    }

    pub fn dialect_name(&self) -> &str {
        self.config.name()
    }
}

impl std::fmt::Debug for Bundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundle")
            .field("dialect", &self.config.name())
            .field("fragment_count", &self.fragments.len())
            .finish()
    }
}
