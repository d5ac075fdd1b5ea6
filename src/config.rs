//! Dialect configuration: the policy object that rewrites `LIKE` clauses,
//! produces pagination suffixes, and normalises raw SQL source lines.
//!
//! The parser and renderer depend only on the [`DialectConfig`] trait; they
//! never inspect a config's concrete type.

/// A sentinel meaning "no limit" for the `fetch` argument of
/// [`DialectConfig::offset_fetch`] / [`DialectConfig::paging`]. Mirrors the
/// "`fetch = Integer.MAX_EQUIVALENT`" sentinel named in the language spec.
pub const UNLIMITED_FETCH: i64 = i64::MAX;

/// The policy object threaded through parsing and rendering.
///
/// Implementations are plain value types with no interior mutability; a
/// `Bundle` holds one behind an `Arc` (see [`crate::bundle::Bundle`]) so that
/// `with_config` can cheaply swap it without touching the fragment tree.
pub trait DialectConfig: Send + Sync {
    /// Used only to select the `<type>-<name>.elsql` overlay resource.
    fn name(&self) -> &str;

    /// Rewrites the already-rendered body of a `@LIKE ... @ENDLIKE` block
    /// into the final `LIKE`-clause text.
    fn format_like(&self, body_sql: &str) -> String {
        format!("LIKE {}", body_sql.trim())
    }

    /// Returns the pagination suffix for `offset` rows skipped and `fetch`
    /// rows returned. `offset == 0` omits the offset clause; `fetch ==
    /// UNLIMITED_FETCH` omits the fetch clause.
    fn offset_fetch(&self, offset: i64, fetch: i64) -> String;

    /// Rewrites the full rendered body to apply pagination. The default
    /// delegates to [`Self::offset_fetch`] appended to the body, matching
    /// dialects where pagination is a trailing clause rather than a
    /// wrapping one.
    fn paging(&self, offset: i64, fetch: i64, body_sql: &str) -> String {
        let suffix = self.offset_fetch(offset, fetch);
        if suffix.is_empty() {
            body_sql.trim_end().to_string()
        } else {
            format!("{} {}", body_sql.trim_end(), suffix)
        }
    }

    /// Pre-processing applied to each SQL source line by the parser.
    fn format_line(&self, raw: &str) -> String {
        raw.trim_end().to_string()
    }
}

/// The default, vendor-neutral dialect: `OFFSET n ROWS FETCH NEXT m ROWS
/// ONLY`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnsiDialect;

impl DialectConfig for AnsiDialect {
    fn name(&self) -> &str {
        "ansi"
    }

    fn offset_fetch(&self, offset: i64, fetch: i64) -> String {
        let mut parts = Vec::new();
        if offset > 0 {
            parts.push(format!("OFFSET {} ROWS", offset));
        }
        if fetch != UNLIMITED_FETCH {
            parts.push(format!("FETCH NEXT {} ROWS ONLY", fetch));
        }
        parts.join(" ")
    }
}

/// PostgreSQL: `LIMIT m OFFSET n`, each clause omitted independently.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect;

impl DialectConfig for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn offset_fetch(&self, offset: i64, fetch: i64) -> String {
        let mut parts = Vec::new();
        if fetch != UNLIMITED_FETCH {
            parts.push(format!("LIMIT {}", fetch));
        }
        if offset > 0 {
            parts.push(format!("OFFSET {}", offset));
        }
        parts.join(" ")
    }
}

/// MySQL: `LIMIT offset, fetch`. MySQL has no "no limit" keyword, so an
/// unlimited fetch is rendered as a very large row count instead of being
/// omitted.
#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlDialect {
    inner: AnsiDialect,
}

impl DialectConfig for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn offset_fetch(&self, offset: i64, fetch: i64) -> String {
        if offset == 0 && fetch == UNLIMITED_FETCH {
            return String::new();
        }
        // MySQL has no unbounded LIMIT keyword; the conventional workaround
        // is a very large row count.
        let fetch = if fetch == UNLIMITED_FETCH {
            i64::MAX
        } else {
            fetch
        };
        format!("LIMIT {}, {}", offset, fetch)
    }

    fn format_like(&self, body_sql: &str) -> String {
        self.inner.format_like(body_sql)
    }

    fn format_line(&self, raw: &str) -> String {
        self.inner.format_line(raw)
    }
}
