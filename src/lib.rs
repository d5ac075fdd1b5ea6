//! ElSql: parameterised SQL templates.
//!
//! An `.elsql` resource is a set of named, indentation-structured SQL
//! fragments (`@NAME` blocks) that compose conditional clauses, loops, and
//! dialect-specific pagination without string concatenation at the call
//! site. Parse one or more layered resources into a [`Bundle`], then render
//! a named fragment against a [`ParamSource`] to get the final SQL text and
//! bind its parameters the normal way.
//!
//! ```
//! use elsql::{AnsiDialect, Bundle, MapParams};
//!
//! let bundle = Bundle::parse(
//!     AnsiDialect,
//!     &["@NAME(selectPerson)\n  SELECT * FROM person\n  @WHERE\n    @AND(:id)\n      id = :id\n"],
//! ).unwrap();
//!
//! let sql = bundle
//!     .get_sql_with_params("selectPerson", &MapParams::new().insert("id", 42i64))
//!     .unwrap();
//! assert_eq!(sql, "SELECT * FROM person WHERE id = 42");
//! ```

pub mod bundle;
pub mod config;
pub mod error;
pub mod fragment;
pub mod loader;
pub mod params;
pub mod parser;
pub mod render;

pub use bundle::Bundle;
pub use config::{AnsiDialect, DialectConfig, MysqlDialect, PostgresDialect, UNLIMITED_FETCH};
pub use error::{ElsqlError, Result};
pub use fragment::{ConnectiveKind, Fragment, IncludeRef, MatchValue, Origin, VarName};
pub use loader::{FsResourceSource, ResourceSource};
pub use params::{EmptyParams, MapParams, ParamSource, Value};
pub use parser::ParserOptions;
