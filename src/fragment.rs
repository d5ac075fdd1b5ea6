//! The fragment tree produced by the parser and walked by the renderer.

/// A variable reference as it appears in a directive, stored without its
/// leading `:` (an invariant the parser enforces once, at parse time, so
/// nothing downstream needs to care about the sigil again).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarName(pub String);

impl VarName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VarName {
    fn from(s: &str) -> Self {
        VarName(s.to_string())
    }
}

/// The literal half of a `:var = literal` predicate in `@IF`/`@AND`/`@OR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchValue(pub String);

/// What an `@INCLUDE` points at: a fixed name, or a variable whose runtime
/// string value names the fragment to include.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeRef {
    Literal(String),
    Variable(VarName),
}

/// Where a fragment came from, for tooling that wants to map rendered output
/// back to source. Not consulted by rendering itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub resource_index: usize,
    pub line: usize,
}

/// A node in a parsed ElSql fragment tree.
///
/// This is a tagged union over the fragment kinds in the language rather
/// than a trait-object hierarchy: every variant's rendering behaviour is a
/// handful of lines, and a `match` in the renderer is both cheaper and
/// easier to audit against the grammar than dynamic dispatch would be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Literal SQL text (after `DialectConfig::format_line`), emitted
    /// verbatim subject to `@LOOPINDEX`-family substitution.
    Text { text: String, origin: Origin },

    /// An ordered run of children with no wrapping behaviour of its own.
    Container { children: Vec<Fragment>, origin: Origin },

    /// A top-level named block. Only `Name` fragments live at the top level
    /// of a `Bundle`'s fragment map.
    Name {
        name: String,
        body: Box<Fragment>,
        origin: Origin,
    },

    /// `@INCLUDE(name)` or `@INCLUDE(:var)`.
    Include { reference: IncludeRef, origin: Origin },

    /// `@WHERE` — emits `WHERE ` followed by its body, or nothing if the
    /// body renders to whitespace only.
    Where { body: Box<Fragment>, origin: Origin },

    /// `@AND(:var[ = value])` / `@OR(:var[ = value])`.
    Connective {
        kind: ConnectiveKind,
        var: VarName,
        match_value: Option<MatchValue>,
        body: Box<Fragment>,
        origin: Origin,
    },

    /// `@IF(:var[ = value])`.
    If {
        var: VarName,
        match_value: Option<MatchValue>,
        body: Box<Fragment>,
        origin: Origin,
    },

    /// `@LOOP(:var)` — body is repeated `var` times.
    Loop {
        var: VarName,
        body: Box<Fragment>,
        origin: Origin,
    },

    /// Text inside a `@LOOP` body that is only emitted between iterations
    /// (i.e. when the loop index is `> 0`). An optional extension named in
    /// the ElSql ecosystem.
    LoopJoin { text: String, origin: Origin },

    /// `@LIKE ... @ENDLIKE` — the body is rendered to a scratch buffer and
    /// handed to `DialectConfig::format_like`.
    Like { body: Box<Fragment>, origin: Origin },

    /// `@OFFSETFETCH` / `@OFFSETFETCH(:off,:fetch)`. A bare `@OFFSETFETCH`
    /// defaults its variable names to `offset`/`fetch` at parse time, so the
    /// renderer never has to special-case "no arguments given".
    OffsetFetch {
        offset_var: VarName,
        fetch_var: VarName,
        origin: Origin,
    },

    /// `@PAGING(:off,:fetch)` — like `OffsetFetch` but rewrites the whole
    /// body via `DialectConfig::paging`.
    Paging {
        offset_var: VarName,
        fetch_var: VarName,
        body: Box<Fragment>,
        origin: Origin,
    },

    /// `@VALUE(:var)` — interpolates the parameter's string form.
    Value { var: VarName, origin: Origin },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectiveKind {
    And,
    Or,
}

impl ConnectiveKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ConnectiveKind::And => "AND ",
            ConnectiveKind::Or => "OR ",
        }
    }
}

impl Fragment {
    pub fn origin(&self) -> Origin {
        match self {
            Fragment::Text { origin, .. }
            | Fragment::Container { origin, .. }
            | Fragment::Name { origin, .. }
            | Fragment::Include { origin, .. }
            | Fragment::Where { origin, .. }
            | Fragment::Connective { origin, .. }
            | Fragment::If { origin, .. }
            | Fragment::Loop { origin, .. }
            | Fragment::LoopJoin { origin, .. }
            | Fragment::Like { origin, .. }
            | Fragment::OffsetFetch { origin, .. }
            | Fragment::Paging { origin, .. }
            | Fragment::Value { origin, .. } => *origin,
        }
    }
}
