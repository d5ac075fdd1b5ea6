//! Walks a parsed fragment tree and produces the final SQL string.
//!
//! Rendering is a single recursive descent over the tree with three pieces
//! of state threaded through: the active `@INCLUDE` chain (cycle
//! detection), the stack of enclosing `@LOOP` indices (for `@LOOPINDEX` and
//! friends), and of course the output buffer itself.

use indexmap::IndexMap;

use crate::config::{DialectConfig, UNLIMITED_FETCH};
use crate::error::{ElsqlError, Result};
use crate::fragment::{ConnectiveKind, Fragment, IncludeRef, MatchValue, VarName};
use crate::params::ParamSource;

/// Renders the named top-level fragment against `params`.
pub fn render_sql(
    fragments: &IndexMap<String, Fragment>,
    config: &dyn DialectConfig,
    name: &str,
    params: &dyn ParamSource,
) -> Result<String> {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("render_sql", fragment = name).entered();

    let root = fragments
        .get(name)
        .ok_or_else(|| ElsqlError::UnknownFragment(name.to_string()))?;
    let Fragment::Name { body, .. } = root else {
        return Err(ElsqlError::UnknownFragment(name.to_string()));
    };

    let mut ctx = Renderer {
        fragments,
        config,
        params,
        active_includes: vec![name.to_string()],
        loop_indices: Vec::new(),
    };
    let mut buf = String::new();
    ctx.render_node(body, &mut buf)?;
    let sql = collapse_whitespace(&buf);

    #[cfg(feature = "tracing")]
    tracing::trace!(fragment = name, rendered_len = sql.len(), "rendered fragment");

    Ok(sql)
}

/// Collapses runs of whitespace into a single space and trims both ends.
/// Applied once at the top of [`render_sql`] and again to any sub-buffer
/// handed to a [`DialectConfig`] method, since those methods format their
/// input as a single logical clause.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Renderer<'a> {
    fragments: &'a IndexMap<String, Fragment>,
    config: &'a dyn DialectConfig,
    params: &'a dyn ParamSource,
    active_includes: Vec<String>,
    loop_indices: Vec<usize>,
}

impl<'a> Renderer<'a> {
    fn render_node(&mut self, frag: &Fragment, buf: &mut String) -> Result<()> {
        match frag {
            Fragment::Text { text, .. } => {
                let text = self.render_text(text)?;
                buf.push_str(&text);
                buf.push(' ');
            }
            Fragment::Container { children, .. } => {
                for child in children {
                    self.render_node(child, buf)?;
                }
            }
            Fragment::Name { body, .. } => self.render_node(body, buf)?,
            Fragment::Include { reference, .. } => self.render_include(reference, buf)?,
            Fragment::Where { body, .. } => self.render_where(body, buf)?,
            Fragment::Connective {
                kind,
                var,
                match_value,
                body,
                ..
            } => self.render_connective(*kind, var, match_value, body, buf)?,
            Fragment::If {
                var,
                match_value,
                body,
                ..
            } => {
                if self.predicate_holds(var, match_value) {
                    self.render_node(body, buf)?;
                }
            }
            Fragment::Loop { var, body, .. } => self.render_loop(var, body, buf)?,
            Fragment::LoopJoin { text, .. } => {
                if self.loop_indices.last() != Some(&0) {
                    let text = self.render_text(text)?;
                    buf.push_str(&text);
                    buf.push(' ');
                }
            }
            Fragment::Like { body, .. } => {
                let mut inner = String::new();
                self.render_node(body, &mut inner)?;
                buf.push_str(&self.config.format_like(&collapse_whitespace(&inner)));
                buf.push(' ');
            }
            Fragment::OffsetFetch {
                offset_var,
                fetch_var,
                ..
            } => {
                let offset = resolve_count(self.params, offset_var, 0)?;
                let fetch = resolve_count(self.params, fetch_var, UNLIMITED_FETCH)?;
                let clause = self.config.offset_fetch(offset, fetch);
                if !clause.is_empty() {
                    buf.push_str(&clause);
                    buf.push(' ');
                }
            }
            Fragment::Paging {
                offset_var,
                fetch_var,
                body,
                ..
            } => {
                let offset = resolve_count(self.params, offset_var, 0)?;
                let fetch = resolve_count(self.params, fetch_var, UNLIMITED_FETCH)?;
                let mut inner = String::new();
                self.render_node(body, &mut inner)?;
                buf.push_str(&self.config.paging(offset, fetch, &collapse_whitespace(&inner)));
                buf.push(' ');
            }
            Fragment::Value { var, .. } => {
                let name = self.decorated_name(var);
                let value = self
                    .params
                    .get_value(&name)
                    .ok_or_else(|| ElsqlError::MissingVariable(name.clone()))?;
                buf.push_str(&value.as_display());
                buf.push(' ');
            }
        }
        Ok(())
    }

    fn render_include(&mut self, reference: &IncludeRef, buf: &mut String) -> Result<()> {
        let name = match reference {
            IncludeRef::Literal(s) => s.clone(),
            IncludeRef::Variable(var) => self
                .params
                .get_value(var.as_str())
                .ok_or_else(|| ElsqlError::MissingVariable(var.as_str().to_string()))?
                .as_display(),
        };

        if self.active_includes.contains(&name) {
            return Err(ElsqlError::CyclicInclude(name));
        }
        let target = self
            .fragments
            .get(&name)
            .ok_or_else(|| ElsqlError::UnknownFragment(name.clone()))?;
        let Fragment::Name { body, .. } = target else {
            return Err(ElsqlError::UnknownFragment(name));
        };

        self.active_includes.push(name);
        let result = self.render_node(body, buf);
        self.active_includes.pop();
        result
    }

    /// `@WHERE` emits `WHERE ` followed by its body, unless the body renders
    /// to whitespace only (in which case nothing is emitted at all). Its own
    /// buffer starts empty, so the first live `@AND`/`@OR` inside it always
    /// sees an empty tail and suppresses its own connective keyword — the
    /// same rule that suppresses a redundant connective after `WHERE `,
    /// `AND `, `OR `, or `(` anywhere else in the tree.
    fn render_where(&mut self, body: &Fragment, buf: &mut String) -> Result<()> {
        let mut inner = String::new();
        self.render_node(body, &mut inner)?;
        if inner.trim().is_empty() {
            return Ok(());
        }
        buf.push_str("WHERE ");
        buf.push_str(&inner);
        Ok(())
    }

    fn render_connective(
        &mut self,
        kind: ConnectiveKind,
        var: &VarName,
        match_value: &Option<MatchValue>,
        body: &Fragment,
        buf: &mut String,
    ) -> Result<()> {
        if !self.predicate_holds(var, match_value) {
            return Ok(());
        }
        let mut scratch = String::new();
        self.render_node(body, &mut scratch)?;
        if scratch.trim().is_empty() {
            return Ok(());
        }
        if !connective_suppressed(buf) {
            buf.push_str(kind.keyword());
        }
        buf.push_str(&scratch);
        Ok(())
    }

    fn render_loop(&mut self, var: &VarName, body: &Fragment, buf: &mut String) -> Result<()> {
        // `resolve_count` already treats an absent variable as zero
        // iterations (its `None` branch); a present-but-non-integer value is
        // a genuine `TypeError` and must propagate as such, not be remapped.
        let count = resolve_count(self.params, var, 0)?;
        if count < 0 {
            return Err(ElsqlError::TypeError {
                name: var.as_str().to_string(),
                message: "loop count must not be negative".to_string(),
            });
        }
        for i in 0..count as usize {
            self.loop_indices.push(i);
            let result = self.render_node(body, buf);
            self.loop_indices.pop();
            result?;
        }
        Ok(())
    }

    /// Applies `@LOOPINDEX`-family substitution, then resolves any
    /// `:variable` reference in the result against the parameter source.
    /// ElSql interpolates values directly into the SQL text rather than
    /// leaving bind placeholders behind; a reference with no value present
    /// is left untouched so the surrounding text stays legible.
    fn render_text(&self, text: &str) -> Result<String> {
        let text = self.substitute_loop_indices(text)?;
        Ok(self.substitute_param_refs(&text))
    }

    fn substitute_param_refs(&self, text: &str) -> String {
        if !text.contains(':') {
            return text.to_string();
        }
        let chars: Vec<char> = text.chars().collect();
        let n = chars.len();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < n {
            if chars[i] == ':' && i + 1 < n && (chars[i + 1].is_ascii_alphabetic() || chars[i + 1] == '_') {
                let start = i + 1;
                let mut j = start;
                while j < n && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                let name: String = chars[start..j].iter().collect();
                match self.params.get_value(&name) {
                    Some(value) => out.push_str(&value.as_display()),
                    None => {
                        out.push(':');
                        out.push_str(&name);
                    }
                }
                i = j;
            } else {
                out.push(chars[i]);
                i += 1;
            }
        }
        out
    }

    fn substitute_loop_indices(&self, text: &str) -> Result<String> {
        if !text.contains("@LOOPINDEX") {
            return Ok(text.to_string());
        }
        let mut s = text.to_string();
        if s.contains("@LOOPINDEX3") {
            s = s.replace("@LOOPINDEX3", &self.loop_index_at(2)?.to_string());
        }
        if s.contains("@LOOPINDEX2") {
            s = s.replace("@LOOPINDEX2", &self.loop_index_at(1)?.to_string());
        }
        if s.contains("@LOOPINDEX") {
            s = s.replace("@LOOPINDEX", &self.loop_index_at(0)?.to_string());
        }
        Ok(s)
    }

    /// `depth_from_innermost == 0` is the closest enclosing `@LOOP`, `1` its
    /// parent loop, and so on, matching `@LOOPINDEX`/`@LOOPINDEX2`/`@LOOPINDEX3`.
    fn loop_index_at(&self, depth_from_innermost: usize) -> Result<usize> {
        let len = self.loop_indices.len();
        len.checked_sub(depth_from_innermost + 1)
            .map(|i| self.loop_indices[i])
            .ok_or_else(|| ElsqlError::TypeError {
                name: format!(
                    "@LOOPINDEX{}",
                    match depth_from_innermost {
                        0 => String::new(),
                        n => (n + 1).to_string(),
                    }
                ),
                message: "referenced outside a loop of sufficient nesting depth".to_string(),
            })
    }

    /// Loop-index decoration policy for `@IF`/`@AND`/`@OR`/`@VALUE` variable
    /// lookups: inside a `@LOOP` body, prefer `name + loop_index` when the
    /// parameter source actually has a value under that name, falling back
    /// to the bare name otherwise. Only the innermost enclosing loop's index
    /// is tried; a variable that wants an outer loop's index should be
    /// referenced with its own `@LOOPINDEX2`-suffixed name in source.
    fn decorated_name(&self, var: &VarName) -> String {
        if let Some(&index) = self.loop_indices.last() {
            let candidate = format!("{}{}", var.as_str(), index);
            if self.params.has_value(&candidate) {
                return candidate;
            }
        }
        var.as_str().to_string()
    }

    /// `@AND`/`@OR`/`@IF` share one predicate rule on the (loop-index-
    /// decorated) variable: absent → false; `= literal` given → case-
    /// insensitive string equality; present and boolean → the boolean
    /// itself; present and anything else → true (presence with any
    /// non-boolean value counts as true).
    fn predicate_holds(&self, var: &VarName, match_value: &Option<MatchValue>) -> bool {
        let name = self.decorated_name(var);
        let Some(value) = self.params.get_value(&name) else {
            return false;
        };
        match match_value {
            Some(expected) => value.as_display().eq_ignore_ascii_case(&expected.0),
            None => value.as_bool().unwrap_or(true),
        }
    }
}

/// Whether `buf`'s current tail already makes a connective keyword
/// redundant: the buffer is empty, or (ignoring trailing whitespace) ends
/// with `WHERE`, `AND`, `OR`, or `(`. The keyword checks require a
/// non-identifier character (or start-of-buffer) immediately before the
/// match, so a column named e.g. `nowhere` never triggers a false positive.
fn connective_suppressed(buf: &str) -> bool {
    let trimmed = buf.trim_end();
    if trimmed.is_empty() {
        return true;
    }
    if trimmed.ends_with('(') {
        return true;
    }
    ["WHERE", "AND", "OR"]
        .iter()
        .any(|kw| ends_with_word(trimmed, kw))
}

fn ends_with_word(s: &str, word: &str) -> bool {
    match s.strip_suffix(word) {
        Some(rest) => rest
            .chars()
            .last()
            .map(|c| !c.is_alphanumeric() && c != '_')
            .unwrap_or(true),
        None => false,
    }
}

/// Resolves an offset/fetch/loop-count variable, falling back to `default`
/// when the parameter source simply doesn't have it (pagination and loop
/// counts are commonly optional), but erroring if it's present with the
/// wrong shape.
fn resolve_count(params: &dyn ParamSource, var: &VarName, default: i64) -> Result<i64> {
    match params.get_value(var.as_str()) {
        None => Ok(default),
        Some(value) => value.as_int().ok_or_else(|| ElsqlError::TypeError {
            name: var.as_str().to_string(),
            message: "expected an integer value".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnsiDialect, PostgresDialect};
    use crate::params::MapParams;
    use crate::parser::{parse_resource, split_lines};

    fn fragments(text: &str) -> IndexMap<String, Fragment> {
        let lines = split_lines(text);
        parse_resource(&AnsiDialect, &lines, 0).unwrap()
    }

    #[test]
    fn renders_basic_named_fragment() {
        let frags = fragments("@NAME(selectPerson)\n  SELECT id, name\n  FROM person\n");
        let sql = render_sql(&frags, &AnsiDialect, "selectPerson", &MapParams::new()).unwrap();
        assert_eq!(sql, "SELECT id, name FROM person");
    }

    #[test]
    fn where_and_is_suppressed_when_variable_is_absent() {
        let frags = fragments(
            "@NAME(selectPerson)\n  SELECT * FROM person\n  @WHERE\n    @AND(:name)\n      name = :name\n",
        );
        let sql = render_sql(&frags, &AnsiDialect, "selectPerson", &MapParams::new()).unwrap();
        assert_eq!(sql, "SELECT * FROM person");
    }

    #[test]
    fn where_strips_leading_and_when_first_condition_survives() {
        let frags = fragments(
            "@NAME(selectPerson)\n  SELECT * FROM person\n  @WHERE\n    @AND(:id)\n      id = :id\n    @AND(:name)\n      AND name = :name\n",
        );
        let params = MapParams::new().insert("id", 1i64);
        let sql = render_sql(&frags, &AnsiDialect, "selectPerson", &params).unwrap();
        assert_eq!(sql, "SELECT * FROM person WHERE id = 1");
    }

    #[test]
    fn two_ands_first_absent_keeps_where_clean() {
        let frags = fragments(
            "@NAME(selectPerson)\n  SELECT * FROM person\n  @WHERE\n    @AND(:id)\n      id = :id\n    @AND(:name)\n      name = :name\n",
        );
        let params = MapParams::new().insert("name", "bob");
        let sql = render_sql(&frags, &AnsiDialect, "selectPerson", &params).unwrap();
        assert_eq!(sql, "SELECT * FROM person WHERE name = bob");
        assert!(!sql.contains("WHERE AND"));
    }

    #[test]
    fn variable_references_in_plain_text_are_interpolated() {
        let frags = fragments("@NAME(x)\n  SELECT * FROM t\n  @WHERE\n    @AND(:a)\n      a = :a\n");
        let params = MapParams::new().insert("a", "x");
        let sql = render_sql(&frags, &AnsiDialect, "x", &params).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a = x");
    }

    #[test]
    fn loop_with_named_variables_interpolates_each_value() {
        let frags = fragments(
            "@NAME(In)\n  IN (\n  @LOOP(:n)\n    :var@LOOPINDEX\n    @LOOPJOIN ,\n  )\n",
        );
        let params = MapParams::new()
            .insert("n", 3i64)
            .insert("var0", "a")
            .insert("var1", "b")
            .insert("var2", "c");
        let sql = render_sql(&frags, &AnsiDialect, "In", &params).unwrap();
        assert_eq!(sql, "IN ( a , b , c )");
    }

    #[test]
    fn match_value_is_case_insensitive() {
        let frags = fragments(
            "@NAME(active)\n  SELECT 1\n  @IF(:status = active)\n    WHERE status = 'A'\n",
        );
        let params = MapParams::new().insert("status", "ACTIVE");
        let sql = render_sql(&frags, &AnsiDialect, "active", &params).unwrap();
        assert_eq!(sql, "SELECT 1 WHERE status = 'A'");
    }

    #[test]
    fn loop_expands_with_loopjoin_and_loopindex() {
        let frags = fragments(
            "@NAME(inList)\n  SELECT 1\n  @LOOP(:n)\n    :ids@LOOPINDEX\n    @LOOPJOIN ,\n",
        );
        let params = MapParams::new().insert("n", 3i64);
        let sql = render_sql(&frags, &AnsiDialect, "inList", &params).unwrap();
        assert_eq!(sql, "SELECT 1 :ids0 , :ids1 , :ids2");
    }

    #[test]
    fn offsetfetch_defaults_to_no_clause_when_params_absent() {
        let frags = fragments("@NAME(page)\n  SELECT 1\n  @OFFSETFETCH\n");
        let sql = render_sql(&frags, &AnsiDialect, "page", &MapParams::new()).unwrap();
        assert_eq!(sql, "SELECT 1");
    }

    #[test]
    fn offsetfetch_renders_with_postgres_dialect() {
        let frags = fragments("@NAME(page)\n  SELECT 1\n  @OFFSETFETCH\n");
        let params = MapParams::new().insert("offset", 5i64).insert("fetch", 10i64);
        let sql = render_sql(&frags, &PostgresDialect, "page", &params).unwrap();
        assert_eq!(sql, "SELECT 1 LIMIT 10 OFFSET 5");
    }

    #[test]
    fn include_resolves_named_fragment() {
        let frags = fragments(
            "@NAME(base)\n  SELECT *\n  FROM person\n@NAME(full)\n  @INCLUDE(base)\n  WHERE id = 1\n",
        );
        let sql = render_sql(&frags, &AnsiDialect, "full", &MapParams::new()).unwrap();
        assert_eq!(sql, "SELECT * FROM person WHERE id = 1");
    }

    #[test]
    fn cyclic_include_is_detected() {
        let frags = fragments(
            "@NAME(a)\n  @INCLUDE(b)\n@NAME(b)\n  @INCLUDE(a)\n",
        );
        let err = render_sql(&frags, &AnsiDialect, "a", &MapParams::new()).unwrap_err();
        assert!(matches!(err, ElsqlError::CyclicInclude(_)));
    }

    #[test]
    fn missing_value_variable_is_an_error() {
        let frags = fragments("@NAME(x)\n  @VALUE(:col)\n");
        let err = render_sql(&frags, &AnsiDialect, "x", &MapParams::new()).unwrap_err();
        assert!(matches!(err, ElsqlError::MissingVariable(_)));
    }

    #[test]
    fn loop_count_variable_that_is_not_an_integer_is_a_type_error() {
        let frags = fragments("@NAME(x)\n  @LOOP(:n)\n    y\n");
        let params = MapParams::new().insert("n", "not-a-number");
        let err = render_sql(&frags, &AnsiDialect, "x", &params).unwrap_err();
        assert!(matches!(err, ElsqlError::TypeError { .. }));
    }

    #[test]
    fn loop_count_variable_absent_expands_zero_times() {
        let frags = fragments("@NAME(x)\n  SELECT 1\n  @LOOP(:n)\n    y\n");
        let sql = render_sql(&frags, &AnsiDialect, "x", &MapParams::new()).unwrap();
        assert_eq!(sql, "SELECT 1");
    }

    #[test]
    fn loop_indexed_predicate_prefers_suffixed_variable() {
        let frags = fragments("@NAME(x)\n  @LOOP(:n)\n    @IF(:active)\n      flag@LOOPINDEX\n");
        let params = MapParams::new()
            .insert("n", 2i64)
            .insert("active", true)
            .insert("active1", false);
        let sql = render_sql(&frags, &AnsiDialect, "x", &params).unwrap();
        // iteration 0 falls back to the bare `active` (true); iteration 1
        // has its own `active1 = false`, which overrides the fallback.
        assert_eq!(sql, "flag0");
    }

    #[test]
    fn boolean_predicate_without_match_value_uses_its_own_truth() {
        let frags = fragments("@NAME(x)\n  SELECT 1\n  @IF(:flag)\n    AND on\n");
        let on = MapParams::new().insert("flag", true);
        assert_eq!(render_sql(&frags, &AnsiDialect, "x", &on).unwrap(), "SELECT 1 AND on");
        let off = MapParams::new().insert("flag", false);
        assert_eq!(render_sql(&frags, &AnsiDialect, "x", &off).unwrap(), "SELECT 1");
    }

    #[test]
    fn value_directive_prefers_loop_indexed_variable() {
        let frags = fragments("@NAME(x)\n  @LOOP(:n)\n    @VALUE(:v)\n");
        let params = MapParams::new().insert("n", 2i64).insert("v0", "a").insert("v1", "b");
        let sql = render_sql(&frags, &AnsiDialect, "x", &params).unwrap();
        assert_eq!(sql, "a b");
    }

    #[test]
    fn connective_suppressed_after_open_paren_not_just_after_where() {
        let frags = fragments(
            "@NAME(x)\n  SELECT 1\n  WHERE (\n    @AND(:a)\n      a = :a\n    )\n    @AND(:b)\n      b = :b\n",
        );
        let params = MapParams::new().insert("a", "1").insert("b", "2");
        let sql = render_sql(&frags, &AnsiDialect, "x", &params).unwrap();
        assert_eq!(sql, "SELECT 1 WHERE ( a = 1 ) AND b = 2");
        assert!(!sql.contains("( AND"));
    }

    #[test]
    fn connective_emits_nothing_when_body_renders_whitespace_only() {
        let frags = fragments("@NAME(x)\n  SELECT 1\n  @WHERE\n    @AND(:a)\n      @VALUE(:a)\n");
        let params = MapParams::new().insert("a", "");
        let sql = render_sql(&frags, &AnsiDialect, "x", &params).unwrap();
        assert_eq!(sql, "SELECT 1");
    }
}
