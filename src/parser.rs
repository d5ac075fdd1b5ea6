//! The indentation-sensitive line parser.
//!
//! Parsing a resource is a single pass over its lines with an explicit stack
//! of open containers (see [`Frame`]). Each line is classified, the stack is
//! adjusted per the indent/nest rule, and the resulting fragment is attached
//! to whichever container is now on top.

use indexmap::IndexMap;

use crate::config::DialectConfig;
use crate::error::{ElsqlError, Result};
use crate::fragment::{ConnectiveKind, Fragment, IncludeRef, MatchValue, Origin, VarName};

/// Splits resource text into lines, accepting both LF and CRLF line endings.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(|l| l.to_string()).collect()
}

/// Parser leniency knobs. `spec.md`'s grammar is otherwise fully
/// deterministic, so this is intentionally small — a plain `Default`-able
/// struct passed by value, the same shape as the rest of this codebase's
/// small config structs, rather than a thread-local or builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserOptions {
    /// If `true`, tolerates extra whitespace immediately inside a
    /// directive's parentheses (e.g. `@AND( :a )`) instead of rejecting it
    /// with a `ParseError`. Default `false`: whitespace directly inside the
    /// parentheses is a parse error, matching the terse directive syntax
    /// shown throughout `spec.md`'s examples.
    pub trailing_directive_args: bool,
}

/// Parses one or more layered resources into a single fragment map. Later
/// resources override fragment names defined by earlier ones.
pub fn parse<'a>(
    config: &dyn DialectConfig,
    resources: impl IntoIterator<Item = &'a [String]>,
) -> Result<IndexMap<String, Fragment>> {
    parse_with_options(config, resources, ParserOptions::default())
}

/// Like [`parse`], but with explicit [`ParserOptions`].
pub fn parse_with_options<'a>(
    config: &dyn DialectConfig,
    resources: impl IntoIterator<Item = &'a [String]>,
    options: ParserOptions,
) -> Result<IndexMap<String, Fragment>> {
    let mut merged = IndexMap::new();
    for (resource_index, lines) in resources.into_iter().enumerate() {
        let parsed = parse_resource_with_options(config, lines, resource_index, options)?;
        for (name, fragment) in parsed {
            merged.insert(name, fragment);
        }
    }
    Ok(merged)
}

/// Parses a single resource (already split into lines) into a name → `Name`
/// fragment map.
pub fn parse_resource(
    config: &dyn DialectConfig,
    lines: &[String],
    resource_index: usize,
) -> Result<IndexMap<String, Fragment>> {
    parse_resource_with_options(config, lines, resource_index, ParserOptions::default())
}

/// Like [`parse_resource`], but with explicit [`ParserOptions`].
pub fn parse_resource_with_options(
    config: &dyn DialectConfig,
    lines: &[String],
    resource_index: usize,
    options: ParserOptions,
) -> Result<IndexMap<String, Fragment>> {
    #[cfg(feature = "tracing")]
    let _span =
        tracing::debug_span!("parse_resource", resource_index, line_count = lines.len()).entered();

    let mut out = IndexMap::new();
    let mut stack: Vec<Frame> = vec![Frame::root()];

    for (zero_based_line, raw) in lines.iter().enumerate() {
        let line_number = zero_based_line + 1;
        let indent = leading_indent(raw);
        let content = raw[indent..].trim_end_matches(['\r']);

        if content.is_empty() || content.starts_with("--") {
            continue;
        }

        pop_ready_frames(&mut stack, indent, &mut out)?;

        if let Some(directive) = content.strip_prefix('@') {
            handle_directive(
                directive,
                indent,
                line_number,
                resource_index,
                config,
                options,
                &mut stack,
                &mut out,
            )?;
        } else {
            let frame = top_mut(&mut stack, resource_index, line_number)?;
            let text = config.format_line(content);
            frame.children.push(Fragment::Text {
                text,
                origin: Origin {
                    resource_index,
                    line: line_number,
                },
            });
        }
    }

    close_to_root(&mut stack, &mut out)?;

    Ok(out)
}

/// Number of leading space/tab characters; each counts as one column.
fn leading_indent(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .count()
}

/// One open container on the parser's stack.
struct Frame {
    indent: usize,
    start_line: usize,
    resource_index: usize,
    kind: FrameKind,
    children: Vec<Fragment>,
}

enum FrameKind {
    /// Synthetic frame below the first `@NAME`; never finalized into a
    /// fragment, only ever holds `Name` frames briefly before they're
    /// inserted into the output map.
    Root,
    Name {
        name: String,
    },
    Where,
    Connective {
        kind: ConnectiveKind,
        var: VarName,
        match_value: Option<MatchValue>,
    },
    If {
        var: VarName,
        match_value: Option<MatchValue>,
    },
    Loop {
        var: VarName,
    },
    Like,
    Paging {
        offset_var: VarName,
        fetch_var: VarName,
    },
}

impl FrameKind {
    /// Whether this kind is a `Name` block (exempt from indent-based
    /// popping; only closed by the next `@NAME` or end-of-file).
    fn is_name(&self) -> bool {
        matches!(self, FrameKind::Name { .. })
    }

    fn is_root(&self) -> bool {
        matches!(self, FrameKind::Root)
    }

    /// All container kinds other than `Root`/`Name` require a non-empty
    /// body.
    fn requires_body(&self) -> bool {
        !matches!(self, FrameKind::Root | FrameKind::Name { .. })
    }

    fn describe(&self) -> &'static str {
        match self {
            FrameKind::Root => "<root>",
            FrameKind::Name { .. } => "@NAME",
            FrameKind::Where => "@WHERE",
            FrameKind::Connective {
                kind: ConnectiveKind::And,
                ..
            } => "@AND",
            FrameKind::Connective {
                kind: ConnectiveKind::Or,
                ..
            } => "@OR",
            FrameKind::If { .. } => "@IF",
            FrameKind::Loop { .. } => "@LOOP",
            FrameKind::Like => "@LIKE",
            FrameKind::Paging { .. } => "@PAGING",
        }
    }
}

impl Frame {
    fn root() -> Self {
        Frame {
            indent: usize::MAX, // never satisfies `indent >= line_indent`, so never popped by the indent rule
            start_line: 0,
            resource_index: 0,
            kind: FrameKind::Root,
            children: Vec::new(),
        }
    }
}

/// Pops frames whose indent is `>= indent` off the stack, finalizing each
/// into its parent's children (or into `out` for a closed `Name`). `Name`
/// frames are never popped by this rule.
fn pop_ready_frames(
    stack: &mut Vec<Frame>,
    indent: usize,
    out: &mut IndexMap<String, Fragment>,
) -> Result<()> {
    loop {
        let top = stack.last().unwrap();
        if top.kind.is_root() || top.kind.is_name() {
            break;
        }
        if top.indent >= indent {
            pop_one(stack, out)?;
        } else {
            break;
        }
    }
    Ok(())
}

/// Closes every open frame at end-of-file, including any still-open `Name`.
fn close_to_root(
    stack: &mut Vec<Frame>,
    out: &mut IndexMap<String, Fragment>,
) -> Result<()> {
    while !stack.last().unwrap().kind.is_root() {
        pop_one(stack, out)?;
    }
    Ok(())
}

/// Pops exactly one frame and attaches the resulting fragment to whatever is
/// now on top (or inserts it into `out` if it was a `Name`).
fn pop_one(stack: &mut Vec<Frame>, out: &mut IndexMap<String, Fragment>) -> Result<()> {
    let frame = stack.pop().expect("pop_one called with empty stack");
    if frame.kind.requires_body() && frame.children.is_empty() {
        return Err(ElsqlError::parse(
            frame.resource_index,
            frame.start_line,
            format!("{} requires a non-empty body", frame.kind.describe()),
        ));
    }

    let origin = Origin {
        resource_index: frame.resource_index,
        line: frame.start_line,
    };
    let body = || -> Box<Fragment> {
        Box::new(Fragment::Container {
            children: frame.children,
            origin,
        })
    };

    let fragment = match frame.kind {
        FrameKind::Root => unreachable!("root frame is never popped"),
        FrameKind::Name { name } => {
            let body = body();
            out.insert(
                name.clone(),
                Fragment::Name {
                    name,
                    body,
                    origin,
                },
            );
            return Ok(());
        }
        FrameKind::Where => Fragment::Where { body: body(), origin },
        FrameKind::Connective { kind, var, match_value } => Fragment::Connective {
            kind,
            var,
            match_value,
            body: body(),
            origin,
        },
        FrameKind::If { var, match_value } => Fragment::If {
            var,
            match_value,
            body: body(),
            origin,
        },
        FrameKind::Loop { var } => Fragment::Loop { var, body: body(), origin },
        FrameKind::Like => Fragment::Like { body: body(), origin },
        FrameKind::Paging { offset_var, fetch_var } => Fragment::Paging {
            offset_var,
            fetch_var,
            body: body(),
            origin,
        },
    };

    stack
        .last_mut()
        .expect("root frame always remains")
        .children
        .push(fragment);
    Ok(())
}

fn top_mut<'s>(
    stack: &'s mut [Frame],
    resource_index: usize,
    line_number: usize,
) -> Result<&'s mut Frame> {
    let top = stack.last_mut().unwrap();
    if top.kind.is_root() {
        return Err(ElsqlError::parse(
            resource_index,
            line_number,
            "content outside of an @NAME block",
        ));
    }
    Ok(top)
}

#[allow(clippy::too_many_arguments)]
fn handle_directive(
    directive: &str,
    indent: usize,
    line_number: usize,
    resource_index: usize,
    config: &dyn DialectConfig,
    options: ParserOptions,
    stack: &mut Vec<Frame>,
    out: &mut IndexMap<String, Fragment>,
) -> Result<()> {
    let origin = Origin {
        resource_index,
        line: line_number,
    };
    let err = |msg: String| ElsqlError::parse(resource_index, line_number, msg);

    // `@LOOPJOIN <text>` takes free text after the directive name rather
    // than parenthesised arguments.
    if let Some(rest) = directive.strip_prefix("LOOPJOIN") {
        let top = top_mut(stack, resource_index, line_number)?;
        let text = config.format_line(rest.trim_start());
        top.children.push(Fragment::LoopJoin { text, origin });
        return Ok(());
    }

    let (name, args) = split_directive(directive, options).map_err(|e| err(e))?;

    match name {
        "NAME" => {
            let args = args.ok_or_else(|| err("@NAME requires a (name) argument".into()))?;
            let block_name = args.trim();
            if block_name.is_empty() {
                return Err(err("@NAME requires a non-empty name".into()));
            }

            // Close whatever is currently open. Any non-Name container left
            // open here (i.e. a `@NAME` appearing inside another block's
            // body) is a nesting error.
            match &stack.last().unwrap().kind {
                FrameKind::Root => {}
                FrameKind::Name { .. } => pop_one(stack, out)?,
                other => {
                    return Err(err(format!(
                        "@NAME cannot appear nested inside {}",
                        other.describe()
                    )))
                }
            }

            stack.push(Frame {
                indent,
                start_line: line_number,
                resource_index,
                kind: FrameKind::Name {
                    name: block_name.to_string(),
                },
                children: Vec::new(),
            });
        }
        "WHERE" => {
            require_no_args(args, "WHERE").map_err(|e| err(e))?;
            push_frame(stack, resource_index, line_number, indent, FrameKind::Where)?;
        }
        "AND" | "OR" => {
            let args = args.ok_or_else(|| err(format!("@{name} requires a (:var) argument")))?;
            let (var, match_value) = parse_predicate_args(args).map_err(|e| err(e))?;
            let kind = if name == "AND" {
                ConnectiveKind::And
            } else {
                ConnectiveKind::Or
            };
            push_frame(
                stack,
                resource_index,
                line_number,
                indent,
                FrameKind::Connective { kind, var, match_value },
            )?;
        }
        "IF" => {
            let args = args.ok_or_else(|| err("@IF requires a (:var) argument".into()))?;
            let (var, match_value) = parse_predicate_args(args).map_err(|e| err(e))?;
            push_frame(
                stack,
                resource_index,
                line_number,
                indent,
                FrameKind::If { var, match_value },
            )?;
        }
        "LOOP" => {
            let args = args.ok_or_else(|| err("@LOOP requires a (:var) argument".into()))?;
            let var = parse_var(args.trim()).map_err(|e| err(e))?;
            push_frame(stack, resource_index, line_number, indent, FrameKind::Loop { var })?;
        }
        "LIKE" => {
            require_no_args(args, "LIKE").map_err(|e| err(e))?;
            push_frame(stack, resource_index, line_number, indent, FrameKind::Like)?;
        }
        "ENDLIKE" => {
            require_no_args(args, "ENDLIKE").map_err(|e| err(e))?;
            // Indentation has already closed a correctly-nested @LIKE block
            // by the time we get here; @ENDLIKE is otherwise a no-op marker.
        }
        "OFFSETFETCH" => {
            let (offset_var, fetch_var) = match args {
                None => (VarName::from("offset"), VarName::from("fetch")),
                Some(args) => parse_two_vars(args).map_err(|e| err(e))?,
            };
            let top = top_mut(stack, resource_index, line_number)?;
            top.children.push(Fragment::OffsetFetch {
                offset_var,
                fetch_var,
                origin,
            });
        }
        "PAGING" => {
            let args = args.ok_or_else(|| err("@PAGING requires (:off,:fetch) arguments".into()))?;
            let (offset_var, fetch_var) = parse_two_vars(args).map_err(|e| err(e))?;
            push_frame(
                stack,
                resource_index,
                line_number,
                indent,
                FrameKind::Paging { offset_var, fetch_var },
            )?;
        }
        "INCLUDE" => {
            let args = args.ok_or_else(|| err("@INCLUDE requires a (name) argument".into()))?;
            let reference = parse_include_ref(args).map_err(|e| err(e))?;
            let top = top_mut(stack, resource_index, line_number)?;
            top.children.push(Fragment::Include { reference, origin });
        }
        "VALUE" => {
            let args = args.ok_or_else(|| err("@VALUE requires a (:var) argument".into()))?;
            let var = parse_var(args.trim()).map_err(|e| err(e))?;
            let top = top_mut(stack, resource_index, line_number)?;
            top.children.push(Fragment::Value { var, origin });
        }
        other => return Err(err(format!("unknown directive @{other}"))),
    }

    Ok(())
}

fn push_frame(
    stack: &mut Vec<Frame>,
    resource_index: usize,
    line_number: usize,
    indent: usize,
    kind: FrameKind,
) -> Result<()> {
    // Validate that we are inside an @NAME before opening a nested block.
    top_mut(stack, resource_index, line_number)?;
    stack.push(Frame {
        indent,
        start_line: line_number,
        resource_index,
        kind,
        children: Vec::new(),
    });
    Ok(())
}

fn require_no_args(args: Option<&str>, directive: &str) -> std::result::Result<(), String> {
    match args {
        None => Ok(()),
        Some(a) if a.trim().is_empty() => Ok(()),
        Some(_) => Err(format!("@{directive} takes no arguments")),
    }
}

/// Splits `NAME(args)` into `("NAME", Some("args"))`, or a bare directive
/// name into `("NAME", None)`. Unless `options.trailing_directive_args` is
/// set, whitespace directly inside the parentheses (before the first
/// argument character or after the last) is rejected rather than silently
/// trimmed.
fn split_directive(
    directive: &str,
    options: ParserOptions,
) -> std::result::Result<(&str, Option<&str>), String> {
    match directive.find('(') {
        None => Ok((directive.trim_end(), None)),
        Some(open) => {
            if !directive.ends_with(')') {
                return Err(format!(
                    "unbalanced parentheses in directive @{directive}"
                ));
            }
            let name = directive[..open].trim_end();
            let args = &directive[open + 1..directive.len() - 1];
            if !options.trailing_directive_args && args != args.trim() {
                return Err(format!(
                    "@{name} has extra whitespace inside its parentheses"
                ));
            }
            Ok((name, Some(args)))
        }
    }
}

fn parse_var(token: &str) -> std::result::Result<VarName, String> {
    let token = token.trim();
    match token.strip_prefix(':') {
        Some(rest) if !rest.is_empty() => Ok(VarName(rest.to_string())),
        _ => Err(format!("expected a `:variable` reference, found `{token}`")),
    }
}

fn parse_predicate_args(
    args: &str,
) -> std::result::Result<(VarName, Option<MatchValue>), String> {
    match args.split_once('=') {
        Some((var_part, value_part)) => {
            let var = parse_var(var_part)?;
            let value = value_part.trim();
            if value.is_empty() {
                return Err("expected a literal after `=`".to_string());
            }
            Ok((var, Some(MatchValue(value.to_string()))))
        }
        None => Ok((parse_var(args)?, None)),
    }
}

fn parse_two_vars(args: &str) -> std::result::Result<(VarName, VarName), String> {
    let mut parts = args.splitn(2, ',');
    let first = parts
        .next()
        .ok_or_else(|| "expected two `:variable` arguments".to_string())?;
    let second = parts
        .next()
        .ok_or_else(|| "expected two comma-separated `:variable` arguments".to_string())?;
    Ok((parse_var(first)?, parse_var(second)?))
}

fn parse_include_ref(args: &str) -> std::result::Result<IncludeRef, String> {
    let trimmed = args.trim();
    if trimmed.is_empty() {
        return Err("@INCLUDE requires a name or :variable argument".to_string());
    }
    if let Some(var) = trimmed.strip_prefix(':') {
        if var.is_empty() {
            return Err("expected a variable name after `:`".to_string());
        }
        Ok(IncludeRef::Variable(VarName(var.to_string())))
    } else {
        Ok(IncludeRef::Literal(trimmed.to_string()))
    }
}
