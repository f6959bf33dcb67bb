//! Readable identifiers derived from the shape of expressions.
//!
//! Every function here is pure: the same expression always produces the same
//! name, and uniqueness is obtained by numeric suffixes against a caller
//! supplied set of taken names.

use crate::ast::{BinaryOp, Expr, InterpolatedPart, UnaryOp};

/// Request superglobals whose names carry no meaning in a template.
const SUPERGLOBALS: &[&str] = &["POST", "GET", "REQUEST", "SERVER", "SESSION", "ENV"];

/// Segments dropped from output names when something follows them.
const NOISE_SEGMENTS: &[&str] = &["array", "item", "row", "entry", "abs", "intval"];

const REGEX_FUNCTIONS: &[&str] = &["replace", "split", "match", "match_all"];

pub const DEFAULT_MAX_CONDITION_LENGTH: usize = 50;

/// A descriptive name for `expr`: lowercase, underscore delimited, never
/// starting with a digit.
///
/// `$post->title` => `post_title`, `htmlspecialchars($_GET['q'])` =>
/// `htmlspecialchars_q`, `isset($user) ? $user : 'x'` => `user`.
pub fn variable_name(expr: &Expr) -> String {
    let mut raw = String::new();
    describe(expr, &mut raw);
    clean(&raw)
}

/// A boolean-flag style name for a condition, truncated to `max_length`
/// characters at a word boundary.
///
/// `$a < 10 && !$done` => `a_lt_10_and_not_done`
pub fn condition_name(expr: &Expr, max_length: usize) -> String {
    let name = collapse_underscores(&dirty_condition_name(expr));

    let mut length: usize = 0;
    let mut output: Vec<&str> = Vec::new();
    for part in name.split('_') {
        // Every word after the first brings its separator.
        let added = if output.is_empty() {
            part.len()
        } else {
            part.len().saturating_add(1)
        };
        length = length.saturating_add(added);
        if length > max_length {
            output.push(if output.is_empty() { "condition" } else { "etc" });
            break;
        }
        output.push(part);
    }

    let name = output.join("_");
    if name.is_empty() {
        "condition".to_string()
    } else {
        name
    }
}

/// Shorten a name for use as an output key: drop the enclosing loop's
/// variable prefix and noise segments.
///
/// Inside `foreach ($posts as $post)`, `post_title` becomes `title`.
pub fn output_name(name: &str, loop_local: Option<&str>) -> String {
    let mut name = name;
    if let Some(local) = loop_local.filter(|l| !l.is_empty()) {
        if let Some(rest) = name.strip_prefix(local).and_then(|r| r.strip_prefix('_')) {
            if !rest.is_empty() {
                name = rest;
            }
        }
    }

    let segments: Vec<&str> = name.split('_').collect();
    let last = segments.len().saturating_sub(1);
    let kept: Vec<&str> = segments
        .iter()
        .enumerate()
        .filter(|(i, s)| *i == last || !NOISE_SEGMENTS.contains(s))
        .map(|(_, s)| *s)
        .collect();

    let name = clean(&kept.join("_"));
    if name.is_empty() {
        "value".to_string()
    } else {
        name
    }
}

/// `name`, or `name_2`, `name_3`, ... whichever is the first not taken.
pub fn unique_name<F: Fn(&str) -> bool>(name: &str, is_taken: F) -> String {
    if !is_taken(name) {
        return name.to_string();
    }
    (2..)
        .map(|i| format!("{}_{}", name, i))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| name.to_string())
}

#[allow(
    clippy::wildcard_enum_match_arm,
    reason = "Everything but operators is named like a value."
)]
fn dirty_condition_name(expr: &Expr) -> String {
    match expr {
        Expr::Binary { op, left, right } => {
            let word = match op {
                BinaryOp::And => "and",
                BinaryOp::Or => "or",
                BinaryOp::Lt => "lt",
                BinaryOp::Lte => "lte",
                BinaryOp::Gt => "gt",
                BinaryOp::Gte => "gte",
                BinaryOp::Eq => "eq",
                BinaryOp::NotEq => "neq",
                BinaryOp::Identical => "eqq",
                BinaryOp::NotIdentical => "neqq",
                BinaryOp::Concat
                | BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Mul
                | BinaryOp::Div
                | BinaryOp::Mod => return variable_name(expr),
            };
            format!(
                "{}_{}_{}",
                dirty_condition_name(left),
                word,
                dirty_condition_name(right)
            )
        }
        Expr::Unary {
            op: UnaryOp::Not,
            expr,
        } => format!("not_{}", dirty_condition_name(expr)),
        Expr::Assign { target, value } => format!(
            "{}_from_{}",
            dirty_condition_name(target),
            dirty_condition_name(value)
        ),
        _ => variable_name(expr),
    }
}

/// Writes a rough description of `expr`; `clean` normalizes it afterwards.
fn describe(expr: &Expr, out: &mut String) {
    match expr {
        Expr::Variable(name) => out.push_str(name),
        Expr::String(value) => out.push_str(value),
        Expr::Int(value) => out.push_str(&value.to_string()),
        Expr::Float(value) => out.push_str(&value.to_string()),
        Expr::Bool(value) => out.push_str(if *value { "true" } else { "false" }),
        Expr::Null => out.push_str("null"),
        Expr::Interpolated(parts) => {
            for part in parts {
                match part {
                    InterpolatedPart::Literal(text) => out.push_str(text),
                    InterpolatedPart::Expr(expr) => describe(expr, out),
                }
                out.push('_');
            }
        }
        Expr::Binary { op, left, right } => {
            describe(left, out);
            out.push_str(match op {
                BinaryOp::Mul => "_times_",
                BinaryOp::Div => "_div_",
                BinaryOp::Sub => "_minus_",
                BinaryOp::Add => "_plus_",
                BinaryOp::Mod => "_mod_",
                BinaryOp::Concat
                | BinaryOp::Lt
                | BinaryOp::Lte
                | BinaryOp::Gt
                | BinaryOp::Gte
                | BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Identical
                | BinaryOp::NotIdentical
                | BinaryOp::And
                | BinaryOp::Or => "_",
            });
            describe(right, out);
        }
        Expr::Unary { op, expr } => {
            if *op == UnaryOp::Neg {
                out.push_str("minus_");
            }
            describe(expr, out);
        }
        Expr::Assign { target, value } | Expr::AssignOp { target, value, .. } => {
            describe(target, out);
            out.push('_');
            describe(value, out);
        }
        Expr::IncDec { target, .. } => describe(target, out),
        Expr::Call { name, args } => {
            out.push_str(name);
            if is_regex_function(name) {
                return;
            }
            // Only the first argument says something about the value.
            if let Some(first) = args.first() {
                out.push('_');
                describe(first, out);
            }
        }
        Expr::Property { object, name } => {
            describe(object, out);
            out.push('_');
            out.push_str(name);
        }
        Expr::Index { array, index } => {
            describe(array, out);
            if let Some(index) = index {
                out.push('_');
                describe(index, out);
            }
        }
        Expr::Array(_) => out.push_str("array"),
        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => match (cond.as_ref(), then) {
            (Expr::Isset(_), Some(then)) => describe(then, out),
            (Expr::Isset(args), None) => describe(args.first().unwrap_or(&**otherwise), out),
            (_, Some(then)) => {
                describe(cond, out);
                out.push('_');
                describe(then, out);
                out.push('_');
                describe(otherwise, out);
            }
            (_, None) => {
                describe(cond, out);
                out.push('_');
                describe(otherwise, out);
            }
        },
        Expr::Cast { expr, .. } => describe(expr, out),
        Expr::Isset(args) => {
            out.push_str("isset");
            for arg in args {
                out.push('_');
                describe(arg, out);
            }
        }
        Expr::Print(expr) => {
            out.push_str("print_");
            describe(expr, out);
        }
    }
}

fn is_regex_function(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    ["preg_", "ereg_"].iter().any(|prefix| {
        lower
            .strip_prefix(prefix)
            .is_some_and(|rest| REGEX_FUNCTIONS.contains(&rest))
    })
}

fn clean(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    let segments: Vec<&str> = sanitized.split('_').filter(|s| !s.is_empty()).collect();
    let last = segments.len().saturating_sub(1);
    let name = segments
        .iter()
        .enumerate()
        .filter(|(i, s)| *i == last || !SUPERGLOBALS.contains(s))
        .map(|(_, s)| s.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_");

    let name = match name.strip_prefix("isset_") {
        Some(rest) => format!("have_{}", rest),
        None => name,
    };

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", name)
    } else {
        name
    }
}

fn collapse_underscores(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out
}
