//! HTML escaping and the escapability analysis.
//!
//! The analysis answers one question about an output expression: is there an
//! expression `e'` such that outputting `escape(e')` prints exactly what the
//! original expression prints? When there is, the template can take over the
//! escaping at render time and the data program stores `e'`.

use crate::ast::{BinaryOp, CastKind, Expr};

pub const DEFAULT_ESCAPE_FUNCTIONS: &[&str] = &["htmlspecialchars", "htmlentities"];

pub const DEFAULT_SAFE_FUNCTIONS: &[&str] = &["abs", "intval", "sizeof", "count", "strlen"];

/// Escape text for HTML the way `htmlspecialchars` does with quote escaping
/// enabled.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

/// True when escaping `text` would leave it unchanged.
pub fn is_escape_invariant(text: &str) -> bool {
    !text.contains(['&', '<', '>', '"', '\''])
}

/// The text a scalar literal prints when output.
#[allow(
    clippy::wildcard_enum_match_arm,
    reason = "Only literals print a fixed text."
)]
pub fn scalar_output(expr: &Expr) -> Option<String> {
    match expr {
        Expr::String(value) => Some(value.clone()),
        Expr::Int(value) => Some(value.to_string()),
        Expr::Float(value) => Some(format_float(*value)),
        Expr::Bool(true) => Some("1".to_string()),
        Expr::Bool(false) | Expr::Null => Some(String::new()),
        _ => None,
    }
}

/// Significant digits of a float when it is output.
const FLOAT_PRECISION: i32 = 14;
const FLOAT_MANTISSA_DECIMALS: usize = 13;

/// Formats `value` like the language's `echo`: 14 significant digits,
/// trailing zeros dropped, exponent form outside `1e-4 ..= 1e14`.
fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NAN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "INF" } else { "-INF" }.to_string();
    }

    // Rounding to the precision first fixes the exponent, 9.99..e2 => 1e3.
    let scientific = format!("{:.*e}", FLOAT_MANTISSA_DECIMALS, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };

    if exponent < -4 || exponent >= FLOAT_PRECISION {
        let mut mantissa = mantissa.trim_end_matches('0').to_string();
        if mantissa.ends_with('.') {
            mantissa.push('0');
        }
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}E{}{}", mantissa, sign, exponent.unsigned_abs());
    }

    let decimals = usize::try_from(exponent.unsigned_abs())
        .map_or(0, |magnitude| {
            if exponent < 0 {
                FLOAT_MANTISSA_DECIMALS.saturating_add(magnitude)
            } else {
                FLOAT_MANTISSA_DECIMALS.saturating_sub(magnitude)
            }
        });
    let fixed = format!("{:.*}", decimals, value);
    if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        fixed
    }
}

/// Static classifier over output expressions.
#[derive(Debug, Clone, Copy)]
pub struct EscapeAnalyzer<'a> {
    escape_functions: &'a [String],
    safe_functions: &'a [String],
}

impl<'a> EscapeAnalyzer<'a> {
    pub fn new(escape_functions: &'a [String], safe_functions: &'a [String]) -> Self {
        Self {
            escape_functions,
            safe_functions,
        }
    }

    /// Function names are matched case-insensitively, like the language does.
    pub fn is_escape_function(&self, name: &str) -> bool {
        self.escape_functions
            .iter()
            .any(|f| f.eq_ignore_ascii_case(name))
    }

    pub fn is_safe_function(&self, name: &str) -> bool {
        self.safe_functions.iter().any(|f| f.eq_ignore_ascii_case(name))
    }

    /// The HTML-escapable form of `expr`, or `None` when no such form can be
    /// proven.
    ///
    /// - `htmlspecialchars($x)` => `$x`
    /// - `count($xs)` => `count($xs)`
    /// - `$c ? htmlspecialchars($a) : 0` => `$c ? $a : 0`
    /// - `$x`, `$c ? $y : htmlspecialchars($z)` => `None`
    #[allow(
        clippy::wildcard_enum_match_arm,
        reason = "Any other expression has no escapable form."
    )]
    pub fn escapable(&self, expr: &Expr) -> Option<Expr> {
        match expr {
            Expr::String(value) => is_escape_invariant(value).then(|| expr.clone()),
            Expr::Int(_) | Expr::Float(_) | Expr::Bool(_) | Expr::Null => Some(expr.clone()),
            Expr::Call { name, args } => {
                if self.is_escape_function(name) {
                    args.first().cloned()
                } else if self.is_safe_function(name) {
                    Some(expr.clone())
                } else {
                    None
                }
            }
            Expr::Binary {
                op: BinaryOp::Concat,
                left,
                right,
            } => {
                let left = self.escapable(left)?;
                let right = self.escapable(right)?;
                Some(Expr::concat(left, right))
            }
            Expr::Ternary {
                cond,
                then: Some(then),
                otherwise,
            } => {
                let then = self.escapable(then)?;
                let otherwise = self.escapable(otherwise)?;
                Some(Expr::ternary((**cond).clone(), then, otherwise))
            }
            Expr::Cast {
                kind: CastKind::String,
                expr: inner,
            } => Some(Expr::cast(CastKind::String, self.escapable(inner)?)),
            Expr::Cast { .. } => Some(expr.clone()),
            _ => None,
        }
    }
}
