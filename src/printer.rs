//! A compact source printer for the AST.
//!
//! Enough to read rewritten programs in tests, logs and documentation. Output
//! follows the source language's syntax but makes no attempt at preserving
//! the original formatting.

use std::fmt::{self, Display, Formatter, Write};

use crate::ast::{BinaryOp, CastKind, Expr, IncDecOp, InterpolatedPart, Stmt, UnaryOp};

const INDENT: &str = "    ";

/// Print a statement list, one statement per line.
pub fn print_program(stmts: &[Stmt]) -> String {
    let mut out = String::new();
    for stmt in stmts {
        // Writing into a String cannot fail.
        let _ = write_stmt(&mut out, stmt, 0);
    }
    out
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_expr(f, self)
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_stmt(&mut out, self, 0)?;
        f.write_str(out.trim_end_matches('\n'))
    }
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Concat => ".",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Identical => "===",
            Self::NotIdentical => "!==",
            Self::And => "&&",
            Self::Or => "||",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Self::Or => 3,
            Self::And => 4,
            Self::Eq | Self::NotEq | Self::Identical | Self::NotIdentical => 5,
            Self::Lt | Self::Lte | Self::Gt | Self::Gte => 6,
            Self::Concat => 7,
            Self::Add | Self::Sub => 8,
            Self::Mul | Self::Div | Self::Mod => 9,
        }
    }
}

impl CastKind {
    fn keyword(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Bool => "bool",
        }
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Assign { .. } | Expr::AssignOp { .. } | Expr::Print(_) => 1,
        Expr::Ternary { .. } => 2,
        Expr::Binary { op, .. } => op.precedence(),
        Expr::Unary { .. } | Expr::Cast { .. } | Expr::IncDec { .. } => 10,
        Expr::Variable(_)
        | Expr::String(_)
        | Expr::Int(_)
        | Expr::Float(_)
        | Expr::Bool(_)
        | Expr::Null
        | Expr::Interpolated(_)
        | Expr::Call { .. }
        | Expr::Property { .. }
        | Expr::Index { .. }
        | Expr::Array(_)
        | Expr::Isset(_) => 11,
    }
}

fn write_operand<W: Write>(out: &mut W, expr: &Expr, parenthesize: bool) -> fmt::Result {
    if parenthesize {
        out.write_char('(')?;
        write_expr(out, expr)?;
        out.write_char(')')
    } else {
        write_expr(out, expr)
    }
}

fn write_list<W: Write>(out: &mut W, exprs: &[Expr]) -> fmt::Result {
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write_expr(out, expr)?;
    }
    Ok(())
}

fn write_single_quoted<W: Write>(out: &mut W, value: &str) -> fmt::Result {
    out.write_char('\'')?;
    for c in value.chars() {
        match c {
            '\'' => out.write_str("\\'")?,
            '\\' => out.write_str("\\\\")?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('\'')
}

fn write_expr<W: Write>(out: &mut W, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Variable(name) => write!(out, "${}", name),
        Expr::String(value) => write_single_quoted(out, value),
        Expr::Int(value) => write!(out, "{}", value),
        Expr::Float(value) => write!(out, "{:?}", value),
        Expr::Bool(value) => out.write_str(if *value { "true" } else { "false" }),
        Expr::Null => out.write_str("null"),
        Expr::Interpolated(parts) => {
            out.write_char('"')?;
            for part in parts {
                match part {
                    InterpolatedPart::Literal(text) => {
                        for c in text.chars() {
                            match c {
                                '"' => out.write_str("\\\"")?,
                                '\\' => out.write_str("\\\\")?,
                                '$' => out.write_str("\\$")?,
                                '\n' => out.write_str("\\n")?,
                                '\t' => out.write_str("\\t")?,
                                c => out.write_char(c)?,
                            }
                        }
                    }
                    InterpolatedPart::Expr(expr) => {
                        out.write_char('{')?;
                        write_expr(out, expr)?;
                        out.write_char('}')?;
                    }
                }
            }
            out.write_char('"')
        }
        Expr::Binary { op, left, right } => {
            let own = op.precedence();
            write_operand(out, left, precedence(left) < own)?;
            write!(out, " {} ", op.symbol())?;
            write_operand(out, right, precedence(right) <= own)
        }
        Expr::Unary { op, expr: inner } => {
            out.write_str(match op {
                UnaryOp::Not => "!",
                UnaryOp::Neg => "-",
            })?;
            write_operand(out, inner, precedence(inner) < 10)
        }
        Expr::Assign { target, value } => {
            write_expr(out, target)?;
            out.write_str(" = ")?;
            write_expr(out, value)
        }
        Expr::AssignOp { op, target, value } => {
            write_expr(out, target)?;
            write!(out, " {}= ", op.symbol())?;
            write_expr(out, value)
        }
        Expr::IncDec { op, target } => match op {
            IncDecOp::PreInc => {
                out.write_str("++")?;
                write_expr(out, target)
            }
            IncDecOp::PreDec => {
                out.write_str("--")?;
                write_expr(out, target)
            }
            IncDecOp::PostInc => {
                write_expr(out, target)?;
                out.write_str("++")
            }
            IncDecOp::PostDec => {
                write_expr(out, target)?;
                out.write_str("--")
            }
        },
        Expr::Call { name, args } => {
            write!(out, "{}(", name)?;
            write_list(out, args)?;
            out.write_char(')')
        }
        Expr::Property { object, name } => {
            write_operand(out, object, precedence(object) < 11)?;
            write!(out, "->{}", name)
        }
        Expr::Index { array, index } => {
            write_operand(out, array, precedence(array) < 11)?;
            out.write_char('[')?;
            if let Some(index) = index {
                write_expr(out, index)?;
            }
            out.write_char(']')
        }
        Expr::Array(items) => {
            out.write_char('[')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                if let Some(key) = &item.key {
                    write_expr(out, key)?;
                    out.write_str(" => ")?;
                }
                write_expr(out, &item.value)?;
            }
            out.write_char(']')
        }
        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => {
            write_operand(out, cond, precedence(cond) <= 2)?;
            match then {
                Some(then) => {
                    out.write_str(" ? ")?;
                    write_operand(out, then, precedence(then) <= 2)?;
                    out.write_str(" : ")?;
                }
                None => out.write_str(" ?: ")?,
            }
            write_operand(out, otherwise, precedence(otherwise) <= 2)
        }
        Expr::Cast { kind, expr: inner } => {
            write!(out, "({})", kind.keyword())?;
            write_operand(out, inner, precedence(inner) < 10)
        }
        Expr::Isset(args) => {
            out.write_str("isset(")?;
            write_list(out, args)?;
            out.write_char(')')
        }
        Expr::Print(inner) => {
            out.write_str("print ")?;
            write_expr(out, inner)
        }
    }
}

fn write_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_body(out: &mut String, body: &[Stmt], depth: usize) -> fmt::Result {
    for stmt in body {
        write_stmt(out, stmt, depth)?;
    }
    Ok(())
}

fn write_stmt(out: &mut String, stmt: &Stmt, depth: usize) -> fmt::Result {
    write_indent(out, depth);
    match stmt {
        Stmt::InlineHtml(text) => writeln!(out, "?>{}<?php", text),
        Stmt::Echo(exprs) => {
            out.push_str("echo ");
            write_list(out, exprs)?;
            out.push_str(";\n");
            Ok(())
        }
        Stmt::Expr(expr) => writeln!(out, "{};", expr),
        Stmt::Break => writeln!(out, "break;"),
        Stmt::If(node) => {
            writeln!(out, "if ({}) {{", node.cond)?;
            write_body(out, &node.body, depth.saturating_add(1))?;
            for elseif in &node.elseifs {
                write_indent(out, depth);
                writeln!(out, "}} elseif ({}) {{", elseif.cond)?;
                write_body(out, &elseif.body, depth.saturating_add(1))?;
            }
            if let Some(body) = &node.else_body {
                write_indent(out, depth);
                writeln!(out, "}} else {{")?;
                write_body(out, body, depth.saturating_add(1))?;
            }
            write_indent(out, depth);
            writeln!(out, "}}")
        }
        Stmt::Switch(node) => {
            writeln!(out, "switch ({}) {{", node.subject)?;
            for case in &node.cases {
                write_indent(out, depth.saturating_add(1));
                match &case.test {
                    Some(test) => writeln!(out, "case {}:", test)?,
                    None => writeln!(out, "default:")?,
                }
                write_body(out, &case.body, depth.saturating_add(2))?;
            }
            write_indent(out, depth);
            writeln!(out, "}}")
        }
        Stmt::Foreach(node) => {
            write!(out, "foreach ({} as ", node.subject)?;
            if let Some(key) = &node.key {
                write!(out, "{} => ", key)?;
            }
            writeln!(out, "{}) {{", node.value)?;
            write_body(out, &node.body, depth.saturating_add(1))?;
            write_indent(out, depth);
            writeln!(out, "}}")
        }
        Stmt::For(node) => {
            out.push_str("for (");
            write_list(out, &node.init)?;
            out.push_str("; ");
            write_list(out, &node.cond)?;
            out.push_str("; ");
            write_list(out, &node.step)?;
            out.push_str(") {\n");
            write_body(out, &node.body, depth.saturating_add(1))?;
            write_indent(out, depth);
            writeln!(out, "}}")
        }
        Stmt::While(node) => {
            writeln!(out, "while ({}) {{", node.cond)?;
            write_body(out, &node.body, depth.saturating_add(1))?;
            write_indent(out, depth);
            writeln!(out, "}}")
        }
        Stmt::DoWhile(node) => {
            writeln!(out, "do {{")?;
            write_body(out, &node.body, depth.saturating_add(1))?;
            write_indent(out, depth);
            writeln!(out, "}} while ({});", node.cond)
        }
    }
}
