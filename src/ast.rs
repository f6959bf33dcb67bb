//! The statement/expression tree of the source language.
//!
//! This is both the input and the output grammar of the transform: the
//! rewritten program is expressed with the same nodes. Nodes are plain owned
//! values; the transform never mutates its input and builds fresh trees
//! instead.

use std::collections::BTreeSet;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Literal markup outside of code, emitted as-is.
    InlineHtml(String),
    /// `echo a, b, ...;`
    Echo(Vec<Expr>),
    /// An expression used as a statement. `print x;` arrives here too.
    Expr(Expr),
    If(If),
    Switch(Switch),
    Foreach(Foreach),
    For(For),
    While(While),
    DoWhile(DoWhile),
    Break,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub cond: Expr,
    pub body: Vec<Stmt>,
    pub elseifs: Vec<ElseIf>,
    pub else_body: Option<Vec<Stmt>>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ElseIf {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Switch {
    pub subject: Expr,
    pub cases: Vec<Case>,
}

/// One `case test:` arm of a switch. A `None` test is the `default:` arm.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Foreach {
    pub subject: Expr,
    pub key: Option<Expr>,
    pub value: Expr,
    pub body: Vec<Stmt>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct For {
    pub init: Vec<Expr>,
    pub cond: Vec<Expr>,
    pub step: Vec<Expr>,
    pub body: Vec<Stmt>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct While {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DoWhile {
    pub body: Vec<Stmt>,
    pub cond: Expr,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Variable(String),
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    /// A double-quoted string with embedded expressions: `"a $b {$c->d}"`.
    Interpolated(Vec<InterpolatedPart>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// Compound assignment such as `$a += 1` or `$s .= "x"`.
    AssignOp {
        op: BinaryOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    IncDec {
        op: IncDecOp,
        target: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Property {
        object: Box<Expr>,
        name: String,
    },
    /// `$a[i]`, or the append slot `$a[]` when `index` is `None`.
    Index {
        array: Box<Expr>,
        index: Option<Box<Expr>>,
    },
    Array(Vec<ArrayItem>),
    Ternary {
        cond: Box<Expr>,
        /// `None` for the short form `a ?: b`.
        then: Option<Box<Expr>>,
        otherwise: Box<Expr>,
    },
    Cast {
        kind: CastKind,
        expr: Box<Expr>,
    },
    Isset(Vec<Expr>),
    Print(Box<Expr>),
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum InterpolatedPart {
    Literal(String),
    Expr(Expr),
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayItem {
    pub key: Option<Expr>,
    pub value: Expr,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    NotEq,
    Identical,
    NotIdentical,
    And,
    Or,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IncDecOp {
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CastKind {
    Int,
    Float,
    String,
    Bool,
}

impl Expr {
    pub fn var<T: Into<String>>(name: T) -> Self {
        Self::Variable(name.into())
    }

    pub fn string<T: Into<String>>(value: T) -> Self {
        Self::String(value.into())
    }

    pub fn call<T: Into<String>>(name: T, args: Vec<Expr>) -> Self {
        Self::Call {
            name: name.into(),
            args,
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn concat(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Concat, left, right)
    }

    pub fn not(expr: Expr) -> Self {
        Self::Unary {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::Assign {
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn property<T: Into<String>>(object: Expr, name: T) -> Self {
        Self::Property {
            object: Box::new(object),
            name: name.into(),
        }
    }

    /// `array[key]` with a string key.
    pub fn key<T: Into<String>>(array: Expr, key: T) -> Self {
        Self::Index {
            array: Box::new(array),
            index: Some(Box::new(Self::String(key.into()))),
        }
    }

    /// The append slot `array[]`.
    pub fn push_slot(array: Expr) -> Self {
        Self::Index {
            array: Box::new(array),
            index: None,
        }
    }

    pub fn cast(kind: CastKind, expr: Expr) -> Self {
        Self::Cast {
            kind,
            expr: Box::new(expr),
        }
    }

    pub fn ternary(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Self::Ternary {
            cond: Box::new(cond),
            then: Some(Box::new(then)),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn empty_array() -> Self {
        Self::Array(Vec::new())
    }

    /// Literal values that need no evaluation.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::String(_) | Self::Int(_) | Self::Float(_) | Self::Bool(_) | Self::Null
        )
    }

    /// True when the variable `name` appears anywhere in this expression.
    pub fn mentions_variable(&self, name: &str) -> bool {
        let mut found = false;
        self.visit(&mut |expr| {
            if matches!(expr, Expr::Variable(n) if n == name) {
                found = true;
            }
        });
        found
    }

    /// Pre-order visit of this expression and every sub-expression.
    pub fn visit<F: FnMut(&Expr)>(&self, f: &mut F) {
        f(self);
        match self {
            Self::Variable(_)
            | Self::String(_)
            | Self::Int(_)
            | Self::Float(_)
            | Self::Bool(_)
            | Self::Null => {}
            Self::Interpolated(parts) => {
                for part in parts {
                    if let InterpolatedPart::Expr(expr) = part {
                        expr.visit(f);
                    }
                }
            }
            Self::Binary { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Self::Unary { expr, .. } | Self::Cast { expr, .. } | Self::Print(expr) => {
                expr.visit(f)
            }
            Self::Assign { target, value } | Self::AssignOp { target, value, .. } => {
                target.visit(f);
                value.visit(f);
            }
            Self::IncDec { target, .. } => target.visit(f),
            Self::Call { args, .. } | Self::Isset(args) => {
                for arg in args {
                    arg.visit(f);
                }
            }
            Self::Property { object, .. } => object.visit(f),
            Self::Index { array, index } => {
                array.visit(f);
                if let Some(index) = index {
                    index.visit(f);
                }
            }
            Self::Array(items) => {
                for item in items {
                    if let Some(key) = &item.key {
                        key.visit(f);
                    }
                    item.value.visit(f);
                }
            }
            Self::Ternary {
                cond,
                then,
                otherwise,
            } => {
                cond.visit(f);
                if let Some(then) = then {
                    then.visit(f);
                }
                otherwise.visit(f);
            }
        }
    }
}

impl Stmt {
    pub fn echo(exprs: Vec<Expr>) -> Self {
        Self::Echo(exprs)
    }

    pub fn html<T: Into<String>>(text: T) -> Self {
        Self::InlineHtml(text.into())
    }

    /// `target = value;` as a statement.
    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::Expr(Expr::assign(target, value))
    }

    /// Visit every expression directly owned by this statement and, through
    /// nested bodies, every expression below it.
    pub fn visit_exprs<F: FnMut(&Expr)>(&self, f: &mut F) {
        match self {
            Self::InlineHtml(_) | Self::Break => {}
            Self::Echo(exprs) => {
                for expr in exprs {
                    expr.visit(f);
                }
            }
            Self::Expr(expr) => expr.visit(f),
            Self::If(node) => {
                node.cond.visit(f);
                visit_body(&node.body, f);
                for elseif in &node.elseifs {
                    elseif.cond.visit(f);
                    visit_body(&elseif.body, f);
                }
                if let Some(body) = &node.else_body {
                    visit_body(body, f);
                }
            }
            Self::Switch(node) => {
                node.subject.visit(f);
                for case in &node.cases {
                    if let Some(test) = &case.test {
                        test.visit(f);
                    }
                    visit_body(&case.body, f);
                }
            }
            Self::Foreach(node) => {
                node.subject.visit(f);
                if let Some(key) = &node.key {
                    key.visit(f);
                }
                node.value.visit(f);
                visit_body(&node.body, f);
            }
            Self::For(node) => {
                for expr in node.init.iter().chain(&node.cond).chain(&node.step) {
                    expr.visit(f);
                }
                visit_body(&node.body, f);
            }
            Self::While(node) => {
                node.cond.visit(f);
                visit_body(&node.body, f);
            }
            Self::DoWhile(node) => {
                visit_body(&node.body, f);
                node.cond.visit(f);
            }
        }
    }
}

fn visit_body<F: FnMut(&Expr)>(body: &[Stmt], f: &mut F) {
    for stmt in body {
        stmt.visit_exprs(f);
    }
}

/// Every variable name used anywhere in `stmts`.
pub fn collect_variable_names(stmts: &[Stmt]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for stmt in stmts {
        stmt.visit_exprs(&mut |expr| {
            if let Expr::Variable(name) = expr {
                names.insert(name.clone());
            }
        });
    }
    names
}
