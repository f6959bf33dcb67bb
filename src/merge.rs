//! Folding of the assignment runs the engine leaves behind.
//!
//! The engine emits one keyed assignment per output value. Directly after a
//! data variable is initialized these are folded into the array literal, and
//! a loop body that only builds and appends its structure collapses into a
//! single append.

use crate::ast::{ArrayItem, Case, ElseIf, Expr, If, Stmt, Switch};

/// Merge the assignments into `data_variable` found in `stmts`.
///
/// `$v = []; $v['a'] = $x; $v['b'] = 1;` becomes `$v = ['a' => $x, 'b' => 1];`
/// and `$v = [...]; $slot = $v;` becomes `$slot = [...];`.
pub fn merge_scope_assignments(stmts: Vec<Stmt>, data_variable: &str) -> Vec<Stmt> {
    let stmts = stmts
        .into_iter()
        .map(|stmt| merge_nested(stmt, data_variable))
        .collect();
    let stmts = fold_keyed_assignments(stmts, data_variable);
    collapse_single_append(stmts, data_variable)
}

fn merge_nested(stmt: Stmt, data_variable: &str) -> Stmt {
    match stmt {
        Stmt::If(node) => Stmt::If(If {
            cond: node.cond,
            body: merge_scope_assignments(node.body, data_variable),
            elseifs: node
                .elseifs
                .into_iter()
                .map(|elseif| ElseIf {
                    cond: elseif.cond,
                    body: merge_scope_assignments(elseif.body, data_variable),
                })
                .collect(),
            else_body: node
                .else_body
                .map(|body| merge_scope_assignments(body, data_variable)),
        }),
        Stmt::Switch(node) => Stmt::Switch(Switch {
            subject: node.subject,
            cases: node
                .cases
                .into_iter()
                .map(|case| Case {
                    test: case.test,
                    body: merge_scope_assignments(case.body, data_variable),
                })
                .collect(),
        }),
        other => other,
    }
}

fn is_variable(expr: &Expr, name: &str) -> bool {
    matches!(expr, Expr::Variable(n) if n == name)
}

/// The items of `$v = [...]`, when `stmt` is exactly that.
fn literal_items_mut<'a>(stmt: &'a mut Stmt, data_variable: &str) -> Option<&'a mut Vec<ArrayItem>> {
    let Stmt::Expr(Expr::Assign { target, value }) = stmt else {
        return None;
    };
    if !is_variable(target, data_variable) {
        return None;
    }
    if let Expr::Array(items) = value.as_mut() {
        Some(items)
    } else {
        None
    }
}

/// The key of `$v['k']` (or `$v[3]`).
fn keyed_slot<'a>(target: &'a Expr, data_variable: &str) -> Option<&'a Expr> {
    let Expr::Index {
        array,
        index: Some(key),
    } = target
    else {
        return None;
    };
    (is_variable(array, data_variable) && matches!(key.as_ref(), Expr::String(_) | Expr::Int(_)))
        .then_some(key.as_ref())
}

fn fold_keyed_assignments(stmts: Vec<Stmt>, data_variable: &str) -> Vec<Stmt> {
    let mut out: Vec<Stmt> = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        let Some(items) = out
            .last_mut()
            .and_then(|last| literal_items_mut(last, data_variable))
        else {
            out.push(stmt);
            continue;
        };

        match stmt {
            Stmt::Expr(Expr::Assign { target, value }) => match keyed_slot(&target, data_variable) {
                // The value must not observe the partially built structure.
                Some(key) if !value.mentions_variable(data_variable) => items.push(ArrayItem {
                    key: Some(key.clone()),
                    value: *value,
                }),
                Some(_) | None => out.push(Stmt::Expr(Expr::Assign { target, value })),
            },
            other => out.push(other),
        }
    }
    out
}

fn collapse_single_append(stmts: Vec<Stmt>, data_variable: &str) -> Vec<Stmt> {
    let [first, second]: [Stmt; 2] = match stmts.try_into() {
        Ok(pair) => pair,
        Err(stmts) => return stmts,
    };

    match (first, second) {
        (
            Stmt::Expr(Expr::Assign {
                target: init,
                value: literal,
            }),
            Stmt::Expr(Expr::Assign {
                target: slot,
                value: source,
            }),
        ) if is_variable(&init, data_variable)
            && matches!(literal.as_ref(), Expr::Array(_))
            && is_variable(&source, data_variable)
            && !slot.mentions_variable(data_variable) =>
        {
            vec![Stmt::assign(*slot, *literal)]
        }
        (first, second) => vec![first, second],
    }
}
