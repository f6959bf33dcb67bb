use std::collections::BTreeSet;
use std::slice;

use tracing::{debug, error, trace, warn};

use crate::ast::{self, BinaryOp, Case, DoWhile, ElseIf, Expr, For, Foreach, If, InterpolatedPart, Stmt, Switch, While};
use crate::error::{Construct, TwigitError, TwigitResult};
use crate::escape::{EscapeAnalyzer, escape_html, scalar_output};
use crate::interface::{TransformOptions, View, ViewBuilderInterface};
use crate::merge::merge_scope_assignments;
use crate::naming::{condition_name, output_name, unique_name, variable_name};
use crate::scope::{Scope, ScopeStack};
use crate::template::{
    Block, ConditionalBlock, ConditionalCase, OutputMode, TemplateNode, VariableIteratorBlock,
};

/// `ViewBuilder` is the primary implementation of the `ViewBuilderInterface`
/// trait.
///
/// Every call to `build_view` walks the program once, rewriting output
/// statements into assignments while building the template that renders
/// them.
///
/// # Examples
///
/// ```
/// use twigit::ast::{Expr, Stmt};
/// use twigit::{TwigFormatter, ViewBuilder, ViewBuilderInterface};
///
/// // echo "Hello " . $name;
/// let program = vec![Stmt::echo(vec![Expr::concat(
///     Expr::string("Hello "),
///     Expr::var("name"),
/// )])];
///
/// let view = ViewBuilder::new().build_view(&program).unwrap();
///
/// assert_eq!(view.code_text(), "$view = ['name' => $name];\n");
/// assert_eq!(view.render_template(&TwigFormatter), "Hello {{ name | raw }}");
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewBuilder {
    options: TransformOptions,
}

impl ViewBuilder {
    /// Creates a builder with the default [`TransformOptions`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: TransformOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }
}

impl ViewBuilderInterface for ViewBuilder {
    /// Separates `program` into a data-gathering program and a template.
    ///
    /// # Returns
    ///
    /// * `Ok(View)` holding the rewritten code and the template tree
    /// * `Err(TwigitError::UnsupportedConstruct)` if the program's output
    ///   cannot be attributed statically
    /// * `Err(TwigitError::InvariantViolation)` on an internal inconsistency
    fn build_view(&self, program: &[Stmt]) -> TwigitResult<View> {
        Processor::new(&self.options, program).process(program)
    }
}

/// Transform `program` with the default options.
pub fn build_view(program: &[Stmt]) -> TwigitResult<View> {
    ViewBuilder::new().build_view(program)
}

/// A frame of the template stack.
#[derive(Debug)]
enum Frame {
    Block(Block),
    Conditional(ConditionalBlock),
    Iterator(VariableIteratorBlock),
}

impl Frame {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Block(_) => "block",
            Self::Conditional(_) => "conditional",
            Self::Iterator(_) => "iterator",
        }
    }
}

/// One guarded branch of a conditional, with the condition its flag is
/// named after.
struct Branch<'s> {
    cond: Expr,
    body: &'s [Stmt],
}

/// Rewritten bodies of a conditional, in source order, and which of them
/// produced output.
struct ConditionalOutcome {
    bodies: Vec<Vec<Stmt>>,
    kept: Vec<bool>,
    else_body: Option<Vec<Stmt>>,
    else_kept: bool,
}

/// What a loop accumulates into and what it calls one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LoopDescriptor {
    collection: String,
    local: String,
}

struct LoopOutcome {
    /// `$parent['collection'] = [];`, placed right before the loop.
    init: Stmt,
    body: Vec<Stmt>,
}

impl LoopDescriptor {
    fn for_each(node: &Foreach) -> Self {
        let local = if let Expr::Variable(_) = &node.value {
            variable_name(&node.value)
        } else {
            String::new()
        };
        Self {
            collection: variable_name(&node.subject),
            local: non_empty_or(local, "item"),
        }
    }

    fn for_loop(node: &For) -> Self {
        let local = if let Some(Expr::Assign { target, .. }) = node.init.first() {
            variable_name(target)
        } else {
            String::new()
        };
        Self::from_local(non_empty_or(local, "item"))
    }

    /// `while` and `do-while` loops, described by their condition.
    fn conditional(cond: &Expr, max_condition_length: usize) -> Self {
        if let Expr::Assign { target, .. } = cond {
            let local = variable_name(target);
            if !local.is_empty() {
                return Self::from_local(local);
            }
        }
        Self {
            collection: format!("{}_steps", condition_name(cond, max_condition_length)),
            local: "step".to_string(),
        }
    }

    fn from_local(local: String) -> Self {
        Self {
            collection: format!("{}s", local),
            local,
        }
    }
}

fn non_empty_or(name: String, fallback: &str) -> String {
    if name.is_empty() {
        fallback.to_string()
    } else {
        name
    }
}

fn flag_assignment(data_variable: &str, flag: &str) -> Stmt {
    Stmt::assign(Expr::key(Expr::var(data_variable), flag), Expr::Bool(true))
}

fn reject(construct: Construct) -> TwigitError {
    warn!(%construct, "rejecting program");
    TwigitError::unsupported(construct)
}

fn broken<T: Into<String>>(message: T) -> TwigitError {
    let message = message.into();
    error!("internal invariant violated: {}", message);
    TwigitError::invariant(message)
}

fn unexpected_frame(expected: &str, found: Option<&Frame>) -> TwigitError {
    broken(format!(
        "expected a {} frame, found {}",
        expected,
        found.map_or("an empty stack", Frame::kind)
    ))
}

fn is_output_buffering(name: &str) -> bool {
    name.get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("ob_"))
}

/// Reject expressions whose output cannot be attributed statically.
fn check_expr(expr: &Expr) -> TwigitResult<()> {
    let mut found = None;
    expr.visit(&mut |e| {
        if found.is_some() {
            return;
        }
        if let Expr::Call { name, .. } = e {
            if is_output_buffering(name) {
                found = Some(Construct::OutputBuffering {
                    function: name.clone(),
                });
            }
        } else if let Expr::Print(_) = e {
            found = Some(Construct::PrintAsValue);
        }
    });

    match found {
        Some(construct) => Err(reject(construct)),
        None => Ok(()),
    }
}

/// True when `stmts` contain a `break` that leaves the enclosing loop, i.e.
/// one not nested in a switch or an inner loop.
fn has_early_exit(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Stmt::Break => true,
        Stmt::If(node) => {
            has_early_exit(&node.body)
                || node.elseifs.iter().any(|elseif| has_early_exit(&elseif.body))
                || node.else_body.as_deref().is_some_and(has_early_exit)
        }
        Stmt::InlineHtml(_)
        | Stmt::Echo(_)
        | Stmt::Expr(_)
        | Stmt::Switch(_)
        | Stmt::Foreach(_)
        | Stmt::For(_)
        | Stmt::While(_)
        | Stmt::DoWhile(_) => false,
    })
}

/// True when a switch case body can leave the switch before its final
/// statement.
fn leaves_case_early(body: &[Stmt]) -> bool {
    match body.split_last() {
        Some((Stmt::Break, rest)) => has_early_exit(rest),
        Some(_) | None => has_early_exit(body),
    }
}

/// The state of one transform. Created per call and dropped with it, so a
/// failed call leaves nothing behind.
struct Processor<'a> {
    options: &'a TransformOptions,
    analyzer: EscapeAnalyzer<'a>,
    /// Every identifier of the input plus the data variables handed out.
    used_names: BTreeSet<String>,
    blocks: Vec<Frame>,
    scopes: ScopeStack,
}

impl<'a> Processor<'a> {
    fn new(options: &'a TransformOptions, program: &[Stmt]) -> Self {
        let mut used_names = ast::collect_variable_names(program);
        let root = unique_name(&options.root_variable, |name| used_names.contains(name));
        used_names.insert(root.clone());

        Self {
            options,
            analyzer: EscapeAnalyzer::new(&options.escape_functions, &options.safe_functions),
            used_names,
            blocks: vec![Frame::Block(Block::new())],
            scopes: ScopeStack::new(Scope::new(root, None)),
        }
    }

    fn process(mut self, program: &[Stmt]) -> TwigitResult<View> {
        debug!(statements = program.len(), "building view");

        let walked = self.walk_stmts(program)?;
        let template = self.pop_block()?;
        if let Some(frame) = self.blocks.last() {
            return Err(broken(format!(
                "{} frame left on the template stack",
                frame.kind()
            )));
        }
        let root = self
            .scopes
            .into_root()
            .ok_or_else(|| broken("scope frames left on the scope stack"))?;

        let data_variable_name = root.data_variable_name;
        let mut code = Vec::with_capacity(walked.len().saturating_add(1));
        code.push(Stmt::assign(
            Expr::var(data_variable_name.as_str()),
            Expr::empty_array(),
        ));
        code.extend(walked);
        if self.options.merge_assignments {
            code = merge_scope_assignments(code, &data_variable_name);
        }

        debug!(
            data_variable = %data_variable_name,
            values = root.value_names.len(),
            has_output = root.has_output,
            "view built"
        );
        Ok(View {
            data_variable_name,
            code,
            template,
        })
    }

    fn walk_stmts(&mut self, stmts: &[Stmt]) -> TwigitResult<Vec<Stmt>> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            self.walk_stmt(stmt, &mut out)?;
        }
        Ok(out)
    }

    fn walk_stmt(&mut self, stmt: &Stmt, out: &mut Vec<Stmt>) -> TwigitResult<()> {
        match stmt {
            Stmt::InlineHtml(text) => self.emit_html(text.clone()),
            Stmt::Echo(exprs) => self.enter_output(exprs, out),
            Stmt::Expr(Expr::Print(expr)) => self.enter_output(slice::from_ref(expr.as_ref()), out),
            Stmt::Expr(expr) => {
                check_expr(expr)?;
                out.push(stmt.clone());
                Ok(())
            }
            Stmt::If(node) => self.walk_if(node, out),
            Stmt::Switch(node) => self.walk_switch(node, out),
            Stmt::Foreach(node) => {
                check_expr(&node.subject)?;
                if let Some(key) = &node.key {
                    check_expr(key)?;
                }
                check_expr(&node.value)?;

                let outcome = self.walk_loop(LoopDescriptor::for_each(node), &node.body)?;
                out.push(outcome.init);
                out.push(Stmt::Foreach(Foreach {
                    subject: node.subject.clone(),
                    key: node.key.clone(),
                    value: node.value.clone(),
                    body: outcome.body,
                }));
                Ok(())
            }
            Stmt::For(node) => {
                for expr in node.init.iter().chain(&node.cond).chain(&node.step) {
                    check_expr(expr)?;
                }

                let outcome = self.walk_loop(LoopDescriptor::for_loop(node), &node.body)?;
                out.push(outcome.init);
                out.push(Stmt::For(For {
                    init: node.init.clone(),
                    cond: node.cond.clone(),
                    step: node.step.clone(),
                    body: outcome.body,
                }));
                Ok(())
            }
            Stmt::While(node) => {
                check_expr(&node.cond)?;

                let descriptor =
                    LoopDescriptor::conditional(&node.cond, self.options.max_condition_length);
                let outcome = self.walk_loop(descriptor, &node.body)?;
                out.push(outcome.init);
                out.push(Stmt::While(While {
                    cond: node.cond.clone(),
                    body: outcome.body,
                }));
                Ok(())
            }
            Stmt::DoWhile(node) => {
                check_expr(&node.cond)?;

                let descriptor =
                    LoopDescriptor::conditional(&node.cond, self.options.max_condition_length);
                let outcome = self.walk_loop(descriptor, &node.body)?;
                out.push(outcome.init);
                out.push(Stmt::DoWhile(DoWhile {
                    body: outcome.body,
                    cond: node.cond.clone(),
                }));
                Ok(())
            }
            Stmt::Break => {
                out.push(Stmt::Break);
                Ok(())
            }
        }
    }

    /// The local name of the innermost loop, which qualifies template
    /// references made inside it.
    fn loop_local(&self) -> Option<String> {
        self.blocks.iter().rev().find_map(|frame| match frame {
            Frame::Iterator(iterator) => Some(iterator.local_name.clone()),
            Frame::Block(_) | Frame::Conditional(_) => None,
        })
    }

    fn append_node(&mut self, node: TemplateNode) -> TwigitResult<()> {
        match self.blocks.last_mut() {
            Some(Frame::Block(block)) => block.push(node),
            Some(Frame::Iterator(iterator)) => iterator.body.push(node),
            Some(Frame::Conditional(_)) => {
                return Err(broken("output reached a conditional outside of its cases"));
            }
            None => return Err(broken("template stack is empty")),
        }
        Ok(())
    }

    fn pop_block(&mut self) -> TwigitResult<Block> {
        match self.blocks.pop() {
            Some(Frame::Block(block)) => Ok(block),
            other => Err(unexpected_frame("block", other.as_ref())),
        }
    }

    fn pop_conditional(&mut self) -> TwigitResult<ConditionalBlock> {
        match self.blocks.pop() {
            Some(Frame::Conditional(conditional)) => Ok(conditional),
            other => Err(unexpected_frame("conditional", other.as_ref())),
        }
    }

    fn pop_iterator(&mut self) -> TwigitResult<VariableIteratorBlock> {
        match self.blocks.pop() {
            Some(Frame::Iterator(iterator)) => Ok(iterator),
            other => Err(unexpected_frame("iterator", other.as_ref())),
        }
    }

    fn current_conditional(&mut self) -> TwigitResult<&mut ConditionalBlock> {
        match self.blocks.last_mut() {
            Some(Frame::Conditional(conditional)) => Ok(conditional),
            other => Err(unexpected_frame("conditional", other.as_deref())),
        }
    }

    fn pop_scope(&mut self) -> TwigitResult<Scope> {
        self.scopes
            .pop()
            .ok_or_else(|| broken("attempted to pop the root scope"))
    }

    fn emit_html(&mut self, text: String) -> TwigitResult<()> {
        self.scopes.current_mut().has_output = true;
        if text.is_empty() {
            return Ok(());
        }
        trace!(length = text.len(), "html output");
        self.append_node(TemplateNode::html(text))
    }

    fn enter_output(&mut self, exprs: &[Expr], out: &mut Vec<Stmt>) -> TwigitResult<()> {
        for expr in exprs {
            check_expr(expr)?;
        }

        let mut parts = Vec::new();
        for expr in exprs {
            self.unwrap_parts(expr, &mut parts);
        }

        self.scopes.current_mut().has_output = true;
        for part in parts {
            self.emit_part(part, out)?;
        }
        Ok(())
    }

    /// Split an output expression into the pieces it prints one after the
    /// other. An escaping call is distributed over the pieces of its first
    /// argument.
    fn unwrap_parts(&self, expr: &Expr, parts: &mut Vec<Expr>) {
        match expr {
            Expr::Binary {
                op: BinaryOp::Concat,
                left,
                right,
            } => {
                self.unwrap_parts(left, parts);
                self.unwrap_parts(right, parts);
            }
            Expr::Interpolated(pieces) => {
                for piece in pieces {
                    match piece {
                        InterpolatedPart::Literal(text) if text.is_empty() => {}
                        InterpolatedPart::Literal(text) => parts.push(Expr::string(text.as_str())),
                        InterpolatedPart::Expr(inner) => self.unwrap_parts(inner, parts),
                    }
                }
            }
            Expr::Call { name, args } if self.analyzer.is_escape_function(name) => {
                let Some((first, rest)) = args.split_first() else {
                    parts.push(expr.clone());
                    return;
                };

                let mut inner = Vec::new();
                self.unwrap_parts(first, &mut inner);
                for piece in inner {
                    let mut args = Vec::with_capacity(args.len());
                    args.push(piece);
                    args.extend(rest.iter().cloned());
                    parts.push(Expr::call(name.as_str(), args));
                }
            }
            other => parts.push(other.clone()),
        }
    }

    fn emit_part(&mut self, part: Expr, out: &mut Vec<Stmt>) -> TwigitResult<()> {
        if let Expr::String(text) = part {
            return self.emit_html(text);
        }

        let (value, mode) = match self.analyzer.escapable(&part) {
            Some(form) => match scalar_output(&form) {
                // Constants are escaped now rather than at render time.
                Some(text) => return self.emit_html(escape_html(&text)),
                None => (form, OutputMode::Safe),
            },
            None => (part, OutputMode::Raw),
        };

        let scope_name = self.loop_local();
        let preferred = output_name(&variable_name(&value), scope_name.as_deref());
        let scope = self.scopes.current_mut();
        let name = scope.claim(&preferred);
        let target = Expr::key(Expr::var(scope.data_variable_name.as_str()), name.as_str());

        trace!(%name, ?mode, "value output");
        self.append_node(TemplateNode::variable(
            name,
            scope_name.as_deref(),
            mode,
        ))?;
        out.push(Stmt::assign(target, value));
        Ok(())
    }

    fn walk_if(&mut self, node: &If, out: &mut Vec<Stmt>) -> TwigitResult<()> {
        check_expr(&node.cond)?;
        for elseif in &node.elseifs {
            check_expr(&elseif.cond)?;
        }

        let mut branches = Vec::with_capacity(node.elseifs.len().saturating_add(1));
        branches.push(Branch {
            cond: node.cond.clone(),
            body: &node.body,
        });
        branches.extend(node.elseifs.iter().map(|elseif| Branch {
            cond: elseif.cond.clone(),
            body: &elseif.body,
        }));

        let outcome = self.walk_conditional(branches, node.else_body.as_deref())?;
        let mut bodies = outcome.bodies.into_iter();
        let body = bodies.next().unwrap_or_default();
        let elseifs = node
            .elseifs
            .iter()
            .zip(bodies)
            .map(|(elseif, body)| ElseIf {
                cond: elseif.cond.clone(),
                body,
            })
            .collect();

        out.push(Stmt::If(If {
            cond: node.cond.clone(),
            body,
            elseifs,
            else_body: outcome.else_body,
        }));
        Ok(())
    }

    fn walk_switch(&mut self, node: &Switch, out: &mut Vec<Stmt>) -> TwigitResult<()> {
        check_expr(&node.subject)?;
        let last = node.cases.len().saturating_sub(1);
        for (i, case) in node.cases.iter().enumerate() {
            if let Some(test) = &case.test {
                check_expr(test)?;
            }
            if i < last && !matches!(case.body.last(), Some(Stmt::Break)) {
                return Err(reject(Construct::SwitchFallthrough { case_index: i }));
            }
        }

        // Only one `default` is meaningful; the language rejects a second.
        let mut branches = Vec::with_capacity(node.cases.len());
        let mut tested = Vec::with_capacity(node.cases.len());
        let mut default = None;
        for (i, case) in node.cases.iter().enumerate() {
            match &case.test {
                Some(test) => {
                    branches.push(Branch {
                        cond: Expr::binary(BinaryOp::Eq, node.subject.clone(), test.clone()),
                        body: &case.body,
                    });
                    tested.push((i, case.body.as_slice()));
                }
                None if default.is_none() => default = Some((i, case.body.as_slice())),
                None => {}
            }
        }

        let outcome = self.walk_conditional(branches, default.map(|(_, body)| body))?;

        // The flag is set on entry to the case, so a case that renders
        // output must not be left before its end.
        let rendered = tested
            .into_iter()
            .zip(outcome.kept.iter().copied())
            .chain(default.map(|case| (case, outcome.else_kept)));
        for ((case_index, body), kept) in rendered {
            if kept && leaves_case_early(body) {
                return Err(reject(Construct::EarlySwitchExit { case_index }));
            }
        }

        let mut bodies = outcome.bodies.into_iter();
        let mut default_body = outcome.else_body;
        let cases = node
            .cases
            .iter()
            .filter_map(|case| match &case.test {
                Some(test) => Some(Case {
                    test: Some(test.clone()),
                    body: bodies.next().unwrap_or_default(),
                }),
                None => default_body.take().map(|body| Case { test: None, body }),
            })
            .collect();

        out.push(Stmt::Switch(Switch {
            subject: node.subject.clone(),
            cases,
        }));
        Ok(())
    }

    /// Walk each branch in a copy of the enclosing frame and keep, in the
    /// template, only the branches that produced output.
    fn walk_conditional(
        &mut self,
        branches: Vec<Branch<'_>>,
        else_body: Option<&[Stmt]>,
    ) -> TwigitResult<ConditionalOutcome> {
        let max_length = self.options.max_condition_length;
        let mut flags = Vec::with_capacity(branches.len());
        for branch in &branches {
            let flag = condition_name(&branch.cond, max_length);
            flags.push(self.scopes.current_mut().claim(&flag));
        }

        let snapshot = self.scopes.current().clone();
        let data_variable = snapshot.data_variable_name.as_str();
        let scope_name = self.loop_local();
        self.blocks.push(Frame::Conditional(ConditionalBlock {
            scope: scope_name,
            cases: Vec::new(),
            else_case: None,
        }));

        let mut bodies = Vec::with_capacity(branches.len());
        let mut kept = Vec::with_capacity(branches.len());
        let mut pruned = false;
        for (branch, flag) in branches.iter().zip(flags) {
            let (mut body, scope, block) = self.walk_branch(&snapshot, &flag, branch.body)?;
            self.scopes.current_mut().absorb(&scope);

            if scope.has_output {
                body.insert(0, flag_assignment(data_variable, &flag));
                self.current_conditional()?
                    .cases
                    .push(ConditionalCase { flag, block });
            } else {
                debug!(%flag, "pruning branch without output");
                pruned = true;
            }
            kept.push(scope.has_output);
            bodies.push(body);
        }

        let mut else_kept = false;
        let else_body = match else_body {
            Some(stmts) => {
                let (mut body, scope, block) = self.walk_branch(&snapshot, "else", stmts)?;
                self.scopes.current_mut().absorb(&scope);
                else_kept = scope.has_output;

                if !scope.has_output {
                    debug!("pruning else branch without output");
                } else if pruned || !self.current_conditional()?.has_cases() {
                    // A pruned case runs without output, so the else case
                    // can no longer be rendered for "no flag set".
                    let flag = self.scopes.current_mut().claim("otherwise");
                    debug!(%flag, "flagging else branch");
                    body.insert(0, flag_assignment(data_variable, &flag));
                    self.current_conditional()?
                        .cases
                        .push(ConditionalCase { flag, block });
                } else {
                    self.current_conditional()?.else_case = Some(block);
                }

                (!body.is_empty()).then_some(body)
            }
            None => None,
        };

        let conditional = self.pop_conditional()?;
        if conditional.has_cases() {
            self.append_node(TemplateNode::Conditional(conditional))?;
        } else {
            trace!("conditional without output dropped from template");
        }

        Ok(ConditionalOutcome {
            bodies,
            kept,
            else_body,
            else_kept,
        })
    }

    fn walk_branch(
        &mut self,
        snapshot: &Scope,
        key: &str,
        stmts: &[Stmt],
    ) -> TwigitResult<(Vec<Stmt>, Scope, Block)> {
        self.scopes.push(snapshot.branch(key));
        self.blocks.push(Frame::Block(Block::new()));

        let body = self.walk_stmts(stmts)?;

        let block = self.pop_block()?;
        let scope = self.pop_scope()?;
        Ok((body, scope, block))
    }

    fn walk_loop(&mut self, descriptor: LoopDescriptor, body: &[Stmt]) -> TwigitResult<LoopOutcome> {
        let parent_local = self.loop_local();
        let parent_variable = self.scopes.current().data_variable_name.clone();
        let collection = self
            .scopes
            .current_mut()
            .claim(&output_name(&descriptor.collection, parent_local.as_deref()));

        let preferred = format!("{}_{}", self.options.root_variable, descriptor.local);
        let data_variable = unique_name(&preferred, |name| self.used_names.contains(name));
        self.used_names.insert(data_variable.clone());

        trace!(%collection, local = %descriptor.local, %data_variable, "entering loop");
        self.blocks.push(Frame::Iterator(VariableIteratorBlock::new(
            collection.as_str(),
            descriptor.local.as_str(),
            parent_local,
        )));
        self.scopes.push(Scope::new(
            data_variable.as_str(),
            Some(collection.clone()),
        ));

        let walked = self.walk_stmts(body)?;

        let iterator = self.pop_iterator()?;
        let scope = self.pop_scope()?;
        self.scopes.current_mut().has_output |= scope.has_output;

        let slot = Expr::key(Expr::var(parent_variable), collection.as_str());
        let init = Stmt::assign(slot.clone(), Expr::empty_array());

        if !scope.has_output {
            debug!(%collection, "loop without output dropped from template");
            return Ok(LoopOutcome { init, body: walked });
        }
        if has_early_exit(body) {
            return Err(reject(Construct::EarlyLoopExit));
        }

        self.append_node(TemplateNode::Iterator(iterator))?;

        let mut rewritten = Vec::with_capacity(walked.len().saturating_add(2));
        if scope.value_names.is_empty() {
            rewritten.extend(walked);
            rewritten.push(Stmt::assign(Expr::push_slot(slot), Expr::empty_array()));
        } else {
            rewritten.push(Stmt::assign(
                Expr::var(data_variable.as_str()),
                Expr::empty_array(),
            ));
            rewritten.extend(walked);
            rewritten.push(Stmt::assign(
                Expr::push_slot(slot),
                Expr::var(data_variable.as_str()),
            ));
        }
        if self.options.merge_assignments {
            rewritten = merge_scope_assignments(rewritten, &data_variable);
        }

        Ok(LoopOutcome {
            init,
            body: rewritten,
        })
    }
}
