//! The template tree produced by the transform.
//!
//! Nodes reference values by name only; the rewritten program is what makes
//! those names exist, at the right nesting, at render time.

/// How a referenced value has to be treated when it is rendered.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum OutputMode {
    /// Pre-escaped or inherently safe; never escape again.
    Raw,
    /// The renderer must HTML-escape the value.
    #[default]
    Safe,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateNode {
    Html(Html),
    Variable(VariableOutput),
    Block(Block),
    Conditional(ConditionalBlock),
    Iterator(VariableIteratorBlock),
}

/// Literal output, opaque to escaping.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Html {
    pub text: String,
}

/// A single value reference, `scope.name`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableOutput {
    pub name: String,
    pub scope: Option<String>,
    pub mode: OutputMode,
}

/// Sequential composition.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub children: Vec<TemplateNode>,
}

/// One flagged branch of a [`ConditionalBlock`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalCase {
    pub flag: String,
    pub block: Block,
}

/// An if/elseif/else chain keyed by flag names.
///
/// Cases render in insertion order; the first as `if`, the rest as `elseif`.
/// The else case only renders when at least one case remains.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConditionalBlock {
    pub scope: Option<String>,
    pub cases: Vec<ConditionalCase>,
    pub else_case: Option<Block>,
}

/// A loop over `scope.iterated_name`, binding `local_name` per iteration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableIteratorBlock {
    pub iterated_name: String,
    pub local_name: String,
    pub scope: Option<String>,
    pub body: Block,
}

impl TemplateNode {
    pub fn html<T: Into<String>>(text: T) -> Self {
        Self::Html(Html { text: text.into() })
    }

    pub fn variable<T: Into<String>>(name: T, scope: Option<&str>, mode: OutputMode) -> Self {
        Self::Variable(VariableOutput {
            name: name.into(),
            scope: scope.map(str::to_string),
            mode,
        })
    }
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: TemplateNode) {
        // Adjacent literal text is kept as one node.
        if let (TemplateNode::Html(next), Some(TemplateNode::Html(last))) =
            (&node, self.children.last_mut())
        {
            last.text.push_str(&next.text);
            return;
        }
        self.children.push(node);
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Every `VariableOutput` in this block and below it, depth first.
    pub fn variables(&self) -> Vec<&VariableOutput> {
        let mut found = Vec::new();
        collect_variables(&self.children, &mut found);
        found
    }
}

impl ConditionalBlock {
    pub fn has_cases(&self) -> bool {
        !self.cases.is_empty()
    }
}

impl VariableIteratorBlock {
    pub fn new<N: Into<String>, L: Into<String>>(
        iterated_name: N,
        local_name: L,
        scope: Option<String>,
    ) -> Self {
        Self {
            iterated_name: iterated_name.into(),
            local_name: local_name.into(),
            scope,
            body: Block::new(),
        }
    }
}

fn collect_variables<'a>(nodes: &'a [TemplateNode], found: &mut Vec<&'a VariableOutput>) {
    for node in nodes {
        match node {
            TemplateNode::Html(_) => {}
            TemplateNode::Variable(variable) => found.push(variable),
            TemplateNode::Block(block) => collect_variables(&block.children, found),
            TemplateNode::Conditional(conditional) => {
                for case in &conditional.cases {
                    collect_variables(&case.block.children, found);
                }
                if let Some(block) = &conditional.else_case {
                    collect_variables(&block.children, found);
                }
            }
            TemplateNode::Iterator(iterator) => collect_variables(&iterator.body.children, found),
        }
    }
}
