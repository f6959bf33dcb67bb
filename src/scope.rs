use std::collections::BTreeSet;

use crate::naming::unique_name;

/// One data-accumulation frame of the rewritten program.
///
/// The root frame accumulates into the view variable; every output-producing
/// loop gets a frame of its own whose structure is appended, once per
/// iteration, to a collection in the enclosing frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    /// The variable of the rewritten program this frame writes into.
    pub data_variable_name: String,
    /// Key under which this frame nests into its parent; `None` for the root.
    pub key_name: Option<String>,
    /// Names already claimed in this frame.
    pub value_names: BTreeSet<String>,
    /// Whether anything inside this frame or its descendants produced output.
    pub has_output: bool,
}

impl Scope {
    pub fn new<T: Into<String>>(data_variable_name: T, key_name: Option<String>) -> Self {
        Self {
            data_variable_name: data_variable_name.into(),
            key_name,
            value_names: BTreeSet::new(),
            has_output: false,
        }
    }

    /// Claim `name`, suffixed as needed to keep it unique in this frame.
    pub fn claim(&mut self, name: &str) -> String {
        let name = unique_name(name, |candidate| self.value_names.contains(candidate));
        self.value_names.insert(name.clone());
        name
    }

    /// A frame for one branch of a conditional: same target, same claimed
    /// names, no output yet.
    pub fn branch(&self, key_name: &str) -> Self {
        Self {
            data_variable_name: self.data_variable_name.clone(),
            key_name: Some(key_name.to_string()),
            value_names: self.value_names.clone(),
            has_output: false,
        }
    }

    /// Fold a finished branch frame back into this one.
    pub fn absorb(&mut self, branch: &Scope) {
        self.value_names
            .extend(branch.value_names.iter().cloned());
        self.has_output |= branch.has_output;
    }
}

/// The stack of frames live during a walk. The root frame is never popped.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    root: Scope,
    frames: Vec<Scope>,
}

impl ScopeStack {
    pub fn new(root: Scope) -> Self {
        Self {
            root,
            frames: Vec::new(),
        }
    }

    pub fn current(&self) -> &Scope {
        self.frames.last().unwrap_or(&self.root)
    }

    pub fn current_mut(&mut self) -> &mut Scope {
        match self.frames.last_mut() {
            Some(scope) => scope,
            None => &mut self.root,
        }
    }

    pub fn push(&mut self, scope: Scope) {
        self.frames.push(scope);
    }

    /// Pop the innermost frame; `None` when only the root is left.
    pub fn pop(&mut self) -> Option<Scope> {
        self.frames.pop()
    }

    /// The root frame, provided every pushed frame has been popped again.
    pub fn into_root(self) -> Option<Scope> {
        self.frames.is_empty().then_some(self.root)
    }
}
