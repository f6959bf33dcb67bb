use crate::ast::Stmt;
use crate::escape::{DEFAULT_ESCAPE_FUNCTIONS, DEFAULT_SAFE_FUNCTIONS};
use crate::formatter::TemplateFormatter;
use crate::naming::DEFAULT_MAX_CONDITION_LENGTH;
use crate::printer::print_program;
use crate::template::Block;

/// Knobs of the transform. The defaults match what the generated templates
/// expect: a `view` root structure and `htmlspecialchars`-style escaping.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransformOptions {
    /// Preferred name of the root data variable; suffixed when the program
    /// already uses it.
    pub root_variable: String,
    /// Run the code-merge pass over the rewritten program.
    pub merge_assignments: bool,
    /// Functions whose result is the HTML-escaped form of their first argument.
    pub escape_functions: Vec<String>,
    /// Functions whose result never needs escaping.
    pub safe_functions: Vec<String>,
    pub max_condition_length: usize,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            root_variable: "view".to_string(),
            merge_assignments: true,
            escape_functions: DEFAULT_ESCAPE_FUNCTIONS.iter().map(|s| s.to_string()).collect(),
            safe_functions: DEFAULT_SAFE_FUNCTIONS.iter().map(|s| s.to_string()).collect(),
            max_condition_length: DEFAULT_MAX_CONDITION_LENGTH,
        }
    }
}

impl TransformOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root_variable<T: Into<String>>(mut self, name: T) -> Self {
        self.root_variable = name.into();
        self
    }

    pub fn with_merge_assignments(mut self, merge: bool) -> Self {
        self.merge_assignments = merge;
        self
    }

    /// Register another escaping function, e.g. a framework's `e()` helper.
    pub fn with_escape_function<T: Into<String>>(mut self, name: T) -> Self {
        self.escape_functions.push(name.into());
        self
    }

    pub fn with_safe_function<T: Into<String>>(mut self, name: T) -> Self {
        self.safe_functions.push(name.into());
        self
    }

    pub fn with_max_condition_length(mut self, length: usize) -> Self {
        self.max_condition_length = length;
        self
    }
}

/// The two artifacts of one transform.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    /// The variable holding the data structure once `code` has run.
    pub data_variable_name: String,
    /// The rewritten program: same logic, no output.
    pub code: Vec<Stmt>,
    /// Renders the data structure built by `code`.
    pub template: Block,
}

impl View {
    /// `code` as source text.
    pub fn code_text(&self) -> String {
        print_program(&self.code)
    }

    pub fn render_template<F: TemplateFormatter>(&self, formatter: &F) -> String {
        formatter.format_block(&self.template)
    }
}

/// `ViewBuilderInterface` separates a program that mixes logic and markup
/// output into a data-gathering program and a template rendering its result.
pub trait ViewBuilderInterface {
    /// `build_view` transforms `program` into a [`View`].
    ///
    /// The input is never modified, and every call starts from a clean state.
    ///
    /// # Errors
    /// - If the program uses output buffering (`ob_*` calls).
    /// - If a switch case falls through into the next one.
    /// - If `print` is used as a value, or a `break` leaves an
    ///   output-producing loop early.
    fn build_view(&self, program: &[Stmt]) -> crate::TwigitResult<View>;
}
