pub mod ast;
mod engine;
mod error;
mod escape;
mod formatter;
mod interface;
mod merge;
pub mod naming;
pub mod printer;
mod scope;
mod template;

// Public exports.
pub use engine::{ViewBuilder, build_view};
pub use error::{Construct, TwigitError, TwigitResult};
pub use escape::{DEFAULT_ESCAPE_FUNCTIONS, DEFAULT_SAFE_FUNCTIONS, EscapeAnalyzer, escape_html};
pub use formatter::{JinjaFormatter, TemplateFormatter, TwigFormatter};
pub use interface::{TransformOptions, View, ViewBuilderInterface};
pub use merge::merge_scope_assignments;
pub use scope::{Scope, ScopeStack};
pub use template::{
    Block, ConditionalBlock, ConditionalCase, Html, OutputMode, TemplateNode, VariableIteratorBlock,
    VariableOutput,
};
