use crate::template::{Block, ConditionalBlock, OutputMode, TemplateNode, VariableIteratorBlock};

/// Turns a template tree into the text of a concrete template language.
pub trait TemplateFormatter {
    /// Render `node` and everything below it.
    fn format_template(&self, node: &TemplateNode) -> String;

    /// Render a root block, as found in [`crate::View::template`].
    fn format_block(&self, block: &Block) -> String {
        let mut out = String::new();
        for child in &block.children {
            out.push_str(&self.format_template(child));
        }
        out
    }
}

/// The tokens that differ between template dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Syntax {
    elseif: &'static str,
    raw_filter: &'static str,
    /// Tag name of a block whose content is not interpreted.
    verbatim: &'static str,
    /// Emitted after every control tag.
    tag_suffix: &'static str,
}

/// Twig syntax: `{% elseif %}`, `{{ x | raw }}`.
///
/// A line break follows every control tag; Twig removes the first newline
/// after a tag, so the rendered output is unaffected. Markup that looks like
/// template syntax is wrapped in `{% verbatim %}`, with no line breaks.
#[derive(Debug, Default, Clone, Copy)]
pub struct TwigFormatter;

/// Jinja syntax: `{% elif %}`, `{{ x | safe }}`, no line breaks added.
/// Markup that looks like template syntax is wrapped in `{% raw %}`.
///
/// Raw values are printed the way Jinja prints them, which differs from the
/// source language for non-strings: `true`, `false` and `none` instead of
/// `1` and the empty string. Data meant for this dialect should hold
/// booleans and nulls already converted to strings.
///
/// # Examples
///
/// ```
/// use twigit::{Block, JinjaFormatter, OutputMode, TemplateFormatter, TemplateNode};
///
/// let mut block = Block::new();
/// block.push(TemplateNode::html("Hello "));
/// block.push(TemplateNode::variable("name", None, OutputMode::Raw));
///
/// assert_eq!(JinjaFormatter.format_block(&block), "Hello {{ name | safe }}");
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct JinjaFormatter;

const TWIG: Syntax = Syntax {
    elseif: "elseif",
    raw_filter: "raw",
    verbatim: "verbatim",
    tag_suffix: "\n",
};

const JINJA: Syntax = Syntax {
    elseif: "elif",
    raw_filter: "safe",
    verbatim: "raw",
    tag_suffix: "",
};

impl TemplateFormatter for TwigFormatter {
    fn format_template(&self, node: &TemplateNode) -> String {
        let mut out = String::new();
        render_node(node, &TWIG, &mut out);
        out
    }
}

impl TemplateFormatter for JinjaFormatter {
    fn format_template(&self, node: &TemplateNode) -> String {
        let mut out = String::new();
        render_node(node, &JINJA, &mut out);
        out
    }
}

fn qualified(scope: Option<&str>, name: &str) -> String {
    match scope {
        Some(scope) if !scope.is_empty() => format!("{}.{}", scope, name),
        Some(_) | None => name.to_string(),
    }
}

fn render_node(node: &TemplateNode, syntax: &Syntax, out: &mut String) {
    match node {
        TemplateNode::Html(html) => render_html(&html.text, syntax, out),
        TemplateNode::Variable(variable) => {
            out.push_str("{{ ");
            out.push_str(&qualified(variable.scope.as_deref(), &variable.name));
            if variable.mode == OutputMode::Raw {
                out.push_str(" | ");
                out.push_str(syntax.raw_filter);
            }
            out.push_str(" }}");
        }
        TemplateNode::Block(block) => render_block(block, syntax, out),
        TemplateNode::Conditional(conditional) => render_conditional(conditional, syntax, out),
        TemplateNode::Iterator(iterator) => render_iterator(iterator, syntax, out),
    }
}

/// True when `text` would be read as template syntax, alone or together with
/// a tag that follows it.
fn needs_verbatim(text: &str) -> bool {
    ["{{", "{%", "{#"].iter().any(|open| text.contains(open)) || text.ends_with('{')
}

fn render_html(text: &str, syntax: &Syntax, out: &mut String) {
    if !needs_verbatim(text) {
        out.push_str(text);
        return;
    }
    out.push_str(&format!(
        "{{% {} %}}{}{{% end{} %}}",
        syntax.verbatim, text, syntax.verbatim
    ));
}

fn render_block(block: &Block, syntax: &Syntax, out: &mut String) {
    for child in &block.children {
        render_node(child, syntax, out);
    }
}

fn render_conditional(conditional: &ConditionalBlock, syntax: &Syntax, out: &mut String) {
    if !conditional.has_cases() {
        return;
    }

    let scope = conditional.scope.as_deref();
    for (i, case) in conditional.cases.iter().enumerate() {
        let keyword = if i == 0 { "if" } else { syntax.elseif };
        out.push_str(&format!(
            "{{% {} {} %}}{}",
            keyword,
            qualified(scope, &case.flag),
            syntax.tag_suffix
        ));
        render_block(&case.block, syntax, out);
    }
    if let Some(else_case) = &conditional.else_case {
        out.push_str("{% else %}");
        out.push_str(syntax.tag_suffix);
        render_block(else_case, syntax, out);
    }
    out.push_str("{% endif %}");
    out.push_str(syntax.tag_suffix);
}

fn render_iterator(iterator: &VariableIteratorBlock, syntax: &Syntax, out: &mut String) {
    out.push_str(&format!(
        "{{% for {} in {} %}}{}",
        iterator.local_name,
        qualified(iterator.scope.as_deref(), &iterator.iterated_name),
        syntax.tag_suffix
    ));
    render_block(&iterator.body, syntax, out);
    out.push_str("{% endfor %}");
    out.push_str(syntax.tag_suffix);
}
