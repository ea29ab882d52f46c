//! Stylesheet printing.
//!
//! Plain trees print as compact CSS. Trees that still hold runtime
//! conditionals or host expressions (`value()`, `eval()`, sprites) print as a
//! host-language expression: escaped CSS string literals concatenated with
//! `+`, runtime conditionals as `((cond) ? (...) : (...))`.

use crate::ast::{ConditionalBlock, Condition, Node, RuleKind, Ruleset, Stylesheet, Value};
use std::fmt::Write;

/// Operands per concatenation group. Bounds the depth of the `+` chain the
/// host compiler has to parse.
const CONCATENATION_CHUNK: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintedStylesheet {
    Css(String),
    Expression(String),
}

impl PrintedStylesheet {
    pub fn as_str(&self) -> &str {
        match self {
            PrintedStylesheet::Css(text) | PrintedStylesheet::Expression(text) => text,
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, PrintedStylesheet::Expression(_))
    }

    /// The output as a host expression; plain CSS becomes a string literal.
    pub fn to_expression(&self) -> String {
        match self {
            PrintedStylesheet::Css(css) => quote(css),
            PrintedStylesheet::Expression(expr) => expr.clone(),
        }
    }
}

pub fn print(stylesheet: &Stylesheet) -> PrintedStylesheet {
    let mut out = ExpressionBuilder::default();
    print_nodes(&stylesheet.root, &mut out);
    out.finish()
}

/// Escapes `text` for use inside a double-quoted host string literal.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out
}

fn quote(text: &str) -> String {
    format!("\"{}\"", escape(text))
}

/// Accumulates CSS text, switching to a concatenation once a host expression
/// shows up.
#[derive(Default)]
struct ExpressionBuilder {
    operands: Vec<String>,
    css: String,
    has_expression: bool,
}

impl ExpressionBuilder {
    fn push_css(&mut self, text: &str) {
        self.css.push_str(text);
    }

    fn push_expression(&mut self, expression: String) {
        self.flush();
        self.operands.push(format!("({})", expression));
        self.has_expression = true;
    }

    fn push_conditional(&mut self, conditional: String) {
        self.flush();
        self.operands.push(conditional);
        self.has_expression = true;
    }

    fn strip_trailing_semicolon(&mut self) {
        if self.css.ends_with(';') {
            self.css.pop();
        }
    }

    fn flush(&mut self) {
        if !self.css.is_empty() {
            let css = std::mem::take(&mut self.css);
            self.operands.push(quote(&css));
        }
    }

    fn finish(mut self) -> PrintedStylesheet {
        if !self.has_expression {
            return PrintedStylesheet::Css(self.css);
        }
        self.flush();
        PrintedStylesheet::Expression(concatenate(self.operands))
    }

    /// A branch of a runtime conditional: always an expression.
    fn finish_branch(self) -> String {
        match self.finish() {
            PrintedStylesheet::Css(css) => format!("({})", quote(&css)),
            PrintedStylesheet::Expression(expr) if expr.starts_with('(') => expr,
            PrintedStylesheet::Expression(expr) => format!("({})", expr),
        }
    }
}

fn concatenate(operands: Vec<String>) -> String {
    match operands.len() {
        0 => "\"\"".to_string(),
        1 => operands.into_iter().next().unwrap_or_default(),
        n if n <= CONCATENATION_CHUNK => format!("({})", operands.join(" + ")),
        _ => {
            let groups: Vec<String> = operands
                .chunks(CONCATENATION_CHUNK)
                .map(|chunk| format!("({})", chunk.join(" + ")))
                .collect();
            format!("({})", groups.join(" + "))
        }
    }
}

fn print_nodes(nodes: &[Node], out: &mut ExpressionBuilder) {
    for node in nodes {
        match node {
            Node::Ruleset(ruleset) => print_ruleset(ruleset, out),
            Node::Declaration(declaration) => {
                out.push_css(&declaration.property);
                out.push_css(":");
                print_value_list(&declaration.value, out);
                if declaration.important {
                    out.push_css(" !important");
                }
                out.push_css(";");
            }
            Node::ConditionalBlock(block) => {
                let conditional = print_conditional(block);
                out.push_conditional(conditional);
            }
            Node::AtRule(at_rule) => {
                out.push_css("@");
                out.push_css(&at_rule.name);
                if !at_rule.params.is_empty() {
                    out.push_css(" ");
                    print_value_list(&at_rule.params, out);
                }
                match &at_rule.block {
                    Some(block) => {
                        out.push_css("{");
                        print_nodes(block, out);
                        out.strip_trailing_semicolon();
                        out.push_css("}");
                    }
                    None => out.push_css(";"),
                }
            }
            Node::Definition(_) | Node::Comment(_) => {}
        }
    }
}

fn print_ruleset(ruleset: &Ruleset, out: &mut ExpressionBuilder) {
    for (i, selector) in ruleset.selectors.iter().enumerate() {
        if i > 0 {
            out.push_css(",");
        }
        out.push_css(&selector.to_string());
    }
    out.push_css("{");
    print_nodes(&ruleset.block, out);
    out.strip_trailing_semicolon();
    out.push_css("}");
}

/// `((c1) ? (b1) : (c2) ? (b2) : (else))`, `("")` standing in for a missing
/// `@else`.
fn print_conditional(block: &ConditionalBlock) -> String {
    let mut expr = String::from("(");
    let mut has_else = false;

    for rule in &block.rules {
        let mut branch = ExpressionBuilder::default();
        print_nodes(&rule.block, &mut branch);
        let branch = branch.finish_branch();

        if rule.kind == RuleKind::Else {
            expr.push_str(&branch);
            has_else = true;
            break;
        }

        let condition = match &rule.condition {
            Some(Condition::Runtime(runtime)) => runtime.expr.clone(),
            Some(Condition::Static(expr)) => expr.to_string(),
            None => "true".to_string(),
        };
        let _ = write!(expr, "({}) ? {} : ", condition, branch);
    }

    if !has_else {
        expr.push_str("(\"\")");
    }
    expr.push(')');
    expr
}

fn print_value_list(values: &[Value], out: &mut ExpressionBuilder) {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push_css(" ");
        }
        print_value(value, out);
    }
}

fn print_value(value: &Value, out: &mut ExpressionBuilder) {
    match value {
        Value::JavaExpression(expr) => out.push_expression(expr.expr.clone()),
        Value::DotPath(path) => out.push_expression(path.expression()),
        Value::Function(call) if value.is_expression() => {
            out.push_css(&call.name);
            out.push_css("(");
            for (i, arg) in call.args.iter().enumerate() {
                if i > 0 {
                    out.push_css(",");
                }
                print_value(arg, out);
            }
            out.push_css(")");
        }
        Value::Composite(composite) if value.is_expression() => {
            for (i, item) in composite.values.iter().enumerate() {
                if i > 0 {
                    out.push_css(composite.separator.as_str());
                }
                print_value(item, out);
            }
        }
        other => out.push_css(&other.to_string()),
    }
}
