use crate::emitter::escape;
use crate::error::Span;
use std::collections::BTreeSet;
use std::fmt;

/// A parsed stylesheet. Every pass mutates `root` in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Stylesheet {
    pub source_name: String,
    pub root: Vec<Node>,
}

impl Stylesheet {
    pub fn new(source_name: impl Into<String>, root: Vec<Node>) -> Self {
        Self {
            source_name: source_name.into(),
            root,
        }
    }
}

/// A child of a block: the root, a ruleset body, a conditional branch or an
/// at-rule body.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Ruleset(Ruleset),
    Declaration(Declaration),
    Definition(Definition),
    ConditionalBlock(ConditionalBlock),
    AtRule(UnknownAtRule),
    Comment(Comment),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ruleset {
    pub selectors: Vec<Selector>,
    pub block: Vec<Node>,
    pub comments: Vec<String>,
    pub span: Span,
}

impl Ruleset {
    pub fn has_comment(&self, marker: &str) -> bool {
        self.comments.iter().any(|c| c.contains(marker))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub parts: Vec<SelectorPart>,
}

impl Selector {
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            SelectorPart::Class(name) => Some(name.as_str()),
            SelectorPart::Text(_) => None,
        })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                SelectorPart::Class(name) => write!(f, ".{}", name)?,
                SelectorPart::Text(text) => f.write_str(text)?,
            }
        }
        Ok(())
    }
}

/// Selectors keep class names apart from the surrounding text so they can be
/// renamed without reparsing.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorPart {
    Class(String),
    Text(String),
}

pub type PropertyValue = Vec<Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: PropertyValue,
    pub important: bool,
    pub comments: Vec<String>,
    pub span: Span,
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: PropertyValue, span: Span) -> Self {
        Self {
            property: property.into(),
            value,
            important: false,
            comments: Vec::new(),
            span,
        }
    }

    pub fn has_comment(&self, marker: &str) -> bool {
        self.comments.iter().any(|c| c.contains(marker))
    }
}

/// `@def NAME params...;`
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    pub params: Vec<Value>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBlock {
    pub rules: Vec<ConditionalRule>,
    pub span: Span,
    /// Set on blocks holding at least one runtime rule.
    pub runtime: bool,
    /// Set once the eliminator rebuilt this block; it is not reprocessed.
    pub processed: bool,
}

impl ConditionalBlock {
    pub fn new(rules: Vec<ConditionalRule>, span: Span) -> Self {
        Self {
            rules,
            span,
            runtime: false,
            processed: false,
        }
    }

    pub fn has_runtime_rule(&self) -> bool {
        self.rules.iter().any(ConditionalRule::is_runtime)
    }

    pub fn has_else(&self) -> bool {
        self.rules.iter().any(|r| r.kind == RuleKind::Else)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    If,
    ElseIf,
    Else,
}

impl RuleKind {
    pub fn keyword(self) -> &'static str {
        match self {
            RuleKind::If => "if",
            RuleKind::ElseIf => "elseif",
            RuleKind::Else => "else",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalRule {
    pub kind: RuleKind,
    /// `None` only for `@else`.
    pub condition: Option<Condition>,
    pub block: Vec<Node>,
    pub span: Span,
}

impl ConditionalRule {
    pub fn is_runtime(&self) -> bool {
        matches!(self.condition, Some(Condition::Runtime(_)))
    }

    pub fn runtime_condition(&self) -> Option<&JavaExpression> {
        match &self.condition {
            Some(Condition::Runtime(expr)) => Some(expr),
            _ => None,
        }
    }

    pub fn into_else(self) -> Self {
        Self {
            kind: RuleKind::Else,
            condition: None,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Decided while compiling against the active condition names.
    Static(BoolExpr),
    /// Deferred to the host program; carries the `eval(...)` expression text.
    Runtime(JavaExpression),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoolExpr {
    True,
    False,
    Constant(String),
    Not(Box<BoolExpr>),
    And(Box<BoolExpr>, Box<BoolExpr>),
    Or(Box<BoolExpr>, Box<BoolExpr>),
}

impl BoolExpr {
    pub fn evaluate(&self, true_conditions: &BTreeSet<String>) -> bool {
        match self {
            BoolExpr::True => true,
            BoolExpr::False => false,
            BoolExpr::Constant(name) => true_conditions.contains(name),
            BoolExpr::Not(inner) => !inner.evaluate(true_conditions),
            BoolExpr::And(l, r) => l.evaluate(true_conditions) && r.evaluate(true_conditions),
            BoolExpr::Or(l, r) => l.evaluate(true_conditions) || r.evaluate(true_conditions),
        }
    }
}

impl fmt::Display for BoolExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolExpr::True => f.write_str("true"),
            BoolExpr::False => f.write_str("false"),
            BoolExpr::Constant(name) => f.write_str(name),
            BoolExpr::Not(inner) => write!(f, "!{}", inner),
            BoolExpr::And(l, r) => write!(f, "({} && {})", l, r),
            BoolExpr::Or(l, r) => write!(f, "({} || {})", l, r),
        }
    }
}

/// Any at-rule the compiler has no dedicated node for (`@external`,
/// `@media`, `@font-face`...).
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownAtRule {
    pub name: String,
    pub params: Vec<Value>,
    pub block: Option<Vec<Node>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Literal(String),
    String(StringLiteral),
    Numeric(Numeric),
    Function(FunctionCall),
    Composite(Composite),
    ConstantRef(ConstantRef),
    JavaExpression(JavaExpression),
    DotPath(DotPath),
}

impl Value {
    pub fn literal(text: impl Into<String>) -> Self {
        Value::Literal(text.into())
    }

    pub fn numeric(number: impl Into<String>, unit: impl Into<String>) -> Self {
        Value::Numeric(Numeric {
            number: number.into(),
            unit: unit.into(),
        })
    }

    /// True for nodes that can only be printed as host-language expressions.
    pub fn is_expression(&self) -> bool {
        match self {
            Value::JavaExpression(_) | Value::DotPath(_) => true,
            Value::Function(call) => call.args.iter().any(Value::is_expression),
            Value::Composite(c) => c.values.iter().any(Value::is_expression),
            _ => false,
        }
    }

    /// The unquoted text of the value, used when a value is an argument
    /// (paths, suffixes, external class names).
    pub fn concrete_text(&self) -> String {
        match self {
            Value::String(s) => s.value.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(text) => f.write_str(text),
            Value::String(s) => write!(f, "{}{}{}", s.quote, s.value, s.quote),
            Value::Numeric(n) => write!(f, "{}{}", n.number, n.unit),
            Value::Function(call) => {
                write!(f, "{}(", call.name)?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Value::Composite(c) => {
                for (i, v) in c.values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(c.separator.as_str())?;
                    }
                    write!(f, "{}", v)?;
                }
                Ok(())
            }
            Value::ConstantRef(r) => f.write_str(&r.name),
            Value::JavaExpression(e) => f.write_str(&e.expr),
            Value::DotPath(p) => f.write_str(&p.expression()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringLiteral {
    pub value: String,
    pub quote: char,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Numeric {
    pub number: String,
    pub unit: String,
}

impl Numeric {
    pub fn from_f64(value: f64, unit: impl Into<String>) -> Self {
        Self {
            number: format_number(value),
            unit: unit.into(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.number.parse().ok()
    }
}

/// Shortest decimal text for a computed number: `10`, `1.5`, `-0.25`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let text = format!("{:.4}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Value>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    Space,
    Comma,
    Slash,
}

impl Separator {
    pub fn as_str(self) -> &'static str {
        match self {
            Separator::Space => " ",
            Separator::Comma => ",",
            Separator::Slash => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    pub values: Vec<Value>,
    pub separator: Separator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantRef {
    pub name: String,
    pub span: Span,
}

/// Source text of an expression evaluated by the host program.
#[derive(Debug, Clone, PartialEq)]
pub struct JavaExpression {
    pub expr: String,
    pub span: Span,
}

impl JavaExpression {
    pub fn new(expr: impl Into<String>, span: Span) -> Self {
        Self {
            expr: expr.into(),
            span,
        }
    }
}

/// A chain of zero-argument accessor calls, e.g. `icons.arrow.getWidth`
/// becomes `icons().arrow().getWidth()`, optionally wrapped in string
/// literals.
#[derive(Debug, Clone, PartialEq)]
pub struct DotPath {
    pub path: String,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub span: Span,
}

impl DotPath {
    pub fn new(path: impl Into<String>, span: Span) -> Self {
        Self {
            path: path.into(),
            prefix: None,
            suffix: None,
            span,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn expression(&self) -> String {
        let mut out = String::new();
        if let Some(prefix) = self.prefix.as_deref().filter(|p| !p.is_empty()) {
            out.push('"');
            out.push_str(&escape(prefix));
            out.push_str("\" + ");
        }
        out.push_str(&accessor_chain(&self.path));
        if let Some(suffix) = self.suffix.as_deref().filter(|s| !s.is_empty()) {
            out.push_str(" + \"");
            out.push_str(&escape(suffix));
            out.push('"');
        }
        out
    }
}

/// `a.b.c` -> `a().b().c()`
pub fn accessor_chain(path: &str) -> String {
    let mut out = path.replace('.', "().");
    out.push_str("()");
    out
}
