//! Stylesheet functions evaluated at compile time.
//!
//! A function has two modes: AST mode replaces the call site with value
//! nodes, string mode works on already printed arguments and is used for
//! calls nested inside another function's arguments.

use crate::ast::{
    Composite, Declaration, Definition, DotPath, FunctionCall, JavaExpression, Numeric,
    Stylesheet, Value,
};
use crate::error::{ErrorManager, GssError, Span};
use crate::resources::{ResourceBundle, ResourceKind};
use crate::visitor::{walk_mut, Cursor, MutatingVisitor};
use indexmap::IndexMap;
use tracing::debug;

pub trait GssFunction {
    /// Exact number of arguments, `None` when variable.
    fn arity(&self) -> Option<usize>;

    fn call(&self, args: &[Value], span: Span) -> Result<Vec<Value>, String>;

    fn call_to_string(&self, args: &[String]) -> Result<String, String>;
}

pub struct FunctionRegistry {
    functions: IndexMap<&'static str, Box<dyn GssFunction>>,
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self {
            functions: IndexMap::new(),
        }
    }

    /// `eval`, `value`, `resourceUrl` and the arithmetic helpers.
    pub fn with_defaults(resources: &ResourceBundle) -> Self {
        let mut registry = Self::empty();
        registry.register("eval", EvalFunction);
        registry.register("value", ValueFunction);
        registry.register(
            "resourceUrl",
            ResourceUrlFunction {
                resources: resources.clone(),
            },
        );
        registry.register("add", Arithmetic::new(Operation::Add));
        registry.register("sub", Arithmetic::new(Operation::Sub));
        registry.register("mult", Arithmetic::new(Operation::Mult));
        registry.register("divide", Arithmetic::new(Operation::Divide));
        registry.register("max", Arithmetic::new(Operation::Max));
        registry.register("min", Arithmetic::new(Operation::Min));
        registry.register("concat", Concat);
        registry.register("selectFrom", SelectFrom);
        registry
    }

    pub fn register(&mut self, name: &'static str, function: impl GssFunction + 'static) {
        self.functions.insert(name, Box::new(function));
    }

    pub fn get(&self, name: &str) -> Option<&dyn GssFunction> {
        self.functions.get(name).map(|f| f.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    fn check_arity(&self, name: &str, function: &dyn GssFunction, count: usize) -> Result<(), String> {
        match function.arity() {
            Some(expected) if expected != count => Err(format!(
                "Function {} expects {} argument(s) but got {}",
                name, expected, count
            )),
            _ => Ok(()),
        }
    }

    /// AST mode. Nested registered calls are first flattened to literals.
    pub fn evaluate(&self, call: &FunctionCall, span: Span) -> Result<Vec<Value>, String> {
        let function = self
            .get(&call.name)
            .ok_or_else(|| format!("Unknown function {}", call.name))?;

        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.flatten_nested(arg)?);
        }

        self.check_arity(&call.name, function, args.len())?;
        function.call(&args, span)
    }

    /// String mode.
    pub fn evaluate_to_string(&self, call: &FunctionCall) -> Result<String, String> {
        let function = self
            .get(&call.name)
            .ok_or_else(|| format!("Unknown function {}", call.name))?;

        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.flatten_nested(arg)?.concrete_text());
        }

        self.check_arity(&call.name, function, args.len())?;
        function.call_to_string(&args)
    }

    /// Replaces registered calls anywhere inside an argument, including
    /// groups and unregistered calls, by their string-mode result.
    fn flatten_nested(&self, value: &Value) -> Result<Value, String> {
        match value {
            Value::Function(inner) if self.contains(&inner.name) => {
                Ok(Value::Literal(self.evaluate_to_string(inner)?))
            }
            Value::Function(inner) => {
                let mut flattened = inner.clone();
                flattened.args = inner
                    .args
                    .iter()
                    .map(|arg| self.flatten_nested(arg))
                    .collect::<Result<_, _>>()?;
                Ok(Value::Function(flattened))
            }
            Value::Composite(composite) => Ok(Value::Composite(Composite {
                values: composite
                    .values
                    .iter()
                    .map(|item| self.flatten_nested(item))
                    .collect::<Result<_, _>>()?,
                separator: composite.separator,
            })),
            other => Ok(other.clone()),
        }
    }
}

struct EvalFunction;

impl GssFunction for EvalFunction {
    fn arity(&self) -> Option<usize> {
        Some(1)
    }

    fn call(&self, args: &[Value], span: Span) -> Result<Vec<Value>, String> {
        Ok(vec![Value::JavaExpression(JavaExpression::new(
            args[0].concrete_text(),
            span,
        ))])
    }

    fn call_to_string(&self, args: &[String]) -> Result<String, String> {
        Ok(args[0].clone())
    }
}

/// `value(path[, suffix[, prefix]])`
struct ValueFunction;

impl ValueFunction {
    fn dot_path(args: &[String], span: Span) -> Result<DotPath, String> {
        if args.is_empty() || args.len() > 3 {
            return Err(format!(
                "Function value expects 1 to 3 arguments but got {}",
                args.len()
            ));
        }
        let mut path = DotPath::new(args[0].clone(), span);
        if let Some(suffix) = args.get(1) {
            path = path.with_suffix(suffix.clone());
        }
        if let Some(prefix) = args.get(2) {
            path = path.with_prefix(prefix.clone());
        }
        Ok(path)
    }
}

impl GssFunction for ValueFunction {
    fn arity(&self) -> Option<usize> {
        None
    }

    fn call(&self, args: &[Value], span: Span) -> Result<Vec<Value>, String> {
        let args: Vec<String> = args.iter().map(Value::concrete_text).collect();
        Ok(vec![Value::DotPath(Self::dot_path(&args, span)?)])
    }

    fn call_to_string(&self, args: &[String]) -> Result<String, String> {
        Ok(Self::dot_path(args, Span::dummy())?.expression())
    }
}

/// `resourceUrl(path)`: `url(...)` of a data or image resource.
struct ResourceUrlFunction {
    resources: ResourceBundle,
}

impl ResourceUrlFunction {
    fn url_path(&self, path: &str) -> Result<DotPath, String> {
        let method = self.resources.method_by_path(path)?;
        match method.kind {
            ResourceKind::Data | ResourceKind::Image(_) => Ok(DotPath::new(
                format!("{}.getSafeUri.asString", path),
                Span::dummy(),
            )),
            ref other => Err(format!(
                "Invalid method type for url substitution: {}. \
                 Only DataResource and ImageResource are supported.",
                other.type_name()
            )),
        }
    }
}

impl GssFunction for ResourceUrlFunction {
    fn arity(&self) -> Option<usize> {
        Some(1)
    }

    fn call(&self, args: &[Value], span: Span) -> Result<Vec<Value>, String> {
        let mut path = self.url_path(&args[0].concrete_text())?;
        path.span = span;
        Ok(vec![Value::Function(FunctionCall {
            name: "url".to_string(),
            args: vec![Value::DotPath(path)],
            span,
        })])
    }

    fn call_to_string(&self, args: &[String]) -> Result<String, String> {
        Ok(self.url_path(&args[0])?.expression())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operation {
    Add,
    Sub,
    Mult,
    Divide,
    Max,
    Min,
}

/// Numeric helpers. `add`, `sub`, `max` and `min` need one shared unit;
/// `mult` and `divide` scale their first argument by unitless factors.
struct Arithmetic {
    operation: Operation,
}

impl Arithmetic {
    fn new(operation: Operation) -> Self {
        Self { operation }
    }

    fn compute(&self, args: &[String]) -> Result<Numeric, String> {
        if args.len() < 2 {
            return Err(format!("Expected at least 2 arguments but got {}", args.len()));
        }
        let operands = args
            .iter()
            .map(|arg| parse_numeric(arg))
            .collect::<Result<Vec<_>, _>>()?;

        let (first, first_unit) = &operands[0];
        let mut result = *first;
        let rest = &operands[1..];

        match self.operation {
            Operation::Add | Operation::Sub | Operation::Max | Operation::Min => {
                for (value, unit) in rest {
                    if unit != first_unit && !(unit.is_empty() && *value == 0.0) {
                        return Err(format!(
                            "Parameters' units don't match (\"{}\" vs \"{}\")",
                            first_unit, unit
                        ));
                    }
                    result = match self.operation {
                        Operation::Add => result + value,
                        Operation::Sub => result - value,
                        Operation::Max => result.max(*value),
                        _ => result.min(*value),
                    };
                }
            }
            Operation::Mult | Operation::Divide => {
                for (value, unit) in rest {
                    if !unit.is_empty() {
                        return Err(format!(
                            "Only the first argument may have a unit, found \"{}\"",
                            unit
                        ));
                    }
                    if self.operation == Operation::Divide {
                        if *value == 0.0 {
                            return Err("Division by zero".to_string());
                        }
                        result /= value;
                    } else {
                        result *= value;
                    }
                }
            }
        }

        Ok(Numeric::from_f64(result, first_unit.clone()))
    }
}

fn parse_numeric(text: &str) -> Result<(f64, String), String> {
    let text = text.trim();
    let split = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let value = number
        .parse::<f64>()
        .map_err(|_| format!("Expected a number but found \"{}\"", text))?;
    Ok((value, unit.to_string()))
}

impl GssFunction for Arithmetic {
    fn arity(&self) -> Option<usize> {
        None
    }

    fn call(&self, args: &[Value], _span: Span) -> Result<Vec<Value>, String> {
        let args: Vec<String> = args.iter().map(Value::concrete_text).collect();
        Ok(vec![Value::Numeric(self.compute(&args)?)])
    }

    fn call_to_string(&self, args: &[String]) -> Result<String, String> {
        let numeric = self.compute(args)?;
        Ok(format!("{}{}", numeric.number, numeric.unit))
    }
}

struct Concat;

impl GssFunction for Concat {
    fn arity(&self) -> Option<usize> {
        None
    }

    fn call(&self, args: &[Value], _span: Span) -> Result<Vec<Value>, String> {
        let args: Vec<String> = args.iter().map(Value::concrete_text).collect();
        Ok(vec![Value::Literal(self.call_to_string(&args)?)])
    }

    fn call_to_string(&self, args: &[String]) -> Result<String, String> {
        Ok(args.concat())
    }
}

/// `selectFrom(condition, ifTrue, ifFalse)`
struct SelectFrom;

impl SelectFrom {
    fn pick<'a, T>(condition: &str, if_true: &'a T, if_false: &'a T) -> Result<&'a T, String> {
        match condition {
            "true" => Ok(if_true),
            "false" => Ok(if_false),
            other => Err(format!(
                "The first argument of selectFrom must be true or false, found \"{}\"",
                other
            )),
        }
    }
}

impl GssFunction for SelectFrom {
    fn arity(&self) -> Option<usize> {
        Some(3)
    }

    fn call(&self, args: &[Value], _span: Span) -> Result<Vec<Value>, String> {
        let selected = Self::pick(&args[0].concrete_text(), &args[1], &args[2])?;
        Ok(vec![selected.clone()])
    }

    fn call_to_string(&self, args: &[String]) -> Result<String, String> {
        Self::pick(&args[0], &args[1], &args[2]).cloned()
    }
}

struct FunctionResolver<'a> {
    registry: &'a FunctionRegistry,
    errors: &'a mut ErrorManager,
    resolved: usize,
}

impl FunctionResolver<'_> {
    /// `span` is the enclosing declaration or definition.
    fn resolve_list(&mut self, values: &mut Vec<Value>, span: Span) {
        let mut index = 0;
        while index < values.len() {
            match &mut values[index] {
                Value::Function(call) if self.registry.contains(&call.name) => {
                    let location = if call.span.is_known() { call.span } else { span };
                    match self.registry.evaluate(call, span) {
                        Ok(replacement) => {
                            let count = replacement.len();
                            values.splice(index..=index, replacement);
                            self.resolved += 1;
                            index += count;
                            continue;
                        }
                        Err(message) => self.errors.report(GssError::new(message, location)),
                    }
                }
                Value::Function(call) => self.resolve_list(&mut call.args, span),
                Value::Composite(composite) => self.resolve_list(&mut composite.values, span),
                _ => {}
            }
            index += 1;
        }
    }
}

impl MutatingVisitor for FunctionResolver<'_> {
    fn enter_declaration(&mut self, declaration: &mut Declaration, _cursor: &mut Cursor) -> bool {
        let span = declaration.span;
        self.resolve_list(&mut declaration.value, span);
        false
    }

    fn enter_definition(&mut self, definition: &mut Definition, _cursor: &mut Cursor) -> bool {
        let span = definition.span;
        self.resolve_list(&mut definition.params, span);
        false
    }
}

/// Replaces every registered function call by its result. Failures are
/// reported and leave the call in place.
pub fn resolve_functions(
    stylesheet: &mut Stylesheet,
    registry: &FunctionRegistry,
    errors: &mut ErrorManager,
) -> usize {
    let mut resolver = FunctionResolver {
        registry,
        errors,
        resolved: 0,
    };
    walk_mut(&mut resolver, &mut stylesheet.root);
    debug!(resolved = resolver.resolved, "resolved function calls");
    resolver.resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::print;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn bundle() -> ResourceBundle {
        serde_json::from_str(
            r#"{
                "methods": {
                    "logo": { "kind": "image", "width": 10, "height": 10 },
                    "font": { "kind": "data" },
                    "text": { "kind": "text" }
                }
            }"#,
        )
        .expect("bundle")
    }

    fn resolve(source: &str) -> (String, ErrorManager) {
        let mut stylesheet = parse("test.gss", source).expect("parse");
        let mut errors = ErrorManager::default();
        resolve_functions(&mut stylesheet, &FunctionRegistry::with_defaults(&bundle()), &mut errors);
        (print(&stylesheet).as_str().to_string(), errors)
    }

    #[test]
    fn eval_becomes_host_expression() {
        let mut stylesheet =
            parse("test.gss", ".a {\n  color: eval('cfg.color()');\n}").expect("parse");
        let mut errors = ErrorManager::default();
        resolve_functions(&mut stylesheet, &FunctionRegistry::with_defaults(&bundle()), &mut errors);

        let printed = print(&stylesheet);
        assert_eq!(printed.as_str(), "(\".a{color:\" + (cfg.color()) + \"}\")");

        let crate::ast::Node::Ruleset(ruleset) = &stylesheet.root[0] else {
            panic!("expected ruleset");
        };
        let crate::ast::Node::Declaration(color) = &ruleset.block[0] else {
            panic!("expected declaration");
        };
        let Value::JavaExpression(expr) = &color.value[0] else {
            panic!("expected expression");
        };
        assert_eq!(expr.span, Span::new(2, 3));
    }

    #[test]
    fn value_builds_accessor_chain() {
        let (css, errors) = resolve(".a { width: value('logo.getWidth', 'px', '-') }");
        assert!(!errors.has_errors());
        assert_eq!(css, "(\".a{width:\" + (\"-\" + logo().getWidth() + \"px\") + \"}\")");
    }

    #[test]
    fn resource_url_accepts_data_and_images() {
        let (css, errors) = resolve(".a { src: resourceUrl('font'); background: resourceUrl(\"logo\") }");
        assert!(!errors.has_errors());
        assert_eq!(
            css,
            "(\".a{src:url(\" + (font().getSafeUri().asString()) + \");background:url(\" \
             + (logo().getSafeUri().asString()) + \")}\")"
        );
    }

    #[test]
    fn resource_url_rejects_other_kinds() {
        let (_, errors) = resolve(".a {\n  src: resourceUrl('text');\n  x: resourceUrl('nope') }");
        let messages: Vec<_> = errors.errors().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("TextResource"));
        assert!(messages[1].contains("'nope'"));
        assert_eq!(errors.errors()[0].span, Some(Span::new(2, 8)));
    }

    #[test]
    fn arithmetic_defaults() {
        let (css, errors) = resolve(
            ".a { width: add(10px, 5px, 1.5px); height: mult(3em, 2); top: divide(10%, 4); \
             left: max(1px, 3px); right: sub(add(2px, 2px), 1px) }",
        );
        assert!(!errors.has_errors(), "{:?}", errors.errors());
        assert_eq!(
            css,
            ".a{width:16.5px;height:6em;top:2.5%;left:3px;right:3px}"
        );
    }

    #[test]
    fn arithmetic_errors() {
        let (_, errors) = resolve(".a { width: add(10px, 5em); height: divide(1px, 0); top: mult(1px, 2px) }");
        assert_eq!(errors.errors().len(), 3);
        assert!(errors.errors()[0].message.contains("units don't match"));
        assert!(errors.errors()[1].message.contains("Division by zero"));
    }

    #[test]
    fn arity_is_checked() {
        let (css, errors) = resolve(".a { color: eval('a', 'b'); top: selectFrom(true, 1px) }");
        assert_eq!(errors.errors().len(), 2);
        assert!(errors.errors()[0].message.contains("expects 1 argument"));
        assert_eq!(css, ".a{color:eval('a','b');top:selectFrom(true,1px)}");
    }

    #[test]
    fn select_and_concat() {
        let (css, errors) = resolve(".a { top: selectFrom(false, 1px, 2px); font-family: concat(a, 'b', c) }");
        assert!(!errors.has_errors());
        assert_eq!(css, ".a{top:2px;font-family:abc}");
    }

    #[test]
    fn nested_calls_inside_groups_are_evaluated() {
        let (css, errors) = resolve(
            ".a { top: selectFrom(false, 0, sub(3px, 1px) 4px); \
             font-family: concat(x, translate(add(1px, 1px)) y) }",
        );
        assert!(!errors.has_errors(), "{:?}", errors.errors());
        assert_eq!(css, ".a{top:2px 4px;font-family:xtranslate(2px) y}");
    }

    #[test]
    fn unknown_functions_keep_their_arguments_resolved() {
        let (css, errors) = resolve(".a { transform: translate(add(1px, 1px), 0) }");
        assert!(!errors.has_errors());
        assert_eq!(css, ".a{transform:translate(2px,0)}");
    }
}
