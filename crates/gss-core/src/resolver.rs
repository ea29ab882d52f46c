use crate::ast::{Composite, Declaration, Definition, Separator, Stylesheet, Value};
use crate::error::{ErrorManager, GssError};
use crate::visitor::{walk_mut, Cursor, MutatingVisitor};
use indexmap::IndexMap;
use tracing::debug;

pub type ConstantDefinitions = IndexMap<String, Definition>;

struct ConstantCollector {
    definitions: ConstantDefinitions,
    remove: bool,
}

impl MutatingVisitor for ConstantCollector {
    fn enter_definition(&mut self, definition: &mut Definition, cursor: &mut Cursor) -> bool {
        self.definitions
            .insert(definition.name.clone(), definition.clone());
        if self.remove {
            cursor.remove_current();
        }
        false
    }
}

/// Collects every `@def`, the last definition of a name winning. With
/// `remove` the definitions are taken out of the tree.
pub fn collect_constants(stylesheet: &mut Stylesheet, remove: bool) -> ConstantDefinitions {
    let mut collector = ConstantCollector {
        definitions: IndexMap::new(),
        remove,
    };
    walk_mut(&mut collector, &mut stylesheet.root);
    debug!(
        constants = collector.definitions.len(),
        removed = remove,
        "collected constant definitions"
    );
    collector.definitions
}

struct ConstantReplacer<'a> {
    resolved: &'a IndexMap<String, Vec<Value>>,
    errors: &'a mut ErrorManager,
    replaced: usize,
}

impl ConstantReplacer<'_> {
    /// Splices constant values into a top-level value list.
    fn replace_in_list(&mut self, values: &mut Vec<Value>) {
        let mut index = 0;
        while index < values.len() {
            if let Value::ConstantRef(reference) = &values[index] {
                match self.resolved.get(&reference.name) {
                    Some(replacement) => {
                        let count = replacement.len();
                        values.splice(index..=index, replacement.iter().cloned());
                        self.replaced += 1;
                        index += count;
                        continue;
                    }
                    None => self.errors.report(GssError::new(
                        format!("GSS constant not defined: {}", reference.name),
                        reference.span,
                    )),
                }
            } else {
                self.replace_nested(&mut values[index]);
            }
            index += 1;
        }
    }

    /// Inside function arguments and composites a multi-value constant stays
    /// grouped so the argument count does not change.
    fn replace_nested(&mut self, value: &mut Value) {
        let items = match value {
            Value::Function(call) => &mut call.args,
            Value::Composite(composite) => &mut composite.values,
            _ => return,
        };
        for item in items.iter_mut() {
            if let Value::ConstantRef(reference) = item {
                match self.resolved.get(&reference.name) {
                    Some(replacement) => {
                        *item = grouped(replacement);
                        self.replaced += 1;
                    }
                    None => self.errors.report(GssError::new(
                        format!("GSS constant not defined: {}", reference.name),
                        reference.span,
                    )),
                }
            } else {
                self.replace_nested(item);
            }
        }
    }
}

fn grouped(values: &[Value]) -> Value {
    match values {
        [single] => single.clone(),
        _ => Value::Composite(Composite {
            values: values.to_vec(),
            separator: Separator::Space,
        }),
    }
}

impl MutatingVisitor for ConstantReplacer<'_> {
    fn enter_declaration(&mut self, declaration: &mut Declaration, _cursor: &mut Cursor) -> bool {
        self.replace_in_list(&mut declaration.value);
        false
    }

    fn enter_definition(&mut self, definition: &mut Definition, _cursor: &mut Cursor) -> bool {
        if let Some(resolved) = self.resolved.get(&definition.name) {
            definition.params = resolved.clone();
        }
        false
    }
}

/// Flattens each definition into a list of values free of references.
fn resolve_definitions(
    definitions: &ConstantDefinitions,
    errors: &mut ErrorManager,
) -> IndexMap<String, Vec<Value>> {
    let mut resolved = IndexMap::new();
    for name in definitions.keys() {
        let mut stack = Vec::new();
        resolve_definition(name, definitions, &mut resolved, &mut stack, errors);
    }
    resolved
}

fn resolve_definition(
    name: &str,
    definitions: &ConstantDefinitions,
    resolved: &mut IndexMap<String, Vec<Value>>,
    stack: &mut Vec<String>,
    errors: &mut ErrorManager,
) -> Option<Vec<Value>> {
    if let Some(values) = resolved.get(name) {
        return Some(values.clone());
    }
    let definition = definitions.get(name)?;
    if stack.iter().any(|n| n == name) {
        errors.report(GssError::new(
            format!(
                "Cyclic constant reference: {} -> {}",
                stack.join(" -> "),
                name
            ),
            definition.span,
        ));
        return None;
    }

    stack.push(name.to_string());
    let mut values = Vec::with_capacity(definition.params.len());
    for param in &definition.params {
        match param {
            Value::ConstantRef(reference) => {
                if !definitions.contains_key(&reference.name) {
                    errors.report(GssError::new(
                        format!("GSS constant not defined: {}", reference.name),
                        reference.span,
                    ));
                    values.push(param.clone());
                    continue;
                }
                match resolve_definition(&reference.name, definitions, resolved, stack, errors) {
                    Some(inner) => values.extend(inner),
                    None => values.push(param.clone()),
                }
            }
            other => values.push(other.clone()),
        }
    }
    for value in values.iter_mut() {
        resolve_nested(value, definitions, resolved, stack, errors);
    }
    stack.pop();

    resolved.insert(name.to_string(), values.clone());
    Some(values)
}

/// Resolves references inside function arguments and composites of a
/// definition, keeping multi-value constants grouped.
fn resolve_nested(
    value: &mut Value,
    definitions: &ConstantDefinitions,
    resolved: &mut IndexMap<String, Vec<Value>>,
    stack: &mut Vec<String>,
    errors: &mut ErrorManager,
) {
    let items = match value {
        Value::Function(call) => &mut call.args,
        Value::Composite(composite) => &mut composite.values,
        _ => return,
    };
    for item in items.iter_mut() {
        let (name, span) = match item {
            Value::ConstantRef(reference) => (reference.name.clone(), reference.span),
            other => {
                resolve_nested(other, definitions, resolved, stack, errors);
                continue;
            }
        };
        if !definitions.contains_key(&name) {
            errors.report(GssError::new(
                format!("GSS constant not defined: {}", name),
                span,
            ));
            continue;
        }
        if let Some(inner) = resolve_definition(&name, definitions, resolved, stack, errors) {
            *item = grouped(&inner);
        }
    }
}

/// Replaces every constant reference with the referenced definition's
/// flattened values. Unknown names are reported and left in place.
pub fn resolve_constants(
    stylesheet: &mut Stylesheet,
    definitions: &ConstantDefinitions,
    errors: &mut ErrorManager,
) -> usize {
    let resolved = resolve_definitions(definitions, errors);
    let mut replacer = ConstantReplacer {
        resolved: &resolved,
        errors,
        replaced: 0,
    };
    walk_mut(&mut replacer, &mut stylesheet.root);
    debug!(replaced = replacer.replaced, "replaced constant references");
    replacer.replaced
}
