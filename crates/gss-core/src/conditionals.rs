//! `@if` / `@elseif` / `@else` handling.
//!
//! Conditions are classified once after parsing: `eval("...")` rules become
//! runtime rules, `is(axis, value)` atoms are normalized to `axis:value`
//! tokens, and the remaining atoms are boolean configuration flags. At compile
//! time, blocks decidable from the active conditions are replaced by the
//! taken branch; blocks holding runtime rules keep their undecided tail.

use crate::ast::{
    BoolExpr, ConditionalBlock, ConditionalRule, Condition, Definition, JavaExpression, Node,
    Stylesheet, UnknownAtRule,
};
use crate::error::{ErrorManager, GssError, Span};
use crate::visitor::{
    condition_constants, for_each_condition_constant_mut, walk, walk_mut, Cursor,
    MutatingVisitor, Visitor,
};
use indexmap::IndexSet;
use std::collections::BTreeSet;
use tracing::debug;

/// Axis assumed by the one-argument form `is("safari")`.
pub const DEFAULT_PERMUTATION_AXIS: &str = "user.agent";

const EXTERNAL_AT_RULE: &str = "external";

/// Extracts the expression of a whole-condition `eval("...")`.
fn runtime_expression(condition: &str) -> Option<&str> {
    let inner = condition
        .trim()
        .strip_prefix("eval(")?
        .strip_suffix(')')?
        .trim();
    let quote = inner.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    inner.strip_prefix(quote)?.strip_suffix(quote)
}

/// Parses `is("axis", "value")` or `is("value")` into `(axis, value)`.
fn permutation_predicate(atom: &str) -> Option<(String, String)> {
    let inner = atom.trim().strip_prefix("is(")?.strip_suffix(')')?;
    let args: Vec<String> = inner
        .split(',')
        .map(|arg| arg.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .collect();
    match args.as_slice() {
        [value] if !value.is_empty() => Some((DEFAULT_PERMUTATION_AXIS.to_string(), value.clone())),
        [axis, value] if !axis.is_empty() && !value.is_empty() => {
            Some((axis.clone(), value.clone()))
        }
        _ => None,
    }
}

struct RuntimeConditionalCreator {
    created: usize,
}

impl MutatingVisitor for RuntimeConditionalCreator {
    fn enter_conditional_rule(&mut self, rule: &mut ConditionalRule) -> bool {
        if let Some(Condition::Static(BoolExpr::Constant(text))) = &rule.condition {
            if let Some(expr) = runtime_expression(text) {
                rule.condition = Some(Condition::Runtime(JavaExpression::new(expr, rule.span)));
                self.created += 1;
            }
        }
        true
    }
}

/// Turns every rule whose whole condition is `eval("...")` into a runtime
/// rule carrying the expression text.
pub fn create_runtime_conditionals(stylesheet: &mut Stylesheet) -> usize {
    let mut creator = RuntimeConditionalCreator { created: 0 };
    walk_mut(&mut creator, &mut stylesheet.root);
    debug!(created = creator.created, "runtime conditional rules");
    creator.created
}

struct BooleanConditionCollector {
    conditions: BTreeSet<String>,
}

impl Visitor for BooleanConditionCollector {
    fn enter_conditional_rule(&mut self, rule: &ConditionalRule) -> bool {
        if let Some(Condition::Static(expr)) = &rule.condition {
            for name in condition_constants(expr) {
                if !name.starts_with("is(") && !name.starts_with("eval(") && !name.contains(':') {
                    self.conditions.insert(name.to_string());
                }
            }
        }
        true
    }
}

/// Names of the boolean configuration flags tested by static conditions.
pub fn collect_boolean_conditions(stylesheet: &Stylesheet) -> BTreeSet<String> {
    let mut collector = BooleanConditionCollector {
        conditions: BTreeSet::new(),
    };
    walk(&mut collector, &stylesheet.root);
    collector.conditions
}

struct PermutationsCollector {
    axes: IndexSet<String>,
    errors: Vec<GssError>,
}

impl MutatingVisitor for PermutationsCollector {
    fn enter_conditional_rule(&mut self, rule: &mut ConditionalRule) -> bool {
        let span = rule.span;
        if let Some(Condition::Static(expr)) = &mut rule.condition {
            for_each_condition_constant_mut(expr, |atom| {
                if !atom.starts_with("is(") {
                    return;
                }
                match permutation_predicate(atom) {
                    Some((axis, value)) => {
                        *atom = format!("{}:{}", axis, value);
                        self.axes.insert(axis);
                    }
                    None => self.errors.push(GssError::new(
                        format!("Invalid permutation predicate {}", atom),
                        span,
                    )),
                }
            });
        }
        true
    }
}

/// Normalizes `is(...)` atoms to `axis:value` and returns the axes seen.
pub fn collect_permutation_axes(
    stylesheet: &mut Stylesheet,
    errors: &mut ErrorManager,
) -> IndexSet<String> {
    let mut collector = PermutationsCollector {
        axes: IndexSet::new(),
        errors: Vec::new(),
    };
    walk_mut(&mut collector, &mut stylesheet.root);
    for error in collector.errors {
        errors.report(error);
    }
    collector.axes
}

struct RuntimeBlockCollector {
    spans: Vec<Span>,
}

impl MutatingVisitor for RuntimeBlockCollector {
    fn enter_conditional_block(&mut self, block: &mut ConditionalBlock, _cursor: &mut Cursor) -> bool {
        block.runtime = block.has_runtime_rule();
        if block.runtime {
            self.spans.push(block.span);
        }
        true
    }
}

/// Flags every block holding a runtime rule and returns where they are.
pub fn collect_runtime_blocks(stylesheet: &mut Stylesheet) -> Vec<Span> {
    let mut collector = RuntimeBlockCollector { spans: Vec::new() };
    walk_mut(&mut collector, &mut stylesheet.root);
    collector.spans
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EliminationStats {
    pub eliminated: usize,
    pub deferred: usize,
}

struct ConditionalEliminator<'a> {
    true_conditions: &'a BTreeSet<String>,
    stats: EliminationStats,
}

impl ConditionalEliminator<'_> {
    /// The rules that still have to be decided by the host, or the branch
    /// that is statically taken before any runtime rule.
    fn resolve(&self, rules: Vec<ConditionalRule>) -> Resolution {
        let mut kept = Vec::new();

        for rule in rules {
            let taken = match &rule.condition {
                None => true,
                Some(Condition::Runtime(_)) => {
                    kept.push(rule);
                    continue;
                }
                Some(Condition::Static(expr)) => expr.evaluate(self.true_conditions),
            };

            if !taken {
                continue;
            }
            if kept.is_empty() {
                return Resolution::Static(rule.block);
            }
            kept.push(rule.into_else());
            break;
        }

        if kept.is_empty() {
            Resolution::Static(Vec::new())
        } else {
            Resolution::Runtime(kept)
        }
    }
}

enum Resolution {
    Static(Vec<Node>),
    Runtime(Vec<ConditionalRule>),
}

impl MutatingVisitor for ConditionalEliminator<'_> {
    fn enter_conditional_block(&mut self, block: &mut ConditionalBlock, cursor: &mut Cursor) -> bool {
        if block.processed {
            return true;
        }

        let rules = std::mem::take(&mut block.rules);
        match self.resolve(rules) {
            Resolution::Static(children) => {
                self.stats.eliminated += 1;
                cursor.replace_current(children, true);
            }
            Resolution::Runtime(rules) => {
                self.stats.deferred += 1;
                let mut rebuilt = ConditionalBlock::new(rules, block.span);
                rebuilt.runtime = true;
                rebuilt.processed = true;
                cursor.replace_current(vec![Node::ConditionalBlock(rebuilt)], true);
            }
        }
        false
    }
}

/// Replaces statically decidable blocks with their taken branch and trims
/// runtime blocks to the rules the host still has to decide.
///
/// Rules are scanned in order. Before any runtime rule, a true rule wins
/// outright and a false rule is dropped. After a runtime rule, the first true
/// rule becomes the `@else` of the rebuilt block and the rest is dropped.
pub fn eliminate_conditionals(
    stylesheet: &mut Stylesheet,
    true_conditions: &BTreeSet<String>,
) -> EliminationStats {
    let mut eliminator = ConditionalEliminator {
        true_conditions,
        stats: EliminationStats::default(),
    };
    walk_mut(&mut eliminator, &mut stylesheet.root);
    debug!(
        eliminated = eliminator.stats.eliminated,
        deferred = eliminator.stats.deferred,
        "conditional elimination"
    );
    eliminator.stats
}

struct RuntimeConditionalValidator<'a> {
    lenient: bool,
    runtime_depth: usize,
    errors: &'a mut ErrorManager,
}

impl RuntimeConditionalValidator<'_> {
    fn report(&mut self, message: String, span: Span) {
        if self.lenient {
            self.errors.report_warning(GssError::new(
                format!("{} This will be an error in a future version.", message),
                span,
            ));
        } else {
            self.errors.report(GssError::new(message, span));
        }
    }
}

impl Visitor for RuntimeConditionalValidator<'_> {
    fn enter_conditional_block(&mut self, block: &ConditionalBlock) -> bool {
        if block.runtime || block.has_runtime_rule() {
            self.runtime_depth += 1;
        }
        true
    }

    fn leave_conditional_block(&mut self, block: &ConditionalBlock) {
        if block.runtime || block.has_runtime_rule() {
            self.runtime_depth -= 1;
        }
    }

    fn enter_definition(&mut self, definition: &Definition) {
        if self.runtime_depth > 0 {
            self.report(
                format!(
                    "You cannot define the constant {} inside a conditional block evaluated at runtime.",
                    definition.name
                ),
                definition.span,
            );
        }
    }

    fn enter_at_rule(&mut self, at_rule: &UnknownAtRule) -> bool {
        if self.runtime_depth > 0 && at_rule.name == EXTERNAL_AT_RULE {
            self.report(
                "You cannot use @external inside a conditional block evaluated at runtime."
                    .to_string(),
                at_rule.span,
            );
        }
        true
    }
}

/// Reports constant definitions and `@external` at any depth below a runtime
/// conditional; warnings instead of errors when `lenient`.
pub fn validate_runtime_conditionals(
    stylesheet: &Stylesheet,
    lenient: bool,
    errors: &mut ErrorManager,
) {
    let mut validator = RuntimeConditionalValidator {
        lenient,
        runtime_depth: 0,
        errors,
    };
    walk(&mut validator, &stylesheet.root);
}

/// True once no block of the tree depends on a runtime condition.
pub fn is_fully_static(nodes: &[Node]) -> bool {
    struct RuntimeFinder {
        found: bool,
    }

    impl Visitor for RuntimeFinder {
        fn enter_conditional_block(&mut self, block: &ConditionalBlock) -> bool {
            self.found |= block.has_runtime_rule();
            true
        }

        fn stopped(&self) -> bool {
            self.found
        }
    }

    let mut finder = RuntimeFinder { found: false };
    walk(&mut finder, nodes);
    !finder.found
}
