//! Tree walking shared by every compiler pass.
//!
//! [`walk`] is a read-only pre-order traversal. [`walk_mut`] additionally hands
//! each block child a [`Cursor`] through which a pass removes the node or
//! replaces it with a list of nodes. Replacements flagged for visiting are
//! walked before the following siblings, so a pass sees the nodes it just
//! produced without a second walk.

use crate::ast::{
    BoolExpr, Comment, ConditionalBlock, ConditionalRule, Declaration, Definition, Node, Ruleset,
    UnknownAtRule, Value,
};

/// Read-only traversal hooks. `enter_*` returning `false` skips the children.
pub trait Visitor {
    fn enter_ruleset(&mut self, _ruleset: &Ruleset) -> bool {
        true
    }

    fn leave_ruleset(&mut self, _ruleset: &Ruleset) {}

    fn enter_declaration(&mut self, _declaration: &Declaration) -> bool {
        true
    }

    fn enter_definition(&mut self, _definition: &Definition) {}

    fn enter_conditional_block(&mut self, _block: &ConditionalBlock) -> bool {
        true
    }

    fn leave_conditional_block(&mut self, _block: &ConditionalBlock) {}

    fn enter_conditional_rule(&mut self, _rule: &ConditionalRule) -> bool {
        true
    }

    fn leave_conditional_rule(&mut self, _rule: &ConditionalRule) {}

    fn enter_at_rule(&mut self, _at_rule: &UnknownAtRule) -> bool {
        true
    }

    fn leave_at_rule(&mut self, _at_rule: &UnknownAtRule) {}

    fn enter_value(&mut self, _value: &Value) -> bool {
        true
    }

    /// Checked before every node; once true the walk unwinds.
    fn stopped(&self) -> bool {
        false
    }
}

pub fn walk<V: Visitor + ?Sized>(visitor: &mut V, nodes: &[Node]) {
    for node in nodes {
        if visitor.stopped() {
            return;
        }
        match node {
            Node::Ruleset(ruleset) => {
                if visitor.enter_ruleset(ruleset) {
                    walk(visitor, &ruleset.block);
                }
                visitor.leave_ruleset(ruleset);
            }
            Node::Declaration(declaration) => {
                if visitor.enter_declaration(declaration) {
                    walk_values(visitor, &declaration.value);
                }
            }
            Node::Definition(definition) => {
                visitor.enter_definition(definition);
                walk_values(visitor, &definition.params);
            }
            Node::ConditionalBlock(block) => {
                if visitor.enter_conditional_block(block) {
                    for rule in &block.rules {
                        if visitor.stopped() {
                            break;
                        }
                        if visitor.enter_conditional_rule(rule) {
                            walk(visitor, &rule.block);
                        }
                        visitor.leave_conditional_rule(rule);
                    }
                }
                visitor.leave_conditional_block(block);
            }
            Node::AtRule(at_rule) => {
                if visitor.enter_at_rule(at_rule) {
                    walk_values(visitor, &at_rule.params);
                    if let Some(block) = &at_rule.block {
                        walk(visitor, block);
                    }
                }
                visitor.leave_at_rule(at_rule);
            }
            Node::Comment(_) => {}
        }
    }
}

fn walk_values<V: Visitor + ?Sized>(visitor: &mut V, values: &[Value]) {
    for value in values {
        if !visitor.enter_value(value) {
            continue;
        }
        match value {
            Value::Function(call) => walk_values(visitor, &call.args),
            Value::Composite(composite) => walk_values(visitor, &composite.values),
            _ => {}
        }
    }
}

#[derive(Debug)]
pub(crate) enum Mutation {
    Remove,
    Replace { nodes: Vec<Node>, visit: bool },
}

/// Handle on the block child currently being visited by [`walk_mut`].
///
/// At most one mutation may be requested per node; a second request is a bug
/// in the pass and panics.
#[derive(Debug, Default)]
pub struct Cursor {
    mutation: Option<Mutation>,
}

impl Cursor {
    pub fn remove_current(&mut self) {
        self.set(Mutation::Remove);
    }

    /// Splices `nodes` in place of the current node. With `visit_replacements`
    /// the walk continues into them; otherwise it resumes after them.
    pub fn replace_current(&mut self, nodes: Vec<Node>, visit_replacements: bool) {
        self.set(Mutation::Replace {
            nodes,
            visit: visit_replacements,
        });
    }

    pub fn is_pending(&self) -> bool {
        self.mutation.is_some()
    }

    pub(crate) fn take(&mut self) -> Option<Mutation> {
        self.mutation.take()
    }

    pub(crate) fn set(&mut self, mutation: Mutation) {
        assert!(
            self.mutation.is_none(),
            "the current node was already removed or replaced"
        );
        self.mutation = Some(mutation);
    }
}

/// Mutating traversal hooks. Every block child gets the [`Cursor`] for its
/// own position; conditional rules and values are mutated through `&mut`.
pub trait MutatingVisitor {
    fn enter_ruleset(&mut self, _ruleset: &mut Ruleset, _cursor: &mut Cursor) -> bool {
        true
    }

    fn leave_ruleset(&mut self, _ruleset: &mut Ruleset) {}

    fn enter_declaration(&mut self, _declaration: &mut Declaration, _cursor: &mut Cursor) -> bool {
        true
    }

    fn enter_definition(&mut self, _definition: &mut Definition, _cursor: &mut Cursor) -> bool {
        true
    }

    fn enter_conditional_block(
        &mut self,
        _block: &mut ConditionalBlock,
        _cursor: &mut Cursor,
    ) -> bool {
        true
    }

    fn leave_conditional_block(&mut self, _block: &mut ConditionalBlock) {}

    fn enter_conditional_rule(&mut self, _rule: &mut ConditionalRule) -> bool {
        true
    }

    fn leave_conditional_rule(&mut self, _rule: &mut ConditionalRule) {}

    fn enter_at_rule(&mut self, _at_rule: &mut UnknownAtRule, _cursor: &mut Cursor) -> bool {
        true
    }

    fn leave_at_rule(&mut self, _at_rule: &mut UnknownAtRule) {}

    fn enter_comment(&mut self, _comment: &mut Comment, _cursor: &mut Cursor) {}

    fn enter_value(&mut self, _value: &mut Value) -> bool {
        true
    }

    fn stopped(&self) -> bool {
        false
    }
}

pub fn walk_mut<V: MutatingVisitor + ?Sized>(visitor: &mut V, nodes: &mut Vec<Node>) {
    let mut index = 0;
    while index < nodes.len() {
        if visitor.stopped() {
            return;
        }

        let mut cursor = Cursor::default();
        visit_node_mut(visitor, &mut nodes[index], &mut cursor);

        match cursor.take() {
            None => index += 1,
            Some(Mutation::Remove) => {
                nodes.remove(index);
            }
            Some(Mutation::Replace {
                nodes: replacements,
                visit,
            }) => {
                let count = replacements.len();
                nodes.splice(index..=index, replacements);
                if !visit {
                    index += count;
                }
            }
        }
    }
}

fn visit_node_mut<V: MutatingVisitor + ?Sized>(visitor: &mut V, node: &mut Node, cursor: &mut Cursor) {
    match node {
        Node::Ruleset(ruleset) => {
            if visitor.enter_ruleset(ruleset, cursor) && !cursor.is_pending() {
                walk_mut(visitor, &mut ruleset.block);
            }
            if !cursor.is_pending() {
                visitor.leave_ruleset(ruleset);
            }
        }
        Node::Declaration(declaration) => {
            if visitor.enter_declaration(declaration, cursor) && !cursor.is_pending() {
                walk_values_mut(visitor, &mut declaration.value);
            }
        }
        Node::Definition(definition) => {
            if visitor.enter_definition(definition, cursor) && !cursor.is_pending() {
                walk_values_mut(visitor, &mut definition.params);
            }
        }
        Node::ConditionalBlock(block) => {
            if visitor.enter_conditional_block(block, cursor) && !cursor.is_pending() {
                for rule in &mut block.rules {
                    if visitor.stopped() {
                        break;
                    }
                    if visitor.enter_conditional_rule(rule) {
                        walk_mut(visitor, &mut rule.block);
                    }
                    visitor.leave_conditional_rule(rule);
                }
            }
            if !cursor.is_pending() {
                visitor.leave_conditional_block(block);
            }
        }
        Node::AtRule(at_rule) => {
            if visitor.enter_at_rule(at_rule, cursor) && !cursor.is_pending() {
                walk_values_mut(visitor, &mut at_rule.params);
                if let Some(block) = &mut at_rule.block {
                    walk_mut(visitor, block);
                }
            }
            if !cursor.is_pending() {
                visitor.leave_at_rule(at_rule);
            }
        }
        Node::Comment(comment) => visitor.enter_comment(comment, cursor),
    }
}

pub fn walk_values_mut<V: MutatingVisitor + ?Sized>(visitor: &mut V, values: &mut [Value]) {
    for value in values {
        if !visitor.enter_value(value) {
            continue;
        }
        match value {
            Value::Function(call) => walk_values_mut(visitor, &mut call.args),
            Value::Composite(composite) => walk_values_mut(visitor, &mut composite.values),
            _ => {}
        }
    }
}

/// Calls `f` on every `Constant` leaf of a condition.
///
/// Conditions are not block children, so the walkers above never reach them;
/// passes that inspect condition atoms go through here.
pub fn for_each_condition_constant_mut(expr: &mut BoolExpr, mut f: impl FnMut(&mut String)) {
    let mut stack = vec![expr];
    while let Some(current) = stack.pop() {
        match current {
            BoolExpr::Constant(name) => f(name),
            BoolExpr::Not(inner) => stack.push(inner),
            BoolExpr::And(left, right) | BoolExpr::Or(left, right) => {
                stack.push(right);
                stack.push(left);
            }
            BoolExpr::True | BoolExpr::False => {}
        }
    }
}

pub fn condition_constants(expr: &BoolExpr) -> Vec<&str> {
    let mut constants = Vec::new();
    let mut stack = vec![expr];
    while let Some(current) = stack.pop() {
        match current {
            BoolExpr::Constant(name) => constants.push(name.as_str()),
            BoolExpr::Not(inner) => stack.push(inner),
            BoolExpr::And(left, right) | BoolExpr::Or(left, right) => {
                stack.push(right);
                stack.push(left);
            }
            BoolExpr::True | BoolExpr::False => {}
        }
    }
    constants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn nodes(source: &str) -> Vec<Node> {
        parse("test.gss", source).expect("parse").root
    }

    struct DropColor;

    impl MutatingVisitor for DropColor {
        fn enter_declaration(&mut self, declaration: &mut Declaration, cursor: &mut Cursor) -> bool {
            if declaration.property == "color" {
                cursor.remove_current();
            }
            true
        }
    }

    #[test]
    fn removes_current_node() {
        let mut root = nodes(".a{color:red;width:1px;color:blue}");
        walk_mut(&mut DropColor, &mut root);
        let Node::Ruleset(ruleset) = &root[0] else {
            panic!("expected ruleset");
        };
        assert_eq!(ruleset.block.len(), 1);
    }

    /// Replaces `@if` blocks with their first branch, visiting the result.
    struct Unwrap {
        declarations_seen: Vec<String>,
    }

    impl MutatingVisitor for Unwrap {
        fn enter_conditional_block(&mut self, block: &mut ConditionalBlock, cursor: &mut Cursor) -> bool {
            let branch = std::mem::take(&mut block.rules[0].block);
            cursor.replace_current(branch, true);
            false
        }

        fn enter_declaration(&mut self, declaration: &mut Declaration, _cursor: &mut Cursor) -> bool {
            self.declarations_seen.push(declaration.property.clone());
            true
        }
    }

    #[test]
    fn visits_replacements_before_siblings() {
        let mut root = nodes(".a{top:0;@if A {@if B {left:0} } right:0}");
        let mut visitor = Unwrap {
            declarations_seen: Vec::new(),
        };
        walk_mut(&mut visitor, &mut root);
        assert_eq!(visitor.declarations_seen, vec!["top", "left", "right"]);

        let Node::Ruleset(ruleset) = &root[0] else {
            panic!("expected ruleset");
        };
        assert!(ruleset
            .block
            .iter()
            .all(|n| matches!(n, Node::Declaration(_))));
    }

    struct FirstDeclaration {
        found: Option<String>,
    }

    impl Visitor for FirstDeclaration {
        fn enter_declaration(&mut self, declaration: &Declaration) -> bool {
            self.found = Some(declaration.property.clone());
            false
        }

        fn stopped(&self) -> bool {
            self.found.is_some()
        }
    }

    #[test]
    fn stops_early() {
        let root = nodes(".a{width:1px} .b{height:2px}");
        let mut visitor = FirstDeclaration { found: None };
        walk(&mut visitor, &root);
        assert_eq!(visitor.found.as_deref(), Some("width"));
    }

    #[test]
    #[should_panic(expected = "already removed or replaced")]
    fn double_mutation_panics() {
        let mut cursor = Cursor::default();
        cursor.remove_current();
        cursor.replace_current(Vec::new(), false);
    }

    #[test]
    fn condition_constants_in_source_order() {
        let mut expr = BoolExpr::Or(
            Box::new(BoolExpr::And(
                Box::new(BoolExpr::Constant("A".into())),
                Box::new(BoolExpr::Not(Box::new(BoolExpr::Constant("B".into())))),
            )),
            Box::new(BoolExpr::Constant("C".into())),
        );
        assert_eq!(condition_constants(&expr), vec!["A", "B", "C"]);

        for_each_condition_constant_mut(&mut expr, |name| name.make_ascii_lowercase());
        assert_eq!(condition_constants(&expr), vec!["a", "b", "c"]);
    }
}
