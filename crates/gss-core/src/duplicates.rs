use crate::ast::{Node, Ruleset, Stylesheet};
use crate::error::{ErrorManager, GssError};
use crate::sprite::ALTERNATE;
use crate::visitor::{walk, Visitor};
use std::collections::HashSet;

struct DuplicateDeclarationChecker<'a> {
    errors: &'a mut ErrorManager,
}

impl Visitor for DuplicateDeclarationChecker<'_> {
    fn enter_ruleset(&mut self, ruleset: &Ruleset) -> bool {
        let mut seen = HashSet::new();
        for node in &ruleset.block {
            let Node::Declaration(declaration) = node else {
                continue;
            };
            if !seen.insert(declaration.property.as_str()) && !declaration.has_comment(ALTERNATE) {
                self.errors.report(GssError::new(
                    format!(
                        "Property {} is declared more than once in the same ruleset; \
                         mark the override with /* {} */",
                        declaration.property, ALTERNATE
                    ),
                    declaration.span,
                ));
            }
        }
        true
    }
}

/// Reports properties declared twice in one ruleset unless the later
/// declaration is an `@alternate`.
pub fn check_duplicate_declarations(stylesheet: &Stylesheet, errors: &mut ErrorManager) {
    let mut checker = DuplicateDeclarationChecker { errors };
    walk(&mut checker, &stylesheet.root);
}
