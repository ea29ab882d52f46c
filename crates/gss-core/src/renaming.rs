//! CSS class renaming and `@external` handling.
//!
//! Class selectors are renamed through a [`SubstitutionMap`]. Names without a
//! replacement pass through unchanged and become external candidates; whether
//! that is legitimate is decided once `@external` declarations are known.

use crate::ast::{Ruleset, SelectorPart, Stylesheet, UnknownAtRule};
use crate::error::{ErrorManager, GssError};
use crate::visitor::{walk_mut, Cursor, MutatingVisitor};
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use tracing::debug;

const EXTERNAL_AT_RULE: &str = "external";

pub trait SubstitutionMap {
    fn get(&mut self, key: &str) -> String;
}

/// Replacement table keyed by `prefix + class`.
#[derive(Debug, Default)]
pub struct RenamingSubstitutionMap {
    replacements: HashMap<String, String>,
    external_candidates: BTreeSet<String>,
    classes: BTreeSet<String>,
}

impl RenamingSubstitutionMap {
    pub fn new(table: &IndexMap<String, IndexMap<String, String>>) -> Self {
        let replacements = table
            .iter()
            .flat_map(|(prefix, entries)| {
                entries
                    .iter()
                    .map(move |(class, replacement)| (format!("{}{}", prefix, class), replacement.clone()))
            })
            .collect();
        Self {
            replacements,
            ..Self::default()
        }
    }

    pub fn replacement_of(&self, key: &str) -> Option<&str> {
        self.replacements.get(key).map(String::as_str)
    }

    /// Classes that were looked up without a replacement.
    pub fn external_candidates(&self) -> &BTreeSet<String> {
        &self.external_candidates
    }

    /// Every class looked up, renamed or not.
    pub fn classes(&self) -> &BTreeSet<String> {
        &self.classes
    }
}

impl SubstitutionMap for RenamingSubstitutionMap {
    fn get(&mut self, key: &str) -> String {
        if !self.classes.contains(key) {
            self.classes.insert(key.to_string());
        }
        match self.replacements.get(key) {
            Some(replacement) => replacement.clone(),
            None => {
                if !self.external_candidates.contains(key) {
                    self.external_candidates.insert(key.to_string());
                }
                key.to_string()
            }
        }
    }
}

/// Exact-match map without miss tracking, used to undo renames.
#[derive(Debug, Default)]
struct RevertMap {
    originals: HashMap<String, String>,
}

impl SubstitutionMap for RevertMap {
    fn get(&mut self, key: &str) -> String {
        self.originals
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

struct ClassRenamer<'a> {
    map: &'a mut dyn SubstitutionMap,
    renamed: usize,
}

impl MutatingVisitor for ClassRenamer<'_> {
    fn enter_ruleset(&mut self, ruleset: &mut Ruleset, _cursor: &mut Cursor) -> bool {
        for selector in &mut ruleset.selectors {
            for part in &mut selector.parts {
                if let SelectorPart::Class(name) = part {
                    let replacement = self.map.get(name);
                    if replacement != *name {
                        *name = replacement;
                        self.renamed += 1;
                    }
                }
            }
        }
        true
    }
}

/// Renames every class selector, nested ones included.
pub fn rename_classes(stylesheet: &mut Stylesheet, map: &mut dyn SubstitutionMap) -> usize {
    let mut renamer = ClassRenamer { map, renamed: 0 };
    walk_mut(&mut renamer, &mut stylesheet.root);
    debug!(renamed = renamer.renamed, "renamed class selectors");
    renamer.renamed
}

/// What the `@external` at-rules of a stylesheet declared.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExternalDeclarations {
    /// `@external *;`
    pub all: bool,
    pub names: BTreeSet<String>,
    pub prefixes: BTreeSet<String>,
}

impl ExternalDeclarations {
    /// The external classes among `classes`.
    pub fn resolve(&self, classes: &BTreeSet<String>) -> BTreeSet<String> {
        if self.all {
            return classes.clone();
        }
        let mut external: BTreeSet<String> = self
            .names
            .iter()
            .filter(|name| classes.contains(*name))
            .cloned()
            .collect();
        for prefix in &self.prefixes {
            let tail = classes.range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded));
            external.extend(tail.take_while(|class| class.starts_with(prefix.as_str())).cloned());
        }
        external
    }
}

struct ExternalClassesCollector {
    declarations: ExternalDeclarations,
}

impl MutatingVisitor for ExternalClassesCollector {
    fn enter_at_rule(&mut self, at_rule: &mut UnknownAtRule, cursor: &mut Cursor) -> bool {
        if at_rule.name != EXTERNAL_AT_RULE {
            return true;
        }
        for param in &at_rule.params {
            let text = param.concrete_text();
            let name = text.strip_prefix('.').unwrap_or(&text);
            if name == "*" {
                self.declarations.all = true;
            } else if let Some(prefix) = name.strip_suffix('*') {
                self.declarations.prefixes.insert(prefix.to_string());
            } else if !name.is_empty() {
                self.declarations.names.insert(name.to_string());
            }
        }
        cursor.remove_current();
        false
    }
}

/// Collects and removes every `@external` at-rule.
pub fn collect_external_classes(stylesheet: &mut Stylesheet) -> ExternalDeclarations {
    let mut collector = ExternalClassesCollector {
        declarations: ExternalDeclarations::default(),
    };
    walk_mut(&mut collector, &mut stylesheet.root);
    collector.declarations
}

/// Class names as the output uses them after renaming.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenamingResult {
    /// Logical name to output name for every renamed, non-external class.
    pub mapping: IndexMap<String, String>,
    pub external_classes: BTreeSet<String>,
    /// Classes seen without a replacement.
    pub external_candidates: BTreeSet<String>,
}

/// Restores the original names of external classes renamed earlier and
/// builds the final mapping.
pub fn revert_external_renaming(
    stylesheet: &mut Stylesheet,
    map: &RenamingSubstitutionMap,
    declarations: &ExternalDeclarations,
) -> RenamingResult {
    let external_classes = declarations.resolve(map.classes());

    let mut revert = RevertMap::default();
    let mut mapping = IndexMap::new();
    for class in map.classes() {
        let Some(replacement) = map.replacement_of(class) else {
            continue;
        };
        if external_classes.contains(class) {
            revert
                .originals
                .insert(replacement.to_string(), class.clone());
        } else {
            mapping.insert(class.clone(), replacement.to_string());
        }
    }

    if !revert.originals.is_empty() {
        let reverted = rename_classes(stylesheet, &mut revert);
        debug!(reverted, "reverted renaming of external classes");
    }

    RenamingResult {
        mapping,
        external_classes,
        external_candidates: map.external_candidates().clone(),
    }
}

/// A strict stylesheet may only leave a class unrenamed when it is declared
/// external.
pub fn check_strict_externals(result: &RenamingResult, errors: &mut ErrorManager) {
    for class in result.external_candidates.difference(&result.external_classes) {
        errors.report(GssError::without_location(format!(
            "The following non-obfuscated class is present in a strict CssResource: {}. \
             Fix by adding a String accessor method for it or use an @external \
             declaration for unobfuscated classes.",
            class
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::print;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn table(entries: &[(&str, &str, &str)]) -> IndexMap<String, IndexMap<String, String>> {
        let mut table: IndexMap<String, IndexMap<String, String>> = IndexMap::new();
        for (prefix, class, replacement) in entries {
            table
                .entry(prefix.to_string())
                .or_default()
                .insert(class.to_string(), replacement.to_string());
        }
        table
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn prefixed_entries_are_expanded() {
        let mut map = RenamingSubstitutionMap::new(&table(&[("", "main", "A"), ("Widget-", "title", "B")]));
        assert_eq!(map.get("main"), "A");
        assert_eq!(map.get("Widget-title"), "B");
        assert_eq!(map.get("title"), "title");
        assert_eq!(map.external_candidates(), &set(&["title"]));
    }

    #[test]
    fn misses_are_recorded_once() {
        let mut map = RenamingSubstitutionMap::new(&table(&[("", "main", "A")]));
        for _ in 0..3 {
            assert_eq!(map.get("loose"), "loose");
        }
        map.get("main");
        assert_eq!(map.external_candidates().len(), 1);
        assert_eq!(map.classes(), &set(&["loose", "main"]));
    }

    #[test]
    fn renames_nested_selectors() {
        let mut stylesheet = parse(
            "test.gss",
            ".main .title, div.main:hover { top: 0 }\n@media print { .title { top: 1px } }",
        )
        .expect("parse");
        let mut map = RenamingSubstitutionMap::new(&table(&[("", "main", "A"), ("", "title", "B")]));
        let renamed = rename_classes(&mut stylesheet, &mut map);
        assert_eq!(renamed, 4);
        assert_eq!(
            print(&stylesheet).as_str(),
            ".A .B,div.A:hover{top:0}@media print{.B{top:1px}}"
        );
    }

    #[test]
    fn prefix_patterns_use_sorted_range() {
        let declarations = ExternalDeclarations {
            prefixes: set(&["foo"]),
            ..ExternalDeclarations::default()
        };
        assert_eq!(
            declarations.resolve(&set(&["bar1", "fo", "foo1", "foo2", "fop"])),
            set(&["foo1", "foo2"])
        );
    }

    #[test]
    fn collects_and_removes_external_rules() {
        let mut stylesheet = parse(
            "test.gss",
            "@external \"foo*\";\n@external bar, .baz;\n.foo1{top:0}.foo2{top:0}.bar1{top:0}",
        )
        .expect("parse");
        let declarations = collect_external_classes(&mut stylesheet);
        assert!(!declarations.all);
        assert_eq!(declarations.prefixes, set(&["foo"]));
        assert_eq!(declarations.names, set(&["bar", "baz"]));
        assert_eq!(print(&stylesheet).as_str(), ".foo1{top:0}.foo2{top:0}.bar1{top:0}");

        let mut map = RenamingSubstitutionMap::new(&IndexMap::new());
        rename_classes(&mut stylesheet, &mut map);
        let result = revert_external_renaming(&mut stylesheet, &map, &declarations);
        assert_eq!(result.external_classes, set(&["foo1", "foo2"]));
    }

    #[test]
    fn star_externalizes_everything() {
        let mut stylesheet = parse("test.gss", "@external *;\n.a{top:0}.b{top:0}").expect("parse");
        let declarations = collect_external_classes(&mut stylesheet);
        assert!(declarations.all);

        let mut map = RenamingSubstitutionMap::new(&table(&[("", "a", "X")]));
        rename_classes(&mut stylesheet, &mut map);
        let result = revert_external_renaming(&mut stylesheet, &map, &declarations);
        assert_eq!(result.external_classes, set(&["a", "b"]));
        assert!(result.mapping.is_empty());
        assert_eq!(print(&stylesheet).as_str(), ".a{top:0}.b{top:0}");
    }

    #[test]
    fn reverts_only_external_classes() {
        let mut stylesheet =
            parse("test.gss", "@external keep;\n.keep{top:0}.obf{top:0}").expect("parse");
        let declarations = collect_external_classes(&mut stylesheet);
        let mut map = RenamingSubstitutionMap::new(&table(&[("", "keep", "K"), ("", "obf", "O")]));
        rename_classes(&mut stylesheet, &mut map);
        assert_eq!(print(&stylesheet).as_str(), ".K{top:0}.O{top:0}");

        let result = revert_external_renaming(&mut stylesheet, &map, &declarations);
        assert_eq!(print(&stylesheet).as_str(), ".keep{top:0}.O{top:0}");
        assert_eq!(result.mapping.get("obf").map(String::as_str), Some("O"));
        assert!(!result.mapping.contains_key("keep"));
    }

    #[test]
    fn strict_check_reports_undeclared_candidates() {
        let result = RenamingResult {
            mapping: IndexMap::new(),
            external_classes: set(&["declared"]),
            external_candidates: set(&["declared", "loose"]),
        };
        let mut errors = ErrorManager::default();
        check_strict_externals(&result, &mut errors);
        assert_eq!(errors.errors().len(), 1);
        assert!(errors.errors()[0]
            .message
            .starts_with("The following non-obfuscated class is present in a strict CssResource: loose."));
    }
}
