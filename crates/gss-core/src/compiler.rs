//! The pass pipeline from a parsed stylesheet to printed output.

use crate::ast::Stylesheet;
use crate::bidi::flip;
use crate::conditionals::{
    collect_boolean_conditions, collect_permutation_axes, collect_runtime_blocks,
    create_runtime_conditionals, eliminate_conditionals, is_fully_static,
    validate_runtime_conditionals,
};
use crate::config::CompileConfig;
use crate::duplicates::check_duplicate_declarations;
use crate::emitter::{print, PrintedStylesheet};
use crate::error::{CompileError, ErrorManager, GssError, Result};
use crate::functions::{resolve_functions, FunctionRegistry};
use crate::parser::parse;
use crate::renaming::{
    check_strict_externals, collect_external_classes, rename_classes, revert_external_renaming,
    RenamingSubstitutionMap,
};
use crate::resolver::{collect_constants, resolve_constants, ConstantDefinitions};
use crate::sprite::expand_sprites;
use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// A parsed stylesheet with its conditions classified.
#[derive(Debug)]
pub struct Prepared {
    stylesheet: Stylesheet,
    permutation_axes: IndexSet<String>,
    boolean_conditions: BTreeSet<String>,
    errors: ErrorManager,
}

impl Prepared {
    pub fn stylesheet(&self) -> &Stylesheet {
        &self.stylesheet
    }

    /// Deferred-binding properties the `@if` conditions switch on.
    pub fn permutation_axes(&self) -> &IndexSet<String> {
        &self.permutation_axes
    }

    /// Boolean configuration flags the `@if` conditions read.
    pub fn boolean_conditions(&self) -> &BTreeSet<String> {
        &self.boolean_conditions
    }

    pub fn errors(&self) -> &[GssError] {
        self.errors.errors()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStylesheet {
    pub ltr: PrintedStylesheet,
    /// Present only when flipping changed something.
    pub rtl: Option<PrintedStylesheet>,
    pub class_mapping: IndexMap<String, String>,
    pub external_classes: BTreeSet<String>,
    pub permutation_axes: IndexSet<String>,
    pub boolean_conditions: BTreeSet<String>,
    pub constants: ConstantDefinitions,
    pub warnings: Vec<GssError>,
    pub rtl_condition: String,
}

impl CompiledStylesheet {
    pub fn flipped(&self) -> bool {
        self.rtl.is_some()
    }

    /// One host expression covering both directions.
    pub fn to_expression(&self) -> String {
        match &self.rtl {
            Some(rtl) => format!(
                "{} ? ({}) : ({})",
                self.rtl_condition,
                rtl.to_expression(),
                self.ltr.to_expression()
            ),
            None => self.ltr.to_expression(),
        }
    }
}

pub struct Compiler {
    config: CompileConfig,
    functions: FunctionRegistry,
}

impl Compiler {
    pub fn new(config: CompileConfig) -> Self {
        let functions = FunctionRegistry::with_defaults(&config.resources);
        Self { config, functions }
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    /// Classifies conditions: runtime rules, boolean flags, permutation axes.
    pub fn prepare(&self, mut stylesheet: Stylesheet) -> Prepared {
        let mut errors = ErrorManager::new(stylesheet.source_name.clone());
        let runtime = create_runtime_conditionals(&mut stylesheet);
        let boolean_conditions = collect_boolean_conditions(&stylesheet);
        let permutation_axes = collect_permutation_axes(&mut stylesheet, &mut errors);
        debug!(
            runtime,
            flags = boolean_conditions.len(),
            axes = permutation_axes.len(),
            "prepared stylesheet"
        );
        Prepared {
            stylesheet,
            permutation_axes,
            boolean_conditions,
            errors,
        }
    }

    pub fn prepare_source(&self, source_name: &str, text: &str) -> Result<Prepared> {
        Ok(self.prepare(parse(source_name, text)?))
    }

    #[instrument(skip_all, fields(source = %prepared.stylesheet.source_name))]
    pub fn compile(&self, prepared: Prepared) -> Result<CompiledStylesheet> {
        let Prepared {
            mut stylesheet,
            permutation_axes,
            boolean_conditions,
            mut errors,
        } = prepared;
        let config = &self.config;

        let mut renaming = RenamingSubstitutionMap::new(&config.replacements);
        rename_classes(&mut stylesheet, &mut renaming);

        let true_conditions =
            config.true_conditions(&permutation_axes, &boolean_conditions, &mut errors);
        let runtime_blocks = collect_runtime_blocks(&mut stylesheet);
        debug!(runtime_blocks = runtime_blocks.len(), "collected runtime blocks");
        eliminate_conditionals(&mut stylesheet, &true_conditions);
        validate_runtime_conditionals(&stylesheet, config.lenient, &mut errors);
        fail_on_errors(&errors)?;

        let definitions = collect_constants(&mut stylesheet, false);
        resolve_constants(&mut stylesheet, &definitions, &mut errors);
        expand_sprites(&mut stylesheet, &config.resources, &mut errors);
        resolve_functions(&mut stylesheet, &self.functions, &mut errors);
        let constants = collect_constants(&mut stylesheet, true);
        if config.simplify {
            check_duplicate_declarations(&stylesheet, &mut errors);
        }
        fail_on_errors(&errors)?;

        let declarations = collect_external_classes(&mut stylesheet);
        let renamed = revert_external_renaming(&mut stylesheet, &renaming, &declarations);
        if config.strict {
            check_strict_externals(&renamed, &mut errors);
        }
        fail_on_errors(&errors)?;

        debug!(
            fully_static = is_fully_static(&stylesheet.root),
            "printing stylesheet"
        );
        let ltr = print(&stylesheet);
        let rtl = flip(&mut stylesheet, config.bidi_options()).then(|| print(&stylesheet));

        let (_, warnings) = errors.into_parts();
        Ok(CompiledStylesheet {
            ltr,
            rtl,
            class_mapping: renamed.mapping,
            external_classes: renamed.external_classes,
            permutation_axes,
            boolean_conditions,
            constants,
            warnings,
            rtl_condition: config.rtl_condition.clone(),
        })
    }

    pub fn compile_source(&self, source_name: &str, text: &str) -> Result<CompiledStylesheet> {
        self.compile(self.prepare_source(source_name, text)?)
    }
}

fn fail_on_errors(errors: &ErrorManager) -> Result<()> {
    if errors.has_errors() {
        return Err(CompileError::Failed {
            errors: errors.errors().to_vec(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compiler(json: &str) -> Compiler {
        Compiler::new(CompileConfig::from_json(json).expect("config"))
    }

    #[test]
    fn prepare_classifies_conditions() {
        let prepared = compiler("{}")
            .prepare_source(
                "test.gss",
                "@if is('ie6') { .a{top:0} } @elseif (MOBILE && !is('locale', 'ar')) { .b{top:0} }\n\
                 @if eval('cfg.on()') { .c{top:0} }",
            )
            .expect("prepare");
        let axes: Vec<_> = prepared.permutation_axes().iter().cloned().collect();
        assert_eq!(axes, vec!["user.agent", "locale"]);
        assert_eq!(
            prepared.boolean_conditions().iter().cloned().collect::<Vec<_>>(),
            vec!["MOBILE"]
        );
        assert!(prepared.errors().is_empty());
    }

    #[test]
    fn compiles_plain_stylesheet() {
        let compiled = compiler(r#"{ "true_conditions": ["WIDE"], "strict": false }"#)
            .compile_source(
                "test.gss",
                "@def W 10px;\n@if WIDE { .a { width: add(W, 5px) } } @else { .a { width: W } }",
            )
            .expect("compile");
        assert_eq!(compiled.ltr, PrintedStylesheet::Css(".a{width:15px}".to_string()));
        assert_eq!(compiled.rtl, None);
        assert_eq!(compiled.to_expression(), "\".a{width:15px}\"");
        assert_eq!(compiled.constants["W"].params.len(), 1);
    }

    #[test]
    fn rtl_variant_only_when_flipped() {
        let compiled = compiler(r#"{ "strict": false, "rtl_condition": "isRtl()" }"#)
            .compile_source("test.gss", ".a { float: left }")
            .expect("compile");
        assert!(compiled.flipped());
        assert_eq!(
            compiled.to_expression(),
            "isRtl() ? (\".a{float:right}\") : (\".a{float:left}\")"
        );
    }

    #[test]
    fn renames_and_reverts_externals() {
        let compiled = compiler(r#"{ "replacements": { "": { "main": "A", "ext": "B" } } }"#)
            .compile_source("test.gss", "@external ext;\n.main{top:0}.ext{top:0}")
            .expect("compile");
        assert_eq!(compiled.ltr.as_str(), ".A{top:0}.ext{top:0}");
        assert_eq!(compiled.class_mapping.get("main").map(String::as_str), Some("A"));
        assert!(compiled.external_classes.contains("ext"));
    }

    #[test]
    fn strict_mode_rejects_unrenamed_classes() {
        let err = compiler("{}")
            .compile_source("test.gss", ".loose{top:0}")
            .unwrap_err();
        let CompileError::Failed { errors } = err else {
            panic!("expected failure");
        };
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("loose"));
    }

    #[test]
    fn collects_every_error_of_a_phase() {
        let err = compiler(r#"{ "strict": false }"#)
            .compile_source("test.gss", ".a { width: MISSING; src: resourceUrl('nope'); top: eval() }")
            .unwrap_err();
        let CompileError::Failed { errors } = err else {
            panic!("expected failure");
        };
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn lenient_mode_keeps_warnings() {
        let compiled = compiler(r#"{ "strict": false, "lenient": true }"#)
            .compile_source("test.gss", "@if eval('x()') { @def C 1px; .a { top: C } }")
            .expect("compile");
        assert_eq!(compiled.warnings.len(), 1);
        assert!(compiled.ltr.is_expression());
    }
}
