//! Expands `gwt-sprite` declarations into the declarations that display one
//! image resource: size, clipping and background position.

use crate::ast::{Declaration, DotPath, FunctionCall, Node, Stylesheet, Value};
use crate::error::{ErrorManager, GssError, Span};
use crate::resources::{RepeatStyle, ResourceBundle};
use crate::visitor::{walk_mut, Cursor, MutatingVisitor};
use tracing::debug;

pub const SPRITE_PROPERTY: &str = "gwt-sprite";

/// Marks declarations a later declaration of the same property may override.
pub const ALTERNATE: &str = "@alternate";

struct SpriteExpander<'a> {
    resources: &'a ResourceBundle,
    errors: &'a mut ErrorManager,
    expanded: usize,
}

impl SpriteExpander<'_> {
    fn expand(&self, declaration: &Declaration) -> Result<Vec<Node>, String> {
        let [value] = declaration.value.as_slice() else {
            return Err(format!(
                "{} must have exactly one value",
                SPRITE_PROPERTY
            ));
        };
        let path = value.concrete_text();
        let image = self.resources.image_by_path(&path)?;
        let span = declaration.span;

        let repeat = match image.repeat_style {
            RepeatStyle::None => "no-repeat",
            RepeatStyle::Horizontal => "repeat-x",
            RepeatStyle::Vertical => "repeat-y",
            RepeatStyle::Both => "repeat",
            RepeatStyle::Unsupported(ref style) => {
                return Err(format!("Unsupported repeatStyle {} for {}", style, path))
            }
        };

        let accessor = |method: &str| DotPath::new(format!("{}.{}", path, method), span);
        let mut nodes = Vec::with_capacity(4);

        if !matches!(image.repeat_style, RepeatStyle::Horizontal | RepeatStyle::Both) {
            nodes.push(alternate(
                "height",
                vec![Value::DotPath(accessor("getHeight").with_suffix("px"))],
                span,
            ));
        }
        if !matches!(image.repeat_style, RepeatStyle::Vertical | RepeatStyle::Both) {
            nodes.push(alternate(
                "width",
                vec![Value::DotPath(accessor("getWidth").with_suffix("px"))],
                span,
            ));
        }
        if image.repeat_style != RepeatStyle::Both {
            nodes.push(alternate("overflow", vec![Value::literal("hidden")], span));
        }

        nodes.push(alternate(
            "background",
            vec![
                Value::Function(FunctionCall {
                    name: "url".to_string(),
                    args: vec![Value::DotPath(accessor("getSafeUri.asString"))],
                    span,
                }),
                Value::DotPath(accessor("getLeft").with_prefix("-").with_suffix("px")),
                Value::DotPath(accessor("getTop").with_prefix("-").with_suffix("px")),
                Value::literal(repeat),
            ],
            span,
        ));

        Ok(nodes)
    }
}

fn alternate(property: &str, value: Vec<Value>, span: Span) -> Node {
    let mut declaration = Declaration::new(property, value, span);
    declaration.comments.push(format!("/* {} */", ALTERNATE));
    Node::Declaration(declaration)
}

impl MutatingVisitor for SpriteExpander<'_> {
    fn enter_declaration(&mut self, declaration: &mut Declaration, cursor: &mut Cursor) -> bool {
        if declaration.property != SPRITE_PROPERTY {
            return false;
        }
        match self.expand(declaration) {
            Ok(nodes) => {
                cursor.replace_current(nodes, false);
                self.expanded += 1;
            }
            Err(message) => self.errors.report(GssError::new(message, declaration.span)),
        }
        false
    }
}

pub fn expand_sprites(
    stylesheet: &mut Stylesheet,
    resources: &ResourceBundle,
    errors: &mut ErrorManager,
) -> usize {
    let mut expander = SpriteExpander {
        resources,
        errors,
        expanded: 0,
    };
    walk_mut(&mut expander, &mut stylesheet.root);
    debug!(expanded = expander.expanded, "expanded sprites");
    expander.expanded
}
