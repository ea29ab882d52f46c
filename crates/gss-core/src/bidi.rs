//! Left-to-right / right-to-left flipping of layout declarations.

use crate::ast::{Declaration, Numeric, Ruleset, Separator, Stylesheet, Value};
use crate::visitor::{walk_mut, Cursor, MutatingVisitor};
use tracing::debug;

/// Exempts a ruleset or a declaration from flipping.
pub const NOFLIP: &str = "@noflip";

const PROPERTY_PAIRS: &[(&str, &str)] = &[
    ("margin-left", "margin-right"),
    ("padding-left", "padding-right"),
    ("border-top-left-radius", "border-top-right-radius"),
    ("border-bottom-left-radius", "border-bottom-right-radius"),
];

const CURSOR_PAIRS: &[(&str, &str)] = &[
    ("e-resize", "w-resize"),
    ("ne-resize", "nw-resize"),
    ("se-resize", "sw-resize"),
];

const FOUR_PART_PROPERTIES: &[&str] = &[
    "margin",
    "padding",
    "border-width",
    "border-color",
    "border-style",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BidiOptions {
    pub swap_ltr_rtl_in_url: bool,
    pub swap_left_right_in_url: bool,
}

#[derive(Debug, Default)]
pub struct BidiFlipper {
    options: BidiOptions,
}

impl BidiFlipper {
    pub fn new(options: BidiOptions) -> Self {
        Self { options }
    }

    pub fn flip_declaration(&self, declaration: &mut Declaration) {
        if declaration.has_comment(NOFLIP) {
            return;
        }

        if let Some(flipped) = flip_property_name(&declaration.property) {
            declaration.property = flipped;
        }

        match declaration.property.as_str() {
            "float" | "clear" | "text-align" => swap_keywords(&mut declaration.value, "left", "right"),
            "direction" => swap_keywords(&mut declaration.value, "ltr", "rtl"),
            "cursor" => {
                for (east, west) in CURSOR_PAIRS {
                    swap_keywords(&mut declaration.value, east, west);
                }
            }
            "background-position" | "background" => {
                for_each_layer(&mut declaration.value, flip_position);
            }
            property if FOUR_PART_PROPERTIES.contains(&property) => {
                if declaration.value.len() == 4 {
                    declaration.value.swap(1, 3);
                }
            }
            _ => {}
        }

        if self.options.swap_ltr_rtl_in_url || self.options.swap_left_right_in_url {
            for value in &mut declaration.value {
                self.flip_urls(value);
            }
        }
    }

    fn flip_urls(&self, value: &mut Value) {
        match value {
            Value::Function(call) if call.name.eq_ignore_ascii_case("url") => {
                for arg in &mut call.args {
                    match arg {
                        Value::Literal(text) => *text = self.flip_url_text(text),
                        Value::String(s) => s.value = self.flip_url_text(&s.value),
                        _ => {}
                    }
                }
            }
            Value::Function(call) => {
                for arg in &mut call.args {
                    self.flip_urls(arg);
                }
            }
            Value::Composite(composite) => {
                for item in &mut composite.values {
                    self.flip_urls(item);
                }
            }
            _ => {}
        }
    }

    fn flip_url_text(&self, url: &str) -> String {
        let mut url = url.to_string();
        if self.options.swap_ltr_rtl_in_url {
            url = swap_substrings(&url, "ltr", "rtl");
        }
        if self.options.swap_left_right_in_url {
            url = swap_substrings(&url, "left", "right");
        }
        url
    }
}

impl MutatingVisitor for BidiFlipper {
    fn enter_ruleset(&mut self, ruleset: &mut Ruleset, _cursor: &mut Cursor) -> bool {
        !ruleset.has_comment(NOFLIP)
    }

    fn enter_declaration(&mut self, declaration: &mut Declaration, _cursor: &mut Cursor) -> bool {
        self.flip_declaration(declaration);
        false
    }
}

fn flip_property_name(property: &str) -> Option<String> {
    match property {
        "left" => return Some("right".to_string()),
        "right" => return Some("left".to_string()),
        _ => {}
    }
    for (left, right) in PROPERTY_PAIRS {
        if property == *left {
            return Some(right.to_string());
        }
        if property == *right {
            return Some(left.to_string());
        }
    }
    // border-left, border-left-color, ...
    if let Some(rest) = property.strip_prefix("border-left") {
        if rest.is_empty() || rest.starts_with('-') {
            return Some(format!("border-right{}", rest));
        }
    }
    if let Some(rest) = property.strip_prefix("border-right") {
        if rest.is_empty() || rest.starts_with('-') {
            return Some(format!("border-left{}", rest));
        }
    }
    None
}

fn swap_keywords(values: &mut [Value], a: &str, b: &str) {
    for value in values {
        match value {
            Value::Literal(text) if text.eq_ignore_ascii_case(a) => *text = b.to_string(),
            Value::Literal(text) if text.eq_ignore_ascii_case(b) => *text = a.to_string(),
            Value::Composite(composite) => swap_keywords(&mut composite.values, a, b),
            _ => {}
        }
    }
}

/// Calls `f` with each comma separated layer of a background value.
fn for_each_layer(values: &mut [Value], mut f: impl FnMut(&mut [Value])) {
    let layered = matches!(values, [Value::Composite(c)] if c.separator == Separator::Comma);
    if !layered {
        f(values);
        return;
    }
    for value in values.iter_mut() {
        let Value::Composite(composite) = value else {
            continue;
        };
        for layer in composite.values.iter_mut() {
            match layer {
                Value::Composite(group) if group.separator == Separator::Space => {
                    f(group.values.as_mut_slice())
                }
                single => f(std::slice::from_mut(single)),
            }
        }
    }
}

/// Swaps `left`/`right` and mirrors the horizontal offset when it is a
/// percentage. The horizontal offset is the first position value of the
/// layer; an offset following a `left`/`right` keyword is measured from that
/// edge and stays as is.
fn flip_position(layer: &mut [Value]) {
    swap_keywords(layer, "left", "right");
    let horizontal = layer.iter_mut().find(|value| is_position(value));
    if let Some(Value::Numeric(numeric)) = horizontal {
        if numeric.unit != "%" {
            return;
        }
        if let Some(x) = numeric.as_f64() {
            *numeric = Numeric::from_f64(100.0 - x, "%");
        }
    }
}

fn is_position(value: &Value) -> bool {
    match value {
        Value::Numeric(_) => true,
        Value::Literal(text) => matches!(
            text.to_ascii_lowercase().as_str(),
            "left" | "right" | "center" | "top" | "bottom"
        ),
        _ => false,
    }
}

/// Replaces every `a` with `b` and every `b` with `a` in one scan.
fn swap_substrings(text: &str, a: &str, b: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix(a) {
            out.push_str(b);
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix(b) {
            out.push_str(a);
            rest = tail;
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }
    out
}

/// Runs a [`BidiFlipper`] and records whether any declaration actually
/// changed. Numbers compare by value, so `50%` flipped to `50%` is no change.
pub struct RecordingBidiFlipper {
    inner: BidiFlipper,
    changed: bool,
}

impl RecordingBidiFlipper {
    pub fn new(inner: BidiFlipper) -> Self {
        Self {
            inner,
            changed: false,
        }
    }

    pub fn changed(&self) -> bool {
        self.changed
    }
}

impl MutatingVisitor for RecordingBidiFlipper {
    fn enter_ruleset(&mut self, ruleset: &mut Ruleset, cursor: &mut Cursor) -> bool {
        self.inner.enter_ruleset(ruleset, cursor)
    }

    fn enter_declaration(&mut self, declaration: &mut Declaration, cursor: &mut Cursor) -> bool {
        if self.changed {
            return self.inner.enter_declaration(declaration, cursor);
        }
        let before = declaration.clone();
        let visit = self.inner.enter_declaration(declaration, cursor);
        if !same_declaration(&before, declaration) {
            self.changed = true;
        }
        visit
    }
}

fn same_declaration(a: &Declaration, b: &Declaration) -> bool {
    a.property == b.property && a.important == b.important && same_values(&a.value, &b.value)
}

fn same_values(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_value(x, y))
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Numeric(x), Value::Numeric(y)) => {
            x.unit == y.unit
                && match (x.as_f64(), y.as_f64()) {
                    (Some(l), Some(r)) => l == r,
                    _ => x.number == y.number,
                }
        }
        (Value::Function(x), Value::Function(y)) => x.name == y.name && same_values(&x.args, &y.args),
        (Value::Composite(x), Value::Composite(y)) => {
            x.separator == y.separator && same_values(&x.values, &y.values)
        }
        _ => a == b,
    }
}

/// Flips `stylesheet` in place. Returns true when the result differs from
/// the input.
pub fn flip(stylesheet: &mut Stylesheet, options: BidiOptions) -> bool {
    let mut recorder = RecordingBidiFlipper::new(BidiFlipper::new(options));
    walk_mut(&mut recorder, &mut stylesheet.root);
    debug!(changed = recorder.changed(), "flipped stylesheet");
    recorder.changed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::print;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn flipped(source: &str) -> (String, bool) {
        flipped_with(source, BidiOptions::default())
    }

    fn flipped_with(source: &str, options: BidiOptions) -> (String, bool) {
        let mut stylesheet = parse("test.gss", source).expect("parse");
        let changed = flip(&mut stylesheet, options);
        (print(&stylesheet).as_str().to_string(), changed)
    }

    #[test]
    fn flips_property_names() {
        let (css, changed) = flipped(
            ".a { left: 0; margin-right: 1px; border-left-color: red; border-right: none; \
             border-top-left-radius: 2px }",
        );
        assert!(changed);
        assert_eq!(
            css,
            ".a{right:0;margin-left:1px;border-right-color:red;border-left:none;\
             border-top-right-radius:2px}"
        );
    }

    #[test]
    fn flips_keywords() {
        let (css, _) = flipped(
            ".a { float: left; clear: right; text-align: left; direction: rtl; cursor: ne-resize }",
        );
        assert_eq!(
            css,
            ".a{float:right;clear:left;text-align:right;direction:ltr;cursor:nw-resize}"
        );
    }

    #[test]
    fn swaps_second_and_fourth_of_four_values() {
        let (css, _) = flipped(".a { margin: 1px 2px 3px 4px; padding: 1px 2px 3px }");
        assert_eq!(css, ".a{margin:1px 4px 3px 2px;padding:1px 2px 3px}");
    }

    #[test]
    fn mirrors_background_positions() {
        let (css, _) = flipped(
            ".a { background-position: 25% 10%; background: url(x.png) left top no-repeat, \
             url(y.png) 30% 0 }",
        );
        assert_eq!(
            css,
            ".a{background-position:75% 10%;background:url(x.png) right top no-repeat,url(y.png) 70% 0}"
        );
    }

    #[test]
    fn vertical_percentages_are_left_alone() {
        let (css, changed) = flipped(
            ".a { background-position: 0 25% } .b { background: url(x.png) 10px 30% no-repeat }",
        );
        assert!(!changed);
        assert_eq!(
            css,
            ".a{background-position:0 25%}.b{background:url(x.png) 10px 30% no-repeat}"
        );

        let (css, changed) = flipped(".a { background-position: left 25% }");
        assert!(changed);
        assert_eq!(css, ".a{background-position:right 25%}");
    }

    #[test]
    fn noflip_is_honored() {
        let (css, changed) = flipped(
            "/* @noflip */ .a { float: left }\n.b { /* @noflip */ float: left; margin-left: 0 }",
        );
        assert!(changed);
        assert_eq!(css, ".a{float:left}.b{float:left;margin-right:0}");
    }

    #[test]
    fn symmetric_stylesheet_is_unchanged() {
        let (_, changed) = flipped(".a { color: red; background-position: 50% 0; margin: 1px 2px 3px 2px }");
        assert!(!changed);

        let (_, changed) = flipped(".a { background-position: 50.0% 0 }");
        assert!(!changed);
    }

    #[test]
    fn url_swapping_is_opt_in() {
        let source = ".a { background: url(arrow-left-ltr.png) }";
        let (css, changed) = flipped(source);
        assert!(!changed);
        assert_eq!(css, ".a{background:url(arrow-left-ltr.png)}");

        let (css, changed) = flipped_with(
            source,
            BidiOptions {
                swap_ltr_rtl_in_url: true,
                swap_left_right_in_url: true,
            },
        );
        assert!(changed);
        assert_eq!(css, ".a{background:url(arrow-right-rtl.png)}");
    }

    #[test]
    fn swaps_substrings_in_one_pass() {
        assert_eq!(swap_substrings("ltr/rtl/ltr", "ltr", "rtl"), "rtl/ltr/rtl");
    }
}
