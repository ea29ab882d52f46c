//! Descriptor of the resource bundle a stylesheet is compiled against.
//!
//! `value()`, `resourceUrl()` and `gwt-sprite` name zero-argument accessor
//! methods by dotted path (`icons.arrow`). The descriptor tells the compiler
//! which accessors exist and what kind of resource each returns.

use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResourceBundle {
    #[serde(default)]
    pub methods: IndexMap<String, ResourceMethod>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawMethod")]
pub struct ResourceMethod {
    pub kind: ResourceKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceKind {
    Data,
    Image(ImageResource),
    Text,
    Css,
    Bundle(ResourceBundle),
    Other(String),
}

/// JSON shape of an accessor: `{"kind": "image", "width": 16, ...}`.
#[derive(Deserialize)]
struct RawMethod {
    kind: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    repeat_style: RepeatStyle,
    #[serde(default)]
    methods: IndexMap<String, ResourceMethod>,
}

impl From<RawMethod> for ResourceMethod {
    fn from(raw: RawMethod) -> Self {
        let kind = match raw.kind.as_str() {
            "data" => ResourceKind::Data,
            "image" => ResourceKind::Image(ImageResource {
                width: raw.width,
                height: raw.height,
                repeat_style: raw.repeat_style,
            }),
            "text" => ResourceKind::Text,
            "css" => ResourceKind::Css,
            "bundle" => ResourceKind::Bundle(ResourceBundle {
                methods: raw.methods,
            }),
            _ => ResourceKind::Other(raw.kind),
        };
        Self { kind }
    }
}

impl ResourceKind {
    pub fn type_name(&self) -> &str {
        match self {
            ResourceKind::Data => "DataResource",
            ResourceKind::Image(_) => "ImageResource",
            ResourceKind::Text => "TextResource",
            ResourceKind::Css => "CssResource",
            ResourceKind::Bundle(_) => "ClientBundle",
            ResourceKind::Other(kind) => kind,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageResource {
    pub width: u32,
    pub height: u32,
    pub repeat_style: RepeatStyle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum RepeatStyle {
    #[default]
    None,
    Horizontal,
    Vertical,
    Both,
    Unsupported(String),
}

impl From<String> for RepeatStyle {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "none" => RepeatStyle::None,
            "horizontal" => RepeatStyle::Horizontal,
            "vertical" => RepeatStyle::Vertical,
            "both" => RepeatStyle::Both,
            _ => RepeatStyle::Unsupported(value),
        }
    }
}

impl fmt::Display for RepeatStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepeatStyle::None => f.write_str("None"),
            RepeatStyle::Horizontal => f.write_str("Horizontal"),
            RepeatStyle::Vertical => f.write_str("Vertical"),
            RepeatStyle::Both => f.write_str("Both"),
            RepeatStyle::Unsupported(other) => f.write_str(other),
        }
    }
}

impl ResourceBundle {
    /// Follows a dotted accessor path through nested bundles.
    pub fn method_by_path(&self, path: &str) -> Result<&ResourceMethod, String> {
        let mut bundle = self;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let method = bundle
                .methods
                .get(segment)
                .ok_or_else(|| format!("Cannot find method '{}' in path '{}'", segment, path))?;

            if segments.peek().is_none() {
                return Ok(method);
            }

            bundle = match &method.kind {
                ResourceKind::Bundle(inner) => inner,
                other => {
                    return Err(format!(
                        "Method '{}' returns {} which has no accessor methods",
                        segment,
                        other.type_name()
                    ))
                }
            };
        }
        Err(format!("Empty accessor path '{}'", path))
    }

    pub fn image_by_path(&self, path: &str) -> Result<&ImageResource, String> {
        match &self.method_by_path(path)?.kind {
            ResourceKind::Image(image) => Ok(image),
            other => Err(format!(
                "Method '{}' returns {} instead of ImageResource",
                path,
                other.type_name()
            )),
        }
    }
}
