use crate::bidi::BidiOptions;
use crate::error::{CompileError, ErrorManager, GssError, Result};
use crate::resources::ResourceBundle;
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

pub const DEFAULT_RTL_CONDITION: &str =
    "com.google.gwt.i18n.client.LocaleInfo.getCurrentLocale().isRTL()";

/// Everything a compilation needs besides the stylesheet itself.
///
/// Loaded from a single JSON document:
///
/// ```json
/// {
///   "properties": { "user.agent": "safari", "MOBILE": "false" },
///   "replacements": { "": { "button": "a1" }, "Shared-": { "title": "b2" } },
///   "resources": { "methods": { "logo": { "kind": "image" } } },
///   "lenient": false
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    pub true_conditions: BTreeSet<String>,
    pub properties: IndexMap<String, PropertyValues>,
    pub replacements: IndexMap<String, IndexMap<String, String>>,
    pub resources: ResourceBundle,
    pub lenient: bool,
    pub strict: bool,
    pub simplify: bool,
    pub rtl_condition: String,
    /// Rewrite `ltr`/`rtl` inside `url(...)` when flipping.
    pub swap_ltr_rtl_in_url: bool,
    /// Rewrite `left`/`right` inside `url(...)` when flipping.
    pub swap_left_right_in_url: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            true_conditions: BTreeSet::new(),
            properties: IndexMap::new(),
            replacements: IndexMap::new(),
            resources: ResourceBundle::default(),
            lenient: false,
            strict: true,
            simplify: true,
            rtl_condition: DEFAULT_RTL_CONDITION.to_string(),
            swap_ltr_rtl_in_url: false,
            swap_left_right_in_url: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PropertyValues {
    Single(String),
    Multiple(Vec<String>),
}

impl PropertyValues {
    fn values(&self) -> Vec<&str> {
        match self {
            PropertyValues::Single(value) => vec![value.as_str()],
            PropertyValues::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

impl CompileConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_json(path.as_ref())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CompileError::Config(e.to_string()))
    }

    pub fn bidi_options(&self) -> BidiOptions {
        BidiOptions {
            swap_ltr_rtl_in_url: self.swap_ltr_rtl_in_url,
            swap_left_right_in_url: self.swap_left_right_in_url,
        }
    }

    /// The condition names an `@if` is evaluated against.
    ///
    /// `true_conditions` are always included. When `properties` is not empty,
    /// each permutation axis contributes `axis:value` and each boolean
    /// condition whose property is `"true"` contributes its own name; an
    /// axis or condition without a property is reported.
    pub fn true_conditions(
        &self,
        permutation_axes: &IndexSet<String>,
        boolean_conditions: &BTreeSet<String>,
        errors: &mut ErrorManager,
    ) -> BTreeSet<String> {
        let mut conditions = self.true_conditions.clone();
        if self.properties.is_empty() {
            return conditions;
        }

        for axis in permutation_axes {
            match self.properties.get(axis).map(PropertyValues::values) {
                Some(values) => {
                    if let Some(current) = values.first() {
                        conditions.insert(format!("{}:{}", axis, current));
                    }
                }
                None => errors.report(GssError::without_location(format!(
                    "Unknown configuration property [{}]",
                    axis
                ))),
            }
        }

        for condition in boolean_conditions {
            let name = condition.strip_prefix('!').unwrap_or(condition);
            let Some(property) = self.properties.get(name) else {
                errors.report(GssError::without_location(format!(
                    "Unknown configuration property [{}]",
                    name
                )));
                continue;
            };

            match property.values().as_slice() {
                ["true"] => {
                    conditions.insert(name.to_string());
                }
                ["false"] => {}
                [_] => errors.report(GssError::without_location(format!(
                    "The configuration property {} is used in a conditional css. \
                     Its value must be either \"true\" or \"false\"",
                    name
                ))),
                _ => errors.report(GssError::without_location(format!(
                    "The configuration property {} is used in a conditional css \
                     and cannot be a multi-valued property",
                    name
                ))),
            }
        }

        conditions
    }
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).map_err(|source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str::<T>(&data)
        .map_err(|e| CompileError::Config(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_fields_missing() {
        let config = CompileConfig::from_json("{}").expect("config");
        assert!(config.strict);
        assert!(!config.lenient);
        assert!(config.simplify);
        assert_eq!(config.rtl_condition, DEFAULT_RTL_CONDITION);
        assert_eq!(config.bidi_options(), BidiOptions::default());
    }

    #[test]
    fn derives_conditions_from_properties() {
        let config = CompileConfig::from_json(
            r#"{
                "true_conditions": ["EXTRA"],
                "properties": {
                    "user.agent": "gecko1_8",
                    "MOBILE": "true",
                    "DEBUG": "false"
                }
            }"#,
        )
        .expect("config");

        let axes: IndexSet<String> = ["user.agent".to_string()].into_iter().collect();
        let flags: BTreeSet<String> = ["MOBILE".to_string(), "DEBUG".to_string()]
            .into_iter()
            .collect();
        let mut errors = ErrorManager::default();
        let conditions = config.true_conditions(&axes, &flags, &mut errors);

        assert!(!errors.has_errors());
        let expected: BTreeSet<String> = ["EXTRA", "MOBILE", "user.agent:gecko1_8"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(conditions, expected);
    }

    #[test]
    fn rejects_unknown_and_non_boolean_properties() {
        let config = CompileConfig::from_json(
            r#"{ "properties": { "THEME": "dark", "LOCALES": ["en", "fr"] } }"#,
        )
        .expect("config");

        let axes: IndexSet<String> = ["user.agent".to_string()].into_iter().collect();
        let flags: BTreeSet<String> = ["THEME", "LOCALES"].into_iter().map(String::from).collect();
        let mut errors = ErrorManager::default();
        config.true_conditions(&axes, &flags, &mut errors);

        let messages: Vec<_> = errors.errors().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("Unknown configuration property [user.agent]"));
        assert!(messages.iter().any(|m| m.contains("multi-valued")));
        assert!(messages.iter().any(|m| m.contains("THEME")));
    }

    #[test]
    fn load_reports_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().expect("tmp");
        write!(file, "{{ not json").expect("write");
        let err = CompileConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, CompileError::Config(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = CompileConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, CompileError::Io { .. }));
    }
}
