use crate::error::{CompileError, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The concatenated text of one or more stylesheet files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    /// Comma separated file names, used in error locations.
    pub name: String,
    pub text: String,
    /// Value of a leading `@charset` rule, which is stripped from `text`.
    pub charset: Option<String>,
}

/// Reads and concatenates `paths`, each file followed by a newline. A file
/// listed twice is read once.
pub fn load_sources(paths: &[PathBuf]) -> Result<LoadedSource> {
    if paths.is_empty() {
        return Err(CompileError::Config("No stylesheet given".to_string()));
    }

    let css_count = paths.iter().filter(|p| has_extension(p, "css")).count();
    if css_count != 0 && css_count != paths.len() {
        return Err(CompileError::Config(
            "Only either css files or gss files are supported".to_string(),
        ));
    }

    let mut visited = HashSet::new();
    let mut names = Vec::new();
    let mut text = String::new();
    let mut charset: Option<String> = None;

    for path in paths {
        let canonical = path.canonicalize().map_err(|source| CompileError::Io {
            path: path.clone(),
            source,
        })?;
        if !visited.insert(canonical.clone()) {
            continue;
        }

        let data = fs::read_to_string(&canonical).map_err(|source| CompileError::Io {
            path: path.clone(),
            source,
        })?;

        let (declared, body) = split_charset(&data);
        if let Some(declared) = declared {
            match &charset {
                Some(existing) if !existing.eq_ignore_ascii_case(&declared) => {
                    return Err(CompileError::Config(format!(
                        "Conflicting @charset in {}: {} vs {}",
                        path.display(),
                        existing,
                        declared
                    )))
                }
                Some(_) => {}
                None => charset = Some(declared),
            }
        }

        text.push_str(body);
        text.push('\n');
        names.push(path.display().to_string());
    }

    debug!(files = names.len(), bytes = text.len(), "loaded stylesheet sources");
    Ok(LoadedSource {
        name: names.join(", "),
        text,
        charset,
    })
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case(extension))
}

/// Splits off a leading `@charset "X";` rule.
fn split_charset(data: &str) -> (Option<String>, &str) {
    let trimmed = data.trim_start_matches('\u{feff}').trim_start();
    let Some(rest) = trimmed.strip_prefix("@charset") else {
        return (None, data);
    };
    let Some(end) = rest.find(';') else {
        return (None, data);
    };
    let value = rest[..end].trim().trim_matches(|c| c == '"' || c == '\'');
    (Some(value.to_string()), &rest[end + 1..])
}
