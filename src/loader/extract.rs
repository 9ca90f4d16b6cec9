//! Metadata extractors
//!
//! Each extractor recognizes one declaration notation in one language and returns the
//! metadata record it found. Extraction is text-pattern based; discovered code is never
//! executed.

use super::literal::{balanced_span, parse_literal, LiteralError};
use crate::module::{ModuleMetadata, SourceLanguage};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

/// Outcome of running one extractor over a source file.
pub type Extraction = Option<Result<ModuleMetadata, LiteralError>>;

pub trait MetadataExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn language(&self) -> SourceLanguage;

    /// `None` when this notation is absent, `Some(Err)` when it is present but unreadable.
    fn extract(&self, source: &str) -> Extraction;
}

/// The extractors used by default, in the order they are tried.
pub fn default_extractors() -> Vec<Box<dyn MetadataExtractor>> {
    vec![
        Box::new(ScriptExportExtractor),
        Box::new(PythonDictExtractor),
        Box::new(PythonDocstringExtractor),
    ]
}

fn script_export_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*(?:(?:export[ \t]+)?(?:const|let|var)[ \t]+metadata\b[^=\n]*|(?:module\.)?exports\.metadata[ \t]*)=[ \t]*",
        )
        .expect("Invalid metadata export regex")
    })
}

fn python_dict_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(?:metadata|METADATA)[ \t]*(?::[^=\n]+)?=[ \t]*")
            .expect("Invalid metadata dict regex")
    })
}

/// Try every match of `pattern` and return the first block that parses. When blocks are
/// found but none parse, the first parse error is returned.
fn extract_block(source: &str, pattern: &Regex, language: SourceLanguage) -> Extraction {
    let mut first_error = None;

    for found in pattern.find_iter(source) {
        let start = found.end();
        if !source[start..].starts_with('{') {
            continue;
        }
        let Some(len) = balanced_span(source, start, language) else {
            first_error.get_or_insert(LiteralError::Unexpected {
                ch: '{',
                offset: start,
            });
            continue;
        };

        match parse_literal(&source[start..start + len], language) {
            Ok(Value::Object(map)) => return Some(Ok(ModuleMetadata::from_map(map))),
            Ok(_) => continue,
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }

    first_error.map(Err)
}

/// `export const metadata = {...}` and the CommonJS `exports.metadata = {...}` forms.
pub struct ScriptExportExtractor;

impl MetadataExtractor for ScriptExportExtractor {
    fn name(&self) -> &'static str {
        "script-export"
    }

    fn language(&self) -> SourceLanguage {
        SourceLanguage::TypeScript
    }

    fn extract(&self, source: &str) -> Extraction {
        extract_block(source, script_export_regex(), SourceLanguage::TypeScript)
    }
}

/// A top-level `metadata = {...}` dict literal.
pub struct PythonDictExtractor;

impl MetadataExtractor for PythonDictExtractor {
    fn name(&self) -> &'static str {
        "python-dict"
    }

    fn language(&self) -> SourceLanguage {
        SourceLanguage::Python
    }

    fn extract(&self, source: &str) -> Extraction {
        extract_block(source, python_dict_regex(), SourceLanguage::Python)
    }
}

/// `@tool` / `@description` / `@version` / `@param` / `@capability` directives in the module
/// docstring.
pub struct PythonDocstringExtractor;

impl MetadataExtractor for PythonDocstringExtractor {
    fn name(&self) -> &'static str {
        "python-docstring"
    }

    fn language(&self) -> SourceLanguage {
        SourceLanguage::Python
    }

    fn extract(&self, source: &str) -> Extraction {
        let docstring = module_docstring(source)?;
        let metadata = parse_docstring_directives(docstring)?;
        Some(Ok(metadata))
    }
}

/// Body of the leading triple-quoted string, skipping blank lines, comments and a shebang.
pub(crate) fn module_docstring(source: &str) -> Option<&str> {
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            offset += line.len();
            continue;
        }
        break;
    }

    let rest = &source[offset..];
    let rest = rest.trim_start();
    let rest = rest.strip_prefix(['r', 'R', 'u', 'U']).unwrap_or(rest);
    let quote = if rest.starts_with("\"\"\"") {
        "\"\"\""
    } else if rest.starts_with("'''") {
        "'''"
    } else {
        return None;
    };

    let body = &rest[3..];
    let end = body.find(quote)?;
    Some(&body[..end])
}

fn json_schema_type(declared: &str) -> &'static str {
    match declared.trim_end_matches('?').to_ascii_lowercase().as_str() {
        "int" | "integer" => "integer",
        "float" | "number" | "double" => "number",
        "bool" | "boolean" => "boolean",
        "list" | "array" => "array",
        "dict" | "object" | "map" => "object",
        _ => "string",
    }
}

fn parse_docstring_directives(docstring: &str) -> Option<ModuleMetadata> {
    let mut map = Map::new();
    let mut properties = Map::new();
    let mut required = Vec::new();
    let mut capabilities = Vec::new();
    let mut found = false;

    for line in docstring.lines() {
        let line = line.trim();
        let Some(directive) = line.strip_prefix('@') else {
            continue;
        };
        let (keyword, rest) = directive
            .split_once(char::is_whitespace)
            .map(|(k, r)| (k, r.trim()))
            .unwrap_or((directive, ""));

        match keyword {
            "tool" | "name" if !rest.is_empty() => {
                map.insert("name".to_string(), json!(rest));
                found = true;
            }
            "description" if !rest.is_empty() => {
                map.insert("description".to_string(), json!(rest));
                found = true;
            }
            "version" if !rest.is_empty() => {
                map.insert("version".to_string(), json!(rest));
                found = true;
            }
            "capability" if !rest.is_empty() => capabilities.push(json!(rest)),
            "returns" if !rest.is_empty() => {
                map.insert("returns".to_string(), json!(rest));
            }
            "param" => {
                let mut parts = rest.splitn(3, char::is_whitespace);
                let (Some(name), Some(kind)) = (parts.next(), parts.next()) else {
                    continue;
                };
                let description = parts.next().unwrap_or("").trim();
                let mut property = Map::new();
                property.insert("type".to_string(), json!(json_schema_type(kind)));
                if !description.is_empty() {
                    property.insert("description".to_string(), json!(description));
                }
                properties.insert(name.to_string(), Value::Object(property));
                if !kind.ends_with('?') {
                    required.push(json!(name));
                }
            }
            _ => {}
        }
    }

    if !found {
        return None;
    }
    if !properties.is_empty() {
        map.insert(
            "inputSchema".to_string(),
            json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        );
    }
    if !capabilities.is_empty() {
        map.insert("capabilities".to_string(), Value::Array(capabilities));
    }

    Some(ModuleMetadata::from_map(map))
}
