//! Handler reference detection.
//!
//! Finds the exported function or class that the generated server will call for a module.
//! Only the declaration is located; nothing is resolved or executed.

use crate::module::{ModuleMetadata, SourceLanguage};
use regex::Regex;
use std::sync::OnceLock;

fn script_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            // export function name / export default async function name
            r"(?m)^[ \t]*export[ \t]+(?:default[ \t]+)?(?:async[ \t]+)?function\s*\*?\s*([A-Za-z_$][\w$]*)",
            // export const name = async (...) => / function
            r"(?m)^[ \t]*export[ \t]+(?:const|let|var)[ \t]+([A-Za-z_$][\w$]*)[^=\n]*=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>)",
            // export class Name
            r"(?m)^[ \t]*export[ \t]+(?:default[ \t]+)?(?:abstract[ \t]+)?class[ \t]+([A-Za-z_$][\w$]*)",
            // export default name;
            r"(?m)^[ \t]*export[ \t]+default[ \t]+([A-Za-z_$][\w$]*)[ \t]*;?[ \t]*$",
            // module.exports.name = / exports.name = function
            r"(?m)^[ \t]*(?:module\.)?exports\.([A-Za-z_$][\w$]*)[ \t]*=[ \t]*(?:async\s+)?(?:function\b|\(|class\b)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("Invalid handler regex"))
        .collect()
    })
}

fn script_anonymous_default() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*(?:export[ \t]+default|module\.exports[ \t]*=)[ \t]*(?:async\s+)?(?:function|class|\()")
            .expect("Invalid default export regex")
    })
}

fn python_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(?:async[ \t]+)?(?:def|class)[ \t]+([A-Za-z][\w]*)")
            .expect("Invalid python handler regex")
    })
}

/// Locate the handler for a module. An explicit `handler` string in the metadata wins when
/// the source declares something by that name.
pub fn detect_handler(
    source: &str,
    language: SourceLanguage,
    metadata: &ModuleMetadata,
) -> Option<String> {
    let candidates = match language {
        SourceLanguage::TypeScript => script_candidates(source),
        SourceLanguage::Python => python_pattern()
            .captures_iter(source)
            .filter_map(|c| c.get(1))
            .map(|m| (m.start(), m.as_str().to_string()))
            .collect(),
    };

    if let Some(declared) = metadata.get("handler").and_then(|v| v.as_str()) {
        if candidates.iter().any(|(_, name)| name == declared) {
            return Some(declared.to_string());
        }
    }

    // prefer a declaration named after the module itself
    if let Some(module_name) = metadata.name() {
        let normalized = module_name.replace('-', "_");
        let camel = to_camel_case(module_name);
        if let Some((_, name)) = candidates
            .iter()
            .find(|(_, n)| *n == normalized || *n == camel || n.eq_ignore_ascii_case(&camel))
        {
            return Some(name.clone());
        }
    }

    if let Some((_, name)) = candidates.into_iter().next() {
        return Some(name);
    }

    if language == SourceLanguage::TypeScript && script_anonymous_default().is_match(source) {
        return Some("default".to_string());
    }

    None
}

fn script_candidates(source: &str) -> Vec<(usize, String)> {
    let mut found: Vec<(usize, String)> = script_patterns()
        .iter()
        .flat_map(|re| re.captures_iter(source))
        .filter_map(|c| c.get(1))
        .map(|m| (m.start(), m.as_str().to_string()))
        .filter(|(_, name)| name != "metadata")
        .collect();
    found.sort();
    found.dedup_by(|a, b| a.1 == b.1);
    found
}

fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '-' || c == '_' || c == ' ' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
