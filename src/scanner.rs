//! Top-level dependency extraction from integration sources.
//!
//! Only what a source states explicitly is captured: endpoint URIs, language
//! and data format usages, imports of catalog types and `camel-k:` modeline
//! dependencies. Anything the catalog does not know is ignored.

use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, instrument};

use crate::catalog::{Catalog, CatalogArtifact};
use crate::model::{DependencyIdentifier, DependencySet, SourceDocument};
use crate::traits::InspectError;

struct Patterns {
    endpoint_call: Regex,
    keyed_uri: Regex,
    language_call: Regex,
    language_key: Regex,
    dataformat_call: Regex,
    dataformat_key: Regex,
    java_import: Regex,
    modeline: Regex,
}

/// DSL calls and YAML keys whose first argument is an endpoint URI.
const ENDPOINT_CALLS: &str = "from|fromF|to|toD|toF|enrich|pollEnrich|wireTap|interceptFrom|interceptSendToEndpoint|deadLetterChannel";

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        endpoint_call: Regex::new(&format!(
            r#"\b(?:{ENDPOINT_CALLS})\s*\(?\s*["'`]([a-zA-Z][a-zA-Z0-9+.\-]*):"#
        ))
        .expect("valid regex"),
        keyed_uri: Regex::new(&format!(
            r"(?m)(?:^|[\s{{,\-])(?:uri|{ENDPOINT_CALLS})[ \t]*:[ \t]*[\x22']?([a-zA-Z][a-zA-Z0-9+.\-]*):"
        ))
        .expect("valid regex"),
        language_call: Regex::new(r"\b([a-z][a-zA-Z0-9]*)\s*\(").expect("valid regex"),
        language_key: Regex::new(r"(?m)^[ \t\-]*([a-z][a-zA-Z0-9]*)[ \t]*:").expect("valid regex"),
        dataformat_call: Regex::new(
            r"\.(?:marshal|unmarshal)\(\s*\)\s*\.\s*([a-zA-Z][a-zA-Z0-9]*)\s*\(",
        )
        .expect("valid regex"),
        dataformat_key: Regex::new(r"(?:marshal|unmarshal)[ \t]*:\s*-?[ \t]*([a-zA-Z][a-zA-Z0-9\-]*)")
            .expect("valid regex"),
        java_import: Regex::new(r"(?m)^[ \t]*import[ \t]+(?:static[ \t]+)?([\w.]+)")
            .expect("valid regex"),
        modeline: Regex::new(r"(?m)^[ \t]*(?://|#)[ \t]*camel-k:[ \t]*(.*)$").expect("valid regex"),
    })
}

fn captures<'t>(re: &'t Regex, text: &'t str) -> impl Iterator<Item = &'t str> + 't {
    re.captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
}

fn is_yaml(name: &str) -> bool {
    name.ends_with(".yaml") || name.ends_with(".yml")
}

/// Returns every distinct dependency `doc` references directly.
///
/// # Errors
///
/// Fails with [`InspectError::InvalidSource`] for compressed documents; no
/// other content is an error.
#[instrument(skip(doc, catalog), fields(source = %doc.name))]
pub fn scan(doc: &SourceDocument, catalog: &Catalog) -> Result<DependencySet, InspectError> {
    if doc.compressed {
        return Err(InspectError::InvalidSource {
            name: doc.name.clone(),
            reason: "compressed content is not supported".to_string(),
        });
    }

    let text = String::from_utf8_lossy(&doc.content);
    let p = patterns();
    let mut found: Vec<&CatalogArtifact> = Vec::new();

    found.extend(
        captures(&p.endpoint_call, &text)
            .chain(captures(&p.keyed_uri, &text))
            .filter_map(|scheme| catalog.artifact_for_scheme(scheme)),
    );

    let language_keys = if is_yaml(&doc.name) {
        Some(captures(&p.language_key, &text))
    } else {
        None
    };
    found.extend(
        captures(&p.language_call, &text)
            .chain(language_keys.into_iter().flatten())
            .filter_map(|language| catalog.artifact_for_language(language)),
    );

    found.extend(
        captures(&p.dataformat_call, &text)
            .chain(captures(&p.dataformat_key, &text))
            .filter_map(|format| catalog.artifact_for_dataformat(format)),
    );

    for import in captures(&p.java_import, &text) {
        let artifact = catalog.artifact_for_java_type(import).or_else(|| {
            // static imports name a member of the type
            import
                .rsplit_once('.')
                .and_then(|(owner, _)| catalog.artifact_for_java_type(owner))
        });
        found.extend(artifact);
    }

    let mut deps: DependencySet = found.into_iter().map(Catalog::dependency_of).collect();
    deps.extend(modeline_dependencies(&text));

    debug!(count = deps.len(), "Scanned source");
    Ok(deps)
}

/// Scans every document and unions the results.
pub fn scan_all(docs: &[SourceDocument], catalog: &Catalog) -> Result<DependencySet, InspectError> {
    let mut deps = DependencySet::new();
    for doc in docs {
        deps.merge(scan(doc, catalog)?);
    }
    Ok(deps)
}

/// `// camel-k: dependency=mvn:org.acme:lib:1.0 language=java`
fn modeline_dependencies(text: &str) -> impl Iterator<Item = DependencyIdentifier> + '_ {
    captures(&patterns().modeline, text)
        .flat_map(str::split_whitespace)
        .filter_map(|option| option.split_once('='))
        .filter(|(key, _)| *key == "dependency")
        .filter_map(|(_, value)| {
            value
                .trim_matches(|c| c == '"' || c == '\'')
                .parse::<DependencyIdentifier>()
                .ok()
        })
}
