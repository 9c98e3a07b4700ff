//! Rendering of dependency lists for stdout.

use serde::Serialize;

use crate::traits::InspectError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Serialize)]
struct Listing<'a> {
    dependencies: &'a [String],
}

pub fn render(format: OutputFormat, dependencies: &[String]) -> Result<String, InspectError> {
    let listing = Listing { dependencies };
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(&listing)
            .map(|mut text| {
                text.push('\n');
                text
            })
            .map_err(|e| InspectError::Output(e.to_string())),
        OutputFormat::Yaml => {
            serde_yaml::to_string(&listing).map_err(|e| InspectError::Output(e.to_string()))
        }
    }
}

/// One dependency per line.
pub fn render_plain(dependencies: &[String]) -> String {
    dependencies.iter().map(|d| format!("{d}\n")).collect()
}

/// What gets printed for a finished run, if anything.
///
/// Without an explicit format, top-level lists are printed as plain text
/// while transitive runs stay quiet: their result is the dependencies
/// directory.
pub fn report(
    format: Option<OutputFormat>,
    transitive: bool,
    dependencies: &[String],
) -> Result<Option<String>, InspectError> {
    match format {
        Some(format) => render(format, dependencies).map(Some),
        None if transitive => Ok(None),
        None => Ok(Some(render_plain(dependencies))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps() -> Vec<String> {
        vec!["camel:log".to_string(), "camel:timer".to_string()]
    }

    #[test]
    fn test_render_plain() {
        assert_eq!(render_plain(&deps()), "camel:log\ncamel:timer\n");
        assert_eq!(render_plain(&[]), "");
    }

    #[test]
    fn test_render_json() {
        let text = render(OutputFormat::Json, &deps()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["dependencies"][1], "camel:timer");
    }

    #[test]
    fn test_render_yaml() {
        let text = render(OutputFormat::Yaml, &deps()).unwrap();
        assert_eq!(text, "dependencies:\n- camel:log\n- camel:timer\n");
    }

    #[test]
    fn test_report_modes() {
        assert_eq!(
            report(None, false, &deps()).unwrap().as_deref(),
            Some("camel:log\ncamel:timer\n")
        );
        assert_eq!(report(None, true, &deps()).unwrap(), None);
        assert!(report(Some(OutputFormat::Json), true, &deps())
            .unwrap()
            .is_some());
    }
}
