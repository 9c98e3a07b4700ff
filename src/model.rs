use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::traits::InspectError;

/// Kind prefix of a dependency identifier (`camel:timer` has kind `camel`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyType {
    Bom,
    Camel,
    CamelK,
    CamelQuarkus,
    Mvn,
    Github,
}

impl DependencyType {
    /// Every accepted type, in the order used by usage messages.
    pub const ACCEPTED: [DependencyType; 6] = [
        DependencyType::Bom,
        DependencyType::Camel,
        DependencyType::CamelK,
        DependencyType::CamelQuarkus,
        DependencyType::Mvn,
        DependencyType::Github,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::Bom => "bom",
            DependencyType::Camel => "camel",
            DependencyType::CamelK => "camel-k",
            DependencyType::CamelQuarkus => "camel-quarkus",
            DependencyType::Mvn => "mvn",
            DependencyType::Github => "github",
        }
    }

    /// `bom|camel|camel-k|...`, for help text.
    pub fn usage() -> String {
        Self::ACCEPTED
            .iter()
            .map(DependencyType::as_str)
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyType {
    type Err = InspectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ACCEPTED
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| InspectError::UnsupportedDependencyType {
                dependency: s.to_string(),
            })
    }
}

/// A `type:name` reference to something the integration needs at runtime.
///
/// The name is opaque here; its shape is only interpreted when a project is
/// synthesized from it (see [`crate::project`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DependencyIdentifier {
    pub kind: DependencyType,
    pub name: String,
}

impl DependencyIdentifier {
    pub fn new(kind: DependencyType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Shorthand for `camel:<name>`.
    pub fn camel(name: impl Into<String>) -> Self {
        Self::new(DependencyType::Camel, name)
    }

    /// Maps a Maven artifact id from the catalog back to the identifier a
    /// user would write for it.
    ///
    /// `camel-quarkus-timer` and `camel-timer` both become `camel:timer`,
    /// `camel-k-cron` becomes `camel-k:cron`.
    pub fn from_artifact(group_id: &str, artifact_id: &str) -> Self {
        if let Some(name) = artifact_id.strip_prefix("camel-quarkus-") {
            Self::camel(name)
        } else if let Some(name) = artifact_id.strip_prefix("camel-k-") {
            Self::new(DependencyType::CamelK, name)
        } else if let Some(name) = artifact_id.strip_prefix("camel-") {
            Self::camel(name)
        } else {
            Self::new(DependencyType::Mvn, format!("{group_id}:{artifact_id}"))
        }
    }

    fn text_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.kind
            .as_str()
            .bytes()
            .chain(std::iter::once(b':'))
            .chain(self.name.bytes())
    }
}

impl FromStr for DependencyIdentifier {
    type Err = InspectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || InspectError::UnsupportedDependencyType {
            dependency: s.to_string(),
        };
        let (kind, name) = s.split_once(':').ok_or_else(unsupported)?;
        let kind: DependencyType = kind.parse().map_err(|_| unsupported())?;
        if name.trim().is_empty() {
            return Err(InspectError::InvalidCoordinates {
                dependency: s.to_string(),
                reason: "empty dependency name".to_string(),
            });
        }
        Ok(Self::new(kind, name.trim()))
    }
}

impl TryFrom<String> for DependencyIdentifier {
    type Error = InspectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DependencyIdentifier> for String {
    fn from(value: DependencyIdentifier) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DependencyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

// Ordered by textual form so listings read the way they print.
impl Ord for DependencyIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text_bytes().cmp(other.text_bytes())
    }
}

impl PartialOrd for DependencyIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Unique dependency identifiers, iterated in sorted textual order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencySet {
    entries: BTreeSet<DependencyIdentifier>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: DependencyIdentifier) -> bool {
        self.entries.insert(id)
    }

    pub fn contains(&self, id: &DependencyIdentifier) -> bool {
        self.entries.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DependencyIdentifier> {
        self.entries.iter()
    }

    /// Adds every identifier of `other` to this set.
    pub fn merge(&mut self, other: DependencySet) {
        self.entries.extend(other.entries);
    }

    /// Set union, leaving both operands untouched.
    pub fn union(&self, other: &DependencySet) -> DependencySet {
        Self {
            entries: self.entries.union(&other.entries).cloned().collect(),
        }
    }

    /// Parses and merges raw `type:name` strings.
    ///
    /// All entries are validated before any is inserted: on error the set is
    /// left exactly as it was.
    pub fn merge_raw<S: AsRef<str>>(&mut self, raw: &[S]) -> Result<(), InspectError> {
        let parsed = raw
            .iter()
            .map(|s| s.as_ref().parse::<DependencyIdentifier>())
            .collect::<Result<Vec<_>, _>>()?;
        self.entries.extend(parsed);
        Ok(())
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }
}

impl FromIterator<DependencyIdentifier> for DependencySet {
    fn from_iter<T: IntoIterator<Item = DependencyIdentifier>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<DependencyIdentifier> for DependencySet {
    fn extend<T: IntoIterator<Item = DependencyIdentifier>>(&mut self, iter: T) {
        self.entries.extend(iter);
    }
}

impl IntoIterator for DependencySet {
    type Item = DependencyIdentifier;
    type IntoIter = std::collections::btree_set::IntoIter<DependencyIdentifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a DependencySet {
    type Item = &'a DependencyIdentifier;
    type IntoIter = std::collections::btree_set::Iter<'a, DependencyIdentifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// One integration source as handed to the scanner.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// File name, without directories (e.g. `Routes.java`)
    pub name: String,
    pub content: Vec<u8>,
    /// Whether `content` is compressed
    pub compressed: bool,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            compressed: false,
        }
    }

    /// Reads a source file from disk, keeping only its base name.
    pub async fn read(path: &Path) -> Result<Self, InspectError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| InspectError::InvalidSource {
                name: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, content))
    }
}

/// A transitive dependency located by the build tool, and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Maven coordinates as reported by the build tool
    pub id: String,
    /// Resolved file, usually inside the local Maven repository
    pub location: PathBuf,
    /// Destination inside the dependencies directory
    pub target: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> DependencySet {
        items.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_identifier_parse_and_display() {
        let id: DependencyIdentifier = "camel-quarkus:timer".parse().unwrap();
        assert_eq!(id.kind, DependencyType::CamelQuarkus);
        assert_eq!(id.name, "timer");
        assert_eq!(id.to_string(), "camel-quarkus:timer");

        let mvn: DependencyIdentifier = "mvn:org.acme:lib:1.0".parse().unwrap();
        assert_eq!(mvn.name, "org.acme:lib:1.0");
    }

    #[test]
    fn test_identifier_rejects_unknown_type() {
        let err = "unknown-type:foo".parse::<DependencyIdentifier>().unwrap_err();
        assert!(matches!(
            err,
            InspectError::UnsupportedDependencyType { ref dependency } if dependency == "unknown-type:foo"
        ));
        assert!("no-separator".parse::<DependencyIdentifier>().is_err());
    }

    #[test]
    fn test_identifier_from_artifact() {
        assert_eq!(
            DependencyIdentifier::from_artifact("org.apache.camel", "camel-timer").to_string(),
            "camel:timer"
        );
        assert_eq!(
            DependencyIdentifier::from_artifact("org.apache.camel.quarkus", "camel-quarkus-log")
                .to_string(),
            "camel:log"
        );
        assert_eq!(
            DependencyIdentifier::from_artifact("org.apache.camel.k", "camel-k-cron").to_string(),
            "camel-k:cron"
        );
        assert_eq!(
            DependencyIdentifier::from_artifact("org.acme", "tools").to_string(),
            "mvn:org.acme:tools"
        );
    }

    #[test]
    fn test_set_iterates_in_textual_order() {
        let deps = set(&["camel:timer", "camel-k:cron", "bom:a/b/1", "camel:log"]);
        assert_eq!(
            deps.to_strings(),
            vec!["bom:a/b/1", "camel-k:cron", "camel:log", "camel:timer"]
        );
    }

    #[test]
    fn test_union_laws() {
        let a = set(&["camel:timer", "camel:log"]);
        let b = set(&["camel:log", "mvn:org.acme:x:1"]);
        let c = set(&["github:acme/repo"]);

        assert_eq!(a.union(&b), b.union(&a));
        assert_eq!(a.union(&b).union(&c), a.union(&b.union(&c)));
        assert_eq!(a.union(&a), a);
    }

    #[test]
    fn test_merge_raw_is_all_or_nothing() {
        let mut deps = set(&["camel:timer"]);
        let before = deps.clone();

        let err = deps
            .merge_raw(&["camel:log", "unknown-type:foo"])
            .unwrap_err();
        assert!(matches!(err, InspectError::UnsupportedDependencyType { .. }));
        assert_eq!(deps, before);

        deps.merge_raw(&["camel:log", "camel:timer"]).unwrap();
        assert_eq!(deps.to_strings(), vec!["camel:log", "camel:timer"]);
    }

    #[test]
    fn test_identifier_serialization() {
        let id = DependencyIdentifier::camel("timer");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"camel:timer\"");
        let back: DependencyIdentifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
