use crate::catalog::{Catalog, RuntimeSpec};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InspectError {
    #[error("Camel catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Unexpected type for dependency: {dependency}, expected <type>:<name> with type one of {{bom|camel|camel-k|camel-quarkus|mvn|github}}")]
    UnsupportedDependencyType { dependency: String },

    #[error("Invalid coordinates in {dependency}: {reason}")]
    InvalidCoordinates { dependency: String, reason: String },

    #[error("Build failed: {reason}")]
    BuildFailure {
        reason: String,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to copy {} to {}: {io}", source_path.display(), target_path.display())]
    ArtifactCopyError {
        source_path: PathBuf,
        target_path: PathBuf,
        #[source]
        io: std::io::Error,
    },

    #[error("Invalid source {name}: {reason}")]
    InvalidSource { name: String, reason: String },

    #[error("Stage '{stage}' timed out after {timeout_secs}s")]
    StageTimeout { stage: String, timeout_secs: u64 },

    #[error("Stage '{stage}' failed: {reason}")]
    StageFailed { stage: String, reason: String },

    #[error("Failed to render output: {0}")]
    Output(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InspectError {
    pub(crate) fn build_failure(reason: impl Into<String>) -> Self {
        Self::BuildFailure {
            reason: reason.into(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Which plugin goal the build tool runs against a synthesized project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildGoal {
    /// Resolve the transitive closure and list every artifact with its file
    DependencyList,
    /// Generate the runtime catalog for the project's runtime
    Catalog,
}

impl BuildGoal {
    /// Plugin goal name passed on the command line.
    pub fn goal_name(&self) -> &'static str {
        match self {
            BuildGoal::DependencyList => "generate-dependency-list",
            BuildGoal::Catalog => "generate-catalog",
        }
    }

    /// File the goal writes, relative to the workspace.
    pub fn output_file(&self) -> &'static str {
        match self {
            BuildGoal::DependencyList => "target/dependencies.yaml",
            BuildGoal::Catalog => "target/catalog.yaml",
        }
    }
}

/// Everything a build tool needs to run one goal inside a workspace.
#[derive(Debug, Clone)]
pub struct BuildInvocation {
    pub workspace: PathBuf,
    pub goal: BuildGoal,
    pub runtime: RuntimeSpec,
    pub local_repository: Option<PathBuf>,
    pub settings: Option<PathBuf>,
    pub timeout: Duration,
}

/// How the build tool process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Exited(Option<i32>),
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub status: BuildStatus,
    pub stdout: String,
    pub stderr: String,
}

impl BuildOutput {
    pub fn success(&self) -> bool {
        self.status == BuildStatus::Exited(Some(0))
    }
}

#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Returns the tool name used in logs (e.g., "mvn").
    fn tool_name(&self) -> &str;

    /// Runs the invocation to completion or until its timeout expires.
    ///
    /// Only failures to launch the tool are errors; a non-zero exit or a
    /// timeout is reported through [`BuildOutput::status`].
    async fn run(&self, invocation: &BuildInvocation) -> Result<BuildOutput, InspectError>;
}

#[async_trait]
pub trait CatalogBuilder: Send + Sync {
    /// Builds the catalog for `runtime`.
    async fn build(&self, runtime: &RuntimeSpec) -> Result<Catalog, InspectError>;
}
