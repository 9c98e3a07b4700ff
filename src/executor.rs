//! Build invoker: stages a synthesized project in a throwaway workspace and
//! runs the build tool against it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::project::Project;
use crate::traits::{BuildGoal, BuildInvocation, BuildStatus, BuildTool, InspectError};

/// Ephemeral, uniquely named directory holding one project and the build
/// tool's working state.
///
/// The directory is removed when the `Workspace` is dropped, including
/// early returns and panics inside the build call.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Creates `maven-XXXXXX` under `root`, or under the system temp dir.
    pub fn create(root: Option<&Path>) -> Result<Self, InspectError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("maven-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "Created workspace");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!(path = %self.path.display(), "Removed workspace"),
                Err(e) => warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove workspace"
                ),
            }
        }
    }
}

/// Raw document written by the build tool (dependency list or catalog).
#[derive(Debug, Clone)]
pub struct GraphOutput {
    pub text: String,
}

/// Runs build tool invocations, at most `concurrency_limit` at a time.
pub struct BuildInvoker {
    tool: Arc<dyn BuildTool>,
    semaphore: Arc<Semaphore>,
    workspace_root: Option<PathBuf>,
    local_repository: Option<PathBuf>,
    settings: Option<PathBuf>,
    timeout: Duration,
}

impl BuildInvoker {
    /// Defaults: one build at a time, 5 minute timeout, system temp dir.
    pub fn new(tool: Arc<dyn BuildTool>) -> Self {
        Self {
            tool,
            semaphore: Arc::new(Semaphore::new(1)),
            workspace_root: None,
            local_repository: None,
            settings: None,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Local Maven repository override (`-Dmaven.repo.local`).
    pub fn with_local_repository(mut self, path: Option<PathBuf>) -> Self {
        self.local_repository = path;
        self
    }

    pub fn with_settings(mut self, path: Option<PathBuf>) -> Self {
        self.settings = path;
        self
    }

    /// Parent directory for workspaces.
    pub fn with_workspace_root(mut self, path: Option<PathBuf>) -> Self {
        self.workspace_root = path;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Computes the transitive dependency list of `project`.
    pub async fn resolve(&self, project: &Project) -> Result<GraphOutput, InspectError> {
        self.invoke(project, BuildGoal::DependencyList).await
    }

    /// Runs `goal` against `project` in a fresh workspace.
    ///
    /// # Errors
    ///
    /// [`InspectError::BuildFailure`] when the tool cannot be started, exits
    /// non-zero, times out, or does not write the goal's output file. The
    /// captured stdout/stderr travel with the error. Nothing is retried.
    #[instrument(skip(self, project, goal), fields(tool = %self.tool.tool_name(), goal = goal.goal_name()))]
    pub async fn invoke(&self, project: &Project, goal: BuildGoal) -> Result<GraphOutput, InspectError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| InspectError::build_failure(format!("Semaphore error: {}", e)))?;

        let workspace = Workspace::create(self.workspace_root.as_deref())?;
        tokio::fs::write(workspace.path().join("pom.xml"), project.to_pom()).await?;

        let invocation = BuildInvocation {
            workspace: workspace.path().to_path_buf(),
            goal,
            runtime: project.runtime.clone(),
            local_repository: self.local_repository.clone(),
            settings: self.settings.clone(),
            timeout: self.timeout,
        };

        info!(
            workspace = %workspace.path().display(),
            dependencies = project.dependencies.len(),
            "Starting build"
        );
        let start = std::time::Instant::now();
        let output = self.tool.run(&invocation).await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        match output.status {
            BuildStatus::TimedOut => {
                warn!(duration_ms, "Build timed out");
                return Err(InspectError::BuildFailure {
                    reason: format!(
                        "{} timed out after {}s",
                        self.tool.tool_name(),
                        self.timeout.as_secs()
                    ),
                    stdout: output.stdout,
                    stderr: output.stderr,
                });
            }
            BuildStatus::Exited(code) if !output.success() => {
                warn!(duration_ms, exit_code = ?code, "Build failed");
                return Err(InspectError::BuildFailure {
                    reason: match code {
                        Some(code) => format!("{} exited with code {}", self.tool.tool_name(), code),
                        None => format!("{} was terminated by a signal", self.tool.tool_name()),
                    },
                    stdout: output.stdout,
                    stderr: output.stderr,
                });
            }
            BuildStatus::Exited(_) => {}
        }

        let result_path = workspace.path().join(goal.output_file());
        let text = match tokio::fs::read_to_string(&result_path).await {
            Ok(text) => text,
            Err(e) => {
                return Err(InspectError::BuildFailure {
                    reason: format!(
                        "{} did not produce {}: {}",
                        self.tool.tool_name(),
                        goal.output_file(),
                        e
                    ),
                    stdout: output.stdout,
                    stderr: output.stderr,
                });
            }
        };

        info!(duration_ms, bytes = text.len(), "Build completed");
        Ok(GraphOutput { text })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::traits::BuildOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    pub enum Script {
        /// Writes each `(id, file name, bytes)` into a fake repository and
        /// lists it in the dependency list.
        Resolve(Vec<(String, String, Vec<u8>)>),
        Fail,
        TimeOut,
        NoOutput,
        Panic,
    }

    pub struct ScriptedTool {
        pub script: Script,
        pub repository: TempDir,
        pub seen: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedTool {
        pub fn new(script: Script) -> Self {
            Self {
                script,
                repository: tempfile::tempdir().unwrap(),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn jars(items: &[(&str, &str)]) -> Self {
            Self::new(Script::Resolve(
                items
                    .iter()
                    .map(|(id, file)| {
                        (id.to_string(), file.to_string(), format!("bytes of {id}").into_bytes())
                    })
                    .collect(),
            ))
        }

        pub fn workspaces(&self) -> Vec<PathBuf> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BuildTool for ScriptedTool {
        fn tool_name(&self) -> &str {
            "scripted"
        }

        async fn run(&self, invocation: &BuildInvocation) -> Result<BuildOutput, InspectError> {
            self.seen.lock().unwrap().push(invocation.workspace.clone());
            assert!(invocation.workspace.join("pom.xml").exists());

            let exited = |code| BuildOutput {
                status: BuildStatus::Exited(Some(code)),
                stdout: "[INFO] scanning".to_string(),
                stderr: String::new(),
            };

            match &self.script {
                Script::Resolve(items) => {
                    let mut listing = String::from("dependencies:\n");
                    for (id, file, bytes) in items {
                        let location = self.repository.path().join(file);
                        std::fs::write(&location, bytes)?;
                        listing.push_str(&format!(
                            "  - id: {}\n    location: {}\n",
                            id,
                            location.display()
                        ));
                    }
                    let target = invocation.workspace.join("target");
                    std::fs::create_dir_all(&target)?;
                    std::fs::write(invocation.workspace.join(invocation.goal.output_file()), listing)?;
                    Ok(exited(0))
                }
                Script::Fail => Ok(BuildOutput {
                    status: BuildStatus::Exited(Some(1)),
                    stdout: "[INFO] BUILD FAILURE".to_string(),
                    stderr: "Could not resolve org.acme:missing".to_string(),
                }),
                Script::TimeOut => Ok(BuildOutput {
                    status: BuildStatus::TimedOut,
                    stdout: "[INFO] Downloading".to_string(),
                    stderr: String::new(),
                }),
                Script::NoOutput => Ok(exited(0)),
                Script::Panic => panic!("build tool crashed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::catalog::fixtures::catalog;
    use crate::model::DependencySet;

    fn project() -> Project {
        let ids: DependencySet = ["camel:timer", "camel:log"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        Project::synthesize(&ids, &catalog()).unwrap()
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let workspace = Workspace::create(None).unwrap();
        let path = workspace.path().to_path_buf();
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("maven-"));
        drop(workspace);
        assert!(!path.exists());
    }

    #[test]
    fn test_workspaces_are_unique() {
        let a = Workspace::create(None).unwrap();
        let b = Workspace::create(None).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn test_resolve_success_removes_workspace() {
        let tool = Arc::new(ScriptedTool::jars(&[(
            "org.apache.camel:camel-timer:jar:3.18.1",
            "camel-timer-3.18.1.jar",
        )]));
        let invoker = BuildInvoker::new(tool.clone());

        let graph = invoker.resolve(&project()).await.unwrap();
        assert!(graph.text.contains("camel-timer-3.18.1.jar"));

        let seen = tool.workspaces();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].exists());
    }

    #[tokio::test]
    async fn test_resolve_failure_carries_diagnostics_and_removes_workspace() {
        let tool = Arc::new(ScriptedTool::new(Script::Fail));
        let invoker = BuildInvoker::new(tool.clone());

        let err = invoker.resolve(&project()).await.unwrap_err();
        match err {
            InspectError::BuildFailure {
                reason,
                stdout,
                stderr,
            } => {
                assert!(reason.contains("exited with code 1"));
                assert!(stdout.contains("BUILD FAILURE"));
                assert!(stderr.contains("org.acme:missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!tool.workspaces()[0].exists());
    }

    #[tokio::test]
    async fn test_resolve_timeout_is_build_failure() {
        let tool = Arc::new(ScriptedTool::new(Script::TimeOut));
        let invoker = BuildInvoker::new(tool.clone()).with_timeout(Duration::from_secs(7));

        let err = invoker.resolve(&project()).await.unwrap_err();
        assert!(matches!(
            err,
            InspectError::BuildFailure { ref reason, .. } if reason.contains("timed out after 7s")
        ));
        assert!(!tool.workspaces()[0].exists());
    }

    #[tokio::test]
    async fn test_resolve_missing_output_is_build_failure() {
        let tool = Arc::new(ScriptedTool::new(Script::NoOutput));
        let invoker = BuildInvoker::new(tool.clone());

        let err = invoker.resolve(&project()).await.unwrap_err();
        assert!(matches!(
            err,
            InspectError::BuildFailure { ref reason, .. } if reason.contains("target/dependencies.yaml")
        ));
        assert!(!tool.workspaces()[0].exists());
    }

    #[tokio::test]
    async fn test_resolve_panic_still_removes_workspace() {
        let tool = Arc::new(ScriptedTool::new(Script::Panic));
        let invoker = Arc::new(BuildInvoker::new(tool.clone()));

        let task = {
            let invoker = invoker.clone();
            tokio::spawn(async move { invoker.resolve(&project()).await.map(|_| ()) })
        };
        assert!(task.await.is_err());
        assert!(!tool.workspaces()[0].exists());
    }

    #[tokio::test]
    async fn test_workspace_root_is_used() {
        let root = tempfile::tempdir().unwrap();
        let tool = Arc::new(ScriptedTool::jars(&[]));
        let invoker =
            BuildInvoker::new(tool.clone()).with_workspace_root(Some(root.path().to_path_buf()));

        invoker.resolve(&project()).await.unwrap();
        assert!(tool.workspaces()[0].starts_with(root.path()));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
