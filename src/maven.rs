//! Maven implementation of [`BuildTool`].
//!
//! Goals come from the runtime's Maven plugin
//! (`org.apache.camel.k:camel-k-maven-plugin`), pinned to the runtime
//! version of the project being built.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::traits::{BuildGoal, BuildInvocation, BuildOutput, BuildStatus, BuildTool, InspectError};

const PLUGIN: &str = "org.apache.camel.k:camel-k-maven-plugin";

/// How long to keep reading output after a timed-out process is killed.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

pub struct MavenBuildTool {
    executable: PathBuf,
    extra_args: Vec<String>,
}

impl MavenBuildTool {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            extra_args: Vec::new(),
        }
    }

    /// Finds `mvn` on `PATH` unless an explicit executable is given.
    ///
    /// A missing `mvn` is only reported when a build is actually launched,
    /// so top-level inspections work without Maven installed.
    pub fn locate(executable: Option<PathBuf>) -> Self {
        match executable {
            Some(path) => Self::new(path),
            None => match which::which("mvn") {
                Ok(path) => Self::new(path),
                Err(e) => {
                    debug!(target: "maven", "mvn not found on PATH: {}", e);
                    Self::new("mvn")
                }
            },
        }
    }

    /// Extra arguments appended before the goal (e.g. `-o`, `-X`).
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    fn arguments(&self, invocation: &BuildInvocation) -> Vec<String> {
        let workspace = &invocation.workspace;
        let mut args = vec![
            "-B".to_string(),
            "-f".to_string(),
            workspace.join("pom.xml").display().to_string(),
        ];
        if let Some(repository) = &invocation.local_repository {
            args.push(format!("-Dmaven.repo.local={}", repository.display()));
        }
        if let Some(settings) = &invocation.settings {
            args.push("-s".to_string());
            args.push(settings.display().to_string());
        }
        match invocation.goal {
            BuildGoal::DependencyList => {
                args.push(format!(
                    "-Dcamel-k.dependencies.file={}",
                    workspace.join(invocation.goal.output_file()).display()
                ));
            }
            BuildGoal::Catalog => {
                args.push(format!("-Dcatalog.runtime={}", invocation.runtime.provider));
                args.push(format!("-Dcatalog.path={}", workspace.join("target").display()));
                args.push("-Dcatalog.file=catalog.yaml".to_string());
            }
        }
        args.extend(self.extra_args.iter().cloned());
        args.push(format!(
            "{}:{}:{}",
            PLUGIN,
            invocation.runtime.version,
            invocation.goal.goal_name()
        ));
        args
    }
}

async fn drain<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        if let Err(e) = reader.read_to_end(&mut buf).await {
            trace!(target: "maven", "Output stream closed early: {}", e);
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[async_trait]
impl BuildTool for MavenBuildTool {
    fn tool_name(&self) -> &str {
        "mvn"
    }

    async fn run(&self, invocation: &BuildInvocation) -> Result<BuildOutput, InspectError> {
        let args = self.arguments(invocation);
        debug!(
            target: "maven",
            "Executing command: {} {}",
            self.executable.display(),
            args.join(" ")
        );

        let mut child = Command::new(&self.executable)
            .args(&args)
            .current_dir(&invocation.workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                InspectError::build_failure(format!(
                    "Failed to launch {}: {}",
                    self.executable.display(),
                    e
                ))
            })?;

        let stdout = tokio::spawn(drain(child.stdout.take()));
        let stderr = tokio::spawn(drain(child.stderr.take()));

        let status = match timeout(invocation.timeout, child.wait()).await {
            Ok(status) => BuildStatus::Exited(status?.code()),
            Err(_) => {
                warn!(
                    target: "maven",
                    "Command timed out after {} seconds: mvn {}",
                    invocation.timeout.as_secs(),
                    args.join(" ")
                );
                if let Err(e) = child.kill().await {
                    warn!(target: "maven", "Failed to kill timed out build: {}", e);
                }
                BuildStatus::TimedOut
            }
        };

        let collect = |task: tokio::task::JoinHandle<String>| async move {
            match timeout(DRAIN_GRACE, task).await {
                Ok(Ok(text)) => text,
                _ => String::new(),
            }
        };
        let stdout = collect(stdout).await;
        let stderr = collect(stderr).await;

        debug!(target: "maven", "Command finished: {:?}", status);
        Ok(BuildOutput {
            status,
            stdout,
            stderr,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::catalog::{RuntimeProvider, RuntimeSpec};
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn fake_mvn(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("mvn");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn invocation(workspace: &Path, goal: BuildGoal, timeout: Duration) -> BuildInvocation {
        BuildInvocation {
            workspace: workspace.to_path_buf(),
            goal,
            runtime: RuntimeSpec {
                provider: RuntimeProvider::Main,
                version: "1.15.0".to_string(),
            },
            local_repository: Some(PathBuf::from("/tmp/m2")),
            settings: None,
            timeout,
        }
    }

    #[test]
    fn test_arguments() {
        let tool = MavenBuildTool::new("mvn").with_args(["-o"]);
        let inv = invocation(Path::new("/ws"), BuildGoal::DependencyList, Duration::from_secs(1));
        let args = tool.arguments(&inv);

        assert_eq!(&args[..3], &["-B", "-f", "/ws/pom.xml"]);
        assert!(args.contains(&"-Dmaven.repo.local=/tmp/m2".to_string()));
        assert!(args.contains(&"-o".to_string()));
        assert_eq!(
            args.last().unwrap(),
            "org.apache.camel.k:camel-k-maven-plugin:1.15.0:generate-dependency-list"
        );

        let catalog = tool.arguments(&invocation(Path::new("/ws"), BuildGoal::Catalog, Duration::from_secs(1)));
        assert!(catalog.contains(&"-Dcatalog.runtime=main".to_string()));
        assert!(catalog.last().unwrap().ends_with(":generate-catalog"));
    }

    #[tokio::test]
    async fn test_run_captures_output_and_exit_code() {
        let bin = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        let mvn = fake_mvn(bin.path(), "echo resolving\necho broken >&2\nexit 3");

        let output = MavenBuildTool::new(mvn)
            .run(&invocation(ws.path(), BuildGoal::DependencyList, Duration::from_secs(10)))
            .await
            .unwrap();

        assert_eq!(output.status, BuildStatus::Exited(Some(3)));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "resolving");
        assert_eq!(output.stderr.trim(), "broken");
    }

    #[tokio::test]
    async fn test_run_writes_in_workspace() {
        let bin = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        let mvn = fake_mvn(
            bin.path(),
            "mkdir -p target && echo 'dependencies: []' > target/dependencies.yaml",
        );

        let output = MavenBuildTool::new(mvn)
            .run(&invocation(ws.path(), BuildGoal::DependencyList, Duration::from_secs(10)))
            .await
            .unwrap();

        assert!(output.success());
        assert!(ws.path().join("target/dependencies.yaml").exists());
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let bin = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        let mvn = fake_mvn(bin.path(), "echo started\nexec sleep 30");

        let start = std::time::Instant::now();
        let output = MavenBuildTool::new(mvn)
            .run(&invocation(ws.path(), BuildGoal::DependencyList, Duration::from_millis(300)))
            .await
            .unwrap();

        assert_eq!(output.status, BuildStatus::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_executable_is_build_failure() {
        let ws = tempfile::tempdir().unwrap();
        let err = MavenBuildTool::new("/nonexistent/mvn")
            .run(&invocation(ws.path(), BuildGoal::DependencyList, Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, InspectError::BuildFailure { .. }));
    }
}
