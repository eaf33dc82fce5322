use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::{fs, process::Command};
use tracing::{info, warn};

use super::types::{RenderEngine, RenderError, RenderJob};

const TARGET: &str = "application::render::command";

/// Renders reports by running an external executable once per job.
///
/// Each job gets a private workspace holding `template.<ext>`, `data.json`
/// and `options.json`; the executable is called as
/// `<program> --template <path> --data <path> --options <path> --output <path>`
/// and must write the report to the output path.
#[derive(Debug, Clone)]
pub struct CommandRenderEngine {
    program: PathBuf,
    work_dir: PathBuf,
    timeout: Duration,
}

impl CommandRenderEngine {
    pub fn new(
        program: PathBuf,
        work_dir: PathBuf,
        timeout: Duration,
    ) -> Result<Self, RenderError> {
        std::fs::create_dir_all(&work_dir).map_err(RenderError::Io)?;
        Ok(Self {
            program,
            work_dir,
            timeout,
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl RenderEngine for CommandRenderEngine {
    async fn render(&self, job: RenderJob<'_>) -> Result<Bytes, RenderError> {
        let started_at = Instant::now();
        let workspace = tempfile::Builder::new()
            .prefix("render-")
            .tempdir_in(&self.work_dir)
            .map_err(RenderError::Io)?;

        let template_name = match job.template.extension.as_deref() {
            Some(extension) => format!("template.{extension}"),
            None => "template".to_string(),
        };
        let template_path = workspace.path().join(template_name);
        let data_path = workspace.path().join("data.json");
        let options_path = workspace.path().join("options.json");
        let output_path = workspace
            .path()
            .join(format!("output.{}", job.target.convert_to));

        let mut options = job.options.clone();
        options.insert(
            "convertTo".to_string(),
            Value::String(job.target.convert_to.clone()),
        );
        options.insert(
            "reportName".to_string(),
            Value::String(job.target.report_name.clone()),
        );

        fs::write(&template_path, &job.content)
            .await
            .map_err(RenderError::Io)?;
        fs::write(&data_path, job.data.to_string())
            .await
            .map_err(RenderError::Io)?;
        fs::write(&options_path, Value::Object(options).to_string())
            .await
            .map_err(RenderError::Io)?;

        let mut command = Command::new(&self.program);
        command
            .arg("--template")
            .arg(&template_path)
            .arg("--data")
            .arg(&data_path)
            .arg("--options")
            .arg(&options_path)
            .arg("--output")
            .arg(&output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!(
                    target = TARGET,
                    op = "command::render",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_code = "spawn_engine",
                    program = %self.program.display(),
                    error = %err,
                    "Failed to spawn render engine"
                );
                return Err(if err.kind() == ErrorKind::NotFound {
                    RenderError::Unavailable(err)
                } else {
                    RenderError::Io(err)
                });
            }
            Err(_) => {
                warn!(
                    target = TARGET,
                    op = "command::render",
                    result = "timeout",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Render engine timed out"
                );
                return Err(RenderError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                target = TARGET,
                op = "command::render",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "engine_failed",
                stderr = %stderr,
                "Render engine invocation failed"
            );
            return Err(RenderError::Engine { exit_code, stderr });
        }

        let report = match fs::read(&output_path).await {
            Ok(report) => report,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(RenderError::Io(err)),
        };
        if report.is_empty() {
            warn!(
                target = TARGET,
                op = "command::render",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error_code = "empty_output",
                "Render engine exited cleanly without writing a report"
            );
            return Err(RenderError::EmptyOutput);
        }

        info!(
            target = TARGET,
            op = "command::render",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            template = %job.template.identifier,
            convert_to = %job.target.convert_to,
            report_bytes = report.len(),
            "Report rendered"
        );

        Ok(Bytes::from(report))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::{fs, os::unix::fs::PermissionsExt};

    use serde_json::{Map, json};
    use tempfile::TempDir;
    use time::OffsetDateTime;

    use super::*;
    use crate::application::render::types::RenderTarget;
    use crate::cache::hash;
    use crate::domain::entries::CacheEntry;

    fn make_executable(path: &Path) {
        let mut perms = fs::metadata(path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).expect("set perms");
    }

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-engine");
        fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
        make_executable(&path);
        path
    }

    fn entry() -> CacheEntry {
        CacheEntry {
            identifier: hash(b"Hello {d.name}"),
            display_name: "greeting.txt".to_string(),
            extension: Some("txt".to_string()),
            storage_path: PathBuf::from("/dev/null"),
            size: 14,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    async fn run(engine: &CommandRenderEngine) -> Result<Bytes, RenderError> {
        let template = entry();
        let target = RenderTarget {
            convert_to: "pdf".to_string(),
            report_name: "greeting.pdf".to_string(),
        };
        let data = json!({ "name": "world" });
        let mut options = Map::new();
        options.insert("lang".to_string(), json!("en-us"));
        engine
            .render(RenderJob {
                template: &template,
                content: Bytes::from_static(b"Hello {d.name}"),
                data: &data,
                target: &target,
                options: &options,
            })
            .await
    }

    #[tokio::test]
    async fn passes_workspace_files_and_returns_output() {
        let dir = TempDir::new().expect("temp dir");
        let args_path = dir.path().join("args.log");
        let script = write_script(
            dir.path(),
            &format!(
                r#"set -eu
echo "$@" > "{args}"
while [ "$#" -gt 0 ]; do
  case "$1" in
    --template) shift; template="$1" ;;
    --data) shift; data="$1" ;;
    --options) shift; options="$1" ;;
    --output) shift; out="$1" ;;
  esac
  shift
done
cat "$template" "$data" "$options" > "$out"
"#,
                args = args_path.display()
            ),
        );

        let engine = CommandRenderEngine::new(script, dir.path().join("work"), Duration::from_secs(5))
            .expect("engine");
        let report = run(&engine).await.expect("rendered");
        let report = String::from_utf8(report.to_vec()).expect("utf8");

        assert!(report.starts_with("Hello {d.name}"), "report: {report}");
        assert!(report.contains(r#""name":"world""#), "report: {report}");
        assert!(report.contains(r#""convertTo":"pdf""#), "report: {report}");
        assert!(report.contains(r#""lang":"en-us""#), "report: {report}");

        let args = fs::read_to_string(&args_path).expect("read args");
        assert!(args.contains("template.txt"), "args: {args}");
        assert!(args.contains("output.pdf"), "args: {args}");

        let leftover = fs::read_dir(dir.path().join("work")).expect("work dir").count();
        assert_eq!(leftover, 0, "job workspace should be removed");
    }

    #[tokio::test]
    async fn surfaces_engine_errors() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(dir.path(), "echo \"boom\" >&2\nexit 42\n");
        let engine = CommandRenderEngine::new(script, dir.path().join("work"), Duration::from_secs(5))
            .expect("engine");

        match run(&engine).await.expect_err("engine failure") {
            RenderError::Engine { exit_code, stderr } => {
                assert_eq!(exit_code, Some(42));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_output_is_reported() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(dir.path(), "exit 0\n");
        let engine = CommandRenderEngine::new(script, dir.path().join("work"), Duration::from_secs(5))
            .expect("engine");

        assert!(matches!(run(&engine).await, Err(RenderError::EmptyOutput)));
    }

    #[tokio::test]
    async fn slow_engine_times_out() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(dir.path(), "sleep 5\n");
        let engine =
            CommandRenderEngine::new(script, dir.path().join("work"), Duration::from_millis(100))
                .expect("engine");

        assert!(matches!(run(&engine).await, Err(RenderError::Timeout(_))));
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let dir = TempDir::new().expect("temp dir");
        let engine = CommandRenderEngine::new(
            dir.path().join("does-not-exist"),
            dir.path().join("work"),
            Duration::from_secs(5),
        )
        .expect("engine");

        assert!(matches!(run(&engine).await, Err(RenderError::Unavailable(_))));
    }
}
