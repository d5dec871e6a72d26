//! Regeneration tool execution.

use std::io::Read;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;

use crate::config::GeneratorConfig;

/// Errors that prevent the generator from producing an exit status.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout_secs} seconds")]
    Timeout { program: String, timeout_secs: u64 },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        source: std::io::Error,
    },
}

/// Result of one generator run.
#[derive(Debug, Clone)]
pub struct GeneratorOutput {
    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    /// Combined stdout and stderr, in write order.
    pub output: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl GeneratorOutput {
    /// Whether the tool exited with status 0.
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// Launches the configured generator against an input file.
#[derive(Debug, Clone)]
pub struct GeneratorCommand {
    config: GeneratorConfig,
}

impl GeneratorCommand {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Short tool name for diagnostics (`specify` for `/usr/bin/specify`).
    pub fn display_name(&self) -> &str {
        Path::new(&self.config.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.config.program)
    }

    /// Run `<program> <args...> <input>` with `workdir` as working directory.
    ///
    /// The child sees only `PATH` from this process plus the configured
    /// environment. Its stdout and stderr share one pipe, so the captured
    /// output keeps the order the tool wrote in. With a non-zero
    /// `timeout_secs` the child is killed when the limit is reached.
    pub async fn run(&self, input: &Path, workdir: &Path) -> Result<GeneratorOutput, GeneratorError> {
        let start = Instant::now();
        let program = self.config.program.clone();
        let spawn_error = |source: std::io::Error| GeneratorError::Spawn {
            program: program.clone(),
            source,
        };

        let (reader, writer) = std::io::pipe().map_err(spawn_error)?;
        let writer_err = writer.try_clone().map_err(spawn_error)?;

        tracing::debug!(program = %program, input = %input.display(), "running generator");
        let mut child = {
            let mut cmd = Command::new(&program);
            cmd.args(&self.config.args)
                .arg(input)
                .current_dir(workdir)
                .env_clear()
                .stdin(Stdio::null())
                .stdout(writer)
                .stderr(writer_err)
                .kill_on_drop(true);
            if let Some(path) = std::env::var_os("PATH") {
                cmd.env("PATH", path);
            }
            cmd.envs(&self.config.env);
            // dropping `cmd` closes our copies of the write end
            cmd.spawn().map_err(spawn_error)?
        };

        let collector = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
            let mut reader = reader;
            let mut captured = Vec::new();
            reader.read_to_end(&mut captured)?;
            Ok(captured)
        });

        let wait_error = |source: std::io::Error| GeneratorError::Wait {
            program: program.clone(),
            source,
        };

        let status = if self.config.timeout_secs > 0 {
            let limit = Duration::from_secs(self.config.timeout_secs);
            match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    if let Err(e) = child.start_kill() {
                        tracing::debug!(program = %program, error = %e, "kill after timeout failed");
                    }
                    return Err(GeneratorError::Timeout {
                        program: program.clone(),
                        timeout_secs: self.config.timeout_secs,
                    });
                }
            }
        } else {
            child.wait().await
        }
        .map_err(wait_error)?;

        let captured = collector
            .await
            .map_err(|e| wait_error(std::io::Error::other(e)))?
            .map_err(wait_error)?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = status.code().unwrap_or(-1);

        crate::obs::emit_generator_finished(&program, exit_code, duration_ms);

        Ok(GeneratorOutput {
            exit_code,
            output: String::from_utf8_lossy(&captured).into_owned(),
            duration_ms,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn shell(script: &str, timeout_secs: u64) -> GeneratorCommand {
        let mut env = BTreeMap::new();
        env.insert("ANSI_COLORS_DISABLED".to_string(), "1".to_string());
        GeneratorCommand::new(GeneratorConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "specify".to_string()],
            env,
            timeout_secs,
            workspace_prefix: "pkgate_test_".to_string(),
        })
    }

    #[test]
    fn test_output_passed() {
        let ok = GeneratorOutput {
            exit_code: 0,
            output: String::new(),
            duration_ms: 5,
        };
        assert!(ok.passed());
        let failed = GeneratorOutput {
            exit_code: 2,
            ..ok
        };
        assert!(!failed.passed());
    }

    #[test]
    fn test_display_name_strips_directories() {
        let cmd = GeneratorCommand::new(GeneratorConfig {
            program: "/usr/bin/specify".to_string(),
            ..GeneratorConfig::default()
        });
        assert_eq!(cmd.display_name(), "specify");
    }

    #[tokio::test]
    async fn test_runs_in_workdir_with_input_argument() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("pkg.yaml");
        std::fs::write(&input, "Name: pkg\n").unwrap();

        let cmd = shell("pwd; echo \"arg=$1\"", 0);
        let out = cmd.run(&input, dir.path()).await.expect("run failed");
        assert!(out.passed());
        let canonical = dir.path().canonicalize().unwrap();
        assert!(out.output.contains(canonical.to_str().unwrap()));
        assert!(out.output.contains(&format!("arg={}", input.display())));
    }

    #[tokio::test]
    async fn test_controlled_environment() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = shell(
            "echo \"colors=$ANSI_COLORS_DISABLED home=${HOME-unset} path=${PATH:+set}\"",
            0,
        );
        let out = cmd.run(Path::new("x.yaml"), dir.path()).await.unwrap();
        assert_eq!(out.output, "colors=1 home=unset path=set\n");
    }

    #[tokio::test]
    async fn test_captures_stdout_and_stderr_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = shell("echo to-stdout; echo to-stderr >&2; exit 3", 0);
        let out = cmd.run(Path::new("x.yaml"), dir.path()).await.unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(out.output.contains("to-stdout"));
        assert!(out.output.contains("to-stderr"));
    }

    #[tokio::test]
    async fn test_output_keeps_write_order_across_streams() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = shell("echo first >&2; sleep 0.1; echo second; exit 1", 0);
        let out = cmd.run(Path::new("x.yaml"), dir.path()).await.unwrap();
        assert_eq!(out.exit_code, 1);
        assert_eq!(out.output, "first\nsecond\n");
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = shell("exec sleep 5", 1);
        let err = cmd.run(Path::new("x.yaml"), dir.path()).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Timeout { timeout_secs: 1, .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = GeneratorCommand::new(GeneratorConfig {
            program: "pkgate-no-such-generator".to_string(),
            ..GeneratorConfig::default()
        });
        let err = cmd.run(Path::new("x.yaml"), dir.path()).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Spawn { .. }));
    }
}
