//! Build executor: sandboxed shell invocations with timeout and
//! environment projection.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use potions_core::recipe::Recipe;
use potions_fetch::Artifact;

use crate::error::{Error, Result};

const DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf /",
    "mkfs",
    "dd if=/dev/zero",
    ":(){:|:&};:",
];

struct Step<'a> {
    label: &'static str,
    script: &'a str,
    timeout: Duration,
}

fn validate_script(script: &str) -> Result<()> {
    if script.trim().is_empty() {
        return Err(Error::ScriptInvalid("script is empty".into()));
    }
    for pattern in DANGEROUS_PATTERNS {
        if script.contains(pattern) {
            return Err(Error::ScriptInvalid(format!(
                "script contains a forbidden pattern: {pattern}"
            )));
        }
    }
    Ok(())
}

fn working_dir(artifact_path: &Path) -> PathBuf {
    if artifact_path.is_dir() {
        artifact_path.to_path_buf()
    } else {
        artifact_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn child_env(recipe: &Recipe, artifact: &Artifact, out_dir: &Path, cwd: &Path) -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = std::env::vars().collect();
    env.push(("PREFIX".into(), out_dir.display().to_string()));
    env.push(("PACKAGE".into(), recipe.name.clone()));
    env.push(("VERSION".into(), artifact.version.clone()));
    env.push(("PLATFORM".into(), artifact.platform.clone()));
    env.push(("SOURCE_DIR".into(), cwd.display().to_string()));
    env.push(("INSTALL_DIR".into(), out_dir.display().to_string()));
    env
}

async fn run_step(step: Step<'_>, cwd: &Path, env: &[(String, String)]) -> Result<()> {
    validate_script(step.script)?;
    tracing::info!(step = step.label, "running build step");

    let mut command = tokio::process::Command::new("/bin/sh");
    command
        .arg("-c")
        .arg(step.script)
        .current_dir(cwd)
        .env_clear()
        .envs(env.iter().cloned())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let forward = async move {
        use tokio::io::{AsyncBufReadExt, BufReader};
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(step = step.label, "{line}");
            }
        }
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(step = step.label, "{line}");
            }
        }
    };

    let wait = async { child.wait().await };

    let (status, _) = match tokio::time::timeout(step.timeout, async { tokio::join!(wait, forward) }).await {
        Ok((status, forwarded)) => (status?, forwarded),
        Err(_) => {
            let _ = child.start_kill();
            return Err(Error::ScriptTimeout(step.timeout));
        }
    };

    if !status.success() {
        return Err(Error::ScriptFailed {
            code: status.code(),
            message: format!("{} exited with {status}", step.label),
        });
    }

    Ok(())
}

/// `run(recipe, artifact, out_dir)`: executes `configure.script`,
/// `build.customBuild`, `build.customInstall`, in that order, skipping
/// any step whose script is empty.
pub async fn run(recipe: &Recipe, artifact: &Artifact, out_dir: &Path) -> Result<()> {
    let cwd = working_dir(&artifact.path);
    let env = child_env(recipe, artifact, out_dir, &cwd);

    let steps = [
        (
            "configure",
            recipe.configure.script.as_deref(),
            Duration::from_secs(recipe.configure.timeout_minutes * 60),
        ),
        (
            "build",
            recipe.build.custom_build.as_deref(),
            Duration::from_secs(recipe.build.timeout_minutes * 60),
        ),
        (
            "install",
            recipe.build.custom_install.as_deref(),
            Duration::from_secs(recipe.build.timeout_minutes * 60),
        ),
    ];

    for (label, script, timeout) in steps {
        let Some(script) = script else { continue };
        if script.trim().is_empty() {
            continue;
        }
        run_step(Step { label, script, timeout }, &cwd, &env).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_script() {
        assert!(validate_script("").is_err());
        assert!(validate_script("   \n").is_err());
    }

    #[test]
    fn rejects_forbidden_patterns() {
        assert!(validate_script("rm -rf /").is_err());
        assert!(validate_script("echo hi; mkfs /dev/sda1").is_err());
        assert!(validate_script(":(){:|:&};:").is_err());
    }

    #[test]
    fn accepts_ordinary_script() {
        assert!(validate_script("make install PREFIX=$PREFIX").is_ok());
    }

    #[tokio::test]
    async fn runs_shell_step_and_captures_failure() {
        let dir = tempfile::tempdir().unwrap();
        let step = Step {
            label: "test",
            script: "exit 3",
            timeout: Duration::from_secs(5),
        };
        let err = run_step(step, dir.path(), &[]).await.unwrap_err();
        match err {
            Error::ScriptFailed { code, .. } => assert_eq!(code, Some(3)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn times_out_long_running_step() {
        let dir = tempfile::tempdir().unwrap();
        let step = Step {
            label: "test",
            script: "sleep 5",
            timeout: Duration::from_millis(50),
        };
        let err = run_step(step, dir.path(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::ScriptTimeout(_)));
    }
}
