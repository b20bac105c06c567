use anyhow::{Context, Result};
use std::process::Stdio;
use tokio::{
    io::BufReader,
    process::{ChildStderr, ChildStdout, Command},
};
use tokio_stream::wrappers::LinesStream;

/// Runs `cmd` to completion, logging every line it prints prefixed with `name`.
pub async fn execute(name: &str, mut cmd: Command) -> Result<()> {
    log::debug!("Executing: {:?}", cmd);

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    let mut child = cmd
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to spawn {}.", name))?;

    if let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) {
        tokio::task::spawn(print_progress(name.to_string(), stdout, stderr));
    }
    let status = child
        .wait()
        .await
        .with_context(|| format!("Failed to wait for {}.", name))?;

    if !status.success() {
        anyhow::bail!("{} exited with: {}", name, status);
    }

    Ok(())
}

async fn print_progress(name: String, stdout: ChildStdout, stderr: ChildStderr) {
    use tokio::io::AsyncBufReadExt;
    use tokio_stream::StreamExt;

    // Merge stdout and stderr together
    let mut output = tokio_stream::StreamExt::merge(
        LinesStream::new(BufReader::new(stdout).lines()),
        LinesStream::new(BufReader::new(stderr).lines()),
    );

    while let Some(line) = output.next().await {
        match line {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => log::info!("[{}] {}", name, line.trim()),
            Err(e) => {
                log::warn!("[{}] Unreadable output: {}", name, e);
                break;
            }
        }
    }
}

/// Extracts a `.tar.gz` archive into `dest`.
pub async fn extract(archive: &std::path::Path, dest: &std::path::Path) -> Result<()> {
    let mut cmd = Command::new("tar");
    cmd.arg("-xzf").arg(archive).arg("-C").arg(dest);
    execute("tar", cmd).await
}
