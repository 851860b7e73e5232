use std::time::Duration;

use tokio::process::Command;
use tracing::{info, warn};

/// Delay before the command runs so the 202 response can flush first.
const RESTART_FLUSH_DELAY: Duration = Duration::from_millis(350);
const RESTART_TIMEOUT: Duration = Duration::from_secs(45);

/// Runs the restart command under the platform shell with a bounded
/// timeout. Invoked from a detached task after the handler has responded.
pub(super) async fn execute_restart_command(raw: &str) {
    let command = raw.trim();
    if command.is_empty() {
        return;
    }
    info!("remote restart executing command={:?}", command);

    tokio::time::sleep(RESTART_FLUSH_DELAY).await;

    let output = match tokio::time::timeout(RESTART_TIMEOUT, shell_command(command).output()).await
    {
        Err(_) => {
            warn!(
                "remote restart command timed out after {}s",
                RESTART_TIMEOUT.as_secs()
            );
            return;
        }
        Ok(Err(err)) => {
            warn!("remote restart command failed to spawn: {}", err);
            return;
        }
        Ok(Ok(output)) => output,
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    let combined = combined.trim();

    if !output.status.success() {
        if combined.is_empty() {
            warn!("remote restart command failed: {}", output.status);
        } else {
            warn!(
                "remote restart command failed: {}: {}",
                output.status, combined
            );
        }
        return;
    }

    if !combined.is_empty() {
        info!("remote restart command output: {}", combined);
    }
    info!("remote restart command completed successfully");
}

fn shell_command(command: &str) -> Command {
    #[cfg(windows)]
    {
        let mut shell = Command::new("cmd");
        shell.arg("/C").arg(command);
        shell
    }
    #[cfg(not(windows))]
    {
        let mut shell = Command::new("sh");
        shell.arg("-lc").arg(command);
        shell
    }
}
