//! Exit-path finalizer leaving maintenance mode.

use tracing::warn;

use crate::occ::{Occ, is_maintenance_enabled};
use crate::process::{CommandRunner, LoggedRunner};

/// Makes sure a run never leaves Nextcloud in maintenance mode.
///
/// [`release`](Self::release) runs after the phases have finished, failed or been
/// interrupted. It asks `occ status` whether maintenance mode is active and switches it
/// off if so. Nothing it does can fail the run; problems are logged and the run's own
/// outcome stands.
pub struct MaintenanceGuard<'a, R> {
    exec: LoggedRunner<'a, R>,
    occ: &'a Occ,
}

impl<'a, R: CommandRunner> MaintenanceGuard<'a, R> {
    pub const fn new(exec: LoggedRunner<'a, R>, occ: &'a Occ) -> Self {
        Self {
            exec,
            occ,
        }
    }

    /// Returns whether maintenance mode was found active and switched off.
    pub async fn release(&self) -> bool {
        let log = self.exec.log();
        let status = match self.exec.run(&self.occ.status()).await {
            Ok(output) if output.success() => output,
            Ok(output) => {
                warn!("occ status exited with {} during cleanup", output.status);
                log.warn(&format!(
                    "Could not query maintenance mode (exit status {}); disable it manually if needed.",
                    output.status
                ));
                return false;
            }
            Err(e) => {
                warn!("occ status failed during cleanup: {:#}", e);
                log.warn(&format!("Could not query maintenance mode: {e:#}"));
                return false;
            }
        };

        if !is_maintenance_enabled(&status.output) {
            return false;
        }

        log.info("Maintenance mode is still active; disabling it.");
        let disabled = self.exec.run_tolerant(&self.occ.maintenance_off()).await;
        if disabled {
            log.success("Maintenance mode disabled.");
        } else {
            warn!("Failed to disable maintenance mode during cleanup");
        }
        disabled
    }
}
