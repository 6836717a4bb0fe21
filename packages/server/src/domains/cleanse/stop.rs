//! Cooperative stop.

use tracing::{debug, info};

use super::registry::JobRegistry;
use crate::common::JobId;

/// Flips a job's stop flag. The runner honours it at the next row boundary.
#[derive(Clone)]
pub struct StopController {
    registry: JobRegistry,
}

impl StopController {
    pub fn new(registry: JobRegistry) -> Self {
        Self { registry }
    }

    /// Returns whether this call changed anything. Repeated calls, unknown ids
    /// and finished jobs are no-ops.
    pub fn request_stop(&self, job_id: JobId) -> bool {
        let changed = self.registry.request_stop(job_id);
        if changed {
            info!(job_id = %job_id, "stop requested");
        } else {
            debug!(job_id = %job_id, "stop request ignored");
        }
        changed
    }
}
