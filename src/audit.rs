//! Audit trail of container grants and releases.

use std::fmt::{Display, Formatter};
use crate::container::{ApplicationId, ContainerId};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AuditOperation {
    AllocContainer,
    ReleaseContainer,
}

impl Display for AuditOperation {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            AuditOperation::AllocContainer => write!(f, "AM Allocated Container"),
            AuditOperation::ReleaseContainer => write!(f, "AM Released Container"),
        }
    }
}

pub trait AuditLogger: Send + Sync {
    fn log_success(&self, user: &str, operation: AuditOperation, target: &str,
                   application_id: ApplicationId, container_id: ContainerId);
}

/// Writes audit records to the `audit` log target.
#[derive(Default)]
pub struct LogAuditLogger;

impl LogAuditLogger {
    pub fn new() -> Self {
        Default::default()
    }
}

impl AuditLogger for LogAuditLogger {
    fn log_success(&self, user: &str, operation: AuditOperation, target: &str,
                   application_id: ApplicationId, container_id: ContainerId) {
        log::info!(target: "audit", "USER={}\tOPERATION={}\tTARGET={}\tRESULT=SUCCESS\tAPPID={}\tCONTAINERID={}",
            user, operation, target, application_id, container_id);
    }
}
