use crate::gateway::Session;
use serde::{Deserialize, Serialize};

/// Last-known active session, saved on every change so a restart can
/// show the running clock before the first refresh completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredActiveSession {
    /// The session believed to be running
    pub active_session: Session,
    /// Elapsed seconds computed at save time
    #[serde(default)]
    pub elapsed_seconds: u64,
}
