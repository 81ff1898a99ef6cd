//! Progress events broadcast to observers of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stage::StageStatus;

/// One stage transition.
///
/// `seq` increases by one per event within a run. Events of a single stage
/// arrive in transition order; events of concurrent generator stages
/// interleave.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    pub run_id: Uuid,
    pub seq: u64,
    pub stage: String,
    pub status: StageStatus,
    /// 0..=100
    pub progress: u8,
    pub at: DateTime<Utc>,
}
