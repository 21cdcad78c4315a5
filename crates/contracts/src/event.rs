//! Job lifecycle events

use serde::{Deserialize, Serialize};
use std::fmt;

/// Point in a job's life at which callbacks fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEvent {
    /// Fired on the intake task after a slot was acquired, before the job body runs
    Start,
    /// Fired on the job's own task after the job body returned
    End,
}

impl JobEvent {
    /// Stable lowercase name (used as a log field and metric label)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
        }
    }
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
