use serde::{Deserialize, Serialize};
use std::fmt;

use crate::runtime::error::PipelineError;

/// Half-open detection window `[start, end)` in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct DetectionInterval {
    start: i64,
    end: i64,
}

#[derive(Deserialize)]
struct RawInterval {
    start: i64,
    end: i64,
}

impl TryFrom<RawInterval> for DetectionInterval {
    type Error = PipelineError;

    fn try_from(raw: RawInterval) -> Result<Self, Self::Error> {
        DetectionInterval::new(raw.start, raw.end)
    }
}

impl DetectionInterval {
    pub fn new(start: i64, end: i64) -> Result<Self, PipelineError> {
        if start > end {
            return Err(PipelineError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

impl fmt::Display for DetectionInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
