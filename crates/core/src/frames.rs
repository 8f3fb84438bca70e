//! Half-open frame ranges and their deterministic partition into
//! single-frame units.
//!
//! Fan-out tasks split a `[start, end)` range into one child job per
//! frame. The split must be deterministic: re-running the same split with
//! the same inputs always enqueues the same set of frames, so a retried
//! fan-out is idempotent in terms of what work gets queued.

use serde_json::{json, Value};

use crate::error::QueueError;

/// A half-open `[start, end)` range of frames with a positive step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

impl FrameRange {
    /// Create a range, validating that `step >= 1` and `end >= start`.
    pub fn new(start: i64, end: i64, step: i64) -> Result<Self, QueueError> {
        if step < 1 {
            return Err(QueueError::Validation(format!(
                "Frame step must be at least 1, got {step}"
            )));
        }
        if end < start {
            return Err(QueueError::Validation(format!(
                "Frame range end ({end}) must not precede start ({start})"
            )));
        }
        Ok(Self { start, end, step })
    }

    /// Single-frame range `[frame, frame + 1)`.
    pub fn single(frame: i64) -> Self {
        Self {
            start: frame,
            end: frame + 1,
            step: 1,
        }
    }

    /// Number of frames the range expands to.
    pub fn len(&self) -> usize {
        self.frames().count()
    }

    /// True when the range contains no frames.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Iterate the individual frames: `start, start + step, ...` up to but
    /// excluding `end`.
    pub fn frames(&self) -> impl Iterator<Item = i64> {
        let step = self.step;
        (self.start..self.end).step_by(step as usize)
    }

    /// Parse a JSON `[start, end]` or `[start, end, step]` array.
    pub fn from_json(value: &Value) -> Result<Self, QueueError> {
        let parts = value.as_array().ok_or_else(|| {
            QueueError::Validation(format!(
                "Frame range must be a [start, end] or [start, end, step] array, got {value}"
            ))
        })?;
        let int_at = |i: usize| -> Result<i64, QueueError> {
            parts
                .get(i)
                .and_then(Value::as_i64)
                .ok_or_else(|| {
                    QueueError::Validation(format!(
                        "Frame range element {i} must be an integer, got {value}"
                    ))
                })
        };
        match parts.len() {
            2 => Self::new(int_at(0)?, int_at(1)?, 1),
            3 => Self::new(int_at(0)?, int_at(1)?, int_at(2)?),
            n => Err(QueueError::Validation(format!(
                "Frame range must have 2 or 3 elements, got {n}"
            ))),
        }
    }

    /// Serialize as a `[start, end, step]` JSON array.
    pub fn to_json(&self) -> Value {
        json!([self.start, self.end, self.step])
    }
}
