//! Job status enum mapping to a SMALLINT column.
//!
//! Statuses form a one-way ladder: `Queued -> Running -> {Succeeded |
//! Failed}`. No transition reverses, which is what `rank` encodes.

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

/// Lifecycle status of a job record.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued = 1,
    Running = 2,
    Succeeded = 3,
    Failed = 4,
}

impl JobStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Decode a database status ID.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(Self::Queued),
            2 => Some(Self::Running),
            3 => Some(Self::Succeeded),
            4 => Some(Self::Failed),
            _ => None,
        }
    }

    /// True for `Succeeded` and `Failed`; no transitions leave these.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Position on the one-way status ladder. Both terminal states share
    /// the top rank; a valid status history is non-decreasing in rank.
    pub fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::Succeeded | Self::Failed => 2,
        }
    }
}

impl From<JobStatus> for StatusId {
    fn from(value: JobStatus) -> Self {
        value as StatusId
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Succeeded,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(JobStatus::from_id(0), None);
        assert_eq!(JobStatus::from_id(99), None);
    }

    #[test]
    fn rank_orders_the_lifecycle() {
        assert!(JobStatus::Queued.rank() < JobStatus::Running.rank());
        assert!(JobStatus::Running.rank() < JobStatus::Succeeded.rank());
        assert_eq!(JobStatus::Succeeded.rank(), JobStatus::Failed.rank());
    }

    #[test]
    fn only_outcomes_are_terminal() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
