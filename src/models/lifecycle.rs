use serde::{Deserialize, Serialize};

/// Soft-delete state of workshops, slots and bookings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Lifecycle {
    #[default]
    Active,
    Deleted,
}

impl Lifecycle {
    /// Maps the `is_deleted` column onto the tag.
    pub fn from_deleted_flag(is_deleted: bool) -> Self {
        if is_deleted {
            Lifecycle::Deleted
        } else {
            Lifecycle::Active
        }
    }

    pub fn is_active(self) -> bool {
        self == Lifecycle::Active
    }
}
