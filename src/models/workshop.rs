use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::Lifecycle;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workshop {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub max_capacity: i64,
    pub lifecycle: Lifecycle,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: i64,
    pub workshop_id: i64,
    pub start_time: String,
    pub end_time: String,
    pub available_spots: i64,
    pub lifecycle: Lifecycle,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopWithSlots {
    #[serde(flatten)]
    pub workshop: Workshop,
    pub time_slots: Vec<TimeSlot>,
}

/// A validated workshop ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewWorkshop {
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub max_capacity: i64,
    pub time_slots: Vec<NewTimeSlot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTimeSlot {
    pub start_time: String,
    pub end_time: String,
}

/// Validated partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct WorkshopPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub max_capacity: Option<i64>,
}

impl WorkshopPatch {
    pub fn apply(self, workshop: &mut Workshop) {
        if let Some(title) = self.title {
            workshop.title = title;
        }
        if let Some(description) = self.description {
            workshop.description = description;
        }
        if let Some(date) = self.date {
            workshop.date = date;
        }
        if let Some(max_capacity) = self.max_capacity {
            workshop.max_capacity = max_capacity;
        }
    }
}
