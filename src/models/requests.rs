//! Raw request bodies. Every field is optional so that missing or mistyped
//! input reaches validation and is reported per field.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkshopRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub max_capacity: Option<Value>,
    pub time_slots: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkshopRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub max_capacity: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotRequest {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub workshop_id: Option<Value>,
    pub time_slot_id: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: Option<String>,
}
