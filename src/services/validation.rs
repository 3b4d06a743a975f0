//! Field rules for every request the API accepts.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;

use crate::errors::{AppError, FieldError};
use crate::models::requests::{
    CreateBookingRequest, CreateWorkshopRequest, LoginRequest, RegisterRequest, TimeSlotRequest,
    UpdateWorkshopRequest,
};
use crate::models::{BookingStatus, NewTimeSlot, NewWorkshop, Role, WorkshopPatch};

pub const MIN_NAME_LEN: usize = 2;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_TITLE_LEN: usize = 3;
pub const MIN_DESCRIPTION_LEN: usize = 10;
pub const MAX_CAPACITY: i64 = 100;
pub const MAX_TIME_SLOTS: usize = 10;

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

fn fail(message: &str, details: Vec<FieldError>) -> Result<(), AppError> {
    if details.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation {
            message: message.to_string(),
            details,
        })
    }
}

pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Accepts `H:MM` or `HH:MM` on a 24-hour clock and returns it zero-padded.
pub fn normalize_time(raw: &str) -> Option<String> {
    let (hours, minutes) = raw.trim().split_once(':')?;
    let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !digits(hours) || hours.len() > 2 || !digits(minutes) || minutes.len() != 2 {
        return None;
    }
    let h: u32 = hours.parse().ok()?;
    let m: u32 = minutes.parse().ok()?;
    NaiveTime::from_hms_opt(h, m, 0)?;
    Some(format!("{h:02}:{m:02}"))
}

/// `YYYY-MM-DD`, or an RFC 3339 timestamp reduced to its UTC date.
pub fn parse_workshop_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
}

pub fn is_future_date(date: NaiveDate) -> bool {
    date > Utc::now().date_naive()
}

/// Positive integer id from a JSON number or a numeric string.
pub fn parse_positive_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (id > 0).then_some(id)
}

pub fn parse_path_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

pub fn validate_registration(req: RegisterRequest) -> Result<Registration, AppError> {
    let mut details = Vec::new();

    let name = req.name.unwrap_or_default().trim().to_string();
    if name.chars().count() < MIN_NAME_LEN {
        details.push(FieldError::new("name", "Name must be at least 2 characters"));
    }

    let email = req.email.unwrap_or_default().trim().to_lowercase();
    if !is_valid_email(&email) {
        details.push(FieldError::new("email", "Invalid email address"));
    }

    let password = req.password.unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        details.push(FieldError::new("password", "Password must be at least 6 characters"));
    }

    let role = match req.role.as_deref() {
        None => Some(Role::Customer),
        Some(raw) => Role::parse(raw),
    };
    if role.is_none() {
        details.push(FieldError::new("role", "Role must be ADMIN or CUSTOMER"));
    }

    fail("Validation failed", details)?;

    Ok(Registration {
        name,
        email,
        password,
        role: role.unwrap_or(Role::Customer),
    })
}

pub fn validate_login(req: LoginRequest) -> Result<Credentials, AppError> {
    let mut details = Vec::new();

    let email = req.email.unwrap_or_default().trim().to_lowercase();
    if email.is_empty() {
        details.push(FieldError::new("email", "Email is required"));
    }
    let password = req.password.unwrap_or_default();
    if password.is_empty() {
        details.push(FieldError::new("password", "Password is required"));
    }

    fail("Validation failed", details)?;
    Ok(Credentials { email, password })
}

fn check_title(raw: String, details: &mut Vec<FieldError>) -> String {
    let title = raw.trim().to_string();
    if title.chars().count() < MIN_TITLE_LEN {
        details.push(FieldError::new("title", "Title must be at least 3 characters"));
    }
    title
}

fn check_description(raw: String, details: &mut Vec<FieldError>) -> String {
    let description = raw.trim().to_string();
    if description.chars().count() < MIN_DESCRIPTION_LEN {
        details.push(FieldError::new(
            "description",
            "Description must be at least 10 characters",
        ));
    }
    description
}

fn check_date(raw: &str, details: &mut Vec<FieldError>) -> Option<NaiveDate> {
    match parse_workshop_date(raw) {
        None => {
            details.push(FieldError::new("date", "Invalid date format"));
            None
        }
        Some(date) if !is_future_date(date) => {
            details.push(FieldError::new("date", "Date must be in the future"));
            None
        }
        Some(date) => Some(date),
    }
}

fn check_capacity(raw: &Value, details: &mut Vec<FieldError>) -> Option<i64> {
    match raw.as_i64() {
        Some(n) if (1..=MAX_CAPACITY).contains(&n) => Some(n),
        Some(n) if n > MAX_CAPACITY => {
            details.push(FieldError::new("maxCapacity", "Capacity cannot exceed 100"));
            None
        }
        Some(_) => {
            details.push(FieldError::new("maxCapacity", "Capacity must be positive"));
            None
        }
        None => {
            details.push(FieldError::new("maxCapacity", "Capacity must be an integer"));
            None
        }
    }
}

fn check_time_slot(index: usize, raw: &Value, details: &mut Vec<FieldError>) -> Option<NewTimeSlot> {
    let field = |name: &str| format!("timeSlots.{index}.{name}");

    let Ok(slot) = serde_json::from_value::<TimeSlotRequest>(raw.clone()) else {
        details.push(FieldError::new(format!("timeSlots.{index}"), "Invalid time slot"));
        return None;
    };

    let start = slot.start_time.as_deref().and_then(normalize_time);
    if start.is_none() {
        details.push(FieldError::new(field("startTime"), "Invalid time format (HH:MM)"));
    }
    let end = slot.end_time.as_deref().and_then(normalize_time);
    if end.is_none() {
        details.push(FieldError::new(field("endTime"), "Invalid time format (HH:MM)"));
    }

    let (start_time, end_time) = (start?, end?);
    // Zero-padded HH:MM compares correctly as text.
    if start_time >= end_time {
        details.push(FieldError::new(
            format!("timeSlots.{index}"),
            "End time must be after start time",
        ));
        return None;
    }
    Some(NewTimeSlot {
        start_time,
        end_time,
    })
}

pub fn validate_new_workshop(req: CreateWorkshopRequest) -> Result<NewWorkshop, AppError> {
    let mut details = Vec::new();

    let title = check_title(req.title.unwrap_or_default(), &mut details);
    let description = check_description(req.description.unwrap_or_default(), &mut details);

    let date = match req.date.as_deref() {
        Some(raw) => check_date(raw, &mut details),
        None => {
            details.push(FieldError::new("date", "Date is required"));
            None
        }
    };

    let max_capacity = match &req.max_capacity {
        Some(raw) => check_capacity(raw, &mut details),
        None => {
            details.push(FieldError::new("maxCapacity", "Capacity is required"));
            None
        }
    };

    let mut time_slots = Vec::new();
    match &req.time_slots {
        Some(Value::Array(items)) => {
            if items.is_empty() {
                details.push(FieldError::new("timeSlots", "At least one time slot is required"));
            } else if items.len() > MAX_TIME_SLOTS {
                details.push(FieldError::new("timeSlots", "Maximum 10 time slots per workshop"));
            } else {
                for (index, item) in items.iter().enumerate() {
                    if let Some(slot) = check_time_slot(index, item, &mut details) {
                        time_slots.push(slot);
                    }
                }
            }
        }
        Some(_) => details.push(FieldError::new("timeSlots", "timeSlots must be an array")),
        None => details.push(FieldError::new("timeSlots", "At least one time slot is required")),
    }

    fail("Workshop validation failed", details)?;

    match (date, max_capacity) {
        (Some(date), Some(max_capacity)) => Ok(NewWorkshop {
            title,
            description,
            date,
            max_capacity,
            time_slots,
        }),
        _ => Err(AppError::InvalidInput("Workshop validation failed".to_string())),
    }
}

pub fn validate_workshop_patch(req: UpdateWorkshopRequest) -> Result<WorkshopPatch, AppError> {
    let mut details = Vec::new();

    let patch = WorkshopPatch {
        title: req.title.map(|t| check_title(t, &mut details)),
        description: req.description.map(|d| check_description(d, &mut details)),
        date: req.date.as_deref().and_then(|d| check_date(d, &mut details)),
        max_capacity: req
            .max_capacity
            .as_ref()
            .and_then(|c| check_capacity(c, &mut details)),
    };

    fail("Workshop validation failed", details)?;
    Ok(patch)
}

pub fn validate_booking_request(req: &CreateBookingRequest) -> Result<(i64, i64), AppError> {
    let workshop_id = req.workshop_id.as_ref().and_then(parse_positive_id);
    let time_slot_id = req.time_slot_id.as_ref().and_then(parse_positive_id);

    match (workshop_id, time_slot_id) {
        (Some(w), Some(s)) => Ok((w, s)),
        _ => Err(AppError::InvalidInput(
            "Invalid workshop or timeSlot ID".to_string(),
        )),
    }
}

pub fn parse_status(raw: Option<&str>) -> Result<BookingStatus, AppError> {
    raw.and_then(BookingStatus::parse)
        .ok_or_else(|| AppError::InvalidInput("Invalid status".to_string()))
}
