use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Booking, BookingDetails, BookingStatus, CustomerSummary, Lifecycle, NewTimeSlot, Role,
    SlotTimes, TimeSlot, User, Workshop, WorkshopSummary,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn now_timestamp() -> String {
    Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| anyhow::anyhow!("bad timestamp {s:?} in database: {e}"))
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| anyhow::anyhow!("bad date {s:?} in database: {e}"))
}

// ── Users ──

pub fn insert_user(
    conn: &Connection,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO users (name, email, password_hash, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![name, email, password_hash, role.as_str(), now_timestamp()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    let row = conn
        .query_row(
            "SELECT id, name, email, password_hash, role, created_at FROM users WHERE email = ?1",
            params![email],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((id, name, email, password_hash, role_str, created_at_str)) = row else {
        return Ok(None);
    };

    let role = Role::parse(&role_str)
        .ok_or_else(|| anyhow::anyhow!("unknown role {role_str:?} for user {id}"))?;

    Ok(Some(User {
        id,
        name,
        email,
        password_hash,
        role,
        created_at: parse_timestamp(&created_at_str)?,
    }))
}

pub fn user_exists(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM users WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

// ── Workshops ──

const WORKSHOP_COLUMNS: &str =
    "id, title, description, date, max_capacity, is_deleted, created_at";

fn parse_workshop_row(row: &rusqlite::Row) -> anyhow::Result<Workshop> {
    let date_str: String = row.get(3)?;
    let created_at_str: String = row.get(6)?;

    Ok(Workshop {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        date: parse_date(&date_str)?,
        max_capacity: row.get(4)?,
        lifecycle: Lifecycle::from_deleted_flag(row.get::<_, i64>(5)? != 0),
        created_at: parse_timestamp(&created_at_str)?,
    })
}

pub fn insert_workshop(
    conn: &Connection,
    title: &str,
    description: &str,
    date: NaiveDate,
    max_capacity: i64,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO workshops (title, description, date, max_capacity, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            title,
            description,
            date.format(DATE_FORMAT).to_string(),
            max_capacity,
            now_timestamp(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_time_slot(
    conn: &Connection,
    workshop_id: i64,
    slot: &NewTimeSlot,
    available_spots: i64,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO time_slots (workshop_id, start_time, end_time, available_spots)
         VALUES (?1, ?2, ?3, ?4)",
        params![workshop_id, slot.start_time, slot.end_time, available_spots],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Id of an active workshop with this exact title and date, if any.
pub fn find_active_workshop_by_title_date(
    conn: &Connection,
    title: &str,
    date: NaiveDate,
) -> anyhow::Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM workshops WHERE title = ?1 AND date = ?2 AND is_deleted = 0",
            params![title, date.format(DATE_FORMAT).to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Looks a workshop up regardless of lifecycle.
pub fn get_workshop(conn: &Connection, id: i64) -> anyhow::Result<Option<Workshop>> {
    let sql = format!("SELECT {WORKSHOP_COLUMNS} FROM workshops WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_workshop_row(row)));

    match result {
        Ok(workshop) => Ok(Some(workshop?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_active_workshops(conn: &Connection) -> anyhow::Result<Vec<Workshop>> {
    let sql = format!(
        "SELECT {WORKSHOP_COLUMNS} FROM workshops WHERE is_deleted = 0 ORDER BY date ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok(parse_workshop_row(row)))?;

    let mut workshops = vec![];
    for row in rows {
        workshops.push(row??);
    }
    Ok(workshops)
}

pub fn update_workshop(conn: &Connection, workshop: &Workshop) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE workshops SET title = ?1, description = ?2, date = ?3, max_capacity = ?4
         WHERE id = ?5 AND is_deleted = 0",
        params![
            workshop.title,
            workshop.description,
            workshop.date.format(DATE_FORMAT).to_string(),
            workshop.max_capacity,
            workshop.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn soft_delete_workshop(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE workshops SET is_deleted = 1 WHERE id = ?1 AND is_deleted = 0",
        params![id],
    )?;
    Ok(count > 0)
}

pub fn count_active_workshops(conn: &Connection) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM workshops WHERE is_deleted = 0",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Active workshop with the most live bookings; ties go to the lowest id.
pub fn most_booked_workshop(conn: &Connection) -> anyhow::Result<Option<(String, i64)>> {
    let row = conn
        .query_row(
            "SELECT w.title, COUNT(b.id) AS booking_count
             FROM workshops w
             LEFT JOIN bookings b ON b.workshop_id = w.id AND b.is_deleted = 0
             WHERE w.is_deleted = 0
             GROUP BY w.id
             ORDER BY booking_count DESC, w.id ASC
             LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(row)
}

// ── Time slots ──

pub fn list_active_slots(conn: &Connection, workshop_id: i64) -> anyhow::Result<Vec<TimeSlot>> {
    let mut stmt = conn.prepare(
        "SELECT id, workshop_id, start_time, end_time, available_spots, is_deleted
         FROM time_slots WHERE workshop_id = ?1 AND is_deleted = 0 ORDER BY start_time ASC, id ASC",
    )?;

    let rows = stmt.query_map(params![workshop_id], |row| {
        Ok(TimeSlot {
            id: row.get(0)?,
            workshop_id: row.get(1)?,
            start_time: row.get(2)?,
            end_time: row.get(3)?,
            available_spots: row.get(4)?,
            lifecycle: Lifecycle::from_deleted_flag(row.get::<_, i64>(5)? != 0),
        })
    })?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row?);
    }
    Ok(slots)
}

pub fn get_available_spots(conn: &Connection, slot_id: i64) -> anyhow::Result<Option<i64>> {
    let spots = conn
        .query_row(
            "SELECT available_spots FROM time_slots WHERE id = ?1",
            params![slot_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(spots)
}

/// Takes one spot from an active slot of an active workshop. The guard on
/// `available_spots > 0` makes this the single point that can refuse an
/// over-booking: returns false when nothing was decremented.
pub fn reserve_spot(conn: &Connection, slot_id: i64, workshop_id: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE time_slots SET available_spots = available_spots - 1
         WHERE id = ?1
           AND workshop_id = ?2
           AND is_deleted = 0
           AND available_spots > 0
           AND EXISTS (SELECT 1 FROM workshops w WHERE w.id = ?2 AND w.is_deleted = 0)",
        params![slot_id, workshop_id],
    )?;
    Ok(count == 1)
}

pub fn release_spot(conn: &Connection, slot_id: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE time_slots SET available_spots = available_spots + 1 WHERE id = ?1",
        params![slot_id],
    )?;
    Ok(count == 1)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str =
    "b.id, b.customer_id, b.workshop_id, b.time_slot_id, b.status, b.is_deleted, b.created_at";

const BOOKING_DETAILS_FROM: &str = "FROM bookings b
     JOIN workshops w ON w.id = b.workshop_id
     JOIN time_slots s ON s.id = b.time_slot_id
     JOIN users u ON u.id = b.customer_id";

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let status_str: String = row.get(4)?;
    let created_at_str: String = row.get(6)?;

    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown booking status {status_str:?}"))?;

    Ok(Booking {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        workshop_id: row.get(2)?,
        time_slot_id: row.get(3)?,
        status,
        lifecycle: Lifecycle::from_deleted_flag(row.get::<_, i64>(5)? != 0),
        created_at: parse_timestamp(&created_at_str)?,
    })
}

fn parse_booking_details_row(row: &rusqlite::Row) -> anyhow::Result<BookingDetails> {
    let booking = parse_booking_row(row)?;
    let date_str: String = row.get(9)?;

    Ok(BookingDetails {
        booking,
        workshop: WorkshopSummary {
            title: row.get(7)?,
            description: row.get(8)?,
            date: parse_date(&date_str)?,
        },
        time_slot: SlotTimes {
            start_time: row.get(10)?,
            end_time: row.get(11)?,
        },
        customer: CustomerSummary {
            name: row.get(12)?,
            email: row.get(13)?,
        },
    })
}

fn query_booking_details(
    conn: &Connection,
    filter: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> anyhow::Result<Vec<BookingDetails>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS}, w.title, w.description, w.date, s.start_time, s.end_time, u.name, u.email
         {BOOKING_DETAILS_FROM} {filter}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params, |row| Ok(parse_booking_details_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn insert_booking(
    conn: &Connection,
    customer_id: i64,
    workshop_id: i64,
    time_slot_id: i64,
    status: BookingStatus,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO bookings (customer_id, workshop_id, time_slot_id, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![customer_id, workshop_id, time_slot_id, status.as_str(), now_timestamp()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// The customer's live booking for a workshop, if one exists.
pub fn find_active_booking_for(
    conn: &Connection,
    customer_id: i64,
    workshop_id: i64,
) -> anyhow::Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM bookings WHERE customer_id = ?1 AND workshop_id = ?2 AND is_deleted = 0",
            params![customer_id, workshop_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn get_booking(conn: &Connection, id: i64) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_booking_row(row)));

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_booking_details(conn: &Connection, id: i64) -> anyhow::Result<Option<BookingDetails>> {
    let mut found = query_booking_details(conn, "WHERE b.id = ?1", params![id])?;
    Ok(found.pop())
}

/// Live bookings of one customer, newest first.
pub fn list_customer_bookings(
    conn: &Connection,
    customer_id: i64,
) -> anyhow::Result<Vec<BookingDetails>> {
    query_booking_details(
        conn,
        "WHERE b.customer_id = ?1 AND b.is_deleted = 0 ORDER BY b.created_at DESC, b.id DESC",
        params![customer_id],
    )
}

pub fn list_active_bookings_page(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<BookingDetails>> {
    query_booking_details(
        conn,
        "WHERE b.is_deleted = 0 ORDER BY b.created_at DESC, b.id DESC LIMIT ?1 OFFSET ?2",
        params![limit, offset],
    )
}

pub fn count_active_bookings(conn: &Connection) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE is_deleted = 0",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn mark_booking_cancelled(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = 'CANCELLED', is_deleted = 1
         WHERE id = ?1 AND is_deleted = 0 AND status IN ('PENDING', 'CONFIRMED')",
        params![id],
    )?;
    Ok(count == 1)
}

pub fn set_booking_status(conn: &Connection, id: i64, status: BookingStatus) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1 WHERE id = ?2 AND is_deleted = 0",
        params![status.as_str(), id],
    )?;
    Ok(count == 1)
}
