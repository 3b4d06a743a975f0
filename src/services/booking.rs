//! Booking lifecycle: creation, cancellation and status changes, plus the
//! admin read paths over bookings.
//!
//! Every mutation of `time_slots.available_spots` happens here, inside an
//! IMMEDIATE transaction, through the conditional updates in
//! [`queries::reserve_spot`] and [`queries::release_spot`].

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{
    Booking, BookingDetails, BookingPage, BookingStatus, DashboardStats, Identity, PageMeta,
    Pagination, PopularWorkshop,
};

fn begin(conn: &mut Connection) -> Result<Transaction<'_>, AppError> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

pub fn create_booking(
    conn: &mut Connection,
    customer_id: i64,
    workshop_id: i64,
    time_slot_id: i64,
) -> Result<BookingDetails, AppError> {
    if workshop_id <= 0 || time_slot_id <= 0 {
        return Err(AppError::InvalidInput(
            "Invalid workshop or timeSlot ID".to_string(),
        ));
    }

    let tx = begin(conn)?;

    // A signed token can outlive its user row.
    if !queries::user_exists(&tx, customer_id)? {
        return Err(AppError::Unauthorized("User not found".to_string()));
    }

    if queries::find_active_booking_for(&tx, customer_id, workshop_id)?.is_some() {
        return Err(AppError::Conflict(
            "You have already booked this workshop.".to_string(),
        ));
    }

    if !queries::reserve_spot(&tx, time_slot_id, workshop_id)? {
        return Err(AppError::InvalidState("Time slot not available".to_string()));
    }

    let booking_id = match queries::insert_booking(
        &tx,
        customer_id,
        workshop_id,
        time_slot_id,
        BookingStatus::Pending,
    ) {
        Ok(id) => id,
        Err(e) if db::is_unique_violation(&e) => {
            return Err(AppError::Conflict(
                "You have already booked this workshop.".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    let details = queries::get_booking_details(&tx, booking_id)?
        .ok_or_else(|| anyhow::anyhow!("booking {booking_id} missing right after insert"))?;
    tx.commit()?;

    tracing::info!(
        booking_id,
        customer_id,
        workshop_id,
        time_slot_id,
        "booking created"
    );
    Ok(details)
}

/// Flips a live booking to CANCELLED/Deleted and gives its spot back.
/// Must run inside the caller's transaction.
fn cancel_in_tx(tx: &Transaction<'_>, booking: &Booking) -> Result<(), AppError> {
    if !queries::mark_booking_cancelled(tx, booking.id)? {
        return Err(AppError::NotFound(
            "Booking not found or cannot be cancelled".to_string(),
        ));
    }
    if !queries::release_spot(tx, booking.time_slot_id)? {
        return Err(AppError::Internal(anyhow::anyhow!(
            "time slot {} of booking {} is missing",
            booking.time_slot_id,
            booking.id
        )));
    }
    Ok(())
}

/// Cancels a booking on behalf of an already-authorized caller. Ownership is
/// not checked here.
pub fn cancel_booking(
    conn: &mut Connection,
    booking_id: i64,
    caller: Identity,
) -> Result<(), AppError> {
    let tx = begin(conn)?;

    let booking = queries::get_booking(&tx, booking_id)?
        .filter(|b| b.lifecycle.is_active() && b.status.is_cancellable())
        .ok_or_else(|| {
            AppError::NotFound("Booking not found or cannot be cancelled".to_string())
        })?;

    cancel_in_tx(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(
        booking_id,
        time_slot_id = booking.time_slot_id,
        caller_id = caller.id,
        caller_role = caller.role.as_str(),
        "booking cancelled"
    );
    Ok(())
}

/// Admin status overwrite. Moving to CANCELLED goes through the same unit as
/// [`cancel_booking`] so the slot counter stays consistent.
pub fn update_booking_status(
    conn: &mut Connection,
    booking_id: i64,
    status: BookingStatus,
) -> Result<Booking, AppError> {
    let tx = begin(conn)?;

    let booking = queries::get_booking(&tx, booking_id)?
        .filter(|b| b.lifecycle.is_active())
        .ok_or_else(|| {
            AppError::NotFound("Booking not found or has been deleted".to_string())
        })?;

    if status == BookingStatus::Cancelled && booking.status.is_cancellable() {
        cancel_in_tx(&tx, &booking)?;
    } else {
        queries::set_booking_status(&tx, booking_id, status)?;
    }

    let updated = queries::get_booking(&tx, booking_id)?
        .ok_or_else(|| anyhow::anyhow!("booking {booking_id} vanished during update"))?;
    tx.commit()?;

    tracing::info!(
        booking_id,
        from = booking.status.as_str(),
        to = status.as_str(),
        "booking status updated"
    );
    Ok(updated)
}

pub fn get_user_bookings(
    conn: &Connection,
    customer_id: i64,
) -> Result<Vec<BookingDetails>, AppError> {
    Ok(queries::list_customer_bookings(conn, customer_id)?)
}

pub fn get_booking_by_id(
    conn: &Connection,
    booking_id: i64,
    customer_id: i64,
) -> Result<BookingDetails, AppError> {
    queries::get_booking_details(conn, booking_id)?
        .filter(|d| d.booking.customer_id == customer_id && d.booking.lifecycle.is_active())
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

pub fn get_all_bookings(conn: &Connection, page: Pagination) -> Result<BookingPage, AppError> {
    let data = queries::list_active_bookings_page(conn, page.limit, page.offset())?;
    let total = queries::count_active_bookings(conn)?;

    Ok(BookingPage {
        data,
        meta: PageMeta {
            total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages(total),
        },
    })
}

pub fn get_dashboard_stats(conn: &Connection) -> Result<DashboardStats, AppError> {
    let total_bookings = queries::count_active_bookings(conn)?;
    let total_workshops = queries::count_active_workshops(conn)?;
    let popular_workshop = match queries::most_booked_workshop(conn)? {
        Some((title, bookings)) => PopularWorkshop {
            title: Some(title),
            bookings,
        },
        None => PopularWorkshop {
            title: None,
            bookings: 0,
        },
    };

    Ok(DashboardStats {
        total_bookings,
        total_workshops,
        popular_workshop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Lifecycle, NewTimeSlot, Role};
    use chrono::NaiveDate;

    struct Fixture {
        conn: Connection,
        workshop_id: i64,
        slot_id: i64,
    }

    fn admin() -> Identity {
        Identity {
            id: 1,
            role: Role::Admin,
        }
    }

    fn customer(conn: &Connection, n: usize) -> i64 {
        queries::insert_user(
            conn,
            &format!("Customer {n}"),
            &format!("c{n}@example.com"),
            "hash",
            Role::Customer,
        )
        .unwrap()
    }

    fn add_workshop(conn: &Connection, title: &str, spots: i64) -> (i64, i64) {
        let date = NaiveDate::from_ymd_opt(2099, 3, 1).unwrap();
        let workshop_id =
            queries::insert_workshop(conn, title, "A workshop for tests", date, spots.max(1))
                .unwrap();
        let slot = NewTimeSlot {
            start_time: "10:00".to_string(),
            end_time: "11:00".to_string(),
        };
        let slot_id = queries::insert_time_slot(conn, workshop_id, &slot, spots).unwrap();
        (workshop_id, slot_id)
    }

    fn setup(spots: i64) -> Fixture {
        let conn = db::init_db(":memory:").unwrap();
        let (workshop_id, slot_id) = add_workshop(&conn, "Intro", spots);
        Fixture {
            conn,
            workshop_id,
            slot_id,
        }
    }

    fn spots(f: &Fixture) -> i64 {
        queries::get_available_spots(&f.conn, f.slot_id)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_each_booking_takes_one_spot() {
        let mut f = setup(5);
        for n in 0..3 {
            let customer_id = customer(&f.conn, n);
            create_booking(&mut f.conn, customer_id, f.workshop_id, f.slot_id).unwrap();
        }
        assert_eq!(spots(&f), 2);
    }

    #[test]
    fn test_created_booking_is_enriched() {
        let mut f = setup(2);
        let customer_id = customer(&f.conn, 1);

        let details = create_booking(&mut f.conn, customer_id, f.workshop_id, f.slot_id).unwrap();
        assert_eq!(details.booking.status, BookingStatus::Pending);
        assert_eq!(details.booking.lifecycle, Lifecycle::Active);
        assert_eq!(details.workshop.title, "Intro");
        assert_eq!(details.time_slot.start_time, "10:00");
        assert_eq!(details.customer.email, "c1@example.com");
    }

    #[test]
    fn test_second_booking_same_workshop_conflicts_even_on_other_slot() {
        let mut f = setup(5);
        let other_slot = queries::insert_time_slot(
            &f.conn,
            f.workshop_id,
            &NewTimeSlot {
                start_time: "14:00".to_string(),
                end_time: "15:00".to_string(),
            },
            5,
        )
        .unwrap();
        let customer_id = customer(&f.conn, 1);

        create_booking(&mut f.conn, customer_id, f.workshop_id, f.slot_id).unwrap();
        let err = create_booking(&mut f.conn, customer_id, f.workshop_id, other_slot).unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(spots(&f), 4);
        assert_eq!(
            queries::get_available_spots(&f.conn, other_slot).unwrap(),
            Some(5)
        );
    }

    #[test]
    fn test_full_slot_is_unavailable_and_unchanged() {
        let mut f = setup(0);
        let customer_id = customer(&f.conn, 1);

        let err = create_booking(&mut f.conn, customer_id, f.workshop_id, f.slot_id).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(spots(&f), 0);
        assert!(get_user_bookings(&f.conn, customer_id).unwrap().is_empty());
    }

    #[test]
    fn test_last_spot_goes_to_exactly_one_customer() {
        let mut f = setup(1);
        let a = customer(&f.conn, 1);
        let b = customer(&f.conn, 2);

        create_booking(&mut f.conn, a, f.workshop_id, f.slot_id).unwrap();
        let err = create_booking(&mut f.conn, b, f.workshop_id, f.slot_id).unwrap_err();

        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(spots(&f), 0);
    }

    #[test]
    fn test_slot_of_another_workshop_is_unavailable() {
        let mut f = setup(3);
        let (other_workshop, _) = add_workshop(&f.conn, "Advanced", 3);
        let customer_id = customer(&f.conn, 1);

        let err =
            create_booking(&mut f.conn, customer_id, other_workshop, f.slot_id).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(spots(&f), 3);
    }

    #[test]
    fn test_unknown_slot_is_unavailable() {
        let mut f = setup(3);
        let customer_id = customer(&f.conn, 1);

        let err = create_booking(&mut f.conn, customer_id, f.workshop_id, 9999).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[test]
    fn test_unknown_customer_is_unauthorized() {
        let mut f = setup(3);

        let err = create_booking(&mut f.conn, 999, f.workshop_id, f.slot_id).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert_eq!(spots(&f), 3);
    }

    #[test]
    fn test_non_positive_ids_rejected() {
        let mut f = setup(3);
        let err = create_booking(&mut f.conn, 1, 0, f.slot_id).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_cancel_releases_spot_once() {
        let mut f = setup(2);
        let customer_id = customer(&f.conn, 1);
        let details = create_booking(&mut f.conn, customer_id, f.workshop_id, f.slot_id).unwrap();
        assert_eq!(spots(&f), 1);

        cancel_booking(&mut f.conn, details.booking.id, admin()).unwrap();
        assert_eq!(spots(&f), 2);

        let booking = queries::get_booking(&f.conn, details.booking.id)
            .unwrap()
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.lifecycle, Lifecycle::Deleted);

        let err = cancel_booking(&mut f.conn, details.booking.id, admin()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(spots(&f), 2);
    }

    #[test]
    fn test_cancel_confirmed_booking() {
        let mut f = setup(2);
        let customer_id = customer(&f.conn, 1);
        let details = create_booking(&mut f.conn, customer_id, f.workshop_id, f.slot_id).unwrap();
        update_booking_status(&mut f.conn, details.booking.id, BookingStatus::Confirmed).unwrap();

        cancel_booking(&mut f.conn, details.booking.id, admin()).unwrap();
        assert_eq!(spots(&f), 2);
    }

    #[test]
    fn test_cancel_unknown_booking() {
        let mut f = setup(2);
        let err = cancel_booking(&mut f.conn, 42, admin()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_customer_can_rebook_after_cancellation() {
        let mut f = setup(1);
        let customer_id = customer(&f.conn, 1);
        let first = create_booking(&mut f.conn, customer_id, f.workshop_id, f.slot_id).unwrap();
        cancel_booking(&mut f.conn, first.booking.id, admin()).unwrap();

        create_booking(&mut f.conn, customer_id, f.workshop_id, f.slot_id).unwrap();
        assert_eq!(spots(&f), 0);
    }

    #[test]
    fn test_status_update_between_live_states_keeps_spots() {
        let mut f = setup(3);
        let customer_id = customer(&f.conn, 1);
        let details = create_booking(&mut f.conn, customer_id, f.workshop_id, f.slot_id).unwrap();

        let updated =
            update_booking_status(&mut f.conn, details.booking.id, BookingStatus::Confirmed)
                .unwrap();
        assert_eq!(updated.status, BookingStatus::Confirmed);
        assert_eq!(updated.lifecycle, Lifecycle::Active);

        let back =
            update_booking_status(&mut f.conn, details.booking.id, BookingStatus::Pending)
                .unwrap();
        assert_eq!(back.status, BookingStatus::Pending);
        assert_eq!(spots(&f), 2);
    }

    #[test]
    fn test_status_update_to_cancelled_releases_spot() {
        let mut f = setup(3);
        let customer_id = customer(&f.conn, 1);
        let details = create_booking(&mut f.conn, customer_id, f.workshop_id, f.slot_id).unwrap();

        let updated =
            update_booking_status(&mut f.conn, details.booking.id, BookingStatus::Cancelled)
                .unwrap();
        assert_eq!(updated.status, BookingStatus::Cancelled);
        assert_eq!(updated.lifecycle, Lifecycle::Deleted);
        assert_eq!(spots(&f), 3);

        // Cancelled is terminal.
        let err = update_booking_status(&mut f.conn, details.booking.id, BookingStatus::Pending)
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(spots(&f), 3);
    }

    #[test]
    fn test_get_booking_by_id_is_owner_only() {
        let mut f = setup(3);
        let owner = customer(&f.conn, 1);
        let stranger = customer(&f.conn, 2);
        let details = create_booking(&mut f.conn, owner, f.workshop_id, f.slot_id).unwrap();

        assert_eq!(
            get_booking_by_id(&f.conn, details.booking.id, owner)
                .unwrap()
                .booking
                .id,
            details.booking.id
        );
        assert!(matches!(
            get_booking_by_id(&f.conn, details.booking.id, stranger),
            Err(AppError::NotFound(_))
        ));

        cancel_booking(&mut f.conn, details.booking.id, admin()).unwrap();
        assert!(matches!(
            get_booking_by_id(&f.conn, details.booking.id, owner),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_user_bookings_newest_first() {
        let mut f = setup(5);
        let (second_workshop, second_slot) = add_workshop(&f.conn, "Advanced", 5);
        let customer_id = customer(&f.conn, 1);

        let first = create_booking(&mut f.conn, customer_id, f.workshop_id, f.slot_id).unwrap();
        let second =
            create_booking(&mut f.conn, customer_id, second_workshop, second_slot).unwrap();

        let listed = get_user_bookings(&f.conn, customer_id).unwrap();
        let ids: Vec<i64> = listed.iter().map(|d| d.booking.id).collect();
        assert_eq!(ids, vec![second.booking.id, first.booking.id]);
    }

    #[test]
    fn test_all_bookings_second_page() {
        let mut f = setup(20);
        for n in 0..12 {
            let customer_id = customer(&f.conn, n);
            create_booking(&mut f.conn, customer_id, f.workshop_id, f.slot_id).unwrap();
        }

        let page = get_all_bookings(&f.conn, Pagination::from_query(Some("2"), Some("5"))).unwrap();
        assert_eq!(page.data.len(), 5);
        assert_eq!(page.meta.total, 12);
        assert_eq!(page.meta.total_pages, 3);

        let last = get_all_bookings(&f.conn, Pagination::from_query(Some("3"), Some("5"))).unwrap();
        assert_eq!(last.data.len(), 2);
    }

    #[test]
    fn test_dashboard_stats() {
        let mut f = setup(5);
        let (popular, popular_slot) = add_workshop(&f.conn, "Popular", 5);

        let a = customer(&f.conn, 1);
        let b = customer(&f.conn, 2);
        create_booking(&mut f.conn, a, popular, popular_slot).unwrap();
        create_booking(&mut f.conn, b, popular, popular_slot).unwrap();
        let cancelled = create_booking(&mut f.conn, a, f.workshop_id, f.slot_id).unwrap();
        cancel_booking(&mut f.conn, cancelled.booking.id, admin()).unwrap();

        let stats = get_dashboard_stats(&f.conn).unwrap();
        assert_eq!(stats.total_bookings, 2);
        assert_eq!(stats.total_workshops, 2);
        assert_eq!(
            stats.popular_workshop,
            PopularWorkshop {
                title: Some("Popular".to_string()),
                bookings: 2
            }
        );
    }

    #[test]
    fn test_dashboard_stats_empty() {
        let conn = db::init_db(":memory:").unwrap();
        let stats = get_dashboard_stats(&conn).unwrap();
        assert_eq!(stats.total_bookings, 0);
        assert_eq!(stats.popular_workshop.title, None);
        assert_eq!(stats.popular_workshop.bookings, 0);
    }
}
