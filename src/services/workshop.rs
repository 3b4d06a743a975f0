use rusqlite::{Connection, TransactionBehavior};

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{NewWorkshop, Workshop, WorkshopPatch, WorkshopWithSlots};

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Workshop with ID {id} not found"))
}

fn duplicate() -> AppError {
    AppError::Conflict("Workshop already exists".to_string())
}

fn with_slots(conn: &Connection, workshop: Workshop) -> Result<WorkshopWithSlots, AppError> {
    let time_slots = queries::list_active_slots(conn, workshop.id)?;
    Ok(WorkshopWithSlots {
        workshop,
        time_slots,
    })
}

pub fn list_workshops(conn: &Connection) -> Result<Vec<WorkshopWithSlots>, AppError> {
    queries::list_active_workshops(conn)?
        .into_iter()
        .map(|w| with_slots(conn, w))
        .collect()
}

pub fn get_workshop(conn: &Connection, id: i64) -> Result<WorkshopWithSlots, AppError> {
    let workshop = queries::get_workshop(conn, id)?
        .filter(|w| w.lifecycle.is_active())
        .ok_or_else(|| not_found(id))?;
    with_slots(conn, workshop)
}

/// Inserts the workshop and its slots atomically. Every slot opens with
/// `max_capacity` spots.
pub fn create_workshop(
    conn: &mut Connection,
    new: NewWorkshop,
) -> Result<WorkshopWithSlots, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if queries::find_active_workshop_by_title_date(&tx, &new.title, new.date)?.is_some() {
        return Err(duplicate());
    }

    let workshop_id = match queries::insert_workshop(
        &tx,
        &new.title,
        &new.description,
        new.date,
        new.max_capacity,
    ) {
        Ok(id) => id,
        Err(e) if db::is_unique_violation(&e) => return Err(duplicate()),
        Err(e) => return Err(e.into()),
    };

    for slot in &new.time_slots {
        queries::insert_time_slot(&tx, workshop_id, slot, new.max_capacity)?;
    }

    let workshop = queries::get_workshop(&tx, workshop_id)?
        .ok_or_else(|| anyhow::anyhow!("workshop {workshop_id} missing right after insert"))?;
    let created = with_slots(&tx, workshop)?;
    tx.commit()?;

    tracing::info!(
        workshop_id,
        title = %created.workshop.title,
        slots = created.time_slots.len(),
        "workshop created"
    );
    Ok(created)
}

/// Partial update. Slot counters are left as they are.
pub fn update_workshop(
    conn: &mut Connection,
    id: i64,
    patch: WorkshopPatch,
) -> Result<WorkshopWithSlots, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut workshop = queries::get_workshop(&tx, id)?
        .filter(|w| w.lifecycle.is_active())
        .ok_or_else(|| not_found(id))?;
    patch.apply(&mut workshop);

    if let Some(existing) =
        queries::find_active_workshop_by_title_date(&tx, &workshop.title, workshop.date)?
    {
        if existing != id {
            return Err(duplicate());
        }
    }

    match queries::update_workshop(&tx, &workshop) {
        Ok(true) => {}
        Ok(false) => return Err(not_found(id)),
        Err(e) if db::is_unique_violation(&e) => return Err(duplicate()),
        Err(e) => return Err(e.into()),
    }

    let updated = with_slots(&tx, workshop)?;
    tx.commit()?;

    tracing::info!(workshop_id = id, "workshop updated");
    Ok(updated)
}

pub fn delete_workshop(conn: &Connection, id: i64) -> Result<(), AppError> {
    let workshop = queries::get_workshop(conn, id)?.ok_or_else(|| not_found(id))?;

    if !workshop.lifecycle.is_active() || !queries::soft_delete_workshop(conn, id)? {
        return Err(AppError::Gone("Workshop is already deleted".to_string()));
    }

    tracing::info!(workshop_id = id, "workshop deleted");
    Ok(())
}
