use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    auth::new_id,
    conflict::ScopeOccupancy,
    db,
    error::EngineError,
    models::{AppointmentRow, AppointmentStatus, OCCUPYING_STATUSES, RESCHEDULE_STATUSES},
    notify,
    state::AppState,
    timeutil,
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewAppointment {
    pub date: NaiveDate,
    pub start_time: String,
    pub service_id: String,
    pub staff_id: Option<String>,
    pub client_name: String,
    pub client_phone: String,
    pub note: Option<String>,
}

/// Administrative field overwrite; no state-machine guard on `status`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentPatch {
    pub status: Option<AppointmentStatus>,
    pub is_paid: Option<bool>,
    pub note: Option<String>,
}

/// Books a new appointment in PENDING. The end time is derived from the
/// service duration, never supplied by the caller. The per-scope booking
/// lock is held across the conflict check and the insert.
pub async fn create(state: &AppState, input: NewAppointment) -> Result<AppointmentRow, EngineError> {
    let service = db::fetch_service(&state.db, &input.service_id)
        .await?
        .ok_or(EngineError::ServiceNotFound)?;

    let start_min = timeutil::to_minutes(&input.start_time)?;
    let end_min = start_min + service.duration_min;
    let end_time = timeutil::to_time_string(end_min);

    let _guard = state
        .booking_locks
        .acquire(input.date, input.staff_id.as_deref())
        .await;

    let occupancy = ScopeOccupancy::load(
        &state.db,
        input.date,
        input.staff_id.as_deref(),
        &OCCUPYING_STATUSES,
        None,
    )
    .await?;
    if occupancy.conflicts(start_min, end_min) {
        return Err(EngineError::SlotUnavailable);
    }

    let now = state.clock.now();
    let client =
        db::find_or_create_client(&state.db, &input.client_name, &input.client_phone, now).await?;

    let id = new_id();
    let insert = sqlx::query(
        r#"INSERT INTO appointments
           (id, date, start_time, end_time, service_id, staff_id, client_name,
            client_phone, client_id, note, status, is_paid, created_at, confirmation_sent_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, NULL)"#,
    )
    .bind(&id)
    .bind(input.date)
    .bind(&input.start_time)
    .bind(&end_time)
    .bind(&input.service_id)
    .bind(&input.staff_id)
    .bind(&input.client_name)
    .bind(&input.client_phone)
    .bind(&client.id)
    .bind(&input.note)
    .bind(AppointmentStatus::Pending)
    .bind(now)
    .execute(&state.db)
    .await;

    if let Err(err) = insert {
        // The partial unique index is the backstop for races the lock
        // cannot see (e.g. a second process on the same database file).
        if err
            .as_database_error()
            .is_some_and(|db_err| db_err.is_unique_violation())
        {
            return Err(EngineError::SlotUnavailable);
        }
        return Err(err.into());
    }
    drop(_guard);

    let appt = db::fetch_appointment(&state.db, &id).await?;

    let client_msg = format!(
        "Hola {}! Reservaste un turno:\nFecha: {}\nHora: {}\nServicio: {}\n\nRespondé 1 para CONFIRMAR tu asistencia o 2 para CANCELAR.",
        appt.client_name,
        appt.date.format("%d/%m/%Y"),
        appt.start_time,
        service.name
    );
    notify_later(state, appt.client_phone.clone(), client_msg);

    let admin_msg = format!(
        "<b>Nueva solicitud de turno</b>\nCliente: {}\nTel: {}\nFecha: {}\nHora: {}\nServicio: {}",
        appt.client_name,
        appt.client_phone,
        appt.date.format("%d/%m/%Y"),
        appt.start_time,
        service.name
    );
    let admin = state.admin.clone();
    tokio::spawn(async move {
        notify::send_telegram(
            admin.telegram_bot_token.as_deref(),
            admin.telegram_chat_id.as_deref(),
            &admin_msg,
        )
        .await;
    });

    Ok(appt)
}

pub async fn confirm(state: &AppState, id: &str) -> Result<AppointmentRow, EngineError> {
    let appt = set_status(state, id, AppointmentStatus::Confirmed).await?;

    let msg = format!(
        "Hola {}! Tu turno del {} a las {} fue CONFIRMADO. Te esperamos!",
        appt.client_name,
        appt.date.format("%d/%m/%Y"),
        appt.start_time
    );
    notify_later(state, appt.client_phone.clone(), msg);
    Ok(appt)
}

/// Cancels from any state. CANCELLED no longer occupies the slot, so the
/// interval becomes bookable again immediately.
pub async fn cancel(state: &AppState, id: &str) -> Result<AppointmentRow, EngineError> {
    let appt = set_status(state, id, AppointmentStatus::Cancelled).await?;

    let msg = format!(
        "Hola {}. Tu turno del {} a las {} fue CANCELADO. Si fue un error, contactanos.",
        appt.client_name,
        appt.date.format("%d/%m/%Y"),
        appt.start_time
    );
    notify_later(state, appt.client_phone.clone(), msg);

    if let Some(admin_phone) = state.admin.phone.clone() {
        let admin_msg = format!(
            "Turno cancelado\nCliente: {}\nFecha: {}\nHora: {}",
            appt.client_name,
            appt.date.format("%d/%m/%Y"),
            appt.start_time
        );
        notify_later(state, admin_phone, admin_msg);
    }
    Ok(appt)
}

pub async fn finish(state: &AppState, id: &str, is_paid: bool) -> Result<AppointmentRow, EngineError> {
    db::fetch_appointment(&state.db, id).await?;
    sqlx::query("UPDATE appointments SET status = ?, is_paid = ? WHERE id = ?")
        .bind(AppointmentStatus::Finished)
        .bind(i64::from(is_paid))
        .bind(id)
        .execute(&state.db)
        .await?;
    db::fetch_appointment(&state.db, id).await
}

/// Moves an appointment to a new date/start. The end is recomputed from the
/// service duration. Conflicts are checked against CONFIRMED and FINISHED
/// appointments only, excluding the appointment's own row; a pending request
/// does not pin its slot, and manual blocks do not bind an admin moving a
/// booking. A CANCELLED appointment is revived to CONFIRMED by a successful
/// reschedule.
pub async fn reschedule(
    state: &AppState,
    id: &str,
    new_date: NaiveDate,
    new_start: &str,
) -> Result<AppointmentRow, EngineError> {
    let appt = db::fetch_appointment(&state.db, id).await?;
    let service = db::fetch_service(&state.db, &appt.service_id)
        .await?
        .ok_or(EngineError::ServiceNotFound)?;

    let start_min = timeutil::to_minutes(new_start)?;
    let end_min = start_min + service.duration_min;
    let end_time = timeutil::to_time_string(end_min);

    let _guard = state
        .booking_locks
        .acquire(new_date, appt.staff_id.as_deref())
        .await;

    let occupancy = ScopeOccupancy::load_appointments(
        &state.db,
        new_date,
        appt.staff_id.as_deref(),
        &RESCHEDULE_STATUSES,
        Some(id),
    )
    .await?;
    if occupancy.conflicts(start_min, end_min) {
        return Err(EngineError::SlotUnavailable);
    }

    let new_status = if appt.status == AppointmentStatus::Cancelled {
        AppointmentStatus::Confirmed
    } else {
        appt.status
    };

    sqlx::query(
        "UPDATE appointments SET date = ?, start_time = ?, end_time = ?, status = ? WHERE id = ?",
    )
    .bind(new_date)
    .bind(new_start)
    .bind(&end_time)
    .bind(new_status)
    .bind(id)
    .execute(&state.db)
    .await?;
    drop(_guard);

    let updated = db::fetch_appointment(&state.db, id).await?;

    let msg = format!(
        "Hola {}! Tu turno fue REPROGRAMADO:\nNueva fecha: {}\nNueva hora: {}\nTe esperamos!",
        updated.client_name,
        updated.date.format("%d/%m/%Y"),
        updated.start_time
    );
    notify_later(state, updated.client_phone.clone(), msg);
    Ok(updated)
}

/// Administrative escape hatch: overwrites the given fields directly, with
/// no conflict re-check and no transition guard.
pub async fn update(
    state: &AppState,
    id: &str,
    patch: AppointmentPatch,
) -> Result<AppointmentRow, EngineError> {
    let appt = db::fetch_appointment(&state.db, id).await?;

    let status = patch.status.unwrap_or(appt.status);
    let is_paid = patch.is_paid.map_or(appt.is_paid, i64::from);
    let note = patch.note.or(appt.note);

    sqlx::query("UPDATE appointments SET status = ?, is_paid = ?, note = ? WHERE id = ?")
        .bind(status)
        .bind(is_paid)
        .bind(&note)
        .bind(id)
        .execute(&state.db)
        .await?;

    db::fetch_appointment(&state.db, id).await
}

pub async fn delete(state: &AppState, id: &str) -> Result<(), EngineError> {
    let result = sqlx::query("DELETE FROM appointments WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(EngineError::NotFound);
    }
    Ok(())
}

async fn set_status(
    state: &AppState,
    id: &str,
    status: AppointmentStatus,
) -> Result<AppointmentRow, EngineError> {
    db::fetch_appointment(&state.db, id).await?;
    sqlx::query("UPDATE appointments SET status = ? WHERE id = ?")
        .bind(status)
        .bind(id)
        .execute(&state.db)
        .await?;
    db::fetch_appointment(&state.db, id).await
}

/// Fire-and-forget client messaging. The state change is already committed;
/// a delivery failure is logged and never rolls anything back.
fn notify_later(state: &AppState, phone: String, body: String) {
    let notifier = Arc::clone(&state.notifier);
    tokio::spawn(async move {
        if !notifier.send(&phone, &body).await {
            log::warn!("Notification to {phone} was not delivered");
        }
    });
}
