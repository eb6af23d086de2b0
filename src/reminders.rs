use std::time::Duration;

use chrono::{Days, TimeDelta};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{
    error::EngineError,
    models::{AppointmentRow, AppointmentStatus},
    state::AppState,
    timeutil,
};

/// How far ahead a scan looks for candidates.
const LOOKAHEAD_DAYS: u64 = 3;
/// A booking made at least this many minutes ahead gets the day-before rule.
const LONG_LEAD_MIN: i64 = 24 * 60;
/// Day-before window; the hour of slack over 24h tolerates scan jitter.
const LONG_LEAD_WINDOW_MIN: i64 = 25 * 60;
/// Hour-before window for short-lead bookings, same idea.
const SHORT_LEAD_WINDOW_MIN: i64 = 75;

/// Owned handle to the recurring reminder scan. The host process starts it
/// once after the pool is ready and aborts it on shutdown.
pub struct ReminderScheduler {
    handle: JoinHandle<()>,
}

impl ReminderScheduler {
    pub fn start(state: AppState, every: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match scan(&state).await {
                    Ok(sent) if sent > 0 => log::info!("Reminder scan dispatched {sent} message(s)"),
                    Ok(_) => {}
                    Err(err) => log::error!("Reminder scan failed: {err}"),
                }
            }
        });
        Self { handle }
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

/// One pass over pending, not-yet-reminded appointments in the next three
/// days. Candidates are processed independently: a failure on one is logged
/// and never aborts the rest. Returns the number of reminders dispatched.
pub async fn scan(state: &AppState) -> Result<usize, EngineError> {
    let now = state.clock.now();
    let today = now.date();
    let limit_date = today
        .checked_add_days(Days::new(LOOKAHEAD_DAYS))
        .unwrap_or(today);

    let candidates = sqlx::query_as::<_, AppointmentRow>(
        r#"SELECT id, date, start_time, end_time, service_id, staff_id, client_name,
                  client_phone, client_id, note, status, is_paid, created_at,
                  confirmation_sent_at
           FROM appointments
           WHERE status = ? AND confirmation_sent_at IS NULL
             AND date >= ? AND date <= ?
           ORDER BY date, start_time"#,
    )
    .bind(AppointmentStatus::Pending)
    .bind(today)
    .bind(limit_date)
    .fetch_all(&state.db)
    .await?;

    let mut sent = 0;
    for appt in candidates {
        match remind_one(state, &appt, now).await {
            Ok(true) => sent += 1,
            Ok(false) => {}
            Err(err) => log::error!("Reminder for appointment {} failed: {err}", appt.id),
        }
    }
    Ok(sent)
}

async fn remind_one(
    state: &AppState,
    appt: &AppointmentRow,
    now: chrono::NaiveDateTime,
) -> Result<bool, EngineError> {
    let start_min = timeutil::to_minutes(&appt.start_time)?;
    let appt_at = appt
        .date
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight + TimeDelta::minutes(start_min))
        .ok_or_else(|| EngineError::InvalidFormat(appt.start_time.clone()))?;

    let lead_time = appt_at - appt.created_at;
    let time_until = appt_at - now;

    let due = if lead_time >= TimeDelta::minutes(LONG_LEAD_MIN) {
        time_until <= TimeDelta::minutes(LONG_LEAD_WINDOW_MIN)
    } else {
        time_until <= TimeDelta::minutes(SHORT_LEAD_WINDOW_MIN)
    };
    if !due {
        return Ok(false);
    }

    let service_name = service_name(&state.db, &appt.service_id).await;
    let msg = format!(
        "Hola {}!\n\nConfirmación de tu turno:\n{} a las {} hs\n{}\n\nRespondé 1 para confirmar o 2 para cancelar.",
        appt.client_name,
        appt.date.format("%d/%m"),
        appt.start_time,
        service_name
    );

    if !state.notifier.send(&appt.client_phone, &msg).await {
        // Left unsent on purpose: the next scan retries.
        log::warn!("Reminder send failed for appointment {}", appt.id);
        return Ok(false);
    }

    // The null guard makes the flag transition at most once even if two
    // scans race on the same row.
    let updated = sqlx::query(
        "UPDATE appointments SET confirmation_sent_at = ? WHERE id = ? AND confirmation_sent_at IS NULL",
    )
    .bind(now)
    .bind(&appt.id)
    .execute(&state.db)
    .await?;

    Ok(updated.rows_affected() > 0)
}

async fn service_name(pool: &SqlitePool, service_id: &str) -> String {
    sqlx::query_as::<_, (String,)>("SELECT name FROM services WHERE id = ? LIMIT 1")
        .bind(service_id)
        .fetch_optional(pool)
        .await
        .ok()
        .flatten()
        .map(|row| row.0)
        .unwrap_or_else(|| "el servicio".to_string())
}
