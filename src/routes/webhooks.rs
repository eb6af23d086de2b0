use actix_web::{web, HttpResponse};
use chrono::TimeDelta;
use serde::Deserialize;
use serde_json::json;

use crate::{
    appointments,
    error::EngineError,
    models::{AppointmentRow, AppointmentStatus},
    state::AppState,
};

/// How far back a confirmation request stays answerable.
const REPLY_WINDOW_HOURS: i64 = 48;

/// Suffix matches shorter than this are too ambiguous to route a reply on.
const MIN_MATCH_DIGITS: usize = 8;

#[derive(Deserialize)]
struct InboundMessage {
    data: InboundData,
}

#[derive(Deserialize)]
struct InboundData {
    body: Option<String>,
    from: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/webhooks/whatsapp").route(web::post().to(whatsapp_inbound)));
}

async fn whatsapp_inbound(
    state: web::Data<AppState>,
    payload: web::Json<InboundMessage>,
) -> Result<HttpResponse, EngineError> {
    let payload = payload.into_inner();
    let body = payload.data.body.unwrap_or_default();
    let from = payload.data.from.unwrap_or_default();

    match apply_reply(&state, &from, &body).await? {
        Some(appt) => Ok(HttpResponse::Ok().json(json!({
            "ok": true,
            "appointment_id": appt.id,
            "status": appt.status,
        }))),
        None => Ok(HttpResponse::Ok().json(json!({ "ok": true, "handled": false }))),
    }
}

/// Routes an inbound "1" (confirm) or "2" (cancel) reply to the sender's
/// pending appointment. Only appointments whose confirmation request went out
/// within the last 48 hours are eligible; the most recently asked wins.
/// Anything else is ignored without error.
pub async fn apply_reply(
    state: &AppState,
    from: &str,
    body: &str,
) -> Result<Option<AppointmentRow>, EngineError> {
    let reply = body.trim();
    if reply != "1" && reply != "2" {
        return Ok(None);
    }

    let cutoff = state.clock.now() - TimeDelta::hours(REPLY_WINDOW_HOURS);
    let candidates = sqlx::query_as::<_, AppointmentRow>(
        r#"SELECT id, date, start_time, end_time, service_id, staff_id, client_name,
                  client_phone, client_id, note, status, is_paid, created_at,
                  confirmation_sent_at
           FROM appointments
           WHERE status = ? AND confirmation_sent_at IS NOT NULL AND confirmation_sent_at >= ?
           ORDER BY confirmation_sent_at DESC"#,
    )
    .bind(AppointmentStatus::Pending)
    .bind(cutoff)
    .fetch_all(&state.db)
    .await?;

    let Some(appt) = candidates
        .into_iter()
        .find(|appt| phones_match(&appt.client_phone, from))
    else {
        log::info!("inbound whatsapp reply from {from} matched no pending appointment");
        return Ok(None);
    };

    let updated = if reply == "1" {
        appointments::confirm(state, &appt.id).await?
    } else {
        appointments::cancel(state, &appt.id).await?
    };
    Ok(Some(updated))
}

/// Digits-only comparison: one number must be a suffix of the other, and the
/// shared suffix must be at least eight digits. Tolerates country prefixes
/// present on one side only.
pub fn phones_match(stored: &str, sender: &str) -> bool {
    let a: String = stored.chars().filter(|c| c.is_ascii_digit()).collect();
    let b: String = sender.chars().filter(|c| c.is_ascii_digit()).collect();
    let short = if a.len() <= b.len() { &a } else { &b };
    let long = if a.len() <= b.len() { &b } else { &a };
    short.len() >= MIN_MATCH_DIGITS && long.ends_with(short.as_str())
}
