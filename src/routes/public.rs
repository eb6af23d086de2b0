use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use crate::{
    appointments::{self, NewAppointment},
    error::EngineError,
    models::ServiceRow,
    slots,
    state::AppState,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/health").route(web::get().to(health)))
        .service(web::resource("/api/services").route(web::get().to(list_services)))
        .service(web::resource("/api/slots").route(web::get().to(get_slots)))
        .service(web::resource("/api/appointments").route(web::post().to(create_appointment)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "ok": true }))
}

async fn list_services(state: web::Data<AppState>) -> Result<HttpResponse, EngineError> {
    let services = sqlx::query_as::<_, ServiceRow>(
        "SELECT id, name, duration_min, price, active FROM services WHERE active = 1 ORDER BY name",
    )
    .fetch_all(&state.db)
    .await
    .map_err(EngineError::from)?;
    Ok(HttpResponse::Ok().json(services))
}

#[derive(Deserialize)]
struct SlotQuery {
    date: NaiveDate,
    service_id: String,
    staff_id: Option<String>,
}

async fn get_slots(
    state: web::Data<AppState>,
    query: web::Query<SlotQuery>,
) -> Result<HttpResponse, EngineError> {
    let slots = slots::generate_slots(
        &state.db,
        state.clock.as_ref(),
        query.date,
        &query.service_id,
        query.staff_id.as_deref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(slots))
}

async fn create_appointment(
    state: web::Data<AppState>,
    payload: web::Json<NewAppointment>,
) -> Result<HttpResponse, EngineError> {
    let input = payload.into_inner();
    if input.client_name.trim().is_empty() || input.client_phone.trim().is_empty() {
        return Ok(HttpResponse::BadRequest()
            .json(json!({ "ok": false, "message": "client_name and client_phone are required" })));
    }

    let appt = appointments::create(&state, input).await?;
    Ok(HttpResponse::Created().json(appt))
}
