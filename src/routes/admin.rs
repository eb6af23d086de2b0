use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    appointments::{self, AppointmentPatch},
    auth::{admin_validator, new_id},
    error::EngineError,
    models::{
        AppointmentRow, AvailabilityDayRow, AvailabilityRangeRow, BlockRow, ClientRow, ServiceRow,
        StaffRow,
    },
    state::AppState,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/admin")
            .wrap(HttpAuthentication::basic(admin_validator))
            .service(
                web::resource("/services")
                    .route(web::get().to(list_services))
                    .route(web::post().to(create_service)),
            )
            .service(web::resource("/services/{id}").route(web::put().to(update_service)))
            .service(
                web::resource("/staff")
                    .route(web::get().to(list_staff))
                    .route(web::post().to(create_staff)),
            )
            .service(web::resource("/availability").route(web::get().to(get_availability)))
            .service(web::resource("/availability/{date}").route(web::put().to(put_availability)))
            .service(
                web::resource("/blocks")
                    .route(web::get().to(list_blocks))
                    .route(web::post().to(create_block)),
            )
            .service(web::resource("/blocks/{id}").route(web::delete().to(delete_block)))
            .service(web::resource("/appointments").route(web::get().to(list_appointments)))
            .service(
                web::resource("/appointments/{id}")
                    .route(web::patch().to(patch_appointment))
                    .route(web::delete().to(delete_appointment)),
            )
            .service(
                web::resource("/appointments/{id}/confirm").route(web::put().to(confirm_appointment)),
            )
            .service(
                web::resource("/appointments/{id}/cancel").route(web::put().to(cancel_appointment)),
            )
            .service(
                web::resource("/appointments/{id}/finish").route(web::put().to(finish_appointment)),
            )
            .service(
                web::resource("/appointments/{id}/reschedule")
                    .route(web::put().to(reschedule_appointment)),
            )
            .service(web::resource("/clients").route(web::get().to(list_clients))),
    );
}

// --- services -------------------------------------------------------------

#[derive(Deserialize)]
struct ServiceForm {
    name: String,
    duration_min: i64,
    price: Option<f64>,
    active: Option<bool>,
}

async fn list_services(state: web::Data<AppState>) -> Result<HttpResponse, EngineError> {
    let services = sqlx::query_as::<_, ServiceRow>(
        "SELECT id, name, duration_min, price, active FROM services ORDER BY name",
    )
    .fetch_all(&state.db)
    .await
    .map_err(EngineError::from)?;
    Ok(HttpResponse::Ok().json(services))
}

async fn create_service(
    state: web::Data<AppState>,
    form: web::Json<ServiceForm>,
) -> Result<HttpResponse, EngineError> {
    let form = form.into_inner();
    let id = new_id();
    sqlx::query("INSERT INTO services (id, name, duration_min, price, active) VALUES (?, ?, ?, ?, ?)")
        .bind(&id)
        .bind(form.name.trim())
        .bind(form.duration_min)
        .bind(form.price)
        .bind(i64::from(form.active.unwrap_or(true)))
        .execute(&state.db)
        .await
        .map_err(EngineError::from)?;

    let service = crate::db::fetch_service(&state.db, &id)
        .await?
        .ok_or(EngineError::ServiceNotFound)?;
    Ok(HttpResponse::Created().json(service))
}

async fn update_service(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Json<ServiceForm>,
) -> Result<HttpResponse, EngineError> {
    let service_id = path.into_inner();
    let form = form.into_inner();
    let result = sqlx::query(
        "UPDATE services SET name = ?, duration_min = ?, price = ?, active = ? WHERE id = ?",
    )
    .bind(form.name.trim())
    .bind(form.duration_min)
    .bind(form.price)
    .bind(i64::from(form.active.unwrap_or(true)))
    .bind(&service_id)
    .execute(&state.db)
    .await
    .map_err(EngineError::from)?;

    if result.rows_affected() == 0 {
        return Err(EngineError::ServiceNotFound);
    }
    let service = crate::db::fetch_service(&state.db, &service_id)
        .await?
        .ok_or(EngineError::ServiceNotFound)?;
    Ok(HttpResponse::Ok().json(service))
}

// --- staff ----------------------------------------------------------------

#[derive(Deserialize)]
struct StaffForm {
    name: String,
}

async fn list_staff(state: web::Data<AppState>) -> Result<HttpResponse, EngineError> {
    let staff = sqlx::query_as::<_, StaffRow>("SELECT id, name, active FROM staff ORDER BY name")
        .fetch_all(&state.db)
        .await
        .map_err(EngineError::from)?;
    Ok(HttpResponse::Ok().json(staff))
}

async fn create_staff(
    state: web::Data<AppState>,
    form: web::Json<StaffForm>,
) -> Result<HttpResponse, EngineError> {
    let id = new_id();
    sqlx::query("INSERT INTO staff (id, name, active) VALUES (?, ?, 1)")
        .bind(&id)
        .bind(form.name.trim())
        .execute(&state.db)
        .await
        .map_err(EngineError::from)?;
    Ok(HttpResponse::Created().json(json!({ "id": id, "name": form.name.trim(), "active": 1 })))
}

// --- availability ---------------------------------------------------------

#[derive(Deserialize)]
struct AvailabilityQuery {
    from: NaiveDate,
    to: NaiveDate,
    staff_id: Option<String>,
}

#[derive(Serialize)]
struct AvailabilityOut {
    #[serde(flatten)]
    day: AvailabilityDayRow,
    ranges: Vec<AvailabilityRangeRow>,
}

#[derive(Deserialize)]
struct RangeForm {
    start_time: String,
    end_time: String,
}

#[derive(Deserialize)]
struct AvailabilityForm {
    staff_id: Option<String>,
    enabled: Option<bool>,
    slot_size_min: Option<i64>,
    ranges: Option<Vec<RangeForm>>,
}

async fn get_availability(
    state: web::Data<AppState>,
    query: web::Query<AvailabilityQuery>,
) -> Result<HttpResponse, EngineError> {
    let days = sqlx::query_as::<_, AvailabilityDayRow>(
        r#"SELECT id, date, enabled, slot_size_min, staff_id
           FROM availability_days
           WHERE date >= ? AND date <= ? AND staff_id IS ?
           ORDER BY date"#,
    )
    .bind(query.from)
    .bind(query.to)
    .bind(query.staff_id.as_deref())
    .fetch_all(&state.db)
    .await
    .map_err(EngineError::from)?;

    let mut out = Vec::with_capacity(days.len());
    for day in days {
        let ranges = sqlx::query_as::<_, AvailabilityRangeRow>(
            r#"SELECT id, availability_day_id, start_time, end_time
               FROM availability_ranges WHERE availability_day_id = ? ORDER BY rowid"#,
        )
        .bind(&day.id)
        .fetch_all(&state.db)
        .await
        .map_err(EngineError::from)?;
        out.push(AvailabilityOut { day, ranges });
    }
    Ok(HttpResponse::Ok().json(out))
}

/// Upserts one day's configuration. Replacing the ranges is atomic: the old
/// rows are deleted and the new ones inserted inside a single transaction.
async fn put_availability(
    state: web::Data<AppState>,
    path: web::Path<NaiveDate>,
    form: web::Json<AvailabilityForm>,
) -> Result<HttpResponse, EngineError> {
    let date = path.into_inner();
    let form = form.into_inner();

    let mut tx = state.db.begin().await.map_err(EngineError::from)?;

    let existing = sqlx::query_as::<_, AvailabilityDayRow>(
        r#"SELECT id, date, enabled, slot_size_min, staff_id
           FROM availability_days WHERE date = ? AND staff_id IS ? LIMIT 1"#,
    )
    .bind(date)
    .bind(form.staff_id.as_deref())
    .fetch_optional(&mut *tx)
    .await
    .map_err(EngineError::from)?;

    let day_id = match existing {
        Some(day) => day.id,
        None => {
            let id = new_id();
            sqlx::query(
                "INSERT INTO availability_days (id, date, enabled, slot_size_min, staff_id) VALUES (?, ?, 1, 45, ?)",
            )
            .bind(&id)
            .bind(date)
            .bind(form.staff_id.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(EngineError::from)?;
            id
        }
    };

    if let Some(enabled) = form.enabled {
        sqlx::query("UPDATE availability_days SET enabled = ? WHERE id = ?")
            .bind(i64::from(enabled))
            .bind(&day_id)
            .execute(&mut *tx)
            .await
            .map_err(EngineError::from)?;
    }
    if let Some(slot_size_min) = form.slot_size_min {
        sqlx::query("UPDATE availability_days SET slot_size_min = ? WHERE id = ?")
            .bind(slot_size_min)
            .bind(&day_id)
            .execute(&mut *tx)
            .await
            .map_err(EngineError::from)?;
    }

    if let Some(ranges) = form.ranges {
        sqlx::query("DELETE FROM availability_ranges WHERE availability_day_id = ?")
            .bind(&day_id)
            .execute(&mut *tx)
            .await
            .map_err(EngineError::from)?;
        for range in ranges {
            crate::timeutil::to_minutes(&range.start_time)?;
            crate::timeutil::to_minutes(&range.end_time)?;
            sqlx::query(
                "INSERT INTO availability_ranges (id, availability_day_id, start_time, end_time) VALUES (?, ?, ?, ?)",
            )
            .bind(new_id())
            .bind(&day_id)
            .bind(&range.start_time)
            .bind(&range.end_time)
            .execute(&mut *tx)
            .await
            .map_err(EngineError::from)?;
        }
    }

    tx.commit().await.map_err(EngineError::from)?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "id": day_id })))
}

// --- blocks ---------------------------------------------------------------

#[derive(Deserialize)]
struct BlockForm {
    start_date: NaiveDate,
    end_date: NaiveDate,
    start_time: String,
    end_time: String,
    reason: Option<String>,
    staff_id: Option<String>,
}

async fn list_blocks(state: web::Data<AppState>) -> Result<HttpResponse, EngineError> {
    let blocks = sqlx::query_as::<_, BlockRow>(
        r#"SELECT id, start_date, end_date, start_time, end_time, reason, staff_id
           FROM blocks ORDER BY start_date"#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(EngineError::from)?;
    Ok(HttpResponse::Ok().json(blocks))
}

async fn create_block(
    state: web::Data<AppState>,
    form: web::Json<BlockForm>,
) -> Result<HttpResponse, EngineError> {
    let form = form.into_inner();
    crate::timeutil::to_minutes(&form.start_time)?;
    crate::timeutil::to_minutes(&form.end_time)?;

    let id = new_id();
    sqlx::query(
        r#"INSERT INTO blocks (id, start_date, end_date, start_time, end_time, reason, staff_id)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(form.start_date)
    .bind(form.end_date)
    .bind(&form.start_time)
    .bind(&form.end_time)
    .bind(&form.reason)
    .bind(&form.staff_id)
    .execute(&state.db)
    .await
    .map_err(EngineError::from)?;
    Ok(HttpResponse::Created().json(json!({ "ok": true, "id": id })))
}

async fn delete_block(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    let result = sqlx::query("DELETE FROM blocks WHERE id = ?")
        .bind(path.into_inner())
        .execute(&state.db)
        .await
        .map_err(EngineError::from)?;
    if result.rows_affected() == 0 {
        return Err(EngineError::NotFound);
    }
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

// --- appointments ---------------------------------------------------------

#[derive(Deserialize)]
struct AppointmentFilter {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    date: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct RescheduleForm {
    date: NaiveDate,
    start_time: String,
}

#[derive(Deserialize)]
struct FinishQuery {
    is_paid: Option<bool>,
}

async fn list_appointments(
    state: web::Data<AppState>,
    query: web::Query<AppointmentFilter>,
) -> Result<HttpResponse, EngineError> {
    let base = r#"SELECT id, date, start_time, end_time, service_id, staff_id, client_name,
                         client_phone, client_id, note, status, is_paid, created_at,
                         confirmation_sent_at
                  FROM appointments"#;

    let rows = if let Some(date) = query.date {
        sqlx::query_as::<_, AppointmentRow>(&format!(
            "{base} WHERE date = ? ORDER BY date, start_time"
        ))
        .bind(date)
        .fetch_all(&state.db)
        .await
    } else {
        sqlx::query_as::<_, AppointmentRow>(&format!(
            "{base} WHERE (? IS NULL OR date >= ?) AND (? IS NULL OR date <= ?) ORDER BY date, start_time"
        ))
        .bind(query.from)
        .bind(query.from)
        .bind(query.to)
        .bind(query.to)
        .fetch_all(&state.db)
        .await
    }
    .map_err(EngineError::from)?;

    Ok(HttpResponse::Ok().json(rows))
}

async fn confirm_appointment(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    let appt = appointments::confirm(&state, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(appt))
}

async fn cancel_appointment(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    let appt = appointments::cancel(&state, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(appt))
}

async fn finish_appointment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<FinishQuery>,
) -> Result<HttpResponse, EngineError> {
    let appt =
        appointments::finish(&state, &path.into_inner(), query.is_paid.unwrap_or(false)).await?;
    Ok(HttpResponse::Ok().json(appt))
}

async fn reschedule_appointment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Json<RescheduleForm>,
) -> Result<HttpResponse, EngineError> {
    let appt =
        appointments::reschedule(&state, &path.into_inner(), form.date, &form.start_time).await?;
    Ok(HttpResponse::Ok().json(appt))
}

async fn patch_appointment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    patch: web::Json<AppointmentPatch>,
) -> Result<HttpResponse, EngineError> {
    let appt = appointments::update(&state, &path.into_inner(), patch.into_inner()).await?;
    Ok(HttpResponse::Ok().json(appt))
}

async fn delete_appointment(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    appointments::delete(&state, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

// --- clients --------------------------------------------------------------

async fn list_clients(state: web::Data<AppState>) -> Result<HttpResponse, EngineError> {
    let clients = sqlx::query_as::<_, ClientRow>(
        "SELECT id, name, phone, email, created_at FROM clients ORDER BY name",
    )
    .fetch_all(&state.db)
    .await
    .map_err(EngineError::from)?;
    Ok(HttpResponse::Ok().json(clients))
}
