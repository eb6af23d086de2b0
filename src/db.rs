use std::{env, fs, path::Path};

use chrono::NaiveDateTime;
use sqlx::SqlitePool;

use crate::{
    auth::{hash_password, new_id},
    error::EngineError,
    models::{AppointmentRow, ClientRow, ServiceRow},
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn seed_defaults(pool: &SqlitePool, now: NaiveDateTime) -> Result<(), sqlx::Error> {
    seed_admin(pool, now).await?;
    seed_services(pool).await?;
    Ok(())
}

async fn seed_admin(pool: &SqlitePool, now: NaiveDateTime) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM admin_users LIMIT 1")
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let username = env::var("ADMIN_USER").unwrap_or_else(|_| "admin".to_string());
    let password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());

    if password == "admin" {
        log::warn!("ADMIN_PASSWORD not set. Using default password 'admin'. Set ADMIN_PASSWORD in production.");
    }

    let password_hash = hash_password(&password)
        .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;

    sqlx::query(
        r#"INSERT INTO admin_users (id, username, password_hash, created_at)
           VALUES (?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(username)
    .bind(password_hash)
    .bind(now.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_services(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM services LIMIT 1")
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let defaults: [(&str, i64); 4] = [
        ("Corte", 45),
        ("Corte y barba", 60),
        ("Color", 90),
        ("Brushing", 30),
    ];

    for (name, duration_min) in defaults {
        sqlx::query(
            r#"INSERT INTO services (id, name, duration_min, price, active)
               VALUES (?, ?, ?, NULL, 1)"#,
        )
        .bind(new_id())
        .bind(name)
        .bind(duration_min)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_service(
    pool: &SqlitePool,
    service_id: &str,
) -> Result<Option<ServiceRow>, EngineError> {
    let row = sqlx::query_as::<_, ServiceRow>(
        "SELECT id, name, duration_min, price, active FROM services WHERE id = ? LIMIT 1",
    )
    .bind(service_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn fetch_appointment(
    pool: &SqlitePool,
    appointment_id: &str,
) -> Result<AppointmentRow, EngineError> {
    sqlx::query_as::<_, AppointmentRow>(
        r#"SELECT id, date, start_time, end_time, service_id, staff_id, client_name,
                  client_phone, client_id, note, status, is_paid, created_at,
                  confirmation_sent_at
           FROM appointments WHERE id = ? LIMIT 1"#,
    )
    .bind(appointment_id)
    .fetch_optional(pool)
    .await?
    .ok_or(EngineError::NotFound)
}

/// Clients are keyed by phone number and created lazily on first booking.
/// An existing client's name is never overwritten by a later booking.
pub async fn find_or_create_client(
    pool: &SqlitePool,
    name: &str,
    phone: &str,
    now: NaiveDateTime,
) -> Result<ClientRow, EngineError> {
    let existing = sqlx::query_as::<_, ClientRow>(
        "SELECT id, name, phone, email, created_at FROM clients WHERE phone = ? LIMIT 1",
    )
    .bind(phone)
    .fetch_optional(pool)
    .await?;

    if let Some(client) = existing {
        return Ok(client);
    }

    let id = new_id();
    sqlx::query(
        r#"INSERT INTO clients (id, name, phone, email, created_at)
           VALUES (?, ?, ?, NULL, ?)"#,
    )
    .bind(&id)
    .bind(name)
    .bind(phone)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(ClientRow {
        id,
        name: name.to_string(),
        phone: phone.to_string(),
        email: None,
        created_at: now,
    })
}

/// In-memory database with migrations applied, shared by the module tests.
#[cfg(any(test, feature = "testutil"))]
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite pool");
    run_migrations(&pool).await.expect("migrations");
    pool
}
