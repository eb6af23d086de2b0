//! Shared fixtures for the module tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::SqlitePool;

use crate::auth::new_id;
use crate::models::AppointmentStatus;
use crate::notify::Notifier;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, min, 0).unwrap()
}

pub async fn seed_day(
    pool: &SqlitePool,
    day: NaiveDate,
    staff_id: Option<&str>,
    enabled: bool,
    slot_size_min: i64,
    ranges: &[(&str, &str)],
) {
    let day_id = new_id();
    sqlx::query(
        "INSERT INTO availability_days (id, date, enabled, slot_size_min, staff_id) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&day_id)
    .bind(day)
    .bind(i64::from(enabled))
    .bind(slot_size_min)
    .bind(staff_id)
    .execute(pool)
    .await
    .unwrap();

    for (start, end) in ranges {
        sqlx::query(
            "INSERT INTO availability_ranges (id, availability_day_id, start_time, end_time) VALUES (?, ?, ?, ?)",
        )
        .bind(new_id())
        .bind(&day_id)
        .bind(start)
        .bind(end)
        .execute(pool)
        .await
        .unwrap();
    }
}

pub async fn seed_service(pool: &SqlitePool, name: &str, duration_min: i64) -> String {
    let id = new_id();
    sqlx::query("INSERT INTO services (id, name, duration_min, price, active) VALUES (?, ?, ?, NULL, 1)")
        .bind(&id)
        .bind(name)
        .bind(duration_min)
        .execute(pool)
        .await
        .unwrap();
    id
}

pub async fn seed_staff(pool: &SqlitePool, name: &str) -> String {
    let id = new_id();
    sqlx::query("INSERT INTO staff (id, name, active) VALUES (?, ?, 1)")
        .bind(&id)
        .bind(name)
        .execute(pool)
        .await
        .unwrap();
    id
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_appointment(
    pool: &SqlitePool,
    day: NaiveDate,
    start_time: &str,
    end_time: &str,
    service_id: &str,
    staff_id: Option<&str>,
    status: AppointmentStatus,
    created_at: NaiveDateTime,
) -> String {
    let id = new_id();
    sqlx::query(
        r#"INSERT INTO appointments
           (id, date, start_time, end_time, service_id, staff_id, client_name,
            client_phone, client_id, note, status, is_paid, created_at, confirmation_sent_at)
           VALUES (?, ?, ?, ?, ?, ?, 'Test Client', '5493512000000', NULL, NULL, ?, 0, ?, NULL)"#,
    )
    .bind(&id)
    .bind(day)
    .bind(start_time)
    .bind(end_time)
    .bind(service_id)
    .bind(staff_id)
    .bind(status)
    .bind(created_at)
    .execute(pool)
    .await
    .unwrap();
    id
}

/// Notifier that records every send and answers with a scripted result.
#[derive(Default)]
pub struct RecordingNotifier {
    pub succeed: bool,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn succeeding() -> Self {
        Self {
            succeed: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            succeed: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to_phone: &str, body: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((to_phone.to_string(), body.to_string()));
        self.succeed
    }
}
