use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::{
    error::EngineError,
    models::{AppointmentRow, AppointmentStatus, BlockRow},
    timeutil,
};

/// Everything that occupies time on one date within one staff-scope:
/// manual blocks plus appointments in the given status set. Loaded once,
/// then queried per candidate interval.
#[derive(Debug, Clone)]
pub struct ScopeOccupancy {
    blocks: Vec<(i64, i64)>,
    appointments: Vec<(i64, i64)>,
}

impl ScopeOccupancy {
    /// Fetches blocks and appointments for `date` in the scope of `staff_id`.
    ///
    /// Scoping is asymmetric on purpose: staff-unscoped blocks are shop-wide
    /// closures and apply to staff-scoped bookings too, while appointments
    /// partition strictly (one staff's appointment never blocks another's
    /// slot, and never blocks the unscoped partition).
    pub async fn load(
        pool: &SqlitePool,
        date: NaiveDate,
        staff_id: Option<&str>,
        statuses: &[AppointmentStatus],
        exclude_appointment_id: Option<&str>,
    ) -> Result<Self, EngineError> {
        let blocks = load_blocks(pool, date, staff_id).await?;
        let appointments =
            load_appointment_intervals(pool, date, staff_id, statuses, exclude_appointment_id)
                .await?;
        Ok(Self {
            blocks,
            appointments,
        })
    }

    /// Like [`load`](Self::load) but without manual blocks. The admin
    /// reschedule path uses this: blocks gate client-facing booking, not an
    /// admin deliberately moving an appointment.
    pub async fn load_appointments(
        pool: &SqlitePool,
        date: NaiveDate,
        staff_id: Option<&str>,
        statuses: &[AppointmentStatus],
        exclude_appointment_id: Option<&str>,
    ) -> Result<Self, EngineError> {
        let appointments =
            load_appointment_intervals(pool, date, staff_id, statuses, exclude_appointment_id)
                .await?;
        Ok(Self {
            blocks: Vec::new(),
            appointments,
        })
    }

    /// True iff `[start_min, end_min)` overlaps any block or appointment.
    pub fn conflicts(&self, start_min: i64, end_min: i64) -> bool {
        self.blocks
            .iter()
            .chain(self.appointments.iter())
            .any(|&(occupied_start, occupied_end)| {
                timeutil::overlaps(start_min, end_min, occupied_start, occupied_end)
            })
    }
}

async fn load_blocks(
    pool: &SqlitePool,
    date: NaiveDate,
    staff_id: Option<&str>,
) -> Result<Vec<(i64, i64)>, EngineError> {
    let block_rows = match staff_id {
        Some(staff) => {
            sqlx::query_as::<_, BlockRow>(
                r#"SELECT id, start_date, end_date, start_time, end_time, reason, staff_id
                   FROM blocks
                   WHERE start_date <= ? AND end_date >= ?
                     AND (staff_id = ? OR staff_id IS NULL)"#,
            )
            .bind(date)
            .bind(date)
            .bind(staff)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, BlockRow>(
                r#"SELECT id, start_date, end_date, start_time, end_time, reason, staff_id
                   FROM blocks
                   WHERE start_date <= ? AND end_date >= ? AND staff_id IS NULL"#,
            )
            .bind(date)
            .bind(date)
            .fetch_all(pool)
            .await?
        }
    };

    let mut blocks = Vec::with_capacity(block_rows.len());
    for block in block_rows {
        blocks.push((
            timeutil::to_minutes(&block.start_time)?,
            timeutil::to_minutes(&block.end_time)?,
        ));
    }
    Ok(blocks)
}

async fn load_appointment_intervals(
    pool: &SqlitePool,
    date: NaiveDate,
    staff_id: Option<&str>,
    statuses: &[AppointmentStatus],
    exclude_appointment_id: Option<&str>,
) -> Result<Vec<(i64, i64)>, EngineError> {
    let placeholders = vec!["?"; statuses.len()].join(", ");
    let sql = format!(
        r#"SELECT id, date, start_time, end_time, service_id, staff_id, client_name,
                  client_phone, client_id, note, status, is_paid, created_at,
                  confirmation_sent_at
           FROM appointments
           WHERE date = ? AND staff_id IS ? AND status IN ({placeholders})
             AND (? IS NULL OR id != ?)"#
    );
    let mut query = sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(date)
        .bind(staff_id);
    for status in statuses {
        query = query.bind(*status);
    }
    let appointment_rows = query
        .bind(exclude_appointment_id)
        .bind(exclude_appointment_id)
        .fetch_all(pool)
        .await?;

    let mut appointments = Vec::with_capacity(appointment_rows.len());
    for appt in appointment_rows {
        appointments.push((
            timeutil::to_minutes(&appt.start_time)?,
            timeutil::to_minutes(&appt.end_time)?,
        ));
    }
    Ok(appointments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::models::{OCCUPYING_STATUSES, RESCHEDULE_STATUSES};
    use crate::testutil::{date, datetime, insert_appointment, seed_service, seed_staff};

    async fn seed_block(
        pool: &SqlitePool,
        start_date: NaiveDate,
        end_date: NaiveDate,
        start_time: &str,
        end_time: &str,
        staff_id: Option<&str>,
    ) {
        sqlx::query(
            r#"INSERT INTO blocks (id, start_date, end_date, start_time, end_time, reason, staff_id)
               VALUES (?, ?, ?, ?, ?, NULL, ?)"#,
        )
        .bind(crate::auth::new_id())
        .bind(start_date)
        .bind(end_date)
        .bind(start_time)
        .bind(end_time)
        .bind(staff_id)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn cancelled_appointments_never_conflict() {
        let pool = memory_pool().await;
        let service = seed_service(&pool, "Corte", 45).await;
        let day = date(2025, 6, 2);
        insert_appointment(
            &pool,
            day,
            "10:00",
            "10:45",
            &service,
            None,
            AppointmentStatus::Cancelled,
            datetime(2025, 6, 1, 9, 0),
        )
        .await;

        let occupancy = ScopeOccupancy::load(&pool, day, None, &OCCUPYING_STATUSES, None)
            .await
            .unwrap();
        assert!(!occupancy.conflicts(600, 645));
    }

    #[tokio::test]
    async fn pending_blocks_creation_but_not_reschedule() {
        let pool = memory_pool().await;
        let service = seed_service(&pool, "Corte", 45).await;
        let day = date(2025, 6, 2);
        insert_appointment(
            &pool,
            day,
            "10:00",
            "10:45",
            &service,
            None,
            AppointmentStatus::Pending,
            datetime(2025, 6, 1, 9, 0),
        )
        .await;

        let create_view = ScopeOccupancy::load(&pool, day, None, &OCCUPYING_STATUSES, None)
            .await
            .unwrap();
        assert!(create_view.conflicts(600, 645));

        let reschedule_view = ScopeOccupancy::load(&pool, day, None, &RESCHEDULE_STATUSES, None)
            .await
            .unwrap();
        assert!(!reschedule_view.conflicts(600, 645));
    }

    #[tokio::test]
    async fn shop_wide_blocks_apply_to_staff_scopes() {
        let pool = memory_pool().await;
        let day = date(2025, 6, 2);
        seed_block(&pool, day, day, "10:00", "12:00", None).await;

        let staff_view = ScopeOccupancy::load(&pool, day, Some("staff-1"), &OCCUPYING_STATUSES, None)
            .await
            .unwrap();
        assert!(staff_view.conflicts(630, 675));
    }

    #[tokio::test]
    async fn appointments_only_loader_skips_blocks() {
        let pool = memory_pool().await;
        let service = seed_service(&pool, "Corte", 45).await;
        let day = date(2025, 6, 2);
        seed_block(&pool, day, day, "10:00", "12:00", None).await;
        insert_appointment(
            &pool,
            day,
            "14:00",
            "14:45",
            &service,
            None,
            AppointmentStatus::Confirmed,
            datetime(2025, 6, 1, 9, 0),
        )
        .await;

        let occupancy =
            ScopeOccupancy::load_appointments(&pool, day, None, &RESCHEDULE_STATUSES, None)
                .await
                .unwrap();
        assert!(!occupancy.conflicts(630, 675));
        assert!(occupancy.conflicts(840, 885));
    }

    #[tokio::test]
    async fn staff_blocks_do_not_leak_into_unscoped_bookings() {
        let pool = memory_pool().await;
        let day = date(2025, 6, 2);
        let staff = seed_staff(&pool, "Staff One").await;
        seed_block(&pool, day, day, "10:00", "12:00", Some(&staff)).await;

        let unscoped = ScopeOccupancy::load(&pool, day, None, &OCCUPYING_STATUSES, None)
            .await
            .unwrap();
        assert!(!unscoped.conflicts(630, 675));

        let scoped = ScopeOccupancy::load(&pool, day, Some(&staff), &OCCUPYING_STATUSES, None)
            .await
            .unwrap();
        assert!(scoped.conflicts(630, 675));
    }

    #[tokio::test]
    async fn one_staffs_appointment_never_blocks_anothers_slot() {
        let pool = memory_pool().await;
        let service = seed_service(&pool, "Corte", 45).await;
        let staff_one = seed_staff(&pool, "Staff One").await;
        let staff_two = seed_staff(&pool, "Staff Two").await;
        let day = date(2025, 6, 2);
        insert_appointment(
            &pool,
            day,
            "10:00",
            "10:45",
            &service,
            Some(&staff_one),
            AppointmentStatus::Confirmed,
            datetime(2025, 6, 1, 9, 0),
        )
        .await;

        let other_staff = ScopeOccupancy::load(&pool, day, Some(&staff_two), &OCCUPYING_STATUSES, None)
            .await
            .unwrap();
        assert!(!other_staff.conflicts(600, 645));

        let unscoped = ScopeOccupancy::load(&pool, day, None, &OCCUPYING_STATUSES, None)
            .await
            .unwrap();
        assert!(!unscoped.conflicts(600, 645));
    }

    #[tokio::test]
    async fn excluded_appointment_is_ignored() {
        let pool = memory_pool().await;
        let service = seed_service(&pool, "Corte", 45).await;
        let day = date(2025, 6, 2);
        let id = insert_appointment(
            &pool,
            day,
            "10:00",
            "10:45",
            &service,
            None,
            AppointmentStatus::Confirmed,
            datetime(2025, 6, 1, 9, 0),
        )
        .await;

        let occupancy =
            ScopeOccupancy::load(&pool, day, None, &OCCUPYING_STATUSES, Some(&id))
                .await
                .unwrap();
        assert!(!occupancy.conflicts(600, 645));
    }

    #[tokio::test]
    async fn blocks_must_cover_the_target_date() {
        let pool = memory_pool().await;
        seed_block(
            &pool,
            date(2025, 6, 3),
            date(2025, 6, 5),
            "00:00",
            "23:59",
            None,
        )
        .await;

        let before = ScopeOccupancy::load(&pool, date(2025, 6, 2), None, &OCCUPYING_STATUSES, None)
            .await
            .unwrap();
        assert!(!before.conflicts(600, 645));

        let inside = ScopeOccupancy::load(&pool, date(2025, 6, 4), None, &OCCUPYING_STATUSES, None)
            .await
            .unwrap();
        assert!(inside.conflicts(600, 645));
    }
}
