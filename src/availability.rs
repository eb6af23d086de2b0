use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::{
    error::EngineError,
    models::{AvailabilityDayRow, AvailabilityRangeRow},
    timeutil,
};

/// Open time ranges and slot granularity for one (date, staff-scope) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAvailability {
    pub slot_size_min: i64,
    /// Ranges in configured order, as minute offsets `(start, end)`.
    pub ranges: Vec<(i64, i64)>,
}

/// Resolves the availability configuration for a date. `None` means closed:
/// either no row exists for this exact (date, staff-scope) pair or the day is
/// disabled. There is no fallback between the staff-scoped and unscoped
/// partitions, and no default-open behavior for missing rows.
pub async fn resolve_day(
    pool: &SqlitePool,
    date: NaiveDate,
    staff_id: Option<&str>,
) -> Result<Option<DayAvailability>, EngineError> {
    let day = sqlx::query_as::<_, AvailabilityDayRow>(
        r#"SELECT id, date, enabled, slot_size_min, staff_id
           FROM availability_days
           WHERE date = ? AND staff_id IS ?
           LIMIT 1"#,
    )
    .bind(date)
    .bind(staff_id)
    .fetch_optional(pool)
    .await?;

    let Some(day) = day else {
        return Ok(None);
    };
    if day.enabled == 0 {
        return Ok(None);
    }

    let range_rows = sqlx::query_as::<_, AvailabilityRangeRow>(
        r#"SELECT id, availability_day_id, start_time, end_time
           FROM availability_ranges
           WHERE availability_day_id = ?
           ORDER BY rowid"#,
    )
    .bind(&day.id)
    .fetch_all(pool)
    .await?;

    let mut ranges = Vec::with_capacity(range_rows.len());
    for row in range_rows {
        ranges.push((
            timeutil::to_minutes(&row.start_time)?,
            timeutil::to_minutes(&row.end_time)?,
        ));
    }

    Ok(Some(DayAvailability {
        slot_size_min: day.slot_size_min,
        ranges,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::testutil::{date, seed_day};

    #[tokio::test]
    async fn missing_row_means_closed() {
        let pool = memory_pool().await;
        let resolved = resolve_day(&pool, date(2025, 6, 2), None).await.unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn disabled_day_is_closed() {
        let pool = memory_pool().await;
        seed_day(&pool, date(2025, 6, 2), None, false, 45, &[("10:00", "13:00")]).await;
        let resolved = resolve_day(&pool, date(2025, 6, 2), None).await.unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn resolves_ranges_in_configured_order() {
        let pool = memory_pool().await;
        seed_day(
            &pool,
            date(2025, 6, 2),
            None,
            true,
            30,
            &[("10:00", "13:00"), ("14:45", "21:30")],
        )
        .await;
        let resolved = resolve_day(&pool, date(2025, 6, 2), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.slot_size_min, 30);
        assert_eq!(resolved.ranges, vec![(600, 780), (885, 1290)]);
    }

    #[tokio::test]
    async fn staff_scopes_do_not_fall_back() {
        let pool = memory_pool().await;
        seed_day(&pool, date(2025, 6, 2), None, true, 45, &[("10:00", "13:00")]).await;

        // A staff-scoped lookup must not see the unscoped row.
        let staff = resolve_day(&pool, date(2025, 6, 2), Some("staff-1"))
            .await
            .unwrap();
        assert!(staff.is_none());

        let unscoped = resolve_day(&pool, date(2025, 6, 2), None).await.unwrap();
        assert!(unscoped.is_some());
    }
}
