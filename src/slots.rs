use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    availability,
    clock::Clock,
    conflict::ScopeOccupancy,
    db,
    error::EngineError,
    models::OCCUPYING_STATUSES,
    timeutil,
};

/// A bookable candidate interval of exactly one service's duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub start_time: String,
    pub end_time: String,
}

/// Produces the conflict-free slots for a date/service/staff combination,
/// ascending by start time. An unknown service or a closed day yields an
/// empty list, not an error.
///
/// Candidate starts step by the day's `slot_size_min` while the slot length
/// is the service duration; the two are independent. Overlapping configured
/// ranges can produce duplicate candidates, which are intentionally not
/// deduplicated here.
pub async fn generate_slots(
    pool: &SqlitePool,
    clock: &dyn Clock,
    date: NaiveDate,
    service_id: &str,
    staff_id: Option<&str>,
) -> Result<Vec<Slot>, EngineError> {
    let Some(service) = db::fetch_service(pool, service_id).await? else {
        return Ok(Vec::new());
    };
    let duration = service.duration_min;

    let today = clock.today();
    if date < today {
        return Ok(Vec::new());
    }
    let is_today = date == today;
    let now_minutes = if is_today { clock.minutes_of_day() } else { -1 };

    let Some(day) = availability::resolve_day(pool, date, staff_id).await? else {
        return Ok(Vec::new());
    };

    let mut candidates = Vec::new();
    for (range_start, range_end) in &day.ranges {
        let mut curr = *range_start;
        while curr + duration <= *range_end {
            if !(is_today && curr < now_minutes) {
                candidates.push((curr, curr + duration));
            }
            curr += day.slot_size_min;
        }
    }

    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    // Configured range order is not trusted to be earliest-first.
    candidates.sort_by_key(|&(start, _)| start);

    let occupancy = ScopeOccupancy::load(pool, date, staff_id, &OCCUPYING_STATUSES, None).await?;

    Ok(candidates
        .into_iter()
        .filter(|&(start, end)| !occupancy.conflicts(start, end))
        .map(|(start, end)| Slot {
            start_time: timeutil::to_time_string(start),
            end_time: timeutil::to_time_string(end),
        })
        .collect())
}
