use crate::error::EngineError;

/// Parses a 24-hour `HH:MM` string into (hour, minute).
pub fn parse_time(s: &str) -> Result<(i64, i64), EngineError> {
    let mut parts = s.splitn(2, ':');
    let (Some(hour), Some(minute)) = (parts.next(), parts.next()) else {
        return Err(EngineError::InvalidFormat(s.to_string()));
    };
    let hour: i64 = hour
        .parse()
        .map_err(|_| EngineError::InvalidFormat(s.to_string()))?;
    let minute: i64 = minute
        .parse()
        .map_err(|_| EngineError::InvalidFormat(s.to_string()))?;
    if !(0..24).contains(&hour) || !(0..60).contains(&minute) {
        return Err(EngineError::InvalidFormat(s.to_string()));
    }
    Ok((hour, minute))
}

/// Converts an `HH:MM` string into minutes since midnight.
pub fn to_minutes(s: &str) -> Result<i64, EngineError> {
    let (hour, minute) = parse_time(s)?;
    Ok(hour * 60 + minute)
}

/// Inverse of [`to_minutes`], zero-padded. Callers are expected to pass
/// offsets inside a single day (0..1440).
pub fn to_time_string(minutes: i64) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Half-open interval overlap: an appointment ending at 13:00 does not
/// conflict with one starting at 13:00.
pub fn overlaps(start_a: i64, end_a: i64, start_b: i64, end_b: i64) -> bool {
    start_a.max(start_b) < end_a.min(end_b)
}
