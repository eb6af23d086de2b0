use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Closed set of appointment states. Stored as TEXT in sqlite under the
/// screaming-snake variant names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    NoShow,
    Finished,
}

impl AppointmentStatus {
    /// A status occupies its slot iff it blocks other bookings for the same
    /// interval. CANCELLED and NO_SHOW never hold a slot.
    pub fn is_occupying(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Finished)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::NoShow => "NO_SHOW",
            Self::Finished => "FINISHED",
        }
    }
}

/// Statuses checked when creating a new appointment.
pub const OCCUPYING_STATUSES: [AppointmentStatus; 3] = [
    AppointmentStatus::Pending,
    AppointmentStatus::Confirmed,
    AppointmentStatus::Finished,
];

/// Statuses checked when rescheduling. PENDING is deliberately absent: a
/// pending request does not stop the admin from moving another appointment
/// into its slot.
pub const RESCHEDULE_STATUSES: [AppointmentStatus; 2] =
    [AppointmentStatus::Confirmed, AppointmentStatus::Finished];

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ServiceRow {
    pub id: String,
    pub name: String,
    pub duration_min: i64,
    pub price: Option<f64>,
    pub active: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct StaffRow {
    pub id: String,
    pub name: String,
    pub active: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AvailabilityDayRow {
    pub id: String,
    pub date: NaiveDate,
    pub enabled: i64,
    pub slot_size_min: i64,
    pub staff_id: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AvailabilityRangeRow {
    pub id: String,
    pub availability_day_id: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct BlockRow {
    pub id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub reason: Option<String>,
    pub staff_id: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ClientRow {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AppointmentRow {
    pub id: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub service_id: String,
    pub staff_id: Option<String>,
    pub client_name: String,
    pub client_phone: String,
    pub client_id: Option<String>,
    pub note: Option<String>,
    pub status: AppointmentStatus,
    pub is_paid: i64,
    pub created_at: NaiveDateTime,
    pub confirmation_sent_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminUserRow {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: String,
}
