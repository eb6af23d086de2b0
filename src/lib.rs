pub mod appointments;
pub mod auth;
pub mod availability;
pub mod clock;
pub mod config;
pub mod conflict;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod reminders;
pub mod routes;
pub mod slots;
pub mod state;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
pub mod timeutil;
