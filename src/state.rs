use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tokio::sync::OwnedMutexGuard;

use crate::clock::Clock;
use crate::notify::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
    pub booking_locks: ScopeLocks,
    pub admin: AdminContact,
}

/// Where the shop owner hears about bookings: an optional WhatsApp copy and
/// an optional Telegram bot ping. Empty fields disable the channel.
#[derive(Clone, Debug, Default)]
pub struct AdminContact {
    pub phone: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

/// One async mutex per (date, staff-scope). Holding the guard across the
/// conflict-check-then-insert sequence closes the double-booking race;
/// disjoint scopes still book concurrently.
#[derive(Clone, Default)]
pub struct ScopeLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ScopeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, date: NaiveDate, staff_id: Option<&str>) -> OwnedMutexGuard<()> {
        let key = format!("{date}|{}", staff_id.unwrap_or(""));
        let lock = {
            let mut map = self
                .inner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // A held or pending guard keeps its own Arc clone, so a strong
            // count of 1 means nobody is using the scope anymore. Pruning
            // here keeps the map from growing one entry per date ever booked.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(key).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn scope_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disjoint_scopes_lock_independently() {
        let locks = ScopeLocks::new();
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let _held = locks.acquire(date, None).await;
        // A different staff scope on the same date must not block.
        let other = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            locks.acquire(date, Some("staff-1")),
        )
        .await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn same_scope_serializes() {
        let locks = ScopeLocks::new();
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let _held = locks.acquire(date, None).await;
        let second = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            locks.acquire(date, None),
        )
        .await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn released_scopes_are_pruned_on_later_acquires() {
        let locks = ScopeLocks::new();
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

        let first = locks.acquire(date, None).await;
        let second = locks.acquire(date, Some("staff-1")).await;
        assert_eq!(locks.scope_count(), 2);
        drop(first);
        drop(second);

        let held = locks.acquire(date, Some("staff-2")).await;
        // Both released scopes went away; only the held one remains.
        assert_eq!(locks.scope_count(), 1);
        drop(held);
    }
}
