//! End-to-end booking flow against an in-memory database: book a slot, watch
//! it disappear from availability, get reminded, confirm by reply, cancel.

use std::sync::Arc;

use chrono::NaiveDateTime;

use salonbook::appointments::{self, NewAppointment};
use salonbook::clock::FixedClock;
use salonbook::db::memory_pool;
use salonbook::models::AppointmentStatus;
use salonbook::routes::webhooks::apply_reply;
use salonbook::slots::generate_slots;
use salonbook::state::{AdminContact, AppState, ScopeLocks};
use salonbook::testutil::{date, datetime, seed_day, seed_service, RecordingNotifier};
use salonbook::{conflict, reminders};

const CLIENT_PHONE: &str = "5493512999888";

async fn booking_state(notifier: Arc<RecordingNotifier>, now: NaiveDateTime) -> AppState {
    AppState {
        db: memory_pool().await,
        clock: Arc::new(FixedClock(now)),
        notifier,
        booking_locks: ScopeLocks::new(),
        admin: AdminContact::default(),
    }
}

async fn slot_starts(state: &AppState, day: chrono::NaiveDate, service: &str) -> Vec<String> {
    generate_slots(&state.db, state.clock.as_ref(), day, service, None)
        .await
        .unwrap()
        .into_iter()
        .map(|slot| slot.start_time)
        .collect()
}

#[tokio::test]
async fn full_booking_lifecycle() {
    // Now is the day before the appointment, mid-morning.
    let now = datetime(2025, 6, 2, 10, 0);
    let notifier = Arc::new(RecordingNotifier::succeeding());
    let state = booking_state(Arc::clone(&notifier), now).await;

    let day = date(2025, 6, 3);
    seed_day(&state.db, day, None, true, 45, &[("10:00", "14:00")]).await;
    let service = seed_service(&state.db, "Corte", 45).await;

    // The requested slot is offered before booking.
    let open = slot_starts(&state, day, &service).await;
    assert!(open.contains(&"10:45".to_string()));

    let appt = appointments::create(
        &state,
        NewAppointment {
            date: day,
            start_time: "10:45".to_string(),
            service_id: service.clone(),
            staff_id: None,
            client_name: "Lucía".to_string(),
            client_phone: CLIENT_PHONE.to_string(),
            note: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(appt.status, AppointmentStatus::Pending);
    assert_eq!(appt.end_time, "11:30");

    // A pending booking already occupies the slot.
    let open = slot_starts(&state, day, &service).await;
    assert!(!open.contains(&"10:45".to_string()));
    assert!(open.contains(&"10:00".to_string()));

    // Booked just under 25 hours ahead, so the reminder scan picks it up.
    assert_eq!(reminders::scan(&state).await.unwrap(), 1);
    assert_eq!(reminders::scan(&state).await.unwrap(), 0);

    // The client answers "1" to the reminder.
    let confirmed = apply_reply(&state, CLIENT_PHONE, "1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(confirmed.id, appt.id);
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    // Confirmed still occupies the slot.
    let open = slot_starts(&state, day, &service).await;
    assert!(!open.contains(&"10:45".to_string()));

    // Cancelling frees it again.
    let cancelled = appointments::cancel(&state, &appt.id).await.unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    let open = slot_starts(&state, day, &service).await;
    assert!(open.contains(&"10:45".to_string()));
}

#[tokio::test]
async fn double_booking_same_scope_is_rejected() {
    let now = datetime(2025, 6, 2, 10, 0);
    let state = booking_state(Arc::new(RecordingNotifier::succeeding()), now).await;

    let day = date(2025, 6, 3);
    seed_day(&state.db, day, None, true, 45, &[("10:00", "14:00")]).await;
    let service = seed_service(&state.db, "Corte", 45).await;

    let booking = NewAppointment {
        date: day,
        start_time: "10:00".to_string(),
        service_id: service.clone(),
        staff_id: None,
        client_name: "Lucía".to_string(),
        client_phone: CLIENT_PHONE.to_string(),
        note: None,
    };
    appointments::create(&state, booking.clone()).await.unwrap();

    let second = appointments::create(
        &state,
        NewAppointment {
            client_name: "Marta".to_string(),
            client_phone: "5493512111222".to_string(),
            ..booking
        },
    )
    .await;
    assert!(matches!(
        second,
        Err(salonbook::error::EngineError::SlotUnavailable)
    ));
}

#[tokio::test]
async fn shop_wide_block_hides_slots_for_staff() {
    let now = datetime(2025, 6, 1, 9, 0);
    let state = booking_state(Arc::new(RecordingNotifier::succeeding()), now).await;

    let day = date(2025, 6, 3);
    let staff = salonbook::testutil::seed_staff(&state.db, "Vale").await;
    seed_day(&state.db, day, Some(&staff), true, 45, &[("10:00", "12:15")]).await;
    let service = seed_service(&state.db, "Corte", 45).await;

    sqlx::query(
        r#"INSERT INTO blocks (id, start_date, end_date, start_time, end_time, reason, staff_id)
           VALUES ('b1', ?, ?, '10:00', '11:30', 'feriado', NULL)"#,
    )
    .bind(day)
    .bind(day)
    .execute(&state.db)
    .await
    .unwrap();

    let open = generate_slots(&state.db, state.clock.as_ref(), day, &service, Some(&staff))
        .await
        .unwrap()
        .into_iter()
        .map(|slot| slot.start_time)
        .collect::<Vec<_>>();
    assert_eq!(open, vec!["11:30".to_string()]);

    // The block also reads back through the occupancy loader.
    let occupancy = conflict::ScopeOccupancy::load(
        &state.db,
        day,
        Some(&staff),
        &salonbook::models::OCCUPYING_STATUSES,
        None,
    )
    .await
    .unwrap();
    assert!(occupancy.conflicts(600, 645));
}
