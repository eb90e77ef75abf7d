use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use ulid::Ulid;

use rezerva::cache::{CacheKey, MemoryCache};
use rezerva::clock::ManualClock;
use rezerva::engine::{BookingRequest, CreateScheduleRequest, Engine, NoShowOutcome};
use rezerva::model::*;
use rezerva::notify::NotifyHub;
use rezerva::store::{MemoryStore, Store};

// ── Test infrastructure ──────────────────────────────────────

const DAY0: Ms = 900 * DAY_MS;

struct World {
    engine: Arc<Engine>,
    store: Arc<MemoryStore>,
    hub: Arc<NotifyHub>,
    cache: Arc<MemoryCache>,
    clock: Arc<ManualClock>,
    employee: Ulid,
    customer: Ulid,
    service: Ulid,
    company: Ulid,
}

fn world() -> World {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(NotifyHub::new());
    let cache = Arc::new(MemoryCache::new());
    let clock = Arc::new(ManualClock::new(DAY0 - DAY_MS));
    let engine = Arc::new(Engine::new(
        store.clone(),
        hub.clone(),
        cache.clone(),
        clock.clone(),
    ));

    let (employee, customer, service, company) =
        (Ulid::new(), Ulid::new(), Ulid::new(), Ulid::new());
    store.put_employee(Employee { id: employee, name: "Mara".into() });
    store.put_customer(Customer { id: customer, name: "Jon".into() });
    store.put_service(Service { id: service, company_id: company, name: "Haircut".into() });

    World { engine, store, hub, cache, clock, employee, customer, service, company }
}

/// Wait for the next event with a timeout.
async fn recv_event(
    rx: &mut broadcast::Receiver<DomainEvent>,
    timeout: Duration,
) -> Option<DomainEvent> {
    tokio::time::timeout(timeout, rx.recv()).await.ok().and_then(|r| r.ok())
}

// ── Scenarios ────────────────────────────────────────────────

#[tokio::test]
async fn full_booking_flow_emits_ordered_events() {
    let w = world();
    let mut rx = w.hub.subscribe(w.employee);

    w.engine
        .create_schedule(CreateScheduleRequest {
            employee_id: w.employee,
            description: Some("weekday mornings".into()),
            slots: vec![(DAY0 + 9 * HOUR_MS, DAY0 + 12 * HOUR_MS)],
            repeat: RepeatPattern::Weekly,
            repeat_count: Some(2),
        })
        .await
        .unwrap();

    w.cache.put(CacheKey::Employee(w.employee), serde_json::json!(["stale listing"]));

    let reservation = w
        .engine
        .book(BookingRequest {
            employee_id: w.employee,
            customer_id: w.customer,
            service_id: w.service,
            start: DAY0 + 9 * HOUR_MS,
        })
        .await
        .unwrap();

    let booked = recv_event(&mut rx, Duration::from_secs(1)).await.unwrap();
    match booked {
        DomainEvent::Booked { reservation_id, customer_id, employee_id, .. } => {
            assert_eq!(reservation_id, reservation.id);
            assert_eq!(customer_id, w.customer);
            assert_eq!(employee_id, w.employee);
        }
        other => panic!("expected Booked, got {other:?}"),
    }
    // Commit happened before publish, so the stale cache entry is gone by
    // the time the event is observed.
    assert!(w.cache.get(&CacheKey::Employee(w.employee)).is_none());

    w.engine.confirm(reservation.id, Some(DAY0 + 10 * HOUR_MS)).await.unwrap();
    let confirmed = recv_event(&mut rx, Duration::from_secs(1)).await.unwrap();
    assert_eq!(confirmed.reservation_id(), reservation.id);
    assert!(matches!(
        confirmed,
        DomainEvent::Confirmed { end, .. } if end == DAY0 + 10 * HOUR_MS
    ));

    w.engine.complete(reservation.id).await.unwrap();
    let completed = recv_event(&mut rx, Duration::from_secs(1)).await.unwrap();
    assert!(matches!(completed, DomainEvent::Completed { .. }));

    // One event per transition, nothing queued beyond that.
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn no_show_path_blocks_after_third_strike() {
    let w = world();
    let mut rx = w.hub.subscribe(w.employee);

    w.engine
        .create_schedule(CreateScheduleRequest {
            employee_id: w.employee,
            description: None,
            slots: vec![(DAY0 + 9 * HOUR_MS, DAY0 + 17 * HOUR_MS)],
            repeat: RepeatPattern::None,
            repeat_count: None,
        })
        .await
        .unwrap();

    for strike in 0..3i64 {
        let reservation = w
            .engine
            .book(BookingRequest {
                employee_id: w.employee,
                customer_id: w.customer,
                service_id: w.service,
                start: DAY0 + 9 * HOUR_MS + strike * HOUR_MS,
            })
            .await
            .unwrap();
        w.engine.confirm(reservation.id, None).await.unwrap();
        let (_, outcome) = w.engine.mark_did_not_come(reservation.id).await.unwrap();

        if strike < 2 {
            assert_eq!(outcome, NoShowOutcome::Recorded);
        } else {
            assert_eq!(outcome, NoShowOutcome::CustomerBlocked);
        }
    }

    let block = w.store.find_block(w.customer, w.company).await.unwrap().unwrap();
    assert!(block.forever);

    // Booked/Confirmed/DidNotCome, three times over.
    let mut seen = Vec::new();
    while let Some(event) = recv_event(&mut rx, Duration::from_millis(100)).await {
        seen.push(event);
    }
    assert_eq!(seen.len(), 9);
    assert!(matches!(seen[2], DomainEvent::DidNotCome { .. }));
    assert!(matches!(seen[8], DomainEvent::DidNotCome { .. }));
}

#[tokio::test]
async fn customer_cancellation_respects_window_under_manual_time() {
    let w = world();

    w.engine
        .create_schedule(CreateScheduleRequest {
            employee_id: w.employee,
            description: None,
            slots: vec![(DAY0 + 9 * HOUR_MS, DAY0 + 12 * HOUR_MS)],
            repeat: RepeatPattern::None,
            repeat_count: None,
        })
        .await
        .unwrap();

    let reservation = w
        .engine
        .book(BookingRequest {
            employee_id: w.employee,
            customer_id: w.customer,
            service_id: w.service,
            start: DAY0 + 9 * HOUR_MS,
        })
        .await
        .unwrap();

    // Nine minutes and fifty-nine seconds out: too late.
    w.clock.set(reservation.start - 10 * MINUTE_MS + 1_000);
    let result = w.engine.cancel_by_customer(reservation.id, "overslept").await;
    assert!(result.is_err());

    // Back up to exactly ten minutes: allowed.
    w.clock.set(reservation.start - 10 * MINUTE_MS);
    let cancelled = w.engine.cancel_by_customer(reservation.id, "overslept").await.unwrap();
    assert_eq!(cancelled.status, ReservationStatus::CancelledByCustomer);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("overslept"));
}

#[tokio::test]
async fn reminder_sweep_announces_upcoming_reservation() {
    let w = world();
    let mut rx = w.hub.subscribe(w.employee);

    w.engine
        .create_schedule(CreateScheduleRequest {
            employee_id: w.employee,
            description: None,
            slots: vec![(DAY0 + 9 * HOUR_MS, DAY0 + 12 * HOUR_MS)],
            repeat: RepeatPattern::None,
            repeat_count: None,
        })
        .await
        .unwrap();

    let reservation = w
        .engine
        .book(BookingRequest {
            employee_id: w.employee,
            customer_id: w.customer,
            service_id: w.service,
            start: DAY0 + 9 * HOUR_MS,
        })
        .await
        .unwrap();
    let _ = recv_event(&mut rx, Duration::from_secs(1)).await; // Booked

    // Move to three minutes before the start and sweep.
    w.clock.set(reservation.start - 3 * MINUTE_MS);
    let mut notified = std::collections::HashMap::new();
    let sent = w.engine.publish_starting_soon(&mut notified).await.unwrap();
    assert_eq!(sent, 1);

    let event = recv_event(&mut rx, Duration::from_secs(1)).await.unwrap();
    match event {
        DomainEvent::StartingSoon { reservation_id, start, .. } => {
            assert_eq!(reservation_id, reservation.id);
            assert_eq!(start, reservation.start);
        }
        other => panic!("expected StartingSoon, got {other:?}"),
    }
}
