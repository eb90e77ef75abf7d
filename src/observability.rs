use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: booking admissions. Labels: outcome.
pub const BOOKINGS_TOTAL: &str = "rezerva_bookings_total";

/// Counter: admission retries after a storage conflict.
pub const BOOKING_RETRIES_TOTAL: &str = "rezerva_booking_retries_total";

/// Counter: reservation status transitions. Labels: transition.
pub const TRANSITIONS_TOTAL: &str = "rezerva_transitions_total";

/// Counter: schedule rows persisted by the planner.
pub const SCHEDULE_ROWS_TOTAL: &str = "rezerva_schedule_rows_total";

/// Counter: schedule requests rejected for overlap.
pub const SCHEDULE_CONFLICTS_TOTAL: &str = "rezerva_schedule_conflicts_total";

// ── USE metrics (resource/background) ───────────────────────────

/// Counter: customers auto-blocked by the no-show policy.
pub const AUTO_BLOCKS_TOTAL: &str = "rezerva_auto_blocks_total";

/// Counter: starting-soon reminders published.
pub const REMINDERS_SENT_TOTAL: &str = "rezerva_reminders_sent_total";

/// Counter: cache invalidations issued after commits.
pub const CACHE_INVALIDATIONS_TOTAL: &str = "rezerva_cache_invalidations_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
