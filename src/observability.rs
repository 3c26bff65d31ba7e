use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings committed through the atomic create path.
pub const BOOKINGS_CREATED_TOTAL: &str = "slotbook_bookings_created_total";

/// Counter: create attempts that lost a slot to another booking.
pub const SLOT_CONFLICTS_TOTAL: &str = "slotbook_slot_conflicts_total";

/// Counter: bookings cancelled (direct or hours-change induced).
pub const BOOKINGS_CANCELLED_TOTAL: &str = "slotbook_bookings_cancelled_total";

/// Counter: bookings truncated by an hours change.
pub const BOOKINGS_TRUNCATED_TOTAL: &str = "slotbook_bookings_truncated_total";

/// Counter: hours-change analyses run.
pub const HOURS_CHANGES_ANALYZED_TOTAL: &str = "slotbook_hours_changes_analyzed_total";

/// Histogram: booking-creation latency in seconds, store round-trip included.
pub const BOOKING_CREATE_DURATION_SECONDS: &str = "slotbook_booking_create_duration_seconds";

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
