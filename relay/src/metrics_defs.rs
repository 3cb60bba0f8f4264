//! Metrics definitions for the relay.

use shared::metrics_defs::{MetricDef, MetricType};

pub const NOTIFICATIONS_INGESTED: MetricDef = MetricDef {
    name: "notifications.ingested",
    metric_type: MetricType::Counter,
    description: "Number of notifications accepted by the ingest endpoint",
};

pub const NOTIFICATIONS_DELIVERED: MetricDef = MetricDef {
    name: "notifications.delivered",
    metric_type: MetricType::Counter,
    description: "Number of notifications handed out by fetches. \
                  A broadcast counts once per reader.",
};

pub const NOTIFICATIONS_EVICTED: MetricDef = MetricDef {
    name: "notifications.evicted",
    metric_type: MetricType::Counter,
    description: "Notifications dropped before delivery. Tagged with reason (capacity, expired).",
};

pub const NOTIFICATIONS_PENDING: MetricDef = MetricDef {
    name: "notifications.pending",
    metric_type: MetricType::Gauge,
    description: "Number of notifications currently retained in the buffer",
};

pub const REQUESTS_REJECTED: MetricDef = MetricDef {
    name: "requests.rejected",
    metric_type: MetricType::Counter,
    description: "Requests answered with an error. Tagged with reason.",
};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Relay request duration in seconds. Tagged with endpoint and status.",
};

// Described with the recorder at startup; a metric missing here is still
// emitted, just undocumented.
pub const ALL_METRICS: &[MetricDef] = &[
    NOTIFICATIONS_INGESTED,
    NOTIFICATIONS_DELIVERED,
    NOTIFICATIONS_EVICTED,
    NOTIFICATIONS_PENDING,
    REQUESTS_REJECTED,
    REQUEST_DURATION,
];
