pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Header the trace carrier persisted on a row is re-injected as on the
/// outbound call. The core never parses its contents; it is copied byte
/// for byte.
pub const TRACE_CARRIER_HEADER: &str = "traceparent";

/// Header read from an inbound enqueue request to capture upstream trace
/// context, if present.
pub const INBOUND_TRACE_HEADER: &str = "traceparent";

pub const ALLOWED_METHODS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "CONNECT", "TRACE",
];
