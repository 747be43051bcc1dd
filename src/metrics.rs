use metrics::{Unit, counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::Lazy;
use std::time::Duration;

pub const PROX_EXCHANGES_TOTAL: &str = "prox_exchanges_total";
pub const PROX_STREAMED_BYTES_TOTAL: &str = "prox_streamed_bytes_total";
pub const PROX_BACKEND_RESPONSE_SECONDS: &str = "prox_backend_response_seconds";

static DESCRIPTIONS: Lazy<()> = Lazy::new(|| {
    describe_counter!(
        PROX_EXCHANGES_TOTAL,
        Unit::Count,
        "Proxied exchanges by terminal outcome."
    );
    describe_counter!(
        PROX_STREAMED_BYTES_TOTAL,
        Unit::Bytes,
        "Response body bytes streamed from backends to callers."
    );
    describe_histogram!(
        PROX_BACKEND_RESPONSE_SECONDS,
        Unit::Seconds,
        "Time until the backend's response head arrived."
    );
});

/// Terminal outcome of one proxied exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    InvalidRequest,
    Unreachable,
    Rejected,
    Truncated,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::InvalidRequest => "invalid_request",
            Outcome::Unreachable => "unreachable",
            Outcome::Rejected => "rejected",
            Outcome::Truncated => "truncated",
        }
    }
}

pub fn record_exchange(target: &str, outcome: Outcome) {
    Lazy::force(&DESCRIPTIONS);
    counter!(
        PROX_EXCHANGES_TOTAL,
        "target" => target.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_streamed_bytes(target: &str, bytes: u64) {
    Lazy::force(&DESCRIPTIONS);
    counter!(PROX_STREAMED_BYTES_TOTAL, "target" => target.to_string()).increment(bytes);
}

pub fn record_backend_response(target: &str, status: u16, elapsed: Duration) {
    Lazy::force(&DESCRIPTIONS);
    histogram!(
        PROX_BACKEND_RESPONSE_SECONDS,
        "target" => target.to_string(),
        "status" => status.to_string()
    )
    .record(elapsed.as_secs_f64());
}
