use tracing::{Span, field};

use super::TraceId;

/// Root span for one subscription / job.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id,
        instrument = field::Empty,
        interval = field::Empty
    )
}

/// Child span; inherits the trace id from the current root.
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!("child", name = %name)
}
