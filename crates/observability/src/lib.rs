//! Process-wide observability setup shared by the api binary and tests.

/// Install the tracing subscriber. Calling it again is a no-op, so tests and
/// the binary can both call it unconditionally.
pub fn init() {
    tracing::init();
}

pub mod tracing;
