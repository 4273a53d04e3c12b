use chrono::{DateTime, Utc};

/// Contract every domain event implements.
///
/// An event records something that already happened in the workflow (an order
/// was submitted, a shipment cleared customs), so implementations are plain
/// data: cloneable, immutable once constructed, and safe to replay in order.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted identifier, e.g. `"shipping.shipment.cleared"`.
    /// Renaming one is a schema change.
    fn event_type(&self) -> &'static str;

    /// Schema version of the serialized payload.
    fn version(&self) -> u32;

    /// Business time: when the fact occurred, not when it was stored.
    fn occurred_at(&self) -> DateTime<Utc>;
}
