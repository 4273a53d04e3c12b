use plasticflow_core::TenantId;

use crate::envelope::EventEnvelope;

/// Anything that carries a tenant id.
///
/// Workers and projections use this to filter messages to a single tenant
/// without knowing the concrete message type.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}

impl<E> TenantScoped for EventEnvelope<E> {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id()
    }
}
