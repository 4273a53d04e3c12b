use plasticflow_core::TenantId;

/// Per-request tenant scope, injected by the tenant middleware and read by
/// every domain handler. Requests without one never reach those handlers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
