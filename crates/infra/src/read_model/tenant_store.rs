use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use plasticflow_core::TenantId;

/// Tenant-isolated key/value store for disposable read models.
///
/// Read models are derived state: everything in a `TenantStore` can be
/// rebuilt by replaying the event store, so implementations need no
/// durability guarantees of their own.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V);
    fn remove(&self, tenant_id: TenantId, key: &K);
    fn list(&self, tenant_id: TenantId) -> Vec<V>;
    /// Drop every record for a tenant (rebuild support).
    fn clear_tenant(&self, tenant_id: TenantId);
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn remove(&self, tenant_id: TenantId, key: &K) {
        (**self).remove(tenant_id, key)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        (**self).clear_tenant(tenant_id)
    }
}

/// In-memory tenant-isolated store.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<HashMap<(TenantId, K), V>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // Read-model records are derived state, so a poisoned lock degrades to
    // empty reads and dropped writes rather than a panic; a rebuild restores
    // the records.

    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(tenant_id, key.clone())).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((tenant_id, key), value);
        }
    }

    fn remove(&self, tenant_id: TenantId, key: &K) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&(tenant_id, key.clone()));
        }
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };
        map.iter()
            .filter_map(|((t, _), v)| (*t == tenant_id).then(|| v.clone()))
            .collect()
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(t, _), _| *t != tenant_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_scoped_per_tenant() {
        let store: InMemoryTenantStore<&str, u32> = InMemoryTenantStore::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();

        store.upsert(tenant_a, "row", 1);
        store.upsert(tenant_b, "row", 2);

        assert_eq!(store.get(tenant_a, &"row"), Some(1));
        assert_eq!(store.get(tenant_b, &"row"), Some(2));

        store.clear_tenant(tenant_a);
        assert_eq!(store.get(tenant_a, &"row"), None);
        assert_eq!(store.get(tenant_b, &"row"), Some(2));
    }

    #[test]
    fn poisoned_lock_degrades_to_empty_reads_without_panicking() {
        let store: Arc<InMemoryTenantStore<&str, u32>> = Arc::new(InMemoryTenantStore::new());
        let tenant = TenantId::new();
        store.upsert(tenant, "row", 1);

        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.write().unwrap();
            panic!("poison the read model lock");
        })
        .join();

        assert_eq!(store.get(tenant, &"row"), None);
        assert!(store.list(tenant).is_empty());
        store.upsert(tenant, "row", 2);
        store.clear_tenant(tenant);
    }

    #[test]
    fn remove_drops_a_single_record() {
        let store: InMemoryTenantStore<&str, u32> = InMemoryTenantStore::new();
        let tenant = TenantId::new();

        store.upsert(tenant, "a", 1);
        store.upsert(tenant, "b", 2);
        store.remove(tenant, &"a");

        assert_eq!(store.get(tenant, &"a"), None);
        assert_eq!(store.list(tenant), vec![2]);
    }
}
