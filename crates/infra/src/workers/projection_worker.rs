//! Background thread that drains the event bus into projections.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use plasticflow_core::TenantId;
use plasticflow_events::{EventBus, TenantScoped};

const SHUTDOWN_POLL: Duration = Duration::from_millis(250);

/// Handle to a running worker. Dropping it signals the thread to stop;
/// [`WorkerHandle::shutdown`] additionally waits for it to finish.
#[derive(Debug)]
pub struct WorkerHandle {
    stop: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn shutdown(mut self) {
        let _ = self.stop.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.stop.send(());
    }
}

/// Subscribe-and-apply loop for keeping read models current.
///
/// The handler must be idempotent: the bus is at-least-once, and a projection
/// that falls behind gets rebuilt from the store rather than replayed from
/// the transport. Handler errors are logged and the loop moves on.
#[derive(Debug)]
pub struct ProjectionWorker;

impl ProjectionWorker {
    /// Spawn a named worker thread consuming `bus`.
    ///
    /// With `tenant_id` set, messages belonging to other tenants are skipped
    /// before the handler sees them.
    pub fn spawn<M, B, H, E>(
        name: &'static str,
        bus: B,
        tenant_id: Option<TenantId>,
        mut handler: H,
    ) -> WorkerHandle
    where
        M: TenantScoped + Send + 'static,
        B: EventBus<M> + Send + Sync + 'static,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let subscription = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(worker = name, "projection worker started");

                loop {
                    if stop_rx.try_recv().is_ok() {
                        break;
                    }

                    let message = match subscription.recv_timeout(SHUTDOWN_POLL) {
                        Ok(message) => message,
                        Err(mpsc::RecvTimeoutError::Timeout) => continue,
                        Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    };

                    if tenant_id.is_some_and(|t| message.tenant_id() != t) {
                        continue;
                    }

                    if let Err(err) = handler(message) {
                        warn!(worker = name, error = ?err, "projection handler failed");
                    }
                }

                debug!(worker = name, "projection worker stopped");
            })
            .expect("failed to spawn projection worker thread");

        WorkerHandle {
            stop: stop_tx,
            join: Some(join),
        }
    }
}
