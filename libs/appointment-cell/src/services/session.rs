use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use shared_models::time::TimeOfDay;

use crate::models::{AvailabilityMap, StoreError};
use crate::services::availability::{compute_availability, SlotScope};
use crate::services::store::AppointmentStore;

/// Stamp of one refresh; only the latest one may publish results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AttemptToken(u64);

#[derive(Debug, Clone)]
struct SessionView {
    scope: SlotScope,
    slots: Vec<TimeOfDay>,
    availability: Option<AvailabilityMap>,
}

/// Cached availability for the doctor and date currently being booked.
pub struct AvailabilitySession {
    store: Arc<dyn AppointmentStore>,
    generation: AtomicU64,
    view: RwLock<Option<SessionView>>,
}

impl AvailabilitySession {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self {
            store,
            generation: AtomicU64::new(0),
            view: RwLock::new(None),
        }
    }

    /// Starts a new attempt, making every earlier token stale.
    pub fn begin(&self) -> AttemptToken {
        AttemptToken(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: AttemptToken) -> bool {
        self.generation.load(Ordering::SeqCst) == token.0
    }

    /// Switches to another doctor or date and loads its availability.
    pub async fn select(
        &self,
        scope: SlotScope,
        slots: Vec<TimeOfDay>,
    ) -> Result<Option<AvailabilityMap>, StoreError> {
        self.begin();
        *self.view.write().await = Some(SessionView {
            scope,
            slots,
            availability: None,
        });
        self.refresh().await
    }

    /// Refetches appointments for the current scope. Returns `None` when nothing
    /// is selected or a newer refresh superseded this one.
    pub async fn refresh(&self) -> Result<Option<AvailabilityMap>, StoreError> {
        let Some(view) = self.view.read().await.clone() else {
            return Ok(None);
        };

        let token = self.begin();
        let appointments = self.store.list_appointments(&view.scope.filter()).await?;
        let availability = compute_availability(&view.scope, view.slots.iter().copied(), &appointments);

        if self.apply(token, &view.scope, availability.clone()).await {
            Ok(Some(availability))
        } else {
            Ok(None)
        }
    }

    /// Publishes `availability` if `token` is still current and the scope unchanged.
    pub async fn apply(&self, token: AttemptToken, scope: &SlotScope, availability: AvailabilityMap) -> bool {
        let mut guard = self.view.write().await;
        match guard.as_mut() {
            Some(view) if self.is_current(token) && view.scope == *scope => {
                view.availability = Some(availability);
                true
            }
            _ => {
                debug!("Discarding stale availability for {:?}", token);
                false
            }
        }
    }

    pub async fn snapshot(&self) -> Option<AvailabilityMap> {
        self.view.read().await.as_ref().and_then(|view| view.availability.clone())
    }

    pub async fn scope(&self) -> Option<SlotScope> {
        self.view.read().await.as_ref().map(|view| view.scope.clone())
    }

    /// Drops cached availability; the next `refresh` refetches.
    pub async fn invalidate(&self) {
        self.begin();
        if let Some(view) = self.view.write().await.as_mut() {
            view.availability = None;
        }
    }

    pub async fn clear(&self) {
        self.begin();
        *self.view.write().await = None;
    }
}
