use std::sync::Arc;

use shared::{
    domain::{FieldKey, Generation, OptionValue},
    error::FetchError,
};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};
use url::Url;

pub mod definition;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod form;
pub mod paths;

pub use definition::{ActivationRule, CascadeDefinition, Dependency, Endpoint, QueryParam};
pub use engine::{CascadeEngine, ChangeOutcome, FetchPlan, Resolution};
pub use error::{BindError, DefinitionError, EngineError};
pub use fetcher::{HttpOptionsFetcher, OptionsFetcher};
pub use form::{Field, FieldState};
pub use paths::PageContext;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Published while the engine lock is held, so subscribers observe events in
/// the order the engine applied them.
#[derive(Debug, Clone)]
pub enum CascadeEvent {
    FieldsCleared {
        source: FieldKey,
        fields: Vec<FieldKey>,
    },
    FetchStarted {
        field: FieldKey,
        generation: Generation,
        url: Url,
    },
    FieldPopulated {
        field: FieldKey,
        option_count: usize,
        value: OptionValue,
    },
    FetchFailed {
        field: FieldKey,
        error: FetchError,
    },
    StaleResponseDiscarded {
        field: FieldKey,
        generation: Generation,
        latest: Generation,
    },
}

/// Keeps dependent fields of one form page consistent with their upstream
/// selections. All field state sits behind one lock; every fetch runs in its
/// own task and applies its result through the engine.
pub struct CascadeController {
    fetcher: Arc<dyn OptionsFetcher>,
    inner: Mutex<CascadeEngine>,
    events: broadcast::Sender<CascadeEvent>,
    inflight: watch::Sender<usize>,
}

impl CascadeController {
    pub fn bind(
        definition: CascadeDefinition,
        page: PageContext,
        fields: Vec<Field>,
        fetcher: Arc<dyn OptionsFetcher>,
    ) -> Result<Arc<Self>, BindError> {
        let engine = CascadeEngine::bind(definition, &page, fields)?;
        info!(
            cascade = engine.cascade().name(),
            path = %page.path,
            fields = engine.cascade().fields().len(),
            "cascade: bound"
        );
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (inflight, _) = watch::channel(0);
        Ok(Arc::new(Self {
            fetcher,
            inner: Mutex::new(engine),
            events,
            inflight,
        }))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CascadeEvent> {
        self.events.subscribe()
    }

    /// Dispatches a change for every field that has dependents.
    pub async fn initial_sync(self: &Arc<Self>) {
        let mut engine = self.inner.lock().await;
        for outcome in engine.initial_sync() {
            self.dispatch(outcome);
        }
    }

    /// A user selected `value` in `field`.
    pub async fn change(
        self: &Arc<Self>,
        field: &FieldKey,
        value: impl Into<String>,
    ) -> Result<(), EngineError> {
        let mut engine = self.inner.lock().await;
        let outcome = engine.set_value(field, OptionValue(value.into()))?;
        self.dispatch(outcome);
        Ok(())
    }

    /// Re-runs the cascade below `field` with its current value.
    pub async fn notify_change(self: &Arc<Self>, field: &FieldKey) -> Result<(), EngineError> {
        let mut engine = self.inner.lock().await;
        let outcome = engine.notify_change(field)?;
        self.dispatch(outcome);
        Ok(())
    }

    pub async fn field(&self, key: &FieldKey) -> Option<Field> {
        self.inner.lock().await.field(key).cloned()
    }

    /// All fields in chain order.
    pub async fn snapshot(&self) -> Vec<Field> {
        self.inner.lock().await.fields().cloned().collect()
    }

    /// Resolves once no fetch is in flight, including fetches started by
    /// synthetic changes after a repopulation.
    pub async fn settled(&self) {
        let mut rx = self.inflight.subscribe();
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    /// Must be called with the engine lock held.
    fn dispatch(self: &Arc<Self>, outcome: ChangeOutcome) {
        if let Some(source) = outcome.source {
            if !outcome.cleared.is_empty() {
                debug!(source = %source, cleared = ?outcome.cleared, "cascade: cleared downstream");
                let _ = self.events.send(CascadeEvent::FieldsCleared {
                    source,
                    fields: outcome.cleared,
                });
            }
        }

        if outcome.fetches.is_empty() {
            return;
        }
        self.inflight
            .send_modify(|count| *count += outcome.fetches.len());

        for plan in outcome.fetches {
            info!(
                field = %plan.field,
                generation = plan.generation.0,
                url = %plan.url,
                "cascade: fetching options"
            );
            let _ = self.events.send(CascadeEvent::FetchStarted {
                field: plan.field.clone(),
                generation: plan.generation,
                url: plan.url.clone(),
            });

            let controller = Arc::clone(self);
            let guard = InflightGuard(Arc::clone(self));
            tokio::spawn(async move {
                let _guard = guard;
                let result = controller.fetcher.fetch_options(&plan.url).await;
                let mut engine = controller.inner.lock().await;
                let resolution = engine.resolve(&plan, result);
                let value = engine
                    .field(&plan.field)
                    .map(|field| field.value.clone())
                    .unwrap_or_else(OptionValue::blank);
                controller.report(resolution, value);
            });
        }
    }

    fn report(self: &Arc<Self>, resolution: Resolution, value: OptionValue) {
        match resolution {
            Resolution::Applied {
                field,
                option_count,
                restored,
                follow_up,
            } => {
                info!(
                    field = %field,
                    option_count,
                    restored,
                    "cascade: options populated"
                );
                let _ = self.events.send(CascadeEvent::FieldPopulated {
                    field,
                    option_count,
                    value,
                });
                self.dispatch(follow_up);
            }
            Resolution::Failed { field, error } => {
                warn!(field = %field, error = %error, "cascade: option fetch failed");
                let _ = self.events.send(CascadeEvent::FetchFailed { field, error });
            }
            Resolution::Stale {
                field,
                generation,
                latest,
            } => {
                debug!(
                    field = %field,
                    generation = generation.0,
                    latest = latest.0,
                    "cascade: discarded stale response"
                );
                let _ = self.events.send(CascadeEvent::StaleResponseDiscarded {
                    field,
                    generation,
                    latest,
                });
            }
        }
    }
}

/// Releases one in-flight slot when the fetch task ends, even if the fetcher
/// panicked or the task was dropped unpolled.
struct InflightGuard(Arc<CascadeController>);

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0
            .inflight
            .send_modify(|count| *count = count.saturating_sub(1));
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
