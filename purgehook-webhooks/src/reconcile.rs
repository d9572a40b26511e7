//! Convergence of remote registrations to the desired event set
//!
//! Each pass walks its events one at a time, awaiting every registry call
//! before the next, and persists the id mapping once at the end. Passes
//! never overlap: `initialize`, `deinitialize` and `remove` share one lock.

use crate::{
    EventDispatcher, EventHandler, JsonFileStore, RemoteRegistry, WebhookDescriptor, WebhookError,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Ordered, duplicate-free set of event names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredEventSet {
    events: Vec<String>,
}

impl DesiredEventSet {
    pub fn new<I, S>(events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for event in events {
            let event = event.into();
            if !set.contains(&event) {
                set.events.push(event);
            }
        }
        set
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events.iter().any(|e| e == event)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Inputs shared by every registration of a pass
#[derive(Debug, Clone)]
pub struct RegistrationTemplate {
    /// Shared signing secret
    pub secret: String,
    /// Target URL with an `{event}` placeholder
    pub target_url_template: String,
    /// Remote webhook name prefix
    pub name_prefix: String,
}

impl RegistrationTemplate {
    pub fn descriptor(&self, event: &str) -> WebhookDescriptor {
        WebhookDescriptor::for_event(
            event,
            &self.target_url_template,
            &self.secret,
            &self.name_prefix,
        )
    }
}

/// Tally of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub success_count: usize,
    pub failed_events: Vec<String>,
}

impl ReconcileReport {
    pub fn is_complete(&self) -> bool {
        self.failed_events.is_empty()
    }
}

/// Drives remote registrations and in-process bindings
pub struct ReconciliationEngine {
    registry: Arc<dyn RemoteRegistry>,
    store: JsonFileStore,
    dispatcher: EventDispatcher,
    handler: Arc<dyn EventHandler>,
    pass_lock: Mutex<()>,
}

impl ReconciliationEngine {
    /// `handler` is bound to every desired event on `dispatcher`
    pub fn new(
        registry: Arc<dyn RemoteRegistry>,
        store: JsonFileStore,
        dispatcher: EventDispatcher,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            registry,
            store,
            dispatcher,
            handler,
            pass_lock: Mutex::new(()),
        }
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Create or update a registration for every desired event.
    ///
    /// Untracked events are created, tracked ones are updated
    /// unconditionally. The handler is bound whatever the registry outcome,
    /// so events registered by an earlier run stay dispatchable. Registry
    /// failures are reported, not raised; only a failed save is an error.
    pub async fn initialize(
        &self,
        desired: &DesiredEventSet,
        template: &RegistrationTemplate,
    ) -> crate::Result<ReconcileReport> {
        let _pass = self.pass_lock.lock().await;
        let mut ids = self.store.load().await;
        let mut report = ReconcileReport::default();

        for (event, remote_id) in ids.iter().filter(|(e, _)| !desired.contains(e)) {
            warn!(
                event = %event,
                remote_id = %remote_id,
                "Tracked event is no longer desired; it is removed on teardown"
            );
        }

        for event in desired.iter() {
            let descriptor = template.descriptor(event);
            let result = match ids.get(event).cloned() {
                None => self.registry.create(&descriptor).await,
                Some(remote_id) => self.registry.update(&remote_id, &descriptor).await,
            };

            match result {
                Ok(remote_id) => {
                    info!(event, remote_id = %remote_id, "Webhook registered");
                    ids.insert(event.to_string(), remote_id);
                    report.success_count += 1;
                }
                Err(e) => {
                    error!(event, error = %e, "Failed to register webhook");
                    report.failed_events.push(event.to_string());
                }
            }

            self.dispatcher.bind(event, self.handler.clone());
        }

        self.store.save(&ids).await?;
        info!(
            succeeded = report.success_count,
            failed = report.failed_events.len(),
            "Webhook initialization finished"
        );
        Ok(report)
    }

    /// Delete every tracked registration.
    ///
    /// Walks the persisted mapping rather than the desired set, so events
    /// dropped from configuration are cleaned up too. A failed delete keeps
    /// its record for a later pass and does not stop the others.
    pub async fn deinitialize(&self) -> crate::Result<ReconcileReport> {
        let _pass = self.pass_lock.lock().await;
        let mut ids = self.store.load().await;
        let mut report = ReconcileReport::default();

        let tracked: Vec<(String, String)> =
            ids.iter().map(|(e, id)| (e.clone(), id.clone())).collect();
        for (event, remote_id) in tracked {
            match self.registry.delete(&remote_id).await {
                Ok(()) => {
                    info!(event = %event, remote_id = %remote_id, "Webhook deleted");
                    ids.remove(&event);
                    self.dispatcher.unbind(&event);
                    report.success_count += 1;
                }
                Err(e) => {
                    error!(
                        event = %event,
                        remote_id = %remote_id,
                        error = %e,
                        "Failed to delete webhook"
                    );
                    report.failed_events.push(event);
                }
            }
        }

        self.store.save(&ids).await?;
        info!(
            succeeded = report.success_count,
            failed = report.failed_events.len(),
            "Webhook teardown finished"
        );
        Ok(report)
    }

    /// Delete the registration of a single tracked event.
    pub async fn remove(&self, event: &str) -> crate::Result<()> {
        let _pass = self.pass_lock.lock().await;
        let mut ids = self.store.load().await;

        let remote_id = ids
            .get(event)
            .cloned()
            .ok_or_else(|| WebhookError::NotTracked(event.to_string()))?;
        self.registry.delete(&remote_id).await?;

        ids.remove(event);
        self.dispatcher.unbind(event);
        self.store.save(&ids).await?;

        info!(event, remote_id = %remote_id, "Webhook removed");
        Ok(())
    }
}
