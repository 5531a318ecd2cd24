//! Streaming query lifecycle logging.
//!
//! A query moves through `Started → {Progress, Idle}* → Terminated`. The
//! engine driving the query calls a [`StreamingQueryListener`] at each of
//! those points; [`StreamingTriggerListener`] turns every call into exactly
//! one log line.

use crate::logging::EventLogger;
use std::sync::{Arc, RwLock};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Identifies the query an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEvent {
    /// Stable query identifier
    pub id: String,
    /// Optional user-facing query name
    pub name: Option<String>,
}

impl QueryEvent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Callbacks for the lifecycle of a streaming query.
pub trait StreamingQueryListener: Send + Sync {
    /// The query has started.
    fn on_query_started(&self, event: &QueryEvent);

    /// A trigger ran and made progress.
    fn on_query_progress(&self, event: &QueryEvent);

    /// A trigger ran with no new data.
    fn on_query_idle(&self, event: &QueryEvent);

    /// The query has stopped. No further events follow.
    fn on_query_terminated(&self, event: &QueryEvent);
}

/// A lifecycle point together with its event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started(QueryEvent),
    Progress(QueryEvent),
    Idle(QueryEvent),
    Terminated(QueryEvent),
}

impl LifecycleEvent {
    /// The event payload.
    pub fn query(&self) -> &QueryEvent {
        match self {
            LifecycleEvent::Started(event)
            | LifecycleEvent::Progress(event)
            | LifecycleEvent::Idle(event)
            | LifecycleEvent::Terminated(event) => event,
        }
    }

    /// Invokes the matching hook on `listener`.
    pub fn dispatch(&self, listener: &dyn StreamingQueryListener) {
        match self {
            LifecycleEvent::Started(event) => listener.on_query_started(event),
            LifecycleEvent::Progress(event) => listener.on_query_progress(event),
            LifecycleEvent::Idle(event) => listener.on_query_idle(event),
            LifecycleEvent::Terminated(event) => listener.on_query_terminated(event),
        }
    }
}

/// Logs one line per lifecycle event.
///
/// # Examples
///
/// ```rust
/// use schemon_client::listener::{QueryEvent, StreamingQueryListener, StreamingTriggerListener};
/// use schemon_client::logging::TracingLogger;
/// use std::sync::Arc;
///
/// let listener = StreamingTriggerListener::new(Arc::new(TracingLogger))
///     .with_stage("bronze")
///     .with_entity_name("orders");
/// listener.on_query_started(&QueryEvent::new("3f2a"));
/// ```
pub struct StreamingTriggerListener {
    logger: Arc<dyn EventLogger>,
    stage: Option<String>,
    entity_name: Option<String>,
}

impl StreamingTriggerListener {
    pub fn new(logger: Arc<dyn EventLogger>) -> Self {
        Self {
            logger,
            stage: None,
            entity_name: None,
        }
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_entity_name(mut self, entity_name: impl Into<String>) -> Self {
        self.entity_name = Some(entity_name.into());
        self
    }

    fn emit(&self, message: &str) {
        self.logger
            .info(message, self.stage.as_deref(), self.entity_name.as_deref());
    }
}

fn now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

impl StreamingQueryListener for StreamingTriggerListener {
    fn on_query_started(&self, event: &QueryEvent) {
        self.emit(&format!("Query started: {}", event.id));
    }

    fn on_query_progress(&self, event: &QueryEvent) {
        self.emit(&format!(
            "Query running: {} | Trigger executed at {}",
            event.id,
            now()
        ));
    }

    fn on_query_idle(&self, event: &QueryEvent) {
        self.emit(&format!(
            "Query running: {} | Trigger is idle at {}",
            event.id,
            now()
        ));
    }

    fn on_query_terminated(&self, event: &QueryEvent) {
        self.emit(&format!("Query terminated: {}", event.id));
    }
}

/// Fans lifecycle events out to registered listeners in registration order.
#[derive(Default)]
pub struct ListenerBus {
    listeners: RwLock<Vec<Arc<dyn StreamingQueryListener>>>,
}

impl ListenerBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn StreamingQueryListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    /// Removes every registration of `listener`, compared by identity.
    pub fn remove_listener(&self, listener: &Arc<dyn StreamingQueryListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `event` to every listener.
    pub fn post(&self, event: &LifecycleEvent) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for listener in listeners {
            event.dispatch(listener.as_ref());
        }
    }
}
