//! Engine event routing
//!
//! Engines publish named notifications addressed by session identity. Each
//! identity has at most one subscriber (its recorder), registered through
//! [`EventBus::subscribe`]. The returned [`Subscription`] removes the route
//! when cancelled or dropped; events for an identity with no route are
//! dropped.

use crate::session::{IdentityAllocator, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::{debug, trace, warn};

/// Well-known event names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The engine finished recording on its own (e.g. a duration limit)
    Ended,
    /// Progress or metering information
    Info,
    /// The engine hit an unrecoverable problem for this session
    Error,
    /// Anything else, passed through verbatim
    Other,
}

impl EventKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "ended" => Self::Ended,
            "info" => Self::Info,
            "error" => Self::Error,
            _ => Self::Other,
        }
    }
}

/// A notification from the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    #[serde(rename = "event")]
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl EngineEvent {
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn ended() -> Self {
        Self::new("ended", serde_json::Value::Null)
    }

    pub fn info(data: serde_json::Value) -> Self {
        Self::new("info", data)
    }

    pub fn error(data: serde_json::Value) -> Self {
        Self::new("error", data)
    }

    pub fn kind(&self) -> EventKind {
        EventKind::from_name(&self.name)
    }
}

type Handler = Arc<dyn Fn(EngineEvent) + Send + Sync>;

struct Route {
    token: u64,
    handler: Handler,
}

type Routes = RwLock<HashMap<SessionId, Route>>;

/// Why a subscription could not be registered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("{0} already has an event subscriber")]
    AlreadySubscribed(SessionId),
}

/// Routes engine events to the subscriber registered for their identity
///
/// The bus also hands out identities, so every recorder routed through one
/// bus gets a distinct one no matter who creates it.
#[derive(Clone, Default)]
pub struct EventBus {
    routes: Arc<Routes>,
    ids: Arc<IdentityAllocator>,
    next_token: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh identity and register `handler` for it
    ///
    /// Identities that were routed by hand through [`subscribe`](Self::subscribe)
    /// are skipped.
    pub fn register<F>(&self, handler: F) -> Subscription
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);

        let id = loop {
            let id = self.ids.allocate();
            if !routes.contains_key(&id) {
                break id;
            }
        };
        self.insert(&mut routes, id, handler)
    }

    /// Register `handler` for events addressed to `id`
    ///
    /// Fails if `id` is already routed. The handler runs on the publisher's
    /// task and must not block.
    pub fn subscribe<F>(&self, id: SessionId, handler: F) -> Result<Subscription, BusError>
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        if routes.contains_key(&id) {
            warn!("Refusing second event subscription for {}", id);
            return Err(BusError::AlreadySubscribed(id));
        }
        Ok(self.insert(&mut routes, id, Arc::new(handler)))
    }

    fn insert(
        &self,
        routes: &mut HashMap<SessionId, Route>,
        id: SessionId,
        handler: Handler,
    ) -> Subscription {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        routes.insert(id, Route { token, handler });
        debug!("Subscribed to engine events for {}", id);

        Subscription {
            id,
            token,
            routes: Arc::downgrade(&self.routes),
        }
    }

    /// Deliver `event` to the subscriber for `id`
    ///
    /// Returns `false` if nobody is subscribed, in which case the event is dropped.
    pub fn publish(&self, id: SessionId, event: EngineEvent) -> bool {
        // Clone the handler out so it can run without holding the routing table
        let handler = self
            .routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|route| Arc::clone(&route.handler));

        match handler {
            Some(handler) => {
                trace!("Routing '{}' event to {}", event.name, id);
                handler(event);
                true
            }
            None => {
                debug!("Dropping '{}' event for unsubscribed {}", event.name, id);
                false
            }
        }
    }

    pub fn is_subscribed(&self, id: SessionId) -> bool {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }
}

/// Cancellable registration returned by [`EventBus::register`] and
/// [`EventBus::subscribe`]
///
/// Dropping the token cancels the subscription.
pub struct Subscription {
    id: SessionId,
    token: u64,
    routes: Weak<Routes>,
}

impl Subscription {
    /// Identity this subscription receives events for
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn cancel(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(routes) = self.routes.upgrade() else {
            return;
        };
        let mut routes = routes.write().unwrap_or_else(PoisonError::into_inner);
        // Only remove the route this token created
        if routes.get(&self.id).is_some_and(|route| route.token == self.token) {
            routes.remove(&self.id);
            debug!("Unsubscribed from engine events for {}", self.id);
        }
    }
}
