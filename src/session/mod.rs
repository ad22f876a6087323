//! Session context shared by every surface
//!
//! Owned by the application shell and injected into each surface. It replaces
//! the process-wide "current engine" accessor: an engine that has not been
//! initialized yet is reported as [`SessionError::NotReady`] instead of a null
//! check scattered across screens. The authenticated user id travels here too.

pub mod accounts;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::sdk::{CallEngine, CallHandle, CallId, EventBus};

pub use accounts::DemoAccounts;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Calling engine is not initialized")]
    NotReady,

    #[error("Call {0} does not exist")]
    CallNotFound(CallId),

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("No user has been authenticated")]
    NoUser,
}

#[derive(Default)]
struct SessionInner {
    engine: Option<Arc<dyn CallEngine>>,
    current_user: Option<String>,
}

#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<RwLock<SessionInner>>,
    bus: EventBus,
    accounts: Arc<DemoAccounts>,
}

impl SessionContext {
    pub fn new(bus: EventBus, accounts: DemoAccounts) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionInner::default())),
            bus,
            accounts: Arc::new(accounts),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn accounts(&self) -> &DemoAccounts {
        &self.accounts
    }

    pub fn engine(&self) -> Result<Arc<dyn CallEngine>, SessionError> {
        self.read().engine.clone().ok_or(SessionError::NotReady)
    }

    pub fn is_ready(&self) -> bool {
        self.read().engine.is_some()
    }

    pub fn attach_engine(&self, engine: Arc<dyn CallEngine>) {
        info!("Calling engine attached to session");
        self.write().engine = Some(engine);
    }

    /// Disconnects and forgets the engine, together with the user
    pub fn disconnect(&self) {
        let engine = {
            let mut inner = self.write();
            inner.current_user = None;
            inner.engine.take()
        };
        if let Some(engine) = engine {
            info!("Disconnecting calling engine");
            engine.disconnect();
        } else {
            debug!("Disconnect requested without an engine");
        }
    }

    pub fn current_user(&self) -> Result<String, SessionError> {
        self.read().current_user.clone().ok_or(SessionError::NoUser)
    }

    pub fn set_current_user(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        debug!("Current user set to {}", user_id);
        self.write().current_user = Some(user_id);
    }

    pub fn call(&self, id: CallId) -> Result<Arc<dyn CallHandle>, SessionError> {
        self.engine()?
            .get_call(id)
            .ok_or(SessionError::CallNotFound(id))
    }
}
