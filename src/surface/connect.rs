//! Connect screen host: application id, engine initialization, login

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{engine_view, Navigation, Navigator, Surface, SurfaceError, SurfaceLink};
use crate::router::connect::{ConnectEffect, ConnectPhase, ConnectReducer, ConnectState};
use crate::router::step;
use crate::sdk::{EngineConnector, SessionEvent, UserType};
use crate::session::SessionContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    AppIdInput,
    /// Non-cancelable
    Connecting,
    LoginChooser,
    /// Non-cancelable, titled with the user id
    Authenticating(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectView {
    pub dialog: Option<Dialog>,
    /// Terminal error replacing the screen content
    pub error: Option<String>,
    pub notices: Vec<String>,
}

pub struct ConnectScreen {
    link: SurfaceLink,
    session: SessionContext,
    connector: Arc<dyn EngineConnector>,
    navigator: Navigator,
    state: ConnectState,
    view: ConnectView,
    has_logged_in: bool,
}

impl ConnectScreen {
    pub fn create(
        session: SessionContext,
        connector: Arc<dyn EngineConnector>,
        navigator: Navigator,
    ) -> Self {
        let authenticated = session
            .engine()
            .map(|engine| engine.is_authenticated())
            .unwrap_or(false);

        if authenticated {
            info!("Already authenticated, going straight to contacts");
            navigator.navigate(Navigation::OpenContacts { pickup: None });
            return Self {
                link: SurfaceLink::finished("connect"),
                session,
                connector,
                navigator,
                state: ConnectState {
                    phase: ConnectPhase::LoggedIn,
                },
                view: ConnectView::default(),
                has_logged_in: true,
            };
        }

        Self {
            link: SurfaceLink::attach("connect", session.bus()),
            session,
            connector,
            navigator,
            state: ConnectState::default(),
            view: ConnectView {
                dialog: Some(Dialog::AppIdInput),
                ..ConnectView::default()
            },
            has_logged_in: false,
        }
    }

    pub fn view(&self) -> &ConnectView {
        &self.view
    }

    pub fn phase(&self) -> ConnectPhase {
        self.state.phase
    }

    pub fn submit_app_id(&mut self, app_id: &str) -> Result<(), SurfaceError> {
        self.link.ensure_alive()?;
        if app_id.is_empty() || app_id.contains(' ') {
            debug!("Rejected application id {:?}", app_id);
            return Err(SurfaceError::InvalidAppId(app_id.to_string()));
        }

        self.view.dialog = Some(Dialog::Connecting);
        self.state.phase = ConnectPhase::Connecting;
        info!("Connecting with application id {}", app_id);
        let engine = self
            .connector
            .initialize(app_id, self.session.bus().clone());
        self.session.attach_engine(engine);
        Ok(())
    }

    pub fn choose_user(&mut self, user_id: &str) -> Result<(), SurfaceError> {
        self.link.ensure_alive()?;
        self.view.dialog = None;

        let engine = match self.session.engine() {
            Ok(engine) => engine,
            Err(e) => {
                error!("Cannot authenticate {}: {}", user_id, e);
                self.view.error = Some("Connection lost".to_string());
                self.state.phase = ConnectPhase::Failed;
                return Ok(());
            }
        };

        self.view.dialog = Some(Dialog::Authenticating(user_id.to_string()));
        self.state.phase = ConnectPhase::Authenticating;
        // Ids outside the account list log in as guests
        let user_type = match self.session.accounts().display_name(user_id) {
            Some(_) => UserType::Internal,
            None => UserType::External,
        };
        self.session.set_current_user(user_id);
        engine.authenticate(user_id, user_type);
        Ok(())
    }

    /// Leaves the screen; an engine that never saw a login is disconnected
    pub fn destroy(&mut self) {
        if !self.has_logged_in && self.session.is_ready() {
            warn!("Leaving without login, disconnecting");
            self.session.disconnect();
        }
        self.link.finish();
    }

    fn handle(&mut self, event: &SessionEvent) {
        let view = engine_view(&self.session);
        let transition = step::<ConnectReducer>(&self.state, event, &view);
        self.state = transition.state;

        for effect in transition.effects {
            if !self.link.is_alive() {
                debug!("Connect screen gone, dropping {:?}", effect);
                break;
            }
            match effect {
                ConnectEffect::DismissDialog => self.view.dialog = None,
                ConnectEffect::ShowLoginChooser => self.view.dialog = Some(Dialog::LoginChooser),
                ConnectEffect::ShowError(description) => {
                    error!("Connect: {}", description);
                    self.view.error = Some(description);
                }
                ConnectEffect::ShowNotice(description) => {
                    warn!("Connect: {}", description);
                    self.view.notices.push(description);
                }
                ConnectEffect::EnterContacts => {
                    self.has_logged_in = true;
                    self.navigator
                        .navigate(Navigation::OpenContacts { pickup: None });
                    self.link.finish();
                }
            }
        }
    }
}

impl Surface for ConnectScreen {
    fn name(&self) -> &'static str {
        self.link.name()
    }

    fn is_alive(&self) -> bool {
        self.link.is_alive()
    }

    fn process_pending(&mut self) -> usize {
        let events = self.link.pending();
        for event in &events {
            if !self.link.is_alive() {
                break;
            }
            self.handle(event);
        }
        events.len()
    }
}
