//! Session-gated navigation state machine.
//!
//! # Responsibility
//! - Decide which screen group is mounted from session snapshots alone.
//! - Report redirects as values so any view layer can apply them.
//!
//! # Invariants
//! - Nothing is mounted while the session is loading.
//! - The task flow is mounted iff an identity is present.
//! - Only session snapshots change the mounted flow; screen requests can only
//!   move between screens of the already-mounted flow.

use crate::session::SessionSnapshot;
use log::debug;
use std::sync::mpsc::Receiver;

/// Screen group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Auth,
    Tasks,
}

/// Concrete screen inside a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Register,
    TaskList,
}

impl Screen {
    pub fn flow(self) -> Flow {
        match self {
            Self::Login | Self::Register => Flow::Auth,
            Self::TaskList => Flow::Tasks,
        }
    }

    /// Route path as used by the mobile shell.
    pub fn route(self) -> &'static str {
        match self {
            Self::Login => "/(auth)/login",
            Self::Register => "/(auth)/register",
            Self::TaskList => "/(tabs)",
        }
    }
}

/// Gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Session check still running; render nothing.
    Pending,
    Unauthenticated,
    Authenticated,
}

/// Replace-style navigation the view layer must perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect {
    pub from: Option<Screen>,
    pub to: Screen,
}

/// Navigation gate driven by session snapshots.
#[derive(Debug)]
pub struct NavigationGate {
    state: GateState,
    screen: Option<Screen>,
    events: Option<Receiver<SessionSnapshot>>,
}

impl Default for NavigationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Pending,
            screen: None,
            events: None,
        }
    }

    /// Gate that pulls snapshots from a session watch channel on `pump`.
    pub fn watching(initial: &SessionSnapshot, events: Receiver<SessionSnapshot>) -> Self {
        let mut gate = Self::new();
        gate.apply(initial);
        gate.events = Some(events);
        gate
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn current_screen(&self) -> Option<Screen> {
        self.screen
    }

    pub fn mounted_flow(&self) -> Option<Flow> {
        match self.state {
            GateState::Pending => None,
            GateState::Unauthenticated => Some(Flow::Auth),
            GateState::Authenticated => Some(Flow::Tasks),
        }
    }

    /// Transitions on one session snapshot.
    ///
    /// Returns the redirect to perform when the current screen no longer
    /// belongs to the mounted flow.
    pub fn apply(&mut self, snapshot: &SessionSnapshot) -> Option<Redirect> {
        let next = if snapshot.loading {
            GateState::Pending
        } else if snapshot.is_authenticated() {
            GateState::Authenticated
        } else {
            GateState::Unauthenticated
        };
        self.state = next;

        let target = match next {
            GateState::Pending => {
                self.screen = None;
                return None;
            }
            GateState::Unauthenticated => Screen::Login,
            GateState::Authenticated => Screen::TaskList,
        };

        if self.screen.map(Screen::flow) == Some(target.flow()) {
            return None;
        }

        let redirect = Redirect {
            from: self.screen,
            to: target,
        };
        self.screen = Some(target);
        debug!(
            "event=navigation_redirect module=navigation status=ok to={}",
            target.route()
        );
        Some(redirect)
    }

    /// Applies every pending snapshot; returns the redirects in order.
    pub fn pump(&mut self) -> Vec<Redirect> {
        let pending = match &self.events {
            Some(events) => events.try_iter().collect::<Vec<_>>(),
            None => return Vec::new(),
        };
        pending
            .iter()
            .filter_map(|snapshot| self.apply(snapshot))
            .collect()
    }

    /// Moves to the register screen; only valid inside the auth flow.
    pub fn open_register(&mut self) -> bool {
        self.open_auth_screen(Screen::Register)
    }

    /// Moves back to the login screen; only valid inside the auth flow.
    pub fn open_login(&mut self) -> bool {
        self.open_auth_screen(Screen::Login)
    }

    fn open_auth_screen(&mut self, screen: Screen) -> bool {
        if self.state != GateState::Unauthenticated {
            return false;
        }
        self.screen = Some(screen);
        true
    }
}
