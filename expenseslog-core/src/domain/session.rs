//! Session state

use serde::Serialize;

use super::user::User;

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// A token exists but has not been validated yet; protected views must wait
    Loading,
    Authenticated,
    LoggedOut,
}

/// Snapshot of the authentication state.
///
/// Constructed only through the associated functions, so a user is never
/// present without a token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    status: SessionStatus,
    #[serde(skip)]
    token: Option<String>,
    user: Option<User>,
}

impl SessionState {
    /// State before the persisted token has been looked at
    pub fn unresolved() -> Self {
        Self {
            status: SessionStatus::Loading,
            token: None,
            user: None,
        }
    }

    pub fn validating(token: impl Into<String>) -> Self {
        Self {
            status: SessionStatus::Loading,
            token: Some(token.into()),
            user: None,
        }
    }

    pub fn authenticated(token: impl Into<String>, user: User) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            token: Some(token.into()),
            user: Some(user),
        }
    }

    pub fn logged_out() -> Self {
        Self {
            status: SessionStatus::LoggedOut,
            token: None,
            user: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

/// User interactions that count as activity for the idle timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionEvent {
    PointerMove,
    KeyPress,
    Click,
    Scroll,
    Touch,
}

impl InteractionEvent {
    pub const ALL: [InteractionEvent; 5] = [
        InteractionEvent::PointerMove,
        InteractionEvent::KeyPress,
        InteractionEvent::Click,
        InteractionEvent::Scroll,
        InteractionEvent::Touch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionEvent::PointerMove => "pointer_move",
            InteractionEvent::KeyPress => "key_press",
            InteractionEvent::Click => "click",
            InteractionEvent::Scroll => "scroll",
            InteractionEvent::Touch => "touch",
        }
    }
}
