//! Navigation shell: maps auth state to the route that should be shown.

use opend::AuthState;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    #[default]
    Discover,
    Collection,
    Mint,
    Wallet,
    Quiz,
}

/// Screens pushed on top of the tab set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StackScreen {
    Saved,
    Upvoted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "route", content = "screen")]
pub enum Route {
    Splash,
    Login,
    Main(Tab),
    Stack(StackScreen),
}

/// Where the user wants to go, before auth is taken into account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Tab(Tab),
    Stack(StackScreen),
}

impl Default for Target {
    fn default() -> Self {
        Target::Tab(Tab::default())
    }
}

pub struct Shell;

impl Shell {
    /// Route for the default tab.
    pub fn route(state: &AuthState) -> Route {
        Self::resolve(state, Target::default())
    }

    /// Route for `target`, or the gate in front of it.
    pub fn resolve(state: &AuthState, target: Target) -> Route {
        match state {
            AuthState::Uninitialized | AuthState::Restoring => Route::Splash,
            AuthState::Unauthenticated { .. } | AuthState::AwaitingCallback => Route::Login,
            AuthState::Authenticated { .. } => match target {
                Target::Tab(tab) => Route::Main(tab),
                Target::Stack(screen) => Route::Stack(screen),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opend::Principal;

    #[test]
    fn test_routes_by_auth_state() {
        assert_eq!(Shell::route(&AuthState::Uninitialized), Route::Splash);
        assert_eq!(Shell::route(&AuthState::Restoring), Route::Splash);
        assert_eq!(
            Shell::route(&AuthState::Unauthenticated { error: None }),
            Route::Login
        );
        assert_eq!(Shell::route(&AuthState::AwaitingCallback), Route::Login);

        let authed = AuthState::Authenticated {
            principal: Principal::anonymous(),
        };
        assert_eq!(Shell::route(&authed), Route::Main(Tab::Discover));
        assert_eq!(
            Shell::resolve(&authed, Target::Stack(StackScreen::Upvoted)),
            Route::Stack(StackScreen::Upvoted)
        );
    }

    #[test]
    fn test_gated_targets_go_to_login() {
        let state = AuthState::Unauthenticated {
            error: Some("Session expired. Please log in again.".into()),
        };
        assert_eq!(Shell::resolve(&state, Target::Tab(Tab::Wallet)), Route::Login);
    }
}
