//! Control routes
//!
//! | Route | Effect |
//! |---|---|
//! | `GET /__demokit/state` | none |
//! | `POST /__demokit/enable` | enable, keeping the scenario |
//! | `POST /__demokit/disable` | disable, clearing the scenario |
//! | `POST /__demokit/scenario/<name>` | enable and activate `<name>` |
//! | `DELETE /__demokit/scenario` | back to base fixtures |
//!
//! Every route answers with the resulting `{"enabled", "scenario"}` and, when
//! the mode changed, the new mode cookie.

use crate::error::BridgeError;
use crate::filter::{reply_with_mode, RequestMode};
use demokit_core::ScenarioName;
use serde_json::json;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Path segment the control routes live under
pub const CONTROL_PREFIX: &str = "__demokit";

/// What a control request asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    /// Report the current state
    State,
    /// Turn demo mode on
    Enable,
    /// Turn demo mode off
    Disable,
    /// Turn demo mode on with a scenario
    SetScenario(String),
    /// Drop the active scenario
    ClearScenario,
}

impl ControlAction {
    /// Apply this action to a request's mode
    ///
    /// # Errors
    /// Returns `BridgeError::Demo` when the scenario name is unusable.
    pub fn apply(self, mode: &RequestMode) -> Result<(), BridgeError> {
        let store = mode.store();
        match self {
            Self::State => {}
            Self::Enable => store.set_enabled(true),
            Self::Disable => store.set_enabled(false),
            Self::SetScenario(raw) => {
                let name = ScenarioName::new(raw)?;
                if !store.state().is_enabled() {
                    store.set_enabled(true);
                }
                store.set_scenario(Some(name));
            }
            Self::ClearScenario => store.set_scenario(None),
        }
        Ok(())
    }
}

fn action() -> impl Filter<Extract = (ControlAction,), Error = Rejection> + Clone {
    let state = warp::get()
        .and(warp::path!("state"))
        .map(|| ControlAction::State);
    let enable = warp::post()
        .and(warp::path!("enable"))
        .map(|| ControlAction::Enable);
    let disable = warp::post()
        .and(warp::path!("disable"))
        .map(|| ControlAction::Disable);
    let set_scenario = warp::post()
        .and(warp::path!("scenario" / String))
        .map(ControlAction::SetScenario);
    let clear_scenario = warp::delete()
        .and(warp::path!("scenario"))
        .map(|| ControlAction::ClearScenario);

    state
        .or(enable)
        .unify()
        .or(disable)
        .unify()
        .or(set_scenario)
        .unify()
        .or(clear_scenario)
        .unify()
}

/// Control routes, reading the mode with `mode`
///
/// Pass [`crate::with_mode`] (or [`crate::with_mode_or`]) for `mode`.
pub fn control_routes<M>(mode: M) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone
where
    M: Filter<Extract = (RequestMode,), Error = Rejection> + Clone + Send + Sync + 'static,
{
    warp::path(CONTROL_PREFIX)
        .and(action())
        .and(mode)
        .map(handle)
}

fn handle(action: ControlAction, mode: RequestMode) -> Response {
    tracing::debug!(?action, "demo control request");
    if let Err(err) = action.apply(&mode) {
        let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({ "error": err.to_string() });
        return warp::reply::with_status(warp::reply::json(&body), status).into_response();
    }
    reply_with_mode(warp::reply::json(&mode.state()), &mode)
}
