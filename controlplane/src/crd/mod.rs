//! Typed resources read and written by the controller.
//!
//! `Gate` is the user-facing exposure intent. `VirtualService` and `Rule`
//! mirror just enough of the Istio and Oathkeeper schemas for the objects
//! derived from a Gate.

mod gate;
mod rule;
mod virtual_service;

pub use gate::{
    AuthStrategy, Gate, GateSpec, GateStatus, GatewayResourceStatus, OauthModeConfig, OauthOption,
    ServiceRef, StatusCode,
};
pub use rule::{Handler, Rule, RuleMatch, RuleSpec, Upstream};
pub use virtual_service::{
    Destination, HttpMatchRequest, HttpRoute, HttpRouteDestination, PortSelector, StringMatch,
    VirtualService, VirtualServiceSpec,
};
