//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use sip_app_router::admin::{setup_admin_router, AdminState};
use sip_app_router::container::ApplicationContainer;
use sip_app_router::descriptor::{ApplicationDescriptor, HandlerDefinition};
use sip_app_router::routing::{MappingRule, MatchExpression};
use sip_app_router::sip::{Method, SipRequest};

pub const API_KEY: &str = "test-admin-key";

/// Request with the given method to `sip:bob@biloxi.com`.
pub fn request(method: Method) -> SipRequest {
    request_to(method, "sip:bob@biloxi.com")
}

pub fn request_to(method: Method, uri: &str) -> SipRequest {
    SipRequest::builder(method, uri.parse().unwrap()).build()
}

pub fn method_rule(handler: &str, method: Method) -> MappingRule {
    MappingRule::new(handler, MatchExpression::method(method))
}

/// Registry `{bye, invite}` with rules `[BYE → bye, INVITE → invite]`.
pub fn bye_invite_app(name: &str) -> ApplicationDescriptor {
    ApplicationDescriptor::builder(name)
        .handler(HandlerDefinition::new("bye", "org.example.ByeHandler"))
        .handler(HandlerDefinition::new("invite", "org.example.InviteHandler"))
        .mapping(method_rule("bye", Method::Bye))
        .mapping(method_rule("invite", Method::Invite))
        .build()
        .unwrap()
}

/// Admin router over a container holding `bye_invite_app("conference")`.
pub fn admin_app() -> (axum::Router, Arc<ApplicationContainer>) {
    let container = Arc::new(ApplicationContainer::new());
    container.deploy(bye_invite_app("conference"));
    let router = setup_admin_router(AdminState::new(container.clone(), API_KEY));
    (router, container)
}
