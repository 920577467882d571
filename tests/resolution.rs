//! End-to-end dispatch behavior of deployed descriptors.

use sip_app_router::container::ApplicationContainer;
use sip_app_router::descriptor::{
    ApplicationDescriptor, DeploymentInfo, DescriptorError, Dispatch, HandlerDefinition, SkipReason,
};
use sip_app_router::routing::{MappingRule, MatchExpression, Resolution, SelectionMode, Variable};
use sip_app_router::sip::{Method, NameAddr, SipRequest};

mod common;

use common::{bye_invite_app, method_rule, request, request_to};

fn var(path: &str) -> Variable {
    path.parse().unwrap()
}

#[test]
fn test_bye_invite_ack_scenario() {
    let app = bye_invite_app("conference");

    assert_eq!(
        app.resolve(&request(Method::Invite)),
        Resolution::Matched { handler: "invite".into(), index: 1 }
    );
    assert_eq!(app.resolve(&request(Method::Ack)), Resolution::NoMatch);

    assert!(app.remove_mapping(&method_rule("bye", Method::Bye)));
    assert_eq!(app.resolve(&request(Method::Bye)), Resolution::NoMatch);
    assert_eq!(
        app.resolve(&request(Method::Invite)),
        Resolution::Matched { handler: "invite".into(), index: 0 }
    );
}

#[test]
fn test_lowest_index_match_wins() {
    let catch_all = MatchExpression::exists(var("request.method"));
    let app = ApplicationDescriptor::builder("overlap")
        .handler(HandlerDefinition::new("specific", "Specific"))
        .handler(HandlerDefinition::new("fallback", "Fallback"))
        .mapping(MappingRule::new(
            "specific",
            MatchExpression::and(vec![
                MatchExpression::method(Method::Invite),
                MatchExpression::subdomain_of(var("request.uri.host"), "example.com"),
            ]),
        ))
        .mapping(MappingRule::new("fallback", catch_all))
        .build()
        .unwrap();

    let specific = request_to(Method::Invite, "sip:alice@pbx.example.com");
    let other_domain = request_to(Method::Invite, "sip:alice@example.org");

    assert_eq!(app.resolve(&specific).handler(), Some("specific"));
    assert_eq!(app.resolve(&other_domain).handler(), Some("fallback"));
}

#[test]
fn test_first_rule_sets_default_and_mode() {
    let app = ApplicationDescriptor::builder("fresh").build().unwrap();
    assert!(app.is_main_handler_mode());
    assert_eq!(app.default_handler(), None);
    assert_eq!(app.resolve(&request(Method::Invite)), Resolution::NoMatch);

    app.add_mapping(method_rule("invite", Method::Invite));
    assert_eq!(app.mappings().mode(), SelectionMode::Mapped);
    assert_eq!(app.default_handler().as_deref(), Some("invite"));

    app.add_mapping(method_rule("bye", Method::Bye));
    assert_eq!(app.default_handler().as_deref(), Some("invite"));

    // Emptying the table does not go back to main-handler mode.
    app.remove_mapping(&method_rule("invite", Method::Invite));
    app.remove_mapping(&method_rule("bye", Method::Bye));
    assert!(app.mappings().is_empty());
    assert_eq!(app.mappings().mode(), SelectionMode::Mapped);
}

#[test]
fn test_later_rule_never_becomes_default() {
    let app = ApplicationDescriptor::builder("cleared").build().unwrap();
    app.add_mapping(method_rule("bye", Method::Bye));
    app.set_default_handler(None);
    app.add_mapping(method_rule("invite", Method::Invite));

    assert_eq!(app.default_handler(), None);
    assert_eq!(app.dispatch(&request(Method::Ack)).unwrap(), Dispatch::Unroutable);
}

#[test]
fn test_explicit_main_handler_is_kept() {
    let app = ApplicationDescriptor::builder("pbx")
        .main_handler("main")
        .mapping(method_rule("invite", Method::Invite))
        .build()
        .unwrap();
    assert_eq!(app.default_handler().as_deref(), Some("main"));
}

#[test]
fn test_removed_rule_never_selected_while_twin_remains() {
    let app = ApplicationDescriptor::builder("twins")
        .handler(HandlerDefinition::new("first", "First"))
        .handler(HandlerDefinition::new("second", "Second"))
        .mapping(method_rule("first", Method::Message))
        .mapping(method_rule("second", Method::Message))
        .build()
        .unwrap();

    assert!(app.remove_mapping(&method_rule("first", Method::Message)));
    assert_eq!(app.resolve(&request(Method::Message)).handler(), Some("second"));
    assert!(!app.remove_mapping(&method_rule("first", Method::Message)));
}

#[test]
fn test_dispatch_falls_back_to_default() {
    let app = bye_invite_app("conference");

    match app.dispatch(&request(Method::Options)).unwrap() {
        Dispatch::Default { handler } => assert_eq!(handler.name, "bye"),
        other => panic!("expected default dispatch, got {other:?}"),
    }

    app.set_default_handler(None);
    assert_eq!(app.dispatch(&request(Method::Options)).unwrap(), Dispatch::Unroutable);
}

#[test]
fn test_dispatch_to_unregistered_handler_is_not_found() {
    let app = ApplicationDescriptor::builder("dangling")
        .mapping(method_rule("ghost", Method::Invite))
        .build()
        .unwrap();

    assert_eq!(app.resolve(&request(Method::Invite)).handler(), Some("ghost"));
    assert_eq!(
        app.dispatch(&request(Method::Invite)).unwrap_err(),
        DescriptorError::NotFound("ghost".into())
    );

    app.register_handler(HandlerDefinition::new("ghost", "Ghost"));
    assert!(app.dispatch(&request(Method::Invite)).is_ok());
}

#[test]
fn test_header_and_address_rules() {
    let app = ApplicationDescriptor::builder("routing")
        .handler(HandlerDefinition::new("vip", "Vip"))
        .handler(HandlerDefinition::new("replaces", "Replaces"))
        .mapping(MappingRule::new(
            "replaces",
            MatchExpression::exists(var("request.header.replaces")),
        ))
        .mapping(MappingRule::new(
            "vip",
            MatchExpression::equal_ignore_case(var("request.from.display-name"), "ALICE"),
        ))
        .build()
        .unwrap();

    let from: NameAddr = "\"Alice\" <sip:alice@atlanta.com>".parse().unwrap();
    let vip = SipRequest::builder(Method::Invite, "sip:bob@biloxi.com".parse().unwrap())
        .from(from.clone())
        .build();
    let transfer = SipRequest::builder(Method::Invite, "sip:bob@biloxi.com".parse().unwrap())
        .from(from)
        .header("Replaces", "abc@host;to-tag=1;from-tag=2")
        .build();

    assert_eq!(app.resolve(&vip).handler(), Some("vip"));
    assert_eq!(app.resolve(&transfer).handler(), Some("replaces"));
}

#[test]
fn test_merge_copies_matching_fields_and_reports_missing() {
    let mut app = bye_invite_app("conference");
    let base = DeploymentInfo {
        deployment_name: "conference-2.1".into(),
        default_session_timeout: Some(600),
        ..Default::default()
    };

    let report = app.merge_from(&base);
    assert_eq!(app.settings().deployment_name, "conference-2.1");
    assert_eq!(app.settings().default_session_timeout, 600);
    assert_eq!(app.settings().context_path, "/");
    assert!(report.copied.contains(&"default_session_timeout"));
    assert!(report
        .skipped
        .iter()
        .any(|s| s.field == "context_path" && s.reason == SkipReason::Missing));
}

#[test]
fn test_container_dispatch_by_application() {
    let container = ApplicationContainer::new();
    container.deploy(bye_invite_app("conference"));
    container.deploy(
        ApplicationDescriptor::builder("voicemail")
            .handler(HandlerDefinition::new("deposit", "Deposit"))
            .main_handler("deposit")
            .build()
            .unwrap(),
    );

    let invite = request(Method::Invite);
    let conference = container.dispatch("conference", &invite).unwrap();
    let voicemail = container.dispatch("voicemail", &invite).unwrap();
    assert_eq!(conference.handler().unwrap().name, "invite");
    assert_eq!(voicemail.handler().unwrap().name, "deposit");
}
