//! Loading the sample configuration and deploying it.

use std::path::Path;

use sip_app_router::config::load_config;
use sip_app_router::container::ApplicationContainer;
use sip_app_router::descriptor::{ConcurrencyControlMode, Dispatch};
use sip_app_router::lifecycle::deploy_all;
use sip_app_router::sip::{Method, SipRequest};

mod common;

use common::request_to;

#[test]
fn test_sample_config_deploys() {
    let config = load_config(&Path::new(env!("CARGO_MANIFEST_DIR")).join("router.toml")).unwrap();
    assert!(config.admin.enabled);

    let container = ApplicationContainer::new();
    assert_eq!(deploy_all(&config, &container).unwrap(), 2);
    assert_eq!(container.names(), vec!["conference", "voicemail"]);

    let conference = container.get("conference").unwrap();
    assert_eq!(conference.concurrency_control_mode(), ConcurrencyControlMode::SipSession);
    assert_eq!(conference.settings().default_session_timeout, 900);
    assert_eq!(conference.settings().display_name.as_deref(), Some("Conference"));
    assert_eq!(
        conference.handlers().lookup("invite").unwrap().init_params["max_participants"],
        "16"
    );

    let invite = SipRequest::builder(Method::Invite, "sip:room-7@conf.example.com".parse().unwrap())
        .header("X-Conference-Id", "room-7")
        .build();
    match container.dispatch("conference", &invite).unwrap() {
        Dispatch::Matched { handler, rule_index } => {
            assert_eq!(handler.name, "invite");
            assert_eq!(rule_index, 1);
        }
        other => panic!("expected match, got {other:?}"),
    }
    assert_eq!(conference.application_key(&invite).as_deref(), Some("room-7"));

    // INVITE outside the domain falls back to the implicit default (first rule).
    let elsewhere = request_to(Method::Invite, "sip:room-7@example.org");
    assert_eq!(
        container.dispatch("conference", &elsewhere).unwrap().handler().unwrap().name,
        "bye"
    );

    let voicemail = container.get("voicemail").unwrap();
    assert!(voicemail.is_main_handler_mode());
    let deposit = request_to(Method::Invite, "sip:alice@vm.example.com");
    assert_eq!(voicemail.application_key(&deposit).as_deref(), Some("alice"));
    assert!(matches!(
        container.dispatch("voicemail", &deposit).unwrap(),
        Dispatch::Default { .. }
    ));
}
