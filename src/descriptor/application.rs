//! The application descriptor aggregate.
//!
//! # Responsibilities
//! - Hold application metadata, timeouts and concurrency policy
//! - Own the handler registry, mapping router and listener list
//! - Select the handler for an inbound request (with default fallback)
//! - Apply administrative mutations and announce them
//!
//! # Design Decisions
//! - Metadata and timeouts are fixed at build time
//! - Mutable parts are snapshot-swapped; `&self` is enough to mutate
//! - Handler references are checked at dispatch, not when rules are added
//! - Administrative mutations hold one descriptor-wide lock through their
//!   event, so event order matches the order changes were applied

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use uuid::Uuid;

use crate::container::events::{self, ContainerEvent, EventSink};
use crate::descriptor::listeners::ListenerList;
use crate::descriptor::merge::{DeploymentSettings, FieldSource, MergeReport};
use crate::descriptor::registry::{HandlerDefinition, HandlerRegistry};
use crate::descriptor::types::{
    ApplicationKeyFn, ConcurrencyControlMode, DescriptorError, DescriptorResult,
    SharedSessionManagerFactory,
};
use crate::observability::metrics;
use crate::routing::{MappingRule, MappingTable, Resolution, Router};
use crate::sip::SipRequest;

/// Handler chosen for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A mapping rule matched.
    Matched { handler: Arc<HandlerDefinition>, rule_index: usize },
    /// No rule matched; the default handler applies.
    Default { handler: Arc<HandlerDefinition> },
    /// No rule matched and no default handler is set.
    Unroutable,
}

impl Dispatch {
    pub fn handler(&self) -> Option<&Arc<HandlerDefinition>> {
        match self {
            Dispatch::Matched { handler, .. } | Dispatch::Default { handler } => Some(handler),
            Dispatch::Unroutable => None,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            Dispatch::Matched { .. } => "matched",
            Dispatch::Default { .. } => "default",
            Dispatch::Unroutable => "unroutable",
        }
    }
}

/// Routing configuration of one deployed SIP application.
#[derive(Debug)]
pub struct ApplicationDescriptor {
    deployment_id: Uuid,
    name: String,
    description: Option<String>,
    small_icon: Option<String>,
    large_icon: Option<String>,
    proxy_timeout: i64,
    application_session_timeout: i64,
    application_key: Option<ApplicationKeyFn>,
    concurrency_mode: AtomicU8,
    settings: DeploymentSettings,
    handlers: HandlerRegistry,
    router: Router,
    listeners: ListenerList,
    events: Option<EventSink>,
    admin_lock: Mutex<()>,
}

impl ApplicationDescriptor {
    pub fn builder(name: impl Into<String>) -> ApplicationDescriptorBuilder {
        ApplicationDescriptorBuilder::new(name)
    }

    pub fn deployment_id(&self) -> Uuid {
        self.deployment_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn small_icon(&self) -> Option<&str> {
        self.small_icon.as_deref()
    }

    pub fn large_icon(&self) -> Option<&str> {
        self.large_icon.as_deref()
    }

    /// Proxy timeout, `None` when disabled.
    pub fn proxy_timeout(&self) -> Option<Duration> {
        positive_secs(self.proxy_timeout)
    }

    /// Application session timeout, `None` when disabled.
    pub fn application_session_timeout(&self) -> Option<Duration> {
        positive_secs(self.application_session_timeout)
    }

    pub fn settings(&self) -> &DeploymentSettings {
        &self.settings
    }

    pub fn session_manager_factory(&self) -> &SharedSessionManagerFactory {
        &self.settings.session_manager_factory
    }

    /// Copy generic settings from a base descriptor before the descriptor is shared.
    pub fn merge_from(&mut self, base: &dyn FieldSource) -> MergeReport {
        self.settings.merge_from(base)
    }

    // --- Handlers ---

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn register_handler(&self, handler: HandlerDefinition) {
        let _admin = self.admin();
        self.handlers.register(handler);
    }

    /// Register every handler given, in order.
    pub fn register_handlers(
        &self,
        handlers: impl IntoIterator<Item = HandlerDefinition>,
    ) -> usize {
        let _admin = self.admin();
        self.handlers.register_all(handlers)
    }

    // --- Mappings ---

    pub fn mappings(&self) -> Arc<MappingTable> {
        self.router.snapshot()
    }

    pub fn is_main_handler_mode(&self) -> bool {
        self.router.snapshot().is_main_handler_mode()
    }

    pub fn default_handler(&self) -> Option<String> {
        self.router.snapshot().default_handler().map(str::to_string)
    }

    pub fn set_default_handler(&self, handler: Option<String>) {
        let _admin = self.admin();
        self.router.set_default_handler(handler);
    }

    pub fn set_diagnostics(&self, enabled: bool) {
        self.router.set_diagnostics(enabled);
    }

    pub fn add_mapping(&self, rule: MappingRule) {
        let _admin = self.admin();
        let handler = rule.handler().to_string();
        if !self.handlers.contains(&handler) {
            tracing::debug!(
                application = %self.name,
                handler = %handler,
                "Mapping added before its handler was registered"
            );
        }
        if self.router.add_rule(rule) {
            tracing::info!(
                application = %self.name,
                "First mapping added, leaving main-handler mode"
            );
        }
        metrics::record_admin_mutation(&self.name, "add_mapping");
        events::notify(
            self.events.as_ref(),
            ContainerEvent::MappingAdded { application: self.name.clone(), handler },
        );
    }

    /// Remove the first equal rule. No-op if absent.
    pub fn remove_mapping(&self, rule: &MappingRule) -> bool {
        let _admin = self.admin();
        let removed = self.router.remove_rule(rule);
        if removed {
            metrics::record_admin_mutation(&self.name, "remove_mapping");
            events::notify(
                self.events.as_ref(),
                ContainerEvent::MappingRemoved {
                    application: self.name.clone(),
                    handler: rule.handler().to_string(),
                },
            );
        }
        removed
    }

    /// Walk the mapping table. Pure; safe from any number of threads.
    pub fn resolve(&self, req: &SipRequest) -> Resolution {
        self.router.resolve(req)
    }

    /// Resolve and apply the default-handler fallback.
    ///
    /// Fails with `NotFound` when the selected handler is not registered.
    pub fn dispatch(&self, req: &SipRequest) -> DescriptorResult<Dispatch> {
        let table = self.router.snapshot();
        let dispatch = match table.resolve_with(req, self.router.diagnostics()) {
            Resolution::Matched { handler, index } => Dispatch::Matched {
                handler: self.checked_lookup(&handler)?,
                rule_index: index,
            },
            Resolution::NoMatch => match table.default_handler() {
                Some(name) => Dispatch::Default { handler: self.checked_lookup(name)? },
                None => Dispatch::Unroutable,
            },
        };
        metrics::record_resolution(&self.name, dispatch.outcome());
        Ok(dispatch)
    }

    fn checked_lookup(&self, name: &str) -> DescriptorResult<Arc<HandlerDefinition>> {
        self.handlers.lookup(name).inspect_err(|_| {
            tracing::warn!(
                application = %self.name,
                handler = %name,
                "Selected handler is not registered"
            );
            metrics::record_resolution(&self.name, "handler_missing");
        })
    }

    // --- Listeners ---

    pub fn listeners(&self) -> Arc<Vec<String>> {
        self.listeners.snapshot()
    }

    pub fn add_listener(&self, listener: impl Into<String>) {
        let listener = listener.into();
        let _admin = self.admin();
        self.listeners.add(listener.clone());
        metrics::record_admin_mutation(&self.name, "add_listener");
        events::notify(
            self.events.as_ref(),
            ContainerEvent::ListenerAdded { application: self.name.clone(), listener },
        );
    }

    /// Remove the first occurrence. No-op if absent.
    pub fn remove_listener(&self, listener: &str) -> bool {
        let _admin = self.admin();
        let removed = self.listeners.remove(listener);
        if removed {
            metrics::record_admin_mutation(&self.name, "remove_listener");
            events::notify(
                self.events.as_ref(),
                ContainerEvent::ListenerRemoved {
                    application: self.name.clone(),
                    listener: listener.to_string(),
                },
            );
        }
        removed
    }

    // --- Sessions ---

    pub fn concurrency_control_mode(&self) -> ConcurrencyControlMode {
        ConcurrencyControlMode::from(self.concurrency_mode.load(Ordering::Acquire))
    }

    /// Applies to sessions created from now on; active sessions keep theirs.
    pub fn set_concurrency_control_mode(&self, mode: ConcurrencyControlMode) {
        let _admin = self.admin();
        self.concurrency_mode.store(mode as u8, Ordering::Release);
        metrics::record_admin_mutation(&self.name, "set_concurrency_control_mode");
        tracing::info!(application = %self.name, mode = %mode, "Concurrency control mode changed");
    }

    pub fn has_application_key(&self) -> bool {
        self.application_key.is_some()
    }

    /// Application-session correlation key, if a derivation is configured.
    pub fn application_key(&self, req: &SipRequest) -> Option<String> {
        self.application_key.as_ref().and_then(|f| f.derive(req))
    }

    pub(crate) fn set_event_sink(&mut self, sink: EventSink) {
        self.events = Some(sink);
    }

    /// Serializes administrative mutations, including their notifications.
    fn admin(&self) -> MutexGuard<'_, ()> {
        self.admin_lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn positive_secs(secs: i64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs as u64))
}

/// Builder for [`ApplicationDescriptor`].
#[derive(Debug)]
pub struct ApplicationDescriptorBuilder {
    name: String,
    description: Option<String>,
    small_icon: Option<String>,
    large_icon: Option<String>,
    proxy_timeout: i64,
    application_session_timeout: i64,
    main_handler: Option<String>,
    application_key: Option<ApplicationKeyFn>,
    concurrency_mode: ConcurrencyControlMode,
    diagnostics: bool,
    settings: DeploymentSettings,
    handlers: Vec<HandlerDefinition>,
    mappings: Vec<MappingRule>,
    listeners: Vec<String>,
    events: Option<EventSink>,
}

impl ApplicationDescriptorBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            small_icon: None,
            large_icon: None,
            proxy_timeout: 0,
            application_session_timeout: 0,
            main_handler: None,
            application_key: None,
            concurrency_mode: ConcurrencyControlMode::None,
            diagnostics: false,
            settings: DeploymentSettings::default(),
            handlers: Vec::new(),
            mappings: Vec::new(),
            listeners: Vec::new(),
            events: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn icons(mut self, small: Option<String>, large: Option<String>) -> Self {
        self.small_icon = small;
        self.large_icon = large;
        self
    }

    /// Seconds; 0 disables, negative is rejected by `build`.
    pub fn proxy_timeout(mut self, secs: i64) -> Self {
        self.proxy_timeout = secs;
        self
    }

    /// Seconds; 0 disables, negative is rejected by `build`.
    pub fn application_session_timeout(mut self, secs: i64) -> Self {
        self.application_session_timeout = secs;
        self
    }

    /// Explicit default handler; takes precedence over the first mapping.
    pub fn main_handler(mut self, handler: impl Into<String>) -> Self {
        self.main_handler = Some(handler.into());
        self
    }

    pub fn application_key(mut self, key: impl Into<ApplicationKeyFn>) -> Self {
        self.application_key = Some(key.into());
        self
    }

    pub fn concurrency_control_mode(mut self, mode: ConcurrencyControlMode) -> Self {
        self.concurrency_mode = mode;
        self
    }

    pub fn diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    pub fn session_manager_factory(mut self, factory: SharedSessionManagerFactory) -> Self {
        self.settings.session_manager_factory = factory;
        self
    }

    pub fn handler(mut self, handler: HandlerDefinition) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn handlers(mut self, handlers: impl IntoIterator<Item = HandlerDefinition>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    pub fn mapping(mut self, rule: MappingRule) -> Self {
        self.mappings.push(rule);
        self
    }

    pub fn mappings(mut self, rules: impl IntoIterator<Item = MappingRule>) -> Self {
        self.mappings.extend(rules);
        self
    }

    pub fn listener(mut self, listener: impl Into<String>) -> Self {
        self.listeners.push(listener.into());
        self
    }

    pub fn event_sink(mut self, sink: EventSink) -> Self {
        self.events = Some(sink);
        self
    }

    /// Copy generic settings from a base descriptor.
    pub fn merge_from(&mut self, base: &dyn FieldSource) -> MergeReport {
        self.settings.merge_from(base)
    }

    pub fn build(self) -> DescriptorResult<ApplicationDescriptor> {
        for (field, value) in [
            ("proxy_timeout", self.proxy_timeout),
            ("application_session_timeout", self.application_session_timeout),
        ] {
            if value < 0 {
                return Err(DescriptorError::InvalidTimeout { field, value });
            }
        }

        let mut table = MappingTable::new().with_default_handler(self.main_handler);
        for rule in self.mappings {
            table = table.with_rule(rule);
        }
        let router = Router::from_table(table);
        router.set_diagnostics(self.diagnostics);

        let handlers = HandlerRegistry::new();
        handlers.register_all(self.handlers);

        let descriptor = ApplicationDescriptor {
            deployment_id: Uuid::new_v4(),
            name: self.name,
            description: self.description,
            small_icon: self.small_icon,
            large_icon: self.large_icon,
            proxy_timeout: self.proxy_timeout,
            application_session_timeout: self.application_session_timeout,
            application_key: self.application_key,
            concurrency_mode: AtomicU8::new(self.concurrency_mode as u8),
            settings: self.settings,
            handlers,
            router,
            listeners: ListenerList::from_ids(self.listeners),
            events: self.events,
            admin_lock: Mutex::new(()),
        };

        tracing::debug!(
            application = %descriptor.name,
            deployment_id = %descriptor.deployment_id,
            handlers = descriptor.handlers.len(),
            mappings = descriptor.router.snapshot().len(),
            "Application descriptor built"
        );
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::types::ApplicationKeySource;
    use crate::routing::MatchExpression;
    use crate::sip::Method;

    fn req(method: Method) -> SipRequest {
        SipRequest::builder(method, "sip:conf-1@example.com".parse().unwrap())
            .header("X-Conference-Id", "c-1")
            .build()
    }

    fn rule(handler: &str, method: Method) -> MappingRule {
        MappingRule::new(handler, MatchExpression::method(method))
    }

    fn descriptor() -> ApplicationDescriptor {
        ApplicationDescriptor::builder("conference")
            .handler(HandlerDefinition::new("bye", "BYE"))
            .handler(HandlerDefinition::new("invite", "INVITE"))
            .mapping(rule("bye", Method::Bye))
            .mapping(rule("invite", Method::Invite))
            .build()
            .unwrap()
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let err = ApplicationDescriptor::builder("app").proxy_timeout(-1).build().unwrap_err();
        assert_eq!(err, DescriptorError::InvalidTimeout { field: "proxy_timeout", value: -1 });

        let err = ApplicationDescriptor::builder("app")
            .application_session_timeout(-5)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::InvalidTimeout { field: "application_session_timeout", .. }
        ));
    }

    #[test]
    fn test_zero_timeout_disables() {
        let d = ApplicationDescriptor::builder("app")
            .proxy_timeout(0)
            .application_session_timeout(180)
            .build()
            .unwrap();
        assert_eq!(d.proxy_timeout(), None);
        assert_eq!(d.application_session_timeout(), Some(Duration::from_secs(180)));
    }

    #[test]
    fn test_first_mapping_sets_default_handler() {
        let d = descriptor();
        assert!(!d.is_main_handler_mode());
        assert_eq!(d.default_handler().as_deref(), Some("bye"));
    }

    #[test]
    fn test_main_handler_takes_precedence() {
        let d = ApplicationDescriptor::builder("app")
            .main_handler("main")
            .mapping(rule("bye", Method::Bye))
            .build()
            .unwrap();
        assert_eq!(d.default_handler().as_deref(), Some("main"));
    }

    #[test]
    fn test_dispatch_matched_and_default() {
        let d = descriptor();
        match d.dispatch(&req(Method::Invite)).unwrap() {
            Dispatch::Matched { handler, rule_index } => {
                assert_eq!(handler.name, "invite");
                assert_eq!(rule_index, 1);
            }
            other => panic!("unexpected dispatch: {:?}", other),
        }
        let fallback = d.dispatch(&req(Method::Ack)).unwrap();
        assert!(matches!(fallback, Dispatch::Default { ref handler } if handler.name == "bye"));
    }

    #[test]
    fn test_main_handler_mode_dispatches_to_default() {
        let d = ApplicationDescriptor::builder("app")
            .main_handler("main")
            .handler(HandlerDefinition::new("main", "Main"))
            .build()
            .unwrap();
        assert!(d.is_main_handler_mode());
        assert_eq!(d.resolve(&req(Method::Invite)), Resolution::NoMatch);
        assert!(matches!(d.dispatch(&req(Method::Invite)).unwrap(), Dispatch::Default { .. }));
    }

    #[test]
    fn test_dispatch_unroutable_without_default() {
        let d = ApplicationDescriptor::builder("app").build().unwrap();
        assert_eq!(d.dispatch(&req(Method::Invite)).unwrap(), Dispatch::Unroutable);
    }

    #[test]
    fn test_dispatch_unregistered_handler_is_not_found() {
        let d = ApplicationDescriptor::builder("app")
            .mapping(rule("ghost", Method::Invite))
            .build()
            .unwrap();
        assert_eq!(
            d.dispatch(&req(Method::Invite)).unwrap_err(),
            DescriptorError::NotFound("ghost".into())
        );
        d.register_handler(HandlerDefinition::new("ghost", "Ghost"));
        assert!(d.dispatch(&req(Method::Invite)).is_ok());
    }

    #[test]
    fn test_listener_events_are_emitted() {
        let (tx, mut rx) = events::channel();
        let d = ApplicationDescriptor::builder("app").event_sink(tx).build().unwrap();

        d.add_listener("audit");
        assert!(d.remove_listener("audit"));
        assert!(!d.remove_listener("audit"));

        assert_eq!(
            rx.try_recv().unwrap(),
            ContainerEvent::ListenerAdded { application: "app".into(), listener: "audit".into() }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ContainerEvent::ListenerRemoved { application: "app".into(), listener: "audit".into() }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_event_receiver_is_ignored() {
        let (tx, rx) = events::channel();
        drop(rx);
        let d = ApplicationDescriptor::builder("app").event_sink(tx).build().unwrap();
        d.add_listener("audit");
        assert_eq!(d.listeners().len(), 1);
    }

    #[test]
    fn test_concurrency_mode_replacement() {
        let d = ApplicationDescriptor::builder("app")
            .concurrency_control_mode(ConcurrencyControlMode::Sas)
            .build()
            .unwrap();
        assert_eq!(d.concurrency_control_mode(), ConcurrencyControlMode::Sas);
        d.set_concurrency_control_mode(ConcurrencyControlMode::SipSession);
        assert_eq!(d.concurrency_control_mode(), ConcurrencyControlMode::SipSession);
    }

    #[test]
    fn test_application_key_derivation() {
        let d = ApplicationDescriptor::builder("app")
            .application_key(ApplicationKeySource::Header("x-conference-id".into()))
            .build()
            .unwrap();
        assert_eq!(d.application_key(&req(Method::Invite)).as_deref(), Some("c-1"));

        let custom = ApplicationDescriptor::builder("app")
            .application_key(ApplicationKeyFn::new(|r| {
                Some(format!("{}-{}", r.method, r.uri.host()))
            }))
            .build()
            .unwrap();
        assert_eq!(
            custom.application_key(&req(Method::Bye)).as_deref(),
            Some("BYE-example.com")
        );

        let none = ApplicationDescriptor::builder("app").build().unwrap();
        assert_eq!(none.application_key(&req(Method::Invite)), None);
    }

    #[test]
    fn test_concurrent_listener_events_follow_list_order() {
        let (tx, mut rx) = events::channel();
        let d = Arc::new(ApplicationDescriptor::builder("app").event_sink(tx).build().unwrap());

        let threads: Vec<_> = (0..8)
            .map(|t| {
                let d = Arc::clone(&d);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        d.add_listener(format!("l-{t}-{i}"));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let mut announced = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ContainerEvent::ListenerAdded { listener, .. } = event {
                announced.push(listener);
            }
        }
        assert_eq!(announced.len(), 200);
        assert_eq!(announced, *d.listeners());
    }
}
