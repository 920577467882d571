//! Deployed applications, keyed by name.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::container::events::{self, ContainerEvent, EventSink};
use crate::descriptor::{ApplicationDescriptor, DescriptorError, Dispatch};
use crate::observability::metrics;
use crate::sip::SipRequest;

/// Errors from container-level operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    #[error("application not deployed: {0}")]
    UnknownApplication(String),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// The set of applications currently deployed.
#[derive(Debug, Default)]
pub struct ApplicationContainer {
    applications: DashMap<String, Arc<ApplicationDescriptor>>,
    events: Option<EventSink>,
}

impl ApplicationContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Container whose descriptors report to `sink`.
    pub fn with_events(sink: EventSink) -> Self {
        Self {
            applications: DashMap::new(),
            events: Some(sink),
        }
    }

    /// Deploy a descriptor, replacing any application with the same name.
    ///
    /// Returns the replaced descriptor; dropping it releases everything it owns.
    pub fn deploy(
        &self,
        mut descriptor: ApplicationDescriptor,
    ) -> Option<Arc<ApplicationDescriptor>> {
        if let Some(sink) = &self.events {
            descriptor.set_event_sink(sink.clone());
        }

        let mappings = descriptor.mappings();
        for rule in mappings.rules() {
            if !descriptor.handlers().contains(rule.handler()) {
                tracing::warn!(
                    application = %descriptor.name(),
                    handler = %rule.handler(),
                    "Mapping references a handler that is not registered"
                );
            }
        }

        let name = descriptor.name().to_string();
        let deployment_id = descriptor.deployment_id();
        let previous = self.applications.insert(name.clone(), Arc::new(descriptor));
        metrics::set_deployed_applications(self.applications.len());

        if let Some(prev) = &previous {
            tracing::info!(
                application = %name,
                previous_deployment = %prev.deployment_id(),
                deployment_id = %deployment_id,
                "Application redeployed"
            );
            events::notify(
                self.events.as_ref(),
                ContainerEvent::Undeployed {
                    application: name.clone(),
                    deployment_id: prev.deployment_id(),
                },
            );
        } else {
            tracing::info!(
                application = %name,
                deployment_id = %deployment_id,
                mappings = mappings.len(),
                "Application deployed"
            );
        }
        events::notify(
            self.events.as_ref(),
            ContainerEvent::Deployed { application: name, deployment_id },
        );
        previous
    }

    pub fn undeploy(&self, name: &str) -> Option<Arc<ApplicationDescriptor>> {
        let (_, removed) = self.applications.remove(name)?;
        metrics::set_deployed_applications(self.applications.len());
        tracing::info!(
            application = %name,
            deployment_id = %removed.deployment_id(),
            "Application undeployed"
        );
        events::notify(
            self.events.as_ref(),
            ContainerEvent::Undeployed {
                application: name.to_string(),
                deployment_id: removed.deployment_id(),
            },
        );
        Some(removed)
    }

    /// Undeploy everything. Returns how many applications were removed.
    pub fn undeploy_all(&self) -> usize {
        self.names().iter().filter(|name| self.undeploy(name).is_some()).count()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ApplicationDescriptor>> {
        self.applications.get(name).map(|entry| entry.value().clone())
    }

    /// Deployed application names in lexical order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.applications.iter().map(|e| e.key().clone()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }

    /// Select the handler of `application` for `req`.
    pub fn dispatch(
        &self,
        application: &str,
        req: &SipRequest,
    ) -> Result<Dispatch, ContainerError> {
        let descriptor = self
            .get(application)
            .ok_or_else(|| ContainerError::UnknownApplication(application.to_string()))?;
        Ok(descriptor.dispatch(req)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::HandlerDefinition;
    use crate::routing::{MappingRule, MatchExpression};
    use crate::sip::Method;

    fn app(name: &str) -> ApplicationDescriptor {
        ApplicationDescriptor::builder(name)
            .handler(HandlerDefinition::new("invite", "Invite"))
            .mapping(MappingRule::new("invite", MatchExpression::method(Method::Invite)))
            .build()
            .unwrap()
    }

    fn invite() -> SipRequest {
        SipRequest::builder(Method::Invite, "sip:bob@biloxi.com".parse().unwrap()).build()
    }

    #[test]
    fn test_deploy_and_dispatch() {
        let container = ApplicationContainer::new();
        assert!(container.deploy(app("conference")).is_none());

        let dispatch = container.dispatch("conference", &invite()).unwrap();
        assert_eq!(dispatch.handler().unwrap().name, "invite");
        assert_eq!(
            container.dispatch("missing", &invite()).unwrap_err(),
            ContainerError::UnknownApplication("missing".into())
        );
    }

    #[test]
    fn test_redeploy_replaces_and_returns_previous() {
        let container = ApplicationContainer::new();
        container.deploy(app("conference"));
        let first_id = container.get("conference").unwrap().deployment_id();

        let previous = container.deploy(app("conference")).unwrap();
        assert_eq!(previous.deployment_id(), first_id);
        assert_ne!(container.get("conference").unwrap().deployment_id(), first_id);
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_undeploy_emits_events() {
        let (tx, mut rx) = events::channel();
        let container = ApplicationContainer::with_events(tx);
        container.deploy(app("b"));
        container.deploy(app("a"));
        assert_eq!(container.names(), vec!["a", "b"]);

        assert_eq!(container.undeploy_all(), 2);
        assert!(container.is_empty());
        assert!(container.undeploy("a").is_none());

        let kinds: Vec<&'static str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| match e {
                ContainerEvent::Deployed { .. } => "deployed",
                ContainerEvent::Undeployed { .. } => "undeployed",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["deployed", "deployed", "undeployed", "undeployed"]);
    }

    #[test]
    fn test_deployed_descriptor_reports_to_container_sink() {
        let (tx, mut rx) = events::channel();
        let container = ApplicationContainer::with_events(tx);
        container.deploy(app("conference"));
        let _ = rx.try_recv();

        container.get("conference").unwrap().add_listener("audit");
        assert_eq!(
            rx.try_recv().unwrap(),
            ContainerEvent::ListenerAdded {
                application: "conference".into(),
                listener: "audit".into(),
            }
        );
    }
}
