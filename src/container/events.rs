//! Fire-and-forget notifications for container listeners.

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Something an external dispatcher may want to hear about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ContainerEvent {
    Deployed { application: String, deployment_id: Uuid },
    Undeployed { application: String, deployment_id: Uuid },
    ListenerAdded { application: String, listener: String },
    ListenerRemoved { application: String, listener: String },
    MappingAdded { application: String, handler: String },
    MappingRemoved { application: String, handler: String },
}

pub type EventSink = mpsc::UnboundedSender<ContainerEvent>;
pub type EventStream = mpsc::UnboundedReceiver<ContainerEvent>;

/// Create a connected sink/stream pair.
pub fn channel() -> (EventSink, EventStream) {
    mpsc::unbounded_channel()
}

/// Send without waiting; a closed receiver is not an error.
pub(crate) fn notify(sink: Option<&EventSink>, event: ContainerEvent) {
    if let Some(sink) = sink {
        if sink.send(event).is_err() {
            tracing::trace!("Container event receiver closed, dropping event");
        }
    }
}

/// Log every event until all sinks are dropped.
///
/// The task resolves to the number of events seen, so shutdown can await it
/// after releasing the container and know the final events were written.
pub fn drain_events(mut stream: EventStream) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut seen = 0;
        while let Some(event) = stream.recv().await {
            tracing::info!(?event, "Container event");
            seen += 1;
        }
        seen
    })
}
