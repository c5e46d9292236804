//! Activity notifications
//!
//! Every non-ACL mutation produces a [`Notification`] naming the public
//! target URL, the acting agent, the activity type, and the resource's LDP
//! types. Delivery is best-effort: sinks must not fail the request.

use crate::rdf::NamedNode;
use crate::services::EventService;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

/// The activity performed on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityType {
    /// as:Create
    Create,
    /// as:Update
    Update,
    /// as:Delete
    Delete,
}

impl ActivityType {
    /// The ActivityStreams IRI
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::Create => crate::vocab::activitystreams::CREATE,
            ActivityType::Update => crate::vocab::activitystreams::UPDATE,
            ActivityType::Delete => crate::vocab::activitystreams::DELETE,
        }
    }

    /// The short ActivityStreams term
    pub fn term(self) -> &'static str {
        match self {
            ActivityType::Create => "Create",
            ActivityType::Update => "Update",
            ActivityType::Delete => "Delete",
        }
    }
}

/// One activity notification.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Public URL of the affected resource; containers carry a trailing slash
    pub target: String,
    /// The acting agent
    pub agent: NamedNode,
    /// What happened
    pub activity: ActivityType,
    /// LDP type IRIs of the resource
    pub resource_types: Vec<String>,
    /// When the notification was constructed
    pub published: DateTime<Utc>,
}

impl Notification {
    /// Build a notification stamped with the current instant.
    pub fn new(
        target: impl Into<String>,
        agent: NamedNode,
        activity: ActivityType,
        resource_types: Vec<String>,
    ) -> Self {
        Self {
            target: target.into(),
            agent,
            activity,
            resource_types,
            published: Utc::now(),
        }
    }

    /// Serialize as an ActivityStreams 2.0 JSON document.
    pub fn to_json(&self) -> Value {
        json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": format!("urn:uuid:{}", Uuid::new_v4()),
            "type": ["Activity", self.activity.term()],
            "actor": [self.agent.as_str()],
            "object": {
                "id": self.target,
                "type": self.resource_types,
            },
            "published": self.published.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}

/// Sink that logs every notification.
#[derive(Debug, Default)]
pub struct LoggingEventService;

impl EventService for LoggingEventService {
    fn emit(&self, notification: Notification) {
        info!(
            target = %notification.target,
            activity = notification.activity.term(),
            "activity notification"
        );
        debug!("notification body: {}", notification.to_json());
    }
}

/// Sink that fans notifications out over a broadcast channel.
///
/// Downstream transports subscribe and forward; a lagging or absent
/// subscriber never blocks the request path.
pub struct BroadcastEventService {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastEventService {
    /// Create a sink with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to the notification stream
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl EventService for BroadcastEventService {
    fn emit(&self, notification: Notification) {
        // Err means no live subscriber, which is fine.
        let _ = self.sender.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::ldp;

    #[test]
    fn test_notification_json_shape() {
        let notification = Notification::new(
            "http://localhost:8080/c1/",
            NamedNode::new("http://www.trellisldp.org/ns/trellis#AnonymousAgent").unwrap(),
            ActivityType::Update,
            vec![ldp::BASIC_CONTAINER.to_string(), ldp::CONTAINER.to_string()],
        );
        let body = notification.to_json();
        assert_eq!(body["object"]["id"], "http://localhost:8080/c1/");
        assert_eq!(body["type"][1], "Update");
        assert_eq!(body["object"]["type"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_delivery() {
        let service = BroadcastEventService::new(8);
        let mut receiver = service.subscribe();
        service.emit(Notification::new(
            "http://localhost:8080/r",
            NamedNode::new("http://example.org/agent").unwrap(),
            ActivityType::Create,
            vec![],
        ));
        let received = receiver.recv().await.unwrap();
        assert_eq!(received.activity, ActivityType::Create);
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let service = BroadcastEventService::new(8);
        service.emit(Notification::new(
            "http://localhost:8080/r",
            NamedNode::new("http://example.org/agent").unwrap(),
            ActivityType::Delete,
            vec![],
        ));
    }
}
