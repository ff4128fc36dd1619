//! Real-time fan-out.
//!
//! Topics are subscription rooms: one per patient, one global alert room,
//! and one per user for point-to-point delivery. Events are pushed to
//! every connection currently in the room, best effort, in publish order
//! per subscriber. Nothing is buffered or replayed for late subscribers.

use dashmap::DashMap;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};
use uuid::Uuid;

pub const VITAL_UPDATE: &str = "vital:update";
pub const ALERT_NEW: &str = "alert:new";
pub const ALERT_ACKNOWLEDGED: &str = "alert:acknowledged";
pub const MEDICATION_REMINDER: &str = "medication:reminder";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Patient(i64),
    Alerts,
    User(i64),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Patient(id) => write!(f, "patient:{id}"),
            Topic::Alerts => f.write_str("alerts:all"),
            Topic::User(id) => write!(f, "user:{id}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutboundEvent {
    pub event: String,
    pub payload: Value,
}

/// A live subscriber connection. The transport layer owns the receiving
/// half and forwards events onto the wire.
pub struct Connection {
    id: Uuid,
    tx: UnboundedSender<OutboundEvent>,
}

impl Connection {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Concurrent topic registry. Subscription changes and publishes may race
/// from request handlers and the scheduler; the sharded map keeps
/// membership updates linearizable per topic.
#[derive(Default)]
pub struct Broadcaster {
    topics: DashMap<Topic, HashMap<Uuid, UnboundedSender<OutboundEvent>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connection and hand back its event stream.
    pub fn connect(&self) -> (Connection, UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection { id: Uuid::new_v4(), tx };
        debug!(connection = %conn.id, "client connected");
        (conn, rx)
    }

    /// Idempotent: subscribing twice to the same topic is a no-op.
    pub fn subscribe(&self, conn: &Connection, topic: Topic) {
        self.topics
            .entry(topic)
            .or_default()
            .insert(conn.id, conn.tx.clone());
        info!(connection = %conn.id, topic = %topic, "subscribed");
    }

    pub fn unsubscribe(&self, conn: &Connection, topic: Topic) {
        if let Some(mut subs) = self.topics.get_mut(&topic) {
            subs.remove(&conn.id);
        }
        info!(connection = %conn.id, topic = %topic, "unsubscribed");
    }

    /// Remove a connection from every topic it belongs to.
    pub fn disconnect(&self, conn_id: Uuid) {
        for mut entry in self.topics.iter_mut() {
            entry.value_mut().remove(&conn_id);
        }
        debug!(connection = %conn_id, "client disconnected");
    }

    /// Deliver an event to every current subscriber of a topic. Returns
    /// the delivery count; connections whose receiving half is gone are
    /// dropped from the topic on the way.
    pub fn publish(&self, topic: Topic, event: &str, payload: Value) -> usize {
        let Some(mut subs) = self.topics.get_mut(&topic) else {
            return 0;
        };
        let before = subs.len();
        subs.retain(|_, tx| {
            tx.send(OutboundEvent { event: event.to_string(), payload: payload.clone() })
                .is_ok()
        });
        let delivered = subs.len();
        if delivered < before {
            debug!(topic = %topic, dropped = before - delivered, "pruned dead subscribers");
        }
        delivered
    }

    pub fn emit_vital_update(&self, patient_id: i64, payload: Value) {
        self.publish(Topic::Patient(patient_id), VITAL_UPDATE, payload);
    }

    /// Patient-scoped alerts also land in the global room, so a dashboard
    /// and a patient view both see them without coordinating.
    pub fn emit_alert(&self, patient_id: i64, payload: Value) {
        self.publish(Topic::Patient(patient_id), ALERT_NEW, payload.clone());
        self.publish(Topic::Alerts, ALERT_NEW, payload);
    }

    pub fn emit_alert_acknowledged(&self, alert_id: i64, acknowledged_by: i64) {
        self.publish(
            Topic::Alerts,
            ALERT_ACKNOWLEDGED,
            json!({ "alert_id": alert_id, "acknowledged_by": acknowledged_by }),
        );
    }

    pub fn emit_medication_reminder(&self, patient_id: i64, payload: Value) {
        self.publish(Topic::Patient(patient_id), MEDICATION_REMINDER, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_only_to_current_subscribers() {
        let bus = Broadcaster::new();
        let (a, mut rx_a) = bus.connect();
        let (_b, mut rx_b) = bus.connect();

        bus.subscribe(&a, Topic::Patient(7));
        let delivered = bus.publish(Topic::Patient(7), VITAL_UPDATE, json!({"heart_rate": 72}));
        assert_eq!(delivered, 1);

        let event = rx_a.try_recv().unwrap();
        assert_eq!(event.event, VITAL_UPDATE);
        assert_eq!(event.payload["heart_rate"], 72);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());

        bus.disconnect(a.id());
        assert_eq!(bus.publish(Topic::Patient(7), VITAL_UPDATE, json!({})), 0);
    }

    #[test]
    fn publish_order_is_preserved_per_subscriber() {
        let bus = Broadcaster::new();
        let (a, mut rx) = bus.connect();
        bus.subscribe(&a, Topic::Patient(1));

        for i in 0..5 {
            bus.publish(Topic::Patient(1), VITAL_UPDATE, json!({ "seq": i }));
        }
        for i in 0..5 {
            assert_eq!(rx.try_recv().unwrap().payload["seq"], i);
        }
    }

    #[test]
    fn alerts_are_dually_delivered() {
        let bus = Broadcaster::new();
        let (patient_view, mut rx_patient) = bus.connect();
        let (dashboard, mut rx_dash) = bus.connect();
        bus.subscribe(&patient_view, Topic::Patient(5));
        bus.subscribe(&dashboard, Topic::Alerts);

        bus.emit_alert(5, json!({"severity": "critical"}));
        assert_eq!(rx_patient.try_recv().unwrap().event, ALERT_NEW);
        assert_eq!(rx_dash.try_recv().unwrap().event, ALERT_NEW);

        // Acknowledgements only reach the global room.
        bus.emit_alert_acknowledged(3, 42);
        assert!(rx_patient.try_recv().is_err());
        let ack = rx_dash.try_recv().unwrap();
        assert_eq!(ack.event, ALERT_ACKNOWLEDGED);
        assert_eq!(ack.payload["alert_id"], 3);
    }

    #[test]
    fn subscribe_and_unsubscribe_are_idempotent() {
        let bus = Broadcaster::new();
        let (a, mut rx) = bus.connect();
        bus.subscribe(&a, Topic::Alerts);
        bus.subscribe(&a, Topic::Alerts);
        assert_eq!(bus.publish(Topic::Alerts, ALERT_NEW, json!({})), 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        bus.unsubscribe(&a, Topic::Alerts);
        bus.unsubscribe(&a, Topic::Alerts);
        assert_eq!(bus.publish(Topic::Alerts, ALERT_NEW, json!({})), 0);
    }

    #[test]
    fn medication_reminders_stay_patient_scoped() {
        let bus = Broadcaster::new();
        let (a, mut rx_a) = bus.connect();
        let (dashboard, mut rx_dash) = bus.connect();
        bus.subscribe(&a, Topic::Patient(4));
        bus.subscribe(&dashboard, Topic::Alerts);

        bus.emit_medication_reminder(4, json!({"medication": "Metformin"}));
        assert_eq!(rx_a.try_recv().unwrap().event, MEDICATION_REMINDER);
        assert!(rx_dash.try_recv().is_err());
    }

    #[test]
    fn user_topic_is_point_to_point() {
        let bus = Broadcaster::new();
        let (a, mut rx_a) = bus.connect();
        let (b, mut rx_b) = bus.connect();
        bus.subscribe(&a, Topic::User(1));
        bus.subscribe(&b, Topic::User(2));

        bus.publish(Topic::User(1), "chat:message", json!({"text": "hi"}));
        assert_eq!(rx_a.try_recv().unwrap().payload["text"], "hi");
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn dropped_receiver_is_pruned_on_publish() {
        let bus = Broadcaster::new();
        let (a, rx) = bus.connect();
        bus.subscribe(&a, Topic::Patient(9));
        drop(rx);
        assert_eq!(bus.publish(Topic::Patient(9), VITAL_UPDATE, json!({})), 0);
    }
}
