// Group membership and fan-out for realtime connections.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::ids::ConversationId;

/// Identifies one live connection inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl ConnId {
    pub fn generate() -> Self {
        Self(rand::random())
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Serialized frame handed to connections. Shared, not copied, per member.
pub type Frame = Arc<str>;

/// Broadcast groups keyed by conversation. A connection only ever talks to
/// the broker, never to other connections.
pub trait Broker: Send + Sync {
    /// Register `conn` in `group`; frames for it arrive on the returned queue.
    fn join(&self, group: &ConversationId, conn: ConnId) -> mpsc::UnboundedReceiver<Frame>;

    /// Once this returns, no later publish reaches `conn`.
    fn leave(&self, group: &ConversationId, conn: ConnId);

    /// Deliver to every current member. Returns how many queues took it.
    fn publish(&self, group: &ConversationId, frame: Frame) -> usize;

    /// Deliver to one member only.
    fn send_to(&self, group: &ConversationId, conn: ConnId, frame: Frame) -> bool;

    fn member_count(&self, group: &ConversationId) -> usize;
}

pub type DynBroker = Arc<dyn Broker>;

/// In-process broker: group -> (connection -> queue).
#[derive(Default)]
pub struct LocalBroker {
    groups: Mutex<HashMap<ConversationId, HashMap<ConnId, mpsc::UnboundedSender<Frame>>>>,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_groups<R>(
        &self,
        f: impl FnOnce(&mut HashMap<ConversationId, HashMap<ConnId, mpsc::UnboundedSender<Frame>>>) -> R,
    ) -> R {
        // Every update is a single map operation, so a poisoned lock is
        // still consistent.
        let mut groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut groups)
    }
}

impl Broker for LocalBroker {
    fn join(&self, group: &ConversationId, conn: ConnId) -> mpsc::UnboundedReceiver<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.with_groups(|groups| {
            groups.entry(group.clone()).or_default().insert(conn, tx);
        });
        tracing::debug!("Connection {} joined {}", conn, group);
        rx
    }

    fn leave(&self, group: &ConversationId, conn: ConnId) {
        self.with_groups(|groups| {
            if let Some(members) = groups.get_mut(group) {
                members.remove(&conn);
                if members.is_empty() {
                    groups.remove(group);
                }
            }
        });
        tracing::debug!("Connection {} left {}", conn, group);
    }

    fn publish(&self, group: &ConversationId, frame: Frame) -> usize {
        self.with_groups(|groups| match groups.get_mut(group) {
            Some(members) => {
                // Drop members whose receiving side is gone
                members.retain(|_, tx| tx.send(frame.clone()).is_ok());
                members.len()
            }
            None => 0,
        })
    }

    fn send_to(&self, group: &ConversationId, conn: ConnId, frame: Frame) -> bool {
        self.with_groups(|groups| {
            groups
                .get(group)
                .and_then(|members| members.get(&conn))
                .map(|tx| tx.send(frame).is_ok())
                .unwrap_or(false)
        })
    }

    fn member_count(&self, group: &ConversationId) -> usize {
        self.with_groups(|groups| groups.get(group).map(|m| m.len()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(s: &str) -> Frame {
        Arc::from(s)
    }

    #[test]
    fn publish_reaches_every_member_of_the_group_only() {
        let broker = LocalBroker::new();
        let group = ConversationId::new("c1");
        let other = ConversationId::new("c2");

        let mut a = broker.join(&group, ConnId::generate());
        let mut b = broker.join(&group, ConnId::generate());
        let mut outsider = broker.join(&other, ConnId::generate());

        assert_eq!(broker.publish(&group, frame("hi")), 2);
        assert_eq!(a.try_recv().unwrap().as_ref(), "hi");
        assert_eq!(b.try_recv().unwrap().as_ref(), "hi");
        assert!(outsider.try_recv().is_err());
    }

    #[test]
    fn leave_stops_delivery() {
        let broker = LocalBroker::new();
        let group = ConversationId::new("c1");
        let conn = ConnId::generate();
        let mut rx = broker.join(&group, conn);

        broker.leave(&group, conn);
        assert_eq!(broker.publish(&group, frame("late")), 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(broker.member_count(&group), 0);
    }

    #[test]
    fn send_to_targets_one_connection() {
        let broker = LocalBroker::new();
        let group = ConversationId::new("c1");
        let me = ConnId::generate();
        let mut mine = broker.join(&group, me);
        let mut theirs = broker.join(&group, ConnId::generate());

        assert!(broker.send_to(&group, me, frame("only you")));
        assert_eq!(mine.try_recv().unwrap().as_ref(), "only you");
        assert!(theirs.try_recv().is_err());
        assert!(!broker.send_to(&ConversationId::new("c9"), me, frame("x")));
    }

    #[test]
    fn dropped_receivers_are_pruned_on_publish() {
        let broker = LocalBroker::new();
        let group = ConversationId::new("c1");
        let _kept = broker.join(&group, ConnId::generate());
        drop(broker.join(&group, ConnId::generate()));

        assert_eq!(broker.publish(&group, frame("x")), 1);
        assert_eq!(broker.member_count(&group), 1);
    }

    #[test]
    fn publish_order_is_preserved_per_member() {
        let broker = LocalBroker::new();
        let group = ConversationId::new("c1");
        let mut rx = broker.join(&group, ConnId::generate());

        for i in 0..5 {
            broker.publish(&group, frame(&i.to_string()));
        }
        let received: Vec<String> = (0..5).map(|_| rx.try_recv().unwrap().to_string()).collect();
        assert_eq!(received, vec!["0", "1", "2", "3", "4"]);
    }
}
