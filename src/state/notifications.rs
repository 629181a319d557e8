use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{
    broadcast,
    mpsc::{self, error::SendTimeoutError},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::stream::Notification,
    state::party::{PartyId, UserId},
};

const PRESENCE_CAPACITY: usize = 1;

struct PresenceSlot {
    session: Uuid,
    sender: mpsc::Sender<Notification>,
}

/// Receiving half of a user's presence slot.
#[derive(Debug)]
pub struct PresenceSubscription {
    /// Identifies this slot, so a replaced stream cannot tear down its successor.
    pub session: Uuid,
    pub receiver: mpsc::Receiver<Notification>,
}

/// Live delivery of presence and party events.
///
/// Presence keeps a single slot per user; opening a new one replaces the previous
/// stream. Party slots are broadcast channels shared by every viewer of the party.
/// Nothing is queued for absent consumers.
pub struct NotificationHub {
    presence: DashMap<UserId, PresenceSlot>,
    parties: DashMap<PartyId, broadcast::Sender<Notification>>,
    push_timeout: Duration,
    party_capacity: usize,
}

impl NotificationHub {
    pub fn new(push_timeout: Duration, party_capacity: usize) -> Self {
        Self {
            presence: DashMap::new(),
            parties: DashMap::new(),
            push_timeout,
            party_capacity: party_capacity.max(1),
        }
    }

    /// Open the presence slot of `user_id`, closing any stream that held it before.
    pub fn open_presence(&self, user_id: &str) -> PresenceSubscription {
        let (sender, receiver) = mpsc::channel(PRESENCE_CAPACITY);
        let session = Uuid::new_v4();
        if self
            .presence
            .insert(user_id.to_owned(), PresenceSlot { session, sender })
            .is_some()
        {
            debug!(user_id, "replacing presence stream");
        }
        PresenceSubscription { session, receiver }
    }

    /// Close the presence slot of `user_id`, ending its stream.
    pub fn close_presence(&self, user_id: &str) -> bool {
        self.presence.remove(user_id).is_some()
    }

    /// Drop the slot of a disconnected stream, unless it was already replaced.
    pub fn release_presence(&self, user_id: &str, session: Uuid) {
        self.presence
            .remove_if(user_id, |_, slot| slot.session == session);
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.presence.contains_key(user_id)
    }

    /// Push into the presence slot of `user_id`, waiting at most the configured timeout.
    ///
    /// Returns whether the notification was delivered.
    pub async fn push_presence(&self, user_id: &str, notification: Notification) -> bool {
        let (session, sender) = match self.presence.get(user_id) {
            Some(slot) => (slot.session, slot.sender.clone()),
            None => return false,
        };

        match sender.send_timeout(notification, self.push_timeout).await {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(dropped)) => {
                warn!(
                    user_id,
                    message = %dropped.message,
                    "presence slot full, dropping notification"
                );
                false
            }
            Err(SendTimeoutError::Closed(_)) => {
                self.release_presence(user_id, session);
                false
            }
        }
    }

    /// Subscribe to the party slot, opening it on first use.
    pub fn attach_party(&self, party_id: PartyId) -> broadcast::Receiver<Notification> {
        self.parties
            .entry(party_id)
            .or_insert_with(|| broadcast::channel(self.party_capacity).0)
            .subscribe()
    }

    /// Send to every current viewer of the party; a party nobody watches is skipped.
    pub fn publish_party(&self, party_id: PartyId, notification: Notification) {
        if let Some(sender) = self.parties.get(&party_id) {
            let _ = sender.send(notification);
        }
    }

    /// Announce the end of the party and close its slot.
    pub fn close_party(&self, party_id: PartyId) {
        if let Some((_, sender)) = self.parties.remove(&party_id) {
            let _ = sender.send(Notification::party_over(party_id));
        }
    }

    pub fn viewer_count(&self, party_id: PartyId) -> usize {
        self.parties
            .get(&party_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::error::RecvError;

    use super::*;

    fn hub() -> NotificationHub {
        NotificationHub::new(Duration::from_millis(20), 1)
    }

    #[tokio::test]
    async fn opening_a_second_presence_slot_ends_the_first() {
        let hub = hub();
        let mut first = hub.open_presence("u1");
        let mut second = hub.open_presence("u1");

        assert!(first.receiver.recv().await.is_none());
        assert!(hub.push_presence("u1", Notification::online("u2")).await);
        assert_eq!(
            second.receiver.recv().await,
            Some(Notification::online("u2"))
        );
    }

    #[tokio::test]
    async fn pushes_to_absent_users_are_dropped() {
        let hub = hub();
        assert!(!hub.push_presence("ghost", Notification::online("u2")).await);
    }

    #[tokio::test]
    async fn a_full_presence_slot_does_not_block() {
        let hub = hub();
        let mut subscription = hub.open_presence("u1");

        assert!(hub.push_presence("u1", Notification::online("u2")).await);
        assert!(!hub.push_presence("u1", Notification::online("u3")).await);
        assert_eq!(
            subscription.receiver.recv().await,
            Some(Notification::online("u2"))
        );
    }

    #[tokio::test]
    async fn releasing_a_replaced_session_keeps_the_new_slot() {
        let hub = hub();
        let stale = hub.open_presence("u1");
        let _current = hub.open_presence("u1");

        hub.release_presence("u1", stale.session);
        assert!(hub.is_online("u1"));

        assert!(hub.close_presence("u1"));
        assert!(!hub.is_online("u1"));
    }

    #[tokio::test]
    async fn party_events_reach_every_viewer_until_teardown() {
        let hub = hub();
        let party_id = Uuid::new_v4();
        let mut creator = hub.attach_party(party_id);
        let mut player = hub.attach_party(party_id);
        assert_eq!(hub.viewer_count(party_id), 2);

        hub.publish_party(party_id, Notification::joined("u2"));
        assert_eq!(creator.recv().await.unwrap(), Notification::joined("u2"));
        assert_eq!(player.recv().await.unwrap(), Notification::joined("u2"));

        hub.close_party(party_id);
        assert_eq!(
            creator.recv().await.unwrap(),
            Notification::party_over(party_id)
        );
        assert!(matches!(creator.recv().await, Err(RecvError::Closed)));
        assert_eq!(hub.viewer_count(party_id), 0);
    }
}
