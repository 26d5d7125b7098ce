// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process change feed.
//!
//! Stores publish one [`ChangeEvent`] per committed row write. Subscribers
//! receive events for the tables and event types they asked for, in the
//! order they were published. Delivery is at-least-once from the
//! subscriber's point of view: a subscriber that falls too far behind is
//! told how many events it missed and must refetch.

use crate::models::{Donation, PickupEvent, Profile, UserRole};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Buffered events per subscriber before it is considered lagging.
pub(crate) const FEED_CAPACITY: usize = 1024;

/// Watched tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Donations,
    PickupEvents,
    Profiles,
    UserRoles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Insert,
    Update,
    Delete,
}

impl EventType {
    pub const ALL: [EventType; 3] = [EventType::Insert, EventType::Update, EventType::Delete];
}

/// A row image carried by a change event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Donation(Donation),
    PickupEvent(PickupEvent),
    Profile(Profile),
    UserRole(UserRole),
}

impl Record {
    pub fn table(&self) -> Table {
        match self {
            Record::Donation(_) => Table::Donations,
            Record::PickupEvent(_) => Table::PickupEvents,
            Record::Profile(_) => Table::Profiles,
            Record::UserRole(_) => Table::UserRoles,
        }
    }
}

/// One row-level change: `{eventType, new, old}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub event_type: EventType,
    pub new: Option<Record>,
    pub old: Option<Record>,
}

impl ChangeEvent {
    pub fn insert(record: Record) -> Self {
        Self {
            table: record.table(),
            event_type: EventType::Insert,
            new: Some(record),
            old: None,
        }
    }

    pub fn update(old: Record, new: Record) -> Self {
        Self {
            table: new.table(),
            event_type: EventType::Update,
            new: Some(new),
            old: Some(old),
        }
    }

    pub fn new_donation(&self) -> Option<&Donation> {
        match &self.new {
            Some(Record::Donation(d)) => Some(d),
            _ => None,
        }
    }

    pub fn old_donation(&self) -> Option<&Donation> {
        match &self.old {
            Some(Record::Donation(d)) => Some(d),
            _ => None,
        }
    }

    pub fn new_pickup_event(&self) -> Option<&PickupEvent> {
        match &self.new {
            Some(Record::PickupEvent(e)) => Some(e),
            _ => None,
        }
    }
}

/// What a subscription yields.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Event(ChangeEvent),
    /// The subscriber lagged and this many events were dropped.
    Missed(u64),
}

/// Publish/subscribe hub shared by the record store and its readers.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    /// Publish a committed change. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::trace!(table = ?event.table, event_type = ?event.event_type, "Publishing change");
        let _ = self.sender.send(event);
    }

    /// Subscribe to changes on `tables` restricted to `event_types`.
    pub fn subscribe(&self, tables: &[Table], event_types: &[EventType]) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            tables: tables.to_vec(),
            event_types: event_types.to_vec(),
            token: CancellationToken::new(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A live subscription. Dropping it, or cancelling its token, releases
/// the channel.
pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    tables: Vec<Table>,
    event_types: Vec<EventType>,
    token: CancellationToken,
}

impl Subscription {
    /// Token that ends this subscription when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Explicitly release the subscription.
    pub fn unsubscribe(self) {
        self.token.cancel();
    }

    fn wants(&self, event: &ChangeEvent) -> bool {
        self.tables.contains(&event.table) && self.event_types.contains(&event.event_type)
    }

    /// Wait for the next matching delivery.
    ///
    /// Returns `None` once cancelled or when the feed is gone.
    pub async fn next(&mut self) -> Option<Delivery> {
        loop {
            let received = tokio::select! {
                biased;
                _ = self.token.cancelled() => return None,
                received = self.receiver.recv() => received,
            };

            match received {
                Ok(event) if self.wants(&event) => return Some(Delivery::Event(event)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Change feed subscriber lagged");
                    return Some(Delivery::Missed(missed));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
