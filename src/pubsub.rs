//! Publish/subscribe channel table.
//!
//! Maps each channel to its subscribers' shared socket writers, and each
//! client to the set of channels it joined. PUBLISH clones the writer
//! handles out of the table and performs the socket writes with only the
//! peer's writer lock held.

use std::collections::{HashMap, HashSet};

use crate::connection::SharedWriter;

#[derive(Default)]
pub struct PubSub {
    channels: HashMap<String, HashMap<String, SharedWriter>>,
    subscriptions: HashMap<String, HashSet<String>>,
}

impl PubSub {
    pub fn new() -> Self {
        PubSub::default()
    }

    /// Adds the client to `channel`, returning how many channels the client
    /// is now subscribed to.
    pub fn subscribe(&mut self, client_address: &str, channel: &str, writer: SharedWriter) -> usize {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(client_address.to_string(), writer);

        let subscriptions = self.subscriptions.entry(client_address.to_string()).or_default();
        subscriptions.insert(channel.to_string());

        subscriptions.len()
    }

    /// Removes the client from `channel`, returning the remaining
    /// subscription count for the client.
    pub fn unsubscribe(&mut self, client_address: &str, channel: &str) -> usize {
        if let Some(subscribers) = self.channels.get_mut(channel) {
            subscribers.remove(client_address);

            if subscribers.is_empty() {
                self.channels.remove(channel);
            }
        }

        match self.subscriptions.get_mut(client_address) {
            Some(subscriptions) => {
                subscriptions.remove(channel);

                if subscriptions.is_empty() {
                    self.subscriptions.remove(client_address);
                    0
                } else {
                    subscriptions.len()
                }
            }
            None => 0,
        }
    }

    /// The channels the client currently belongs to.
    pub fn subscribed_channels(&self, client_address: &str) -> Vec<String> {
        self.subscriptions
            .get(client_address)
            .map(|channels| channels.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether the client is in subscriber mode (restricted command set).
    pub fn is_subscribed(&self, client_address: &str) -> bool {
        self.subscriptions.contains_key(client_address)
    }

    /// Clones the writer handles of every subscriber of `channel`.
    pub fn subscribers(&self, channel: &str) -> Vec<SharedWriter> {
        self.channels
            .get(channel)
            .map(|subscribers| subscribers.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Drops every registration a disconnecting client left behind.
    pub fn remove_client(&mut self, client_address: &str) {
        if let Some(channels) = self.subscriptions.remove(client_address) {
            for channel in channels {
                if let Some(subscribers) = self.channels.get_mut(&channel) {
                    subscribers.remove(client_address);

                    if subscribers.is_empty() {
                        self.channels.remove(&channel);
                    }
                }
            }
        }
    }
}
