//! Blocking coordinator and per-connection transaction state.
//!
//! Parked readers (BLPOP, XREAD BLOCK) are queued here per key, in FIFO
//! order. A list waiter carries a one-shot result slot: the writer that
//! satisfies it pops the element and sends it through the slot before the
//! mutation becomes visible to anyone else, so delivery is at-most-once and
//! the element never reappears in the list. Stream waiters only need a wake
//! signal; the woken reader re-reads entries past its cursor.
//!
//! The coordinator lock is always acquired after the keyspace lock.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::commands::CommandHandler;

#[derive(Error, Debug, PartialEq)]
pub enum StateError {
    #[error("MULTI calls can not be nested")]
    TransactionAlreadyStarted,
    #[error("no transaction started")]
    TransactionNotStarted,
}

/// Result slot for one parked BLPOP.
///
/// A waiter blocking on several keys registers the same slot under each key;
/// whichever write arrives first takes the sender, so later writes see an
/// empty slot and skip the waiter.
pub type ListResultSlot = Arc<Mutex<Option<oneshot::Sender<(String, String)>>>>;

#[derive(Debug)]
pub struct ListWaiter {
    pub client_address: String,
    pub slot: ListResultSlot,
}

impl ListWaiter {
    pub fn new(client_address: &str) -> (Self, oneshot::Receiver<(String, String)>) {
        let (sender, receiver) = oneshot::channel();

        (
            ListWaiter {
                client_address: client_address.to_string(),
                slot: Arc::new(Mutex::new(Some(sender))),
            },
            receiver,
        )
    }
}

#[derive(Debug)]
pub struct StreamWaiter {
    pub client_address: String,
    pub wake: mpsc::Sender<()>,
}

#[derive(Debug, Default, PartialEq)]
pub struct Transaction {
    pub queued: Vec<CommandHandler>,
    pub error_sticky: bool,
}

#[derive(Debug, Default)]
pub struct State {
    list_waiters: HashMap<String, VecDeque<ListWaiter>>,
    stream_waiters: HashMap<String, VecDeque<StreamWaiter>>,
    transactions: HashMap<String, Transaction>,
}

impl State {
    pub fn new() -> Self {
        State::default()
    }

    pub fn add_list_waiter(&mut self, key: &str, waiter: ListWaiter) {
        self.list_waiters
            .entry(key.to_string())
            .or_default()
            .push_back(waiter);
    }

    /// Hands list elements to parked waiters in FIFO order, returning how
    /// many elements were delivered.
    ///
    /// Called by a pushing writer while it still holds the keyspace lock.
    /// Each served waiter receives `(key, element)` through its slot and is
    /// dequeued; waiters whose slot is already taken (served via another key
    /// or timed out mid-delivery) are dropped without consuming an element.
    pub fn drain_list_waiters(&mut self, key: &str, list: &mut VecDeque<String>) -> usize {
        let mut delivered = 0;

        let Some(waiters) = self.list_waiters.get_mut(key) else {
            return delivered;
        };

        while !list.is_empty() {
            let Some(waiter) = waiters.pop_front() else {
                break;
            };

            let Some(sender) = waiter.slot.lock().ok().and_then(|mut slot| slot.take()) else {
                continue;
            };

            let Some(element) = list.pop_front() else {
                break;
            };

            match sender.send((key.to_string(), element)) {
                Ok(()) => delivered += 1,
                Err((_, element)) => {
                    // Receiver gave up between registration and delivery;
                    // the element goes back to the head for the next waiter.
                    list.push_front(element);
                }
            }
        }

        if waiters.is_empty() {
            self.list_waiters.remove(key);
        }

        delivered
    }

    pub fn remove_list_waiter(&mut self, key: &str, client_address: &str) {
        if let Some(waiters) = self.list_waiters.get_mut(key) {
            waiters.retain(|waiter| waiter.client_address != client_address);

            if waiters.is_empty() {
                self.list_waiters.remove(key);
            }
        }
    }

    pub fn add_stream_waiter(&mut self, key: &str, waiter: StreamWaiter) {
        self.stream_waiters
            .entry(key.to_string())
            .or_default()
            .push_back(waiter);
    }

    /// Wakes every reader parked on `key` after a stream append commits.
    pub fn wake_stream_waiters(&mut self, key: &str) {
        if let Some(waiters) = self.stream_waiters.remove(key) {
            for waiter in waiters {
                let _ = waiter.wake.try_send(());
            }
        }
    }

    pub fn remove_stream_waiter(&mut self, key: &str, client_address: &str) {
        if let Some(waiters) = self.stream_waiters.get_mut(key) {
            waiters.retain(|waiter| waiter.client_address != client_address);

            if waiters.is_empty() {
                self.stream_waiters.remove(key);
            }
        }
    }

    pub fn start_transaction(&mut self, client_address: &str) -> Result<(), StateError> {
        if self.transactions.contains_key(client_address) {
            return Err(StateError::TransactionAlreadyStarted);
        }

        self.transactions
            .insert(client_address.to_string(), Transaction::default());

        Ok(())
    }

    pub fn in_transaction(&self, client_address: &str) -> bool {
        self.transactions.contains_key(client_address)
    }

    pub fn queue_command(
        &mut self,
        client_address: &str,
        command: CommandHandler,
    ) -> Result<(), StateError> {
        let transaction = self
            .transactions
            .get_mut(client_address)
            .ok_or(StateError::TransactionNotStarted)?;

        transaction.queued.push(command);

        Ok(())
    }

    /// Records a queue-time validation failure; EXEC will abort the batch.
    pub fn mark_transaction_error(&mut self, client_address: &str) -> Result<(), StateError> {
        let transaction = self
            .transactions
            .get_mut(client_address)
            .ok_or(StateError::TransactionNotStarted)?;

        transaction.error_sticky = true;

        Ok(())
    }

    pub fn take_transaction(&mut self, client_address: &str) -> Result<Transaction, StateError> {
        self.transactions
            .remove(client_address)
            .ok_or(StateError::TransactionNotStarted)
    }

    /// Unwinds everything a disconnecting client left behind.
    pub fn remove_client(&mut self, client_address: &str) {
        self.list_waiters.retain(|_, waiters| {
            waiters.retain(|waiter| waiter.client_address != client_address);
            !waiters.is_empty()
        });
        self.stream_waiters.retain(|_, waiters| {
            waiters.retain(|waiter| waiter.client_address != client_address);
            !waiters.is_empty()
        });
        self.transactions.remove(client_address);
    }
}
