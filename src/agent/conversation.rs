//! Conversation message history.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::ModelMessage;

/// Message history of one agent.
///
/// Cloning yields another handle to the same history. The lock is only held
/// to copy or append, never across an await.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Arc<Mutex<Vec<ModelMessage>>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current history.
    pub fn snapshot(&self) -> Vec<ModelMessage> {
        self.lock().clone()
    }

    /// Append a completed turn: the user message and everything the model
    /// and tools produced in reply.
    pub fn record_turn(&self, user: ModelMessage, replies: Vec<ModelMessage>) {
        let mut messages = self.lock();
        messages.push(user);
        messages.extend(replies);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ModelMessage>> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }
}
