//! Append-only conversation log.
//!
//! Messages are never edited or removed. A regenerated reply is a new
//! message. Ids are UUID v4 and timestamps strictly increase: a clock
//! reading that does not advance past the previous message is bumped by
//! one microsecond.
//!
//! Streaming replies are accumulated in a [`StreamingReply`] outside the
//! log and committed as one message when complete, so readers never see a
//! partially typed entry.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{Message, Reference, Role};

/// Source of timestamps. Swappable for tests.
pub type Clock = fn() -> DateTime<Utc>;

/// Ordered, append-only message history.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    messages: Vec<Message>,
    clock: Clock,
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            messages: Vec::new(),
            clock,
        }
    }

    pub fn append_user(&mut self, text: impl Into<String>) -> &Message {
        self.push(Role::User, text.into(), Vec::new(), None)
    }

    /// Append an assistant message, optionally answering `in_reply_to`.
    pub fn append_assistant(
        &mut self,
        text: impl Into<String>,
        references: Vec<Reference>,
        in_reply_to: Option<String>,
    ) -> &Message {
        self.push(Role::Assistant, text.into(), references, in_reply_to)
    }

    /// Append a finished streaming reply as one assistant message.
    pub fn commit_stream(&mut self, reply: StreamingReply) -> &Message {
        self.push(
            Role::Assistant,
            reply.text,
            reply.references,
            reply.in_reply_to,
        )
    }

    fn push(
        &mut self,
        role: Role,
        text: String,
        references: Vec<Reference>,
        in_reply_to: Option<String>,
    ) -> &Message {
        let mut timestamp = (self.clock)();
        if let Some(last) = self.messages.last() {
            if timestamp <= last.timestamp {
                timestamp = last.timestamp + Duration::microseconds(1);
            }
        }
        self.messages.push(Message {
            id: Uuid::new_v4().to_string(),
            seq: self.messages.len() as u64,
            role,
            text,
            timestamp,
            references,
            in_reply_to,
        });
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// The assistant message answering `user_message_id`, if any.
    pub fn reply_to(&self, user_message_id: &str) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| m.in_reply_to.as_deref() == Some(user_message_id))
    }

    /// Messages after the one with `seq`, for incremental rendering.
    pub fn since(&self, seq: u64) -> &[Message] {
        let start = (seq as usize + 1).min(self.messages.len());
        &self.messages[start..]
    }
}

/// An assistant reply being typed out.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamingReply {
    text: String,
    references: Vec<Reference>,
    in_reply_to: Option<String>,
}

impl StreamingReply {
    /// Start a reply that will be filled chunk by chunk.
    pub fn new(in_reply_to: Option<String>) -> Self {
        Self {
            text: String::new(),
            references: Vec::new(),
            in_reply_to,
        }
    }

    pub fn push_str(&mut self, chunk: &str) {
        self.text.push_str(chunk);
    }

    pub fn add_reference(&mut self, reference: Reference) {
        if !self.references.contains(&reference) {
            self.references.push(reference);
        }
    }

    /// Text typed so far.
    pub fn text(&self) -> &str {
        &self.text
    }
}
