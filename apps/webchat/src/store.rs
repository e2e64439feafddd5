use crate::config::ConfigError;
use crate::message::Message;
use std::collections::VecDeque;
use tokio::sync::watch;

pub const SOFT_CAP_MAX: usize = 50;
pub const SOFT_CAP_TARGET: usize = 20;
pub const HARD_CAP: usize = 20;

/// How many messages the history keeps. Once an append pushes the length past
/// `max`, the oldest entries are dropped until `target` remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    max: usize,
    target: usize,
}

impl RetentionPolicy {
    pub fn new(max: usize, target: usize) -> Result<Self, ConfigError> {
        if target == 0 {
            return Err(ConfigError::InvalidRetention(
                "trim target must be at least one message".into(),
            ));
        }
        if target > max {
            return Err(ConfigError::InvalidRetention(format!(
                "trim target {target} exceeds maximum {max}"
            )));
        }
        Ok(Self { max, target })
    }

    /// Overshoot up to 50 messages, then cut back to the newest 20.
    pub const fn soft_cap() -> Self {
        Self {
            max: SOFT_CAP_MAX,
            target: SOFT_CAP_TARGET,
        }
    }

    pub fn hard_cap(limit: usize) -> Result<Self, ConfigError> {
        Self::new(limit, limit)
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn target(&self) -> usize {
        self.target
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::soft_cap()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct StoreRevision(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    pub revision: StoreRevision,
    pub evicted: usize,
}

/// Ordered, capacity-bounded message history. Views observe it through
/// [`MessageStore::subscribe`] instead of binding to the field directly.
#[derive(Debug)]
pub struct MessageStore {
    messages: VecDeque<Message>,
    policy: RetentionPolicy,
    revision: watch::Sender<StoreRevision>,
}

impl MessageStore {
    pub fn new(policy: RetentionPolicy) -> Self {
        let (revision, _) = watch::channel(StoreRevision::default());
        Self {
            messages: VecDeque::with_capacity(policy.max() + 1),
            policy,
            revision,
        }
    }

    pub fn append(&mut self, message: Message) -> AppendOutcome {
        self.messages.push_back(message);
        let mut evicted = 0;
        if self.messages.len() > self.policy.max {
            evicted = self.messages.len() - self.policy.target;
            self.messages.drain(..evicted);
        }
        let next = StoreRevision(self.revision.borrow().0 + 1);
        self.revision.send_replace(next);
        AppendOutcome {
            revision: next,
            evicted,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreRevision> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> StoreRevision {
        *self.revision.borrow()
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Message> + ExactSizeIterator {
        self.messages.iter()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}
