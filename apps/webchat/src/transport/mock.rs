use super::{ConnectionError, ConnectionState, Outbound};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory outbound side that records every frame it accepts.
#[derive(Clone, Default)]
pub struct MockOutbound {
    state: Arc<Mutex<ConnectionState>>,
    sent: Arc<Mutex<Vec<String>>>,
    fail_sends: Arc<AtomicBool>,
}

impl MockOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open() -> Self {
        let mock = Self::new();
        mock.set_state(ConnectionState::Open);
        mock
    }

    pub fn set_state(&self, state: ConnectionState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state;
        }
    }

    /// Refuse frames while still reporting the current state, like a socket
    /// whose writer died before the close was observed.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Outbound for MockOutbound {
    fn state(&self) -> ConnectionState {
        self.state
            .lock()
            .map(|guard| *guard)
            .unwrap_or(ConnectionState::Closed)
    }

    fn send_text(&self, text: String) -> Result<(), ConnectionError> {
        if !self.is_open() || self.fail_sends.load(Ordering::SeqCst) {
            return Err(ConnectionError::NotConnected);
        }
        if let Ok(mut guard) = self.sent.lock() {
            guard.push(text);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_frames_unless_open() {
        let mock = MockOutbound::new();
        assert!(matches!(
            mock.send_text("early".into()),
            Err(ConnectionError::NotConnected)
        ));

        mock.set_state(ConnectionState::Open);
        mock.send_text("hello".into()).unwrap();

        mock.set_state(ConnectionState::Closed);
        assert!(mock.send_text("late".into()).is_err());
        assert_eq!(mock.sent(), vec!["hello".to_string()]);
    }
}
