use std::collections::VecDeque;
use std::sync::Mutex;

/// Process-wide FIFO of formatted notification lines.
///
/// Producers are poll completions on any runtime thread; the consumer is the
/// broadcast driver, which takes one line per tick.
#[derive(Debug, Default)]
pub struct BroadcastQueue {
    pending: Mutex<VecDeque<String>>,
}

impl BroadcastQueue {
    pub fn enqueue(&self, message: impl Into<String>) {
        self.pending
            .lock()
            .expect("broadcast queue mutex poisoned")
            .push_back(message.into());
    }

    /// Oldest pending line, if any.
    pub fn drain_one(&self) -> Option<String> {
        self.pending
            .lock()
            .expect("broadcast queue mutex poisoned")
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .expect("broadcast queue mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
