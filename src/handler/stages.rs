use log::debug;
use uuid::Uuid;

/// Lifecycle of one scrape request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validating,
    Fetching,
    Extracting,
    Responding,
    Completed,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed)
    }

    fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, next),
            (Received, Validating)
                | (Validating, Fetching)
                | (Fetching, Extracting)
                | (Validating | Fetching | Extracting, Responding)
                | (Responding, Completed | Failed)
        )
    }
}

#[derive(Debug)]
pub struct StageTracker {
    id: Uuid,
    history: Vec<Stage>,
}

impl StageTracker {
    pub fn new(id: Uuid) -> Self {
        debug!("[{}] {:?}", id, Stage::Received);
        Self {
            id,
            history: vec![Stage::Received],
        }
    }

    pub fn current(&self) -> Stage {
        *self.history.last().unwrap_or(&Stage::Received)
    }

    pub fn advance(&mut self, next: Stage) {
        let current = self.current();
        debug_assert!(
            current.can_advance_to(next),
            "illegal transition {current:?} -> {next:?}"
        );
        debug!("[{}] {:?} -> {:?}", self.id, current, next);
        self.history.push(next);
    }

    pub fn into_history(self) -> Vec<Stage> {
        self.history
    }
}
