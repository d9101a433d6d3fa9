use super::events::Generation;
use super::message::{Message, Origin};

/// Outcome of offering a history batch to the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMerge {
    /// No live message had arrived; the batch became the whole log
    Replaced,
    /// Live messages arrived first; the batch went in ahead of them
    Prepended,
    /// Wrong generation, or history was already applied
    Ignored,
}

/// Ordered messages for the current generation's target
///
/// Entries are never mutated. The whole log is discarded on a target switch.
#[derive(Debug, Default)]
pub struct MessageLog {
    generation: Generation,
    entries: Vec<Message>,
    history_applied: bool,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything and scope the log to `generation`
    pub fn reset(&mut self, generation: Generation) {
        self.generation = generation;
        self.entries.clear();
        self.history_applied = false;
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a live frame in receipt order; false when the generation is stale
    pub fn append_live(&mut self, generation: Generation, message: Message) -> bool {
        if generation != self.generation {
            return false;
        }
        debug_assert_eq!(message.origin, Origin::Live);
        self.entries.push(message);
        true
    }

    /// Merge the history batch for `generation`
    ///
    /// Server history never includes messages sent after the connection
    /// opened, so anything already in the log sorts after the batch.
    pub fn apply_history(&mut self, generation: Generation, batch: Vec<Message>) -> HistoryMerge {
        if generation != self.generation || self.history_applied {
            return HistoryMerge::Ignored;
        }
        self.history_applied = true;

        if self.entries.is_empty() {
            self.entries = batch;
            HistoryMerge::Replaced
        } else {
            let live = std::mem::replace(&mut self.entries, batch);
            self.entries.extend(live);
            HistoryMerge::Prepended
        }
    }

    /// The live-origin tail of the log
    pub fn live_suffix(&self) -> &[Message] {
        let start = self
            .entries
            .iter()
            .position(|m| m.origin == Origin::Live)
            .unwrap_or(self.entries.len());
        &self.entries[start..]
    }
}
