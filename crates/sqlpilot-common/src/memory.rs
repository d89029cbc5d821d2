use serde::{Deserialize, Serialize};

/// One successful question/SQL exchange kept as conversational context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryTurn {
    pub question: String,
    pub sql: String,
}

/// Ordered conversation memory owned by a single user session.
///
/// Only the session that owns it mutates it; retrieval and generation
/// components receive the turns read-only. Trimmed to the most recent
/// `max_turns` entries on every push; `max_turns == 0` disables memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMemory {
    turns: Vec<MemoryTurn>,
    max_turns: usize,
}

impl SessionMemory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns,
        }
    }

    pub fn push(&mut self, question: impl Into<String>, sql: impl Into<String>) {
        if self.max_turns == 0 {
            return;
        }
        self.turns.push(MemoryTurn {
            question: question.into(),
            sql: sql.into(),
        });
        if self.turns.len() > self.max_turns {
            let excess = self.turns.len() - self.max_turns;
            self.turns.drain(..excess);
        }
    }

    /// Chronological turns, most recent last.
    pub fn turns(&self) -> &[MemoryTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
