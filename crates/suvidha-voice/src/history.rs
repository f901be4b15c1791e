//! Bounded conversation history backing guidance calls.

use std::collections::VecDeque;

/// Ordered `User: ...` / `Assistant: ...` lines, keeping only the most recent `cap`.
///
/// Older lines are dropped as new ones arrive, so the slice handed to any guidance
/// call is bounded no matter how long the session runs.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    cap: usize,
    lines: VecDeque<String>,
}

impl ConversationHistory {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            lines: VecDeque::with_capacity(cap),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn push_user(&mut self, text: &str) {
        self.push(format!("User: {}", text));
    }

    pub fn push_assistant(&mut self, text: &str) {
        self.push(format!("Assistant: {}", text));
    }

    fn push(&mut self, line: String) {
        while self.lines.len() >= self.cap {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Most recent lines, oldest first.
    pub fn recent(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
