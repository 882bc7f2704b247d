use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub text: String,
    pub completed: bool,
}

/// Ordered task list. Ids come from a counter that only grows, so an id is
/// never handed out twice, even after the task that held it is removed.
#[derive(Debug, Clone)]
pub struct TaskList {
    items: Vec<Task>,
    next_id: u64,
}

impl Default for TaskList {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskList {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            next_id: 1,
        }
    }

    /// The starter list shown on first launch.
    pub fn seeded() -> Self {
        let mut list = Self::new();
        for text in [
            "Write the task list code",
            "Add the chat bot",
            "Implement the image editor",
        ] {
            list.add(text);
        }
        if let Some(first) = list.items.first_mut() {
            first.completed = true;
        }
        list
    }

    /// Append a new, not yet completed task. Blank text is ignored.
    pub fn add(&mut self, text: &str) -> Option<u64> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.items.push(Task {
            id,
            text: text.to_string(),
            completed: false,
        });
        Some(id)
    }

    /// Flip the completion flag. Returns false when no task has this id.
    pub fn toggle(&mut self, id: u64) -> bool {
        match self.items.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.completed = !task.completed;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|t| t.id != id);
        self.items.len() != before
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.items.iter().find(|t| t.id == id)
    }

    pub fn items(&self) -> &[Task] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of tasks not yet completed
    pub fn remaining(&self) -> usize {
        self.items.iter().filter(|t| !t.completed).count()
    }
}
