use std::sync::Mutex;

/// Navigation side of the page shell. Calls are fire-and-forget.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
    fn go_back(&self);
}

/// Navigation history kept in process, newest entry last.
#[derive(Debug, Default)]
pub struct History {
    entries: Mutex<Vec<String>>,
}

impl History {
    pub fn starting_at(path: impl Into<String>) -> Self {
        Self {
            entries: Mutex::new(vec![path.into()]),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.lock().last().cloned()
    }

    pub fn depth(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        // History entries stay valid even if a holder panicked.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Navigator for History {
    fn navigate(&self, path: &str) {
        self.lock().push(path.to_string());
    }

    fn go_back(&self) {
        let mut entries = self.lock();
        if entries.len() > 1 {
            entries.pop();
        }
    }
}
