//! Key-path layout
//!
//! Everything lives under `artifacts/{app_id}/`:
//!
//! ```text
//! users/{uid}/stats
//! users/{uid}/transactions/{pushId}
//! users/{uid}/notifications/{pushId}
//! public/data/microtasks/{taskId}
//! public/data/submissions/{taskId}/{subId}
//! ```

/// Characters the database refuses in keys, plus `/` which would escape the segment.
const FORBIDDEN_KEY_CHARS: &[char] = &['/', '.', '#', '$', '[', ']'];

#[derive(Debug, Clone)]
pub struct Paths {
    root: String,
}

impl Paths {
    pub fn new(app_id: &str) -> Self {
        Self {
            root: format!("artifacts/{}", app_id),
        }
    }

    pub fn users(&self) -> String {
        format!("{}/users", self.root)
    }

    pub fn user_stats(&self, uid: &str) -> String {
        format!("{}/users/{}/stats", self.root, uid)
    }

    pub fn transactions(&self, uid: &str) -> String {
        format!("{}/users/{}/transactions", self.root, uid)
    }

    pub fn notifications(&self, uid: &str) -> String {
        format!("{}/users/{}/notifications", self.root, uid)
    }

    pub fn microtask(&self, task_id: &str) -> String {
        format!("{}/public/data/microtasks/{}", self.root, task_id)
    }

    pub fn submission(&self, task_id: &str, sub_id: &str) -> String {
        format!("{}/public/data/submissions/{}/{}", self.root, task_id, sub_id)
    }
}

/// Whether a caller-supplied id is usable as a single path segment.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= 768 && !key.contains(FORBIDDEN_KEY_CHARS)
}
