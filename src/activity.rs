use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::node::now_millis;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub action: String,
    pub timestamp: i64,
    #[serde(default)]
    pub payload: Value,
}

/// What the user did, newest last (`userActivityLog`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub user_id: String,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl ActivityLog {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            activities: Vec::new(),
        }
    }

    /// Append an activity and keep at most `limit` of the newest ones.
    pub fn record(&mut self, action: &str, payload: Value, limit: usize) {
        self.activities.push(Activity {
            id: Uuid::new_v4().to_string(),
            action: action.to_string(),
            timestamp: now_millis(),
            payload,
        });
        if self.activities.len() > limit {
            let excess = self.activities.len() - limit;
            self.activities.drain(..excess);
        }
    }

    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &Activity> {
        self.activities.iter().rev().take(limit)
    }
}
