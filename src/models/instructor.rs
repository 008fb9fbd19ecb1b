use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instructor {
    pub id: String,
    pub name: String,
}

impl Instructor {
    /// Read a user record from `/users?role=instructor`; ids may be numeric.
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = match value.get("id")? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let name = value
            .get("name")
            .or_else(|| value.get("full_name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                let first = value.get("first_name").and_then(Value::as_str)?;
                let last = value.get("last_name").and_then(Value::as_str).unwrap_or("");
                Some(format!("{first} {last}").trim().to_string())
            })
            .unwrap_or_else(|| "Instructor".to_string());
        Some(Instructor { id, name })
    }
}

/// Id to display-name lookup for conflict messages.
#[derive(Debug, Default)]
pub struct InstructorDirectory {
    names: RwLock<HashMap<String, String>>,
}

impl InstructorDirectory {
    pub fn load(&self, instructors: Vec<Instructor>) {
        let mut names = self.names.write().unwrap_or_else(|e| e.into_inner());
        names.clear();
        names.extend(instructors.into_iter().map(|i| (i.id, i.name)));
    }

    pub fn name_for(&self, id: &str) -> Option<String> {
        self.names
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// Name when known, the raw id otherwise.
    pub fn label_for(&self, id: &str) -> String {
        self.name_for(id).unwrap_or_else(|| id.to_string())
    }

    pub fn len(&self) -> usize {
        self.names.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
