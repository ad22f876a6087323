use std::collections::BTreeMap;

/// Demo accounts (user id → display name) for fast testing
///
/// Insertion order is kept so pickers list them the same way every time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoAccounts {
    entries: Vec<(String, String)>,
}

impl Default for DemoAccounts {
    fn default() -> Self {
        let builtin = [
            ("k.tenma", "Kenzo Tenma"),
            ("fortner-n", "Nina Fortner"),
            ("runge_h@bka.de", "Heinrich Runge"),
            ("ev@heinman", "Eva Heinman"),
            // Does not satisfy the engine's user id rules, authentication fails
            ("l j", "Johan Liebert"),
        ];
        Self {
            entries: builtin
                .iter()
                .map(|(uid, name)| (uid.to_string(), name.to_string()))
                .collect(),
        }
    }
}

impl DemoAccounts {
    pub fn display_name(&self, user_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(uid, _)| uid == user_id)
            .map(|(_, name)| name.as_str())
    }

    pub fn user_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(uid, _)| uid.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Overrides known ids and appends new ones
    pub fn merged_with(mut self, extra: &BTreeMap<String, String>) -> Self {
        for (uid, name) in extra {
            match self.entries.iter_mut().find(|(known, _)| known == uid) {
                Some(entry) => entry.1 = name.clone(),
                None => self.entries.push((uid.clone(), name.clone())),
            }
        }
        self
    }
}
