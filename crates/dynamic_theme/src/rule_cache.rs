//! Rule-level memo of modifiable declarations, keyed by rule identity.

use crate::host::RuleId;
use crate::modifier::ModifiableDeclaration;
use std::collections::HashMap;
use std::rc::Rc;

/// The themed view of one style rule.
#[derive(Clone, Debug, PartialEq)]
pub struct ModifiableRule {
    pub selector_text: String,
    /// Enclosing `@media` conditions, outermost first.
    pub media: Vec<String>,
    pub declarations: Vec<ModifiableDeclaration>,
}

/// Index from [`RuleId`] to the rule's modifiers.
///
/// A stored `None` records that the rule contributes nothing and is not
/// rebuilt either. Entries live until the host reports the rule gone or the
/// cache is cleaned explicitly.
#[derive(Debug, Default)]
pub struct RuleCache {
    entries: HashMap<RuleId, Option<Rc<ModifiableRule>>>,
    builds: usize,
}

impl RuleCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build<F>(&mut self, id: RuleId, build: F) -> Option<Rc<ModifiableRule>>
    where
        F: FnOnce() -> Option<ModifiableRule>,
    {
        if let Some(entry) = self.entries.get(&id) {
            return entry.clone();
        }
        self.builds += 1;
        let entry = build().map(Rc::new);
        self.entries.insert(id, entry.clone());
        entry
    }

    /// How many times a rule had to be built.
    #[must_use]
    pub const fn build_count(&self) -> usize {
        self.builds
    }

    pub fn forget(&mut self, ids: &[RuleId]) {
        for id in ids {
            self.entries.remove(id);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
