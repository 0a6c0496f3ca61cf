use core::cell::Cell;
use std::rc::Rc;

/// Activation-to-deactivation lifetime of a theme.
///
/// Cloned into every asynchronous continuation, which must check it before
/// touching the document. Each rebuild bumps the generation so that output
/// of a superseded rebuild can be recognized and dropped.
#[derive(Clone, Debug)]
pub struct Session {
    watching: Rc<Cell<bool>>,
    generation: Rc<Cell<u64>>,
}

impl Session {
    /// A new, active session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            watching: Rc::new(Cell::new(true)),
            generation: Rc::new(Cell::new(0)),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watching.get()
    }

    pub fn stop(&self) {
        self.watching.set(false);
    }

    /// Start a new rebuild and return its generation.
    pub fn advance(&self) -> u64 {
        let next = self.generation.get().wrapping_add(1);
        self.generation.set(next);
        next
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Still watching and no newer rebuild has started.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.is_watching() && self.generation.get() == generation
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
