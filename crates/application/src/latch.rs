use std::cell::Cell;

/// Single-slot render lock. Acquisition never waits: a second caller gets
/// `None` while a guard is alive, and the slot frees when the guard drops.
#[derive(Debug, Default)]
pub struct RenderLatch {
    held: Cell<bool>,
}

impl RenderLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<RenderGuard<'_>> {
        if self.held.replace(true) {
            return None;
        }
        Some(RenderGuard { latch: self })
    }

    pub fn is_held(&self) -> bool {
        self.held.get()
    }
}

#[derive(Debug)]
pub struct RenderGuard<'a> {
    latch: &'a RenderLatch,
}

impl Drop for RenderGuard<'_> {
    fn drop(&mut self) {
        self.latch.held.set(false);
    }
}
