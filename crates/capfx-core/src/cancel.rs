//! Cancellation handles
//!
//! Every started computation hands back a [`Cancel`]. Invoking it is a request:
//! the leaf capability that currently holds the continuation decides whether to
//! honour it. The runtime itself never tears down a continuation.
//!
//! [`CancelSlot`] is the one place where the kernel mutates shared state. Combinators
//! that run sub-computations one after another keep the live sub-computation's
//! handle in a slot and expose a single handle that forwards to whatever is
//! installed at the time it is invoked.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::logging::log_cancel_requested;

//-----------------------------------------------------------------------------
// Cancellation Handle
//-----------------------------------------------------------------------------

/// Idempotent request to stop a computation from producing its result.
///
/// Clones share the same action, which runs at most once across all of them.
#[derive(Clone, Default)]
pub struct Cancel {
    target: Target,
}

#[derive(Clone, Default)]
enum Target {
    #[default]
    Inert,
    Action(Rc<CancelAction>),
    Slot(CancelSlot),
}

struct CancelAction {
    pending: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Cancel {
    /// Wrap an action. The action runs on the first `cancel` only.
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            target: Target::Action(Rc::new(CancelAction {
                pending: RefCell::new(Some(Box::new(action))),
            })),
        }
    }

    /// A handle that does nothing, for computations that cannot be stopped
    pub fn uncancelable() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        match &self.target {
            Target::Inert => {}
            Target::Action(action) => {
                // Release the borrow before running: the action may re-enter this handle.
                let pending = action.pending.borrow_mut().take();
                if let Some(run) = pending {
                    run();
                }
            }
            Target::Slot(slot) => {
                if !slot.is_requested() {
                    slot.cancel_current();
                }
            }
        }
    }

    /// Whether invoking this handle could still have an effect
    pub fn is_armed(&self) -> bool {
        match &self.target {
            Target::Inert => false,
            Target::Action(action) => action.pending.borrow().is_some(),
            Target::Slot(slot) => slot.is_armed(),
        }
    }
}

impl fmt::Debug for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancel").field("armed", &self.is_armed()).finish()
    }
}

/// The canonical inert handle
/// uncancelable : Cancel
pub fn uncancelable() -> Cancel {
    Cancel::uncancelable()
}

//-----------------------------------------------------------------------------
// Single-Slot Cell
//-----------------------------------------------------------------------------

/// Rebindable cell holding the handle of the live sub-computation.
///
/// Each sub-computation is started under a generation obtained from
/// [`advance`](Self::advance). Its handle is installed with
/// [`install_for`](Self::install_for), which is ignored if a later step has
/// already advanced the slot: a step that completed synchronously must not
/// overwrite its successor's handle with its own stale one.
#[derive(Clone, Default)]
pub struct CancelSlot {
    inner: Rc<SlotState>,
}

#[derive(Default)]
struct SlotState {
    current: RefCell<Cancel>,
    generation: Cell<u64>,
    requested: Cell<bool>,
    finished: Cell<bool>,
}

impl CancelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation of the step currently running
    pub fn generation(&self) -> u64 {
        self.inner.generation.get()
    }

    /// Start a new step, superseding whatever was installed before
    pub fn advance(&self) -> u64 {
        let next = self.inner.generation.get() + 1;
        self.inner.generation.set(next);
        *self.inner.current.borrow_mut() = Cancel::uncancelable();
        next
    }

    /// Install the handle returned by the step started under `generation`.
    ///
    /// If cancellation was already requested the handle is invoked at once.
    pub fn install_for(&self, generation: u64, handle: Cancel) {
        if self.inner.generation.get() != generation {
            return;
        }
        if self.inner.requested.get() {
            handle.cancel();
            return;
        }
        *self.inner.current.borrow_mut() = handle;
    }

    /// Mark the owning computation as finished. The slot becomes inert.
    pub fn finish(&self) {
        self.advance();
        self.inner.finished.set(true);
    }

    /// Whether the owning computation has delivered its result
    pub fn is_finished(&self) -> bool {
        self.inner.finished.get()
    }

    /// Whether a cancellation request could still reach a live step
    pub fn is_armed(&self) -> bool {
        !self.is_requested() && !self.is_finished() && self.inner.current.borrow().is_armed()
    }

    /// Whether cancellation has been requested through this slot
    pub fn is_requested(&self) -> bool {
        self.inner.requested.get()
    }

    /// Forward a cancellation request to the installed handle
    pub fn cancel_current(&self) {
        self.inner.requested.set(true);
        let current = self.inner.current.borrow().clone();
        log_cancel_requested(self.inner.generation.get(), current.is_armed());
        current.cancel();
    }

    /// The handle exposed to the caller of the owning computation
    pub fn handle(&self) -> Cancel {
        Cancel {
            target: Target::Slot(self.clone()),
        }
    }
}

impl fmt::Debug for CancelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSlot")
            .field("generation", &self.inner.generation.get())
            .field("requested", &self.inner.requested.get())
            .field("finished", &self.inner.finished.get())
            .finish()
    }
}

//-----------------------------------------------------------------------------
// Tests
//-----------------------------------------------------------------------------
