// Capability Effects Core Library
//
// Deferred computations that declare the capabilities they need as a
// type-level list, receive implementations through a scoped record, and
// deliver their result to a continuation.

// Requirement Calculus
// Type-level capability lists with membership, subtraction and covering
pub mod requirement;

// Capability Records
// Capability trait, scoped runtime records, supplies and typed views
pub mod capability;

// Cancellation
// Idempotent cancel handles and rebindable slots for sequenced steps
pub mod cancel;

// Computation Kernel
// The computation type, its combinators and the top-level runners
pub mod computation;

// Sequential Composer
// Straight-line composition of computations over async blocks
pub mod compose;

// Error Effect
// Raising, catching and reifying typed errors through a capability
pub mod fail;

// Logging
pub mod logging;
pub mod test_logging;

// Re-export important types for easier access
pub use capfx_error::{EffectError, EffectResult};
pub use frunk::HList;

pub use cancel::{uncancelable, Cancel, CancelSlot};
pub use capability::{Capability, Env, Layer, Record, Supply};
pub use compose::{do_env, forever, Perform, Step};
pub use computation::{
    chain, embed, map, provide, pure, run_pure, run_pure_discard, seq, widen, with_env, Cont, Eff,
};
pub use fail::{attempt, catch_error, map_error, throw_error, CatchError, Handled};
pub use requirement::{Covers, Empty, Has, Subtract};
