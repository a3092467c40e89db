//! Requirement calculus
//!
//! A computation's requirement set is a type-level list of capability types
//! (`HList![Print, Read]`). The relations the combinators need are all
//! expressed through frunk's HList traits, so the compiler checks them:
//!
//! ```text
//! membership   C ∈ R        R: Has<C, I>
//! subtraction  R \ S        Subtract<R, S, Ix>      (requires S ⊆ R)
//! covering     R ⊇ S        R: Covers<S, Ix>
//! empty        {}           Empty
//! ```
//!
//! Union is not a separate operation. Combinators that join two computations
//! require both to share one `R`; leaf constructors are generic in `R` and only
//! demand membership, so the shared `R` must contain every capability either
//! side asks for. "Any" is likewise plain genericity: `pure` accepts every `R`.
//!
//! The index parameters (`I`, `Ix`) are inferred by the compiler and only
//! disambiguate where in the list a capability sits.

use frunk::hlist::{Sculptor, Selector};

pub use frunk::hlist::{HCons, HNil};
pub use frunk::indices::{Here, There};

/// The requirement set with no capabilities
pub type Empty = HNil;

/// `C` is one of the capabilities in the requirement list
pub trait Has<C, I>: Selector<C, I> {}

impl<R, C, I> Has<C, I> for R where R: Selector<C, I> {}

/// Every capability in `S` also appears in `Self`
pub trait Covers<S, Ix>: Sculptor<S, Ix> {}

impl<R, S, Ix> Covers<S, Ix> for R where R: Sculptor<S, Ix> {}

/// `R` with the capabilities of `S` removed
pub type Subtract<R, S, Ix> = <R as Sculptor<S, Ix>>::Remainder;
