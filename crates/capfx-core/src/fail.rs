//! Typed error raising and handling
//!
//! Errors are ordinary values routed through the `catchError` capability. A
//! raise looks up the innermost [`CatchError`] in the record and hands it the
//! error together with the raise site's own continuation. The handler then
//! decides what happens:
//!
//! - resume the raise site with a recovered value ([`catch_error`]),
//! - abandon the raise site and report the error elsewhere ([`attempt`]),
//! - transform the error and raise it further out ([`map_error`]).
//!
//! There is no unwinding. Abandoning a raise site simply means its continuation
//! is dropped without being called.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use frunk::hlist::{HCons, HNil, Sculptor};

use crate::cancel::Cancel;
use crate::capability::{Capability, Env, Record, Supply};
use crate::computation::{provide, Cont, Eff};
use crate::logging::log_error_raised;
use crate::requirement::{Covers, Has, Subtract};

/// Requirement list supplied by an error handler
pub type Handled<E, A> = HCons<CatchError<E, A>, HNil>;

//-----------------------------------------------------------------------------
// Capability
//-----------------------------------------------------------------------------

/// Handler for errors of type `E` raised where an `A` is expected
pub struct CatchError<E, A> {
    handler: Rc<dyn Fn(E, Cont<A>) -> Cancel>,
}

impl<E, A> CatchError<E, A> {
    /// Wrap a handler. It receives the error and the raise site's continuation.
    pub fn new(handler: impl Fn(E, Cont<A>) -> Cancel + 'static) -> Self {
        Self {
            handler: Rc::new(handler),
        }
    }

    /// Hand an error to the handler
    pub fn raise(&self, error: E, k: Cont<A>) -> Cancel {
        (self.handler)(error, k)
    }
}

impl<E, A> Clone for CatchError<E, A> {
    fn clone(&self) -> Self {
        Self {
            handler: Rc::clone(&self.handler),
        }
    }
}

impl<E, A> fmt::Debug for CatchError<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatchError")
            .field("error", &std::any::type_name::<E>())
            .field("value", &std::any::type_name::<A>())
            .finish()
    }
}

impl<E: 'static, A: 'static> Capability for CatchError<E, A> {
    const NAME: &'static str = "catchError";
}

//-----------------------------------------------------------------------------
// Operations
//-----------------------------------------------------------------------------

/// Raise an error to the innermost handler.
///
/// Whatever the handler passes to the continuation becomes this computation's
/// value.
/// throw_error : E → Eff {catchError} A
pub fn throw_error<R, I, E, A>(error: E) -> Eff<R, A>
where
    R: Has<CatchError<E, A>, I>,
    E: Clone + 'static,
    A: 'static,
{
    Eff::from_fn(move |env: &Env<'_, R>, k: Cont<A>| {
        log_error_raised(std::any::type_name::<E>());
        env.get::<CatchError<E, A>, I>().raise(error.clone(), k)
    })
}

/// Recover from errors by resuming each raise site with `handler(error)`
/// catch_error : (E → A) ⊗ Eff R A → Eff (R \ {catchError}) A
pub fn catch_error<R, Out, Ix, OutIx, E, A, H>(handler: H, e: Eff<R, A>) -> Eff<Out, A>
where
    R: Sculptor<Handled<E, A>, Ix>,
    Out: Covers<Subtract<R, Handled<E, A>, Ix>, OutIx>,
    E: 'static,
    A: 'static,
    H: Fn(E) -> A + 'static,
{
    let handler = Rc::new(handler);
    let recover = CatchError::new(move |error: E, k: Cont<A>| {
        k(handler(error));
        Cancel::uncancelable()
    });
    provide(Supply::new().with(recover), e)
}

/// Reify success or the first raised error as a `Result`.
///
/// A raise abandons the raise site and delivers `Err` straight to this
/// computation's continuation; the result is delivered exactly once.
/// attempt : Eff R A → Eff (R \ {catchError}) (A + E)
pub fn attempt<R, Out, Ix, OutIx, E, A>(e: Eff<R, A>) -> Eff<Out, Result<A, E>>
where
    R: Sculptor<Handled<E, A>, Ix>,
    Out: Covers<Subtract<R, Handled<E, A>, Ix>, OutIx>,
    E: 'static,
    A: 'static,
{
    let run_e = e.runner();
    Eff::from_runner(Rc::new(move |record: &Record, k: Cont<Result<A, E>>| {
        let outcome = Rc::new(RefCell::new(Some(k)));
        let on_error = Rc::clone(&outcome);
        let reify = CatchError::<E, A>::new(move |error: E, _abandoned: Cont<A>| {
            let k = on_error.borrow_mut().take();
            if let Some(k) = k {
                k(Err(error));
            }
            Cancel::uncancelable()
        });
        let scoped = record.extend(&Supply::new().with(reify).into_layer());
        run_e(
            &scoped,
            Box::new(move |a: A| {
                let k = outcome.borrow_mut().take();
                if let Some(k) = k {
                    k(Ok(a));
                }
            }),
        )
    }))
}

/// Translate errors and raise them to the enclosing handler.
///
/// The enclosing handler's answer resumes the original raise site.
/// map_error : (E1 → E2) ⊗ Eff R A → Eff ((R \ {catchError E1}) ∪ {catchError E2}) A
pub fn map_error<R, Out, Ix, OutIx, I2, E1, E2, A, F>(f: F, e: Eff<R, A>) -> Eff<Out, A>
where
    R: Sculptor<Handled<E1, A>, Ix>,
    Out: Covers<Subtract<R, Handled<E1, A>, Ix>, OutIx> + Has<CatchError<E2, A>, I2>,
    E1: 'static,
    E2: 'static,
    A: 'static,
    F: Fn(E1) -> E2 + 'static,
{
    let f = Rc::new(f);
    let run_e = e.runner();
    Eff::from_runner(Rc::new(move |record: &Record, k: Cont<A>| {
        let outer = Env::<Out>::new(record).get::<CatchError<E2, A>, I2>().clone();
        let f = Rc::clone(&f);
        let translate = CatchError::<E1, A>::new(move |error: E1, resume: Cont<A>| {
            outer.raise(f(error), resume)
        });
        run_e(&record.extend(&Supply::new().with(translate).into_layer()), k)
    }))
}

//-----------------------------------------------------------------------------
// Tests
//-----------------------------------------------------------------------------
