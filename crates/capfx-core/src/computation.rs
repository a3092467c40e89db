//! Computation kernel
//!
//! An [`Eff<R, A>`] is a deferred computation: given a capability record
//! satisfying the requirement list `R` and a continuation accepting `A`, it starts
//! its work and returns a [`Cancel`] handle. Computations are immutable and can
//! be run any number of times; each run gets its own handle.
//!
//! Argument order follows the computation: `map(e, f)` and `chain(e, f)` take
//! the computation first, `provide(supply, e)` and `embed(f, e)` take the
//! environment adjustment first.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use frunk::hlist::Sculptor;

use crate::cancel::{Cancel, CancelSlot};
use crate::capability::{Env, Record, Supply};
use crate::logging::{log_run_start, log_scope_installed};
use crate::requirement::{Covers, Empty, Subtract};

/// Receives a computation's result; called at most once
pub type Cont<A> = Box<dyn FnOnce(A)>;

/// Type-erased body of a computation
pub(crate) type Runner<A> = Rc<dyn Fn(&Record, Cont<A>) -> Cancel>;

//-----------------------------------------------------------------------------
// Computation Type
//-----------------------------------------------------------------------------

/// A computation needing the capabilities in `R` and producing an `A`
pub struct Eff<R, A> {
    runner: Runner<A>,
    _req: PhantomData<fn() -> R>,
}

impl<R, A: 'static> Eff<R, A> {
    /// Leaf constructor with access to the declared capabilities.
    ///
    /// The body must call `k` at most once and return a handle that is inert
    /// once `k` has been called.
    pub fn from_fn<F>(body: F) -> Self
    where
        F: Fn(&Env<'_, R>, Cont<A>) -> Cancel + 'static,
    {
        Self::from_runner(Rc::new(move |record: &Record, k: Cont<A>| {
            body(&Env::new(record), k)
        }))
    }

    pub(crate) fn from_runner(runner: Runner<A>) -> Self {
        Self {
            runner,
            _req: PhantomData,
        }
    }

    pub(crate) fn runner(&self) -> Runner<A> {
        Rc::clone(&self.runner)
    }

    /// Start the computation against `record`.
    ///
    /// The record must carry every capability in `R`; drivers normally go
    /// through [`run_pure`] instead.
    pub fn run(&self, record: &Record, k: Cont<A>) -> Cancel {
        (self.runner)(record, k)
    }

    /// Method form of [`map`]
    pub fn map<B, F>(self, f: F) -> Eff<R, B>
    where
        B: 'static,
        F: Fn(A) -> B + 'static,
    {
        map(self, f)
    }

    /// Method form of [`chain`]
    pub fn chain<B, F>(self, f: F) -> Eff<R, B>
    where
        B: 'static,
        F: Fn(A) -> Eff<R, B> + 'static,
    {
        chain(self, f)
    }

    /// Method form of [`widen`]
    pub fn widen<R2, Ix>(self) -> Eff<R2, A>
    where
        R2: Covers<R, Ix>,
    {
        widen(self)
    }
}

impl<R, A> Clone for Eff<R, A> {
    fn clone(&self) -> Self {
        Self {
            runner: Rc::clone(&self.runner),
            _req: PhantomData,
        }
    }
}

impl<R, A> fmt::Debug for Eff<R, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Eff")
            .field("requires", &std::any::type_name::<R>())
            .field("produces", &std::any::type_name::<A>())
            .finish()
    }
}

//-----------------------------------------------------------------------------
// Core Combinators
//-----------------------------------------------------------------------------

/// Deliver a value synchronously; runs under any record
/// pure : A → Eff Any A
pub fn pure<R, A>(a: A) -> Eff<R, A>
where
    A: Clone + 'static,
{
    Eff::from_runner(Rc::new(move |_: &Record, k: Cont<A>| {
        k(a.clone());
        Cancel::uncancelable()
    }))
}

/// Compute a value directly from the capabilities
/// with_env : (R → A) → Eff R A
pub fn with_env<R, A, F>(f: F) -> Eff<R, A>
where
    A: 'static,
    F: Fn(&Env<'_, R>) -> A + 'static,
{
    Eff::from_runner(Rc::new(move |record: &Record, k: Cont<A>| {
        k(f(&Env::new(record)));
        Cancel::uncancelable()
    }))
}

/// Transform the result without changing the requirements.
///
/// `f` must not panic; a panic unwinds through whichever capability delivered
/// the value.
/// map : Eff R A ⊗ (A → B) → Eff R B
pub fn map<R, A, B, F>(e: Eff<R, A>, f: F) -> Eff<R, B>
where
    A: 'static,
    B: 'static,
    F: Fn(A) -> B + 'static,
{
    let f = Rc::new(f);
    let run_e = e.runner();
    Eff::from_runner(Rc::new(move |record: &Record, k: Cont<B>| {
        let slot = CancelSlot::new();
        let started = slot.generation();
        let f = Rc::clone(&f);
        let done = slot.clone();
        let handle = run_e(
            record,
            Box::new(move |a: A| {
                done.finish();
                k(f(a))
            }),
        );
        slot.install_for(started, handle);
        slot.handle()
    }))
}

/// Sequence two computations; the second is chosen by the first's result.
///
/// Both sides share one requirement list, so the result needs the union of
/// what either side asks for. Cancelling the returned handle cancels whichever
/// side is live.
/// chain : Eff R A ⊗ (A → Eff R B) → Eff R B
pub fn chain<R, A, B, F>(e: Eff<R, A>, f: F) -> Eff<R, B>
where
    A: 'static,
    B: 'static,
    F: Fn(A) -> Eff<R, B> + 'static,
{
    let f = Rc::new(f);
    let run_e = e.runner();
    Eff::from_runner(Rc::new(move |record: &Record, k: Cont<B>| {
        let slot = CancelSlot::new();
        let started = slot.generation();
        let f = Rc::clone(&f);
        let next_slot = slot.clone();
        let next_record = record.clone();
        let handle = run_e(
            record,
            Box::new(move |a: A| {
                let second = next_slot.advance();
                let done = next_slot.clone();
                let handle = f(a).run(
                    &next_record,
                    Box::new(move |b: B| {
                        done.finish();
                        k(b)
                    }),
                );
                next_slot.install_for(second, handle);
            }),
        );
        slot.install_for(started, handle);
        slot.handle()
    }))
}

/// Run `first`, discard its value, then run `second`
/// seq : Eff R A ⊗ Eff R B → Eff R B
pub fn seq<R, A, B>(first: Eff<R, A>, second: Eff<R, B>) -> Eff<R, B>
where
    R: 'static,
    A: 'static,
    B: 'static,
{
    chain(first, move |_| second.clone())
}

/// Run a computation against a record projected from a richer one
/// embed : (RA → RB) ⊗ Eff RB A → Eff RA A
pub fn embed<RA, RB, S, Ix, A, F>(f: F, e: Eff<RB, A>) -> Eff<RA, A>
where
    A: 'static,
    S: Covers<RB, Ix>,
    F: Fn(&Env<'_, RA>) -> Supply<S> + 'static,
{
    let run_e = e.runner();
    Eff::from_runner(Rc::new(move |record: &Record, k: Cont<A>| {
        let projected = f(&Env::new(record)).into_record();
        run_e(&projected, k)
    }))
}

/// Satisfy some of a computation's requirements.
///
/// The supplied capabilities form a new innermost scope over whatever record
/// the result is run with, so a nested `provide` shadows an enclosing one.
/// The result needs `R \ S`, or any list covering it.
/// provide : S ⊗ Eff R A → Eff (R \ S) A
#[doc(alias = "use")]
pub fn provide<S, R, Out, Ix, OutIx, A>(supplied: Supply<S>, e: Eff<R, A>) -> Eff<Out, A>
where
    A: 'static,
    R: Sculptor<S, Ix>,
    Out: Covers<Subtract<R, S, Ix>, OutIx>,
{
    let layer = supplied.into_layer();
    let run_e = e.runner();
    Eff::from_runner(Rc::new(move |residual: &Record, k: Cont<A>| {
        let scoped = residual.extend(&layer);
        log_scope_installed(&layer, &scoped);
        run_e(&scoped, k)
    }))
}

/// Accept a larger requirement list than the computation needs
/// widen : Eff R A → Eff R2 A    where R ⊆ R2
pub fn widen<R, R2, Ix, A>(e: Eff<R, A>) -> Eff<R2, A>
where
    A: 'static,
    R2: Covers<R, Ix>,
{
    Eff::from_runner(e.runner())
}

//-----------------------------------------------------------------------------
// Runners
//-----------------------------------------------------------------------------

/// Run a computation whose requirements are fully satisfied
/// run_pure : Eff {} A ⊗ (A → ()) → Cancel
pub fn run_pure<A, K>(e: Eff<Empty, A>, k: K) -> Cancel
where
    A: 'static,
    K: FnOnce(A) + 'static,
{
    log_run_start(std::any::type_name::<A>());
    e.run(&Record::empty(), Box::new(k))
}

/// Run a computation whose requirements are fully satisfied, discarding its result
pub fn run_pure_discard<A>(e: Eff<Empty, A>) -> Cancel
where
    A: 'static,
{
    run_pure(e, |_| {})
}

//-----------------------------------------------------------------------------
// Tests
//-----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;
    use crate::requirement::Has;
    use frunk::HList;
    use std::cell::{Cell, RefCell};

    struct Greet(fn(&str) -> String);

    impl Capability for Greet {
        const NAME: &'static str = "greet";
    }

    /// Holds continuations until the test releases them
    #[derive(Clone, Default)]
    struct Gate {
        waiting: Rc<RefCell<Vec<Cont<u32>>>>,
        cancelled: Rc<Cell<u32>>,
    }

    impl Capability for Gate {
        const NAME: &'static str = "gate";
    }

    impl Gate {
        fn release(&self, value: u32) {
            let next = self.waiting.borrow_mut().remove(0);
            next(value);
        }
    }

    fn wait<R, I>() -> Eff<R, u32>
    where
        R: Has<Gate, I>,
    {
        Eff::from_fn(|env: &Env<'_, R>, k| {
            let gate = env.get::<Gate, I>();
            gate.waiting.borrow_mut().push(k);
            let cancelled = Rc::clone(&gate.cancelled);
            Cancel::new(move || cancelled.set(cancelled.get() + 1))
        })
    }

    fn collect<A: 'static>() -> (Rc<RefCell<Vec<A>>>, impl FnOnce(A) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |a| sink.borrow_mut().push(a))
    }

    #[test]
    fn test_pure_map_delivers_synchronously() {
        let (seen, k) = collect();
        let handle = run_pure(map(pure(2), |x: i32| x + 3), k);
        assert_eq!(*seen.borrow(), vec![5]);
        handle.cancel();
        assert_eq!(*seen.borrow(), vec![5]);
    }

    #[test]
    fn test_computation_is_rerunnable() {
        let e: Eff<Empty, i32> = pure(1).chain(|a| pure(a + 1));
        let (first, k1) = collect();
        let (second, k2) = collect();
        run_pure(e.clone(), k1);
        run_pure(e, k2);
        assert_eq!(*first.borrow(), vec![2]);
        assert_eq!(*second.borrow(), vec![2]);
    }

    #[test]
    fn test_provide_supplies_with_env() {
        let greeting: Eff<HList![Greet], String> =
            with_env(|env: &Env<'_, HList![Greet]>| (env.get::<Greet, _>().0)("x"));
        let supply = Supply::new().with(Greet(|name| format!("hi {name}")));

        let (seen, k) = collect();
        run_pure(provide(supply, greeting), k);
        assert_eq!(*seen.borrow(), vec!["hi x".to_string()]);
    }

    #[test]
    fn test_seq_discards_first_value() {
        let (seen, k) = collect();
        run_pure(seq(pure::<Empty, _>("ignored"), pure(9)), k);
        assert_eq!(*seen.borrow(), vec![9]);
    }

    #[test]
    fn test_chain_cancels_live_side() {
        let gate = Gate::default();
        let e: Eff<HList![Gate], u32> = chain(wait(), |a| map(wait(), move |b| a + b));
        let (seen, k) = collect();
        let handle = run_pure(provide(Supply::new().with(gate.clone()), e), k);

        // Only the first wait is live
        gate.release(1);
        assert_eq!(gate.waiting.borrow().len(), 1);

        handle.cancel();
        assert_eq!(gate.cancelled.get(), 1);
        handle.cancel();
        assert_eq!(gate.cancelled.get(), 1);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_chain_handle_inert_after_completion() {
        let gate = Gate::default();
        let e: Eff<HList![Gate], u32> = chain(wait(), |a| map(wait(), move |b| a * b));
        let (seen, k) = collect();
        let handle = run_pure(provide(Supply::new().with(gate.clone()), e), k);

        assert!(handle.is_armed());
        gate.release(3);
        assert!(handle.is_armed());
        gate.release(4);
        assert_eq!(*seen.borrow(), vec![12]);
        assert!(!handle.is_armed());

        handle.cancel();
        assert_eq!(gate.cancelled.get(), 0);
    }

    #[test]
    fn test_completed_handles_are_disarmed() {
        let chained = run_pure(chain(pure(1), |a: i32| pure(a + 1)), |_| {});
        assert!(!chained.is_armed());

        let mapped = run_pure(map(pure(1), |a: i32| a * 2), |_| {});
        assert!(!mapped.is_armed());

        let gate = Gate::default();
        let waiting: Eff<HList![Gate], u32> = map(wait(), |v| v + 1);
        let handle = run_pure(provide(Supply::new().with(gate.clone()), waiting), |_| {});
        assert!(handle.is_armed());
        gate.release(1);
        assert!(!handle.is_armed());
    }

    #[test]
    fn test_chain_with_synchronous_first_step_forwards_to_second() {
        let gate = Gate::default();
        let e: Eff<HList![Gate], u32> = chain(pure(5), |a| map(wait(), move |b| a + b));
        let (seen, k) = collect();
        let handle = run_pure(provide(Supply::new().with(gate.clone()), e), k);

        assert!(handle.is_armed());
        handle.cancel();
        assert_eq!(gate.cancelled.get(), 1);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_embed_projects_record() {
        struct Name(&'static str);
        impl Capability for Name {
            const NAME: &'static str = "name";
        }

        let greeting: Eff<HList![Greet], String> =
            with_env(|env: &Env<'_, HList![Greet]>| (env.get::<Greet, _>().0)("embedded"));
        let adapted: Eff<HList![Name], String> = embed(
            |env: &Env<'_, HList![Name]>| {
                let prefix = env.get::<Name, _>().0;
                let greet: fn(&str) -> String = match prefix {
                    "loud" => |s| s.to_uppercase(),
                    _ => |s| s.to_string(),
                };
                Supply::new().with(Greet(greet))
            },
            greeting,
        );

        let (seen, k) = collect();
        run_pure(provide(Supply::new().with(Name("loud")), adapted), k);
        assert_eq!(*seen.borrow(), vec!["EMBEDDED".to_string()]);
    }

    #[test]
    fn test_widen_accepts_extra_capabilities() {
        let plain: Eff<Empty, u8> = pure(1);
        let widened: Eff<HList![Greet], u8> = plain.widen();
        let (seen, k) = collect();
        run_pure(provide(Supply::new().with(Greet(|s| s.to_string())), widened), k);
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn test_run_pure_discard_still_runs() {
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let e: Eff<Empty, ()> = with_env(move |_: &Env<'_, Empty>| flag.set(true));
        run_pure_discard(e);
        assert!(ran.get());
    }
}
