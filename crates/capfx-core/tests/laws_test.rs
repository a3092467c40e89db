//! Property tests for the composition laws
//!
//! Two computations are observationally equal when, run against fresh
//! capabilities, they deliver the same results and make the same capability
//! calls in the same order.

use std::cell::RefCell;
use std::rc::Rc;

use capfx_core::{
    chain, do_env, map, provide, pure, run_pure, with_env, Capability, Eff, Env, Has, Supply,
    HList,
};
use proptest::prelude::*;

#[derive(Clone, Default)]
struct Journal {
    entries: Rc<RefCell<Vec<i64>>>,
}

impl Capability for Journal {
    const NAME: &'static str = "journal";
}

struct Offset(i64);

impl Capability for Offset {
    const NAME: &'static str = "offset";
}

/// Record `n` in the journal and pass it through
fn note<R, I>(n: i64) -> Eff<R, i64>
where
    R: Has<Journal, I>,
{
    with_env(move |env: &Env<'_, R>| {
        env.get::<Journal, I>().entries.borrow_mut().push(n);
        n
    })
}

type Journaled = HList![Journal];

#[derive(Debug, PartialEq)]
struct Observation {
    results: Vec<i64>,
    journal: Vec<i64>,
}

fn observe(e: Eff<Journaled, i64>) -> Observation {
    let journal = Journal::default();
    let results = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&results);
    run_pure(provide(Supply::new().with(journal.clone()), e), move |a| {
        sink.borrow_mut().push(a)
    });
    let results = results.borrow().clone();
    let journal = journal.entries.borrow().clone();
    Observation { results, journal }
}

/// A Kleisli arrow: journal the input, then return an affine image of it
fn step(m: i64, c: i64) -> impl Fn(i64) -> Eff<Journaled, i64> + Clone + 'static {
    move |a: i64| map(note(a), move |x: i64| x.wrapping_mul(m).wrapping_add(c))
}

fn seed(a: i64) -> Eff<Journaled, i64> {
    chain(note(a), |x| note(x.wrapping_add(1)))
}

proptest! {
    #[test]
    fn left_identity(a in any::<i64>(), m in -8i64..8, c in -100i64..100) {
        let f = step(m, c);
        prop_assert_eq!(observe(chain(pure(a), f.clone())), observe(f(a)));
    }

    #[test]
    fn right_identity(a in any::<i64>()) {
        prop_assert_eq!(observe(chain(seed(a), pure)), observe(seed(a)));
    }

    #[test]
    fn associativity(
        a in any::<i64>(),
        (m1, c1) in (-8i64..8, -100i64..100),
        (m2, c2) in (-8i64..8, -100i64..100),
    ) {
        let f = step(m1, c1);
        let g = step(m2, c2);

        let left = chain(chain(seed(a), f.clone()), g.clone());
        let right = chain(seed(a), move |x| chain(f(x), g.clone()));
        prop_assert_eq!(observe(left), observe(right));
    }

    #[test]
    fn map_identity(a in any::<i64>()) {
        prop_assert_eq!(observe(map(seed(a), |x| x)), observe(seed(a)));
    }

    #[test]
    fn map_fusion(a in any::<i64>(), m in -8i64..8, c in -100i64..100) {
        let f = move |x: i64| x.wrapping_mul(m);
        let g = move |x: i64| x.wrapping_add(c);
        prop_assert_eq!(
            observe(map(map(seed(a), f), g)),
            observe(map(seed(a), move |x| g(f(x))))
        );
    }

    #[test]
    fn composer_matches_nested_chain(a in any::<i64>(), m in -8i64..8, c in -100i64..100) {
        let composed: Eff<Journaled, i64> = do_env(move |step| async move {
            let a1 = step.perform(note(a)).await;
            let a2 = step.perform(note(a1.wrapping_mul(m))).await;
            pure(a1.wrapping_add(a2).wrapping_add(c))
        });
        let chained: Eff<Journaled, i64> = chain(note(a), move |a1| {
            chain(note(a1.wrapping_mul(m)), move |a2| pure(a1.wrapping_add(a2).wrapping_add(c)))
        });
        prop_assert_eq!(observe(composed), observe(chained));
    }

    #[test]
    fn provide_in_stages_matches_provide_at_once(a in any::<i64>(), offset in -1000i64..1000) {
        let shifted = || -> Eff<HList![Journal, Offset], i64> {
            chain(
                with_env(|env: &Env<'_, HList![Journal, Offset]>| env.get::<Offset, _>().0),
                move |o| note(a.wrapping_add(o)),
            )
        };

        let staged: Eff<Journaled, i64> = provide(Supply::new().with(Offset(offset)), shifted());

        let journal = Journal::default();
        let results = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&results);
        let all = Supply::new().with(journal.clone()).with(Offset(offset));
        run_pure(provide(all, shifted()), move |v| sink.borrow_mut().push(v));
        let at_once = Observation {
            results: results.borrow().clone(),
            journal: journal.entries.borrow().clone(),
        };

        prop_assert_eq!(observe(staged), at_once);
    }
}
