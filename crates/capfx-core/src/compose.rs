//! Sequential composer
//!
//! [`do_env`] turns an `async` block into a computation. Inside the block,
//! `step.perform(e).await` yields the computation `e` and resumes with its
//! result, so the block reads like straight-line code:
//!
//! ```ignore
//! let e: Eff<HList![Print, Read], ()> = do_env(|step| async move {
//!     step.perform(print("> ")).await;
//!     let line = step.perform(read()).await;
//!     print(&line)
//! });
//! ```
//!
//! The block is a coroutine, not a task: it is polled by the composer with a
//! no-op waker and may only suspend on `perform`. Each yielded computation runs
//! against the composer's record; when its continuation fires, the block is
//! polled again. A step that completes synchronously is resumed from the
//! driving loop rather than from inside the continuation, so long runs of
//! synchronous steps use constant stack. The value the block returns is itself a
//! computation and becomes the composer's tail.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use capfx_error::{fail_fast, EffectError};

use crate::cancel::{Cancel, CancelSlot};
use crate::capability::Record;
use crate::computation::{Cont, Eff, Runner};
use crate::logging::log_composer_step;

/// A yielded computation with its result type erased
type Yielded = Box<dyn FnOnce(&Record, Box<dyn FnOnce()>) -> Cancel>;

#[derive(Default)]
struct Mailbox {
    yielded: RefCell<Option<Yielded>>,
}

//-----------------------------------------------------------------------------
// Step Handle
//-----------------------------------------------------------------------------

/// Handle through which a composer body yields computations
pub struct Step<R> {
    mailbox: Rc<Mailbox>,
    _req: PhantomData<fn() -> R>,
}

impl<R> Step<R> {
    /// Yield `e`; resolves to its result once its continuation fires
    pub fn perform<A: 'static>(&self, e: Eff<R, A>) -> Perform<A> {
        Perform {
            mailbox: Rc::clone(&self.mailbox),
            runner: Some(e.runner()),
            result: Rc::new(RefCell::new(None)),
        }
    }
}

impl<R> Clone for Step<R> {
    fn clone(&self) -> Self {
        Self {
            mailbox: Rc::clone(&self.mailbox),
            _req: PhantomData,
        }
    }
}

/// Future returned by [`Step::perform`]
#[must_use = "a yielded computation only runs when awaited"]
pub struct Perform<A> {
    mailbox: Rc<Mailbox>,
    runner: Option<Runner<A>>,
    result: Rc<RefCell<Option<A>>>,
}

impl<A: 'static> Future for Perform<A> {
    type Output = A;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<A> {
        let ready = self.result.borrow_mut().take();
        if let Some(a) = ready {
            return Poll::Ready(a);
        }
        if let Some(runner) = self.runner.take() {
            let result = Rc::clone(&self.result);
            let yielded: Yielded = Box::new(move |record: &Record, resume: Box<dyn FnOnce()>| {
                runner(
                    record,
                    Box::new(move |a: A| {
                        *result.borrow_mut() = Some(a);
                        resume();
                    }),
                )
            });
            *self.mailbox.yielded.borrow_mut() = Some(yielded);
        }
        Poll::Pending
    }
}

//-----------------------------------------------------------------------------
// Driver
//-----------------------------------------------------------------------------

type Body<R, A> = Pin<Box<dyn Future<Output = Eff<R, A>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepState {
    Running,
    CompletedSync,
    Suspended,
}

struct Driver<R, A> {
    record: Record,
    mailbox: Rc<Mailbox>,
    body: RefCell<Option<Body<R, A>>>,
    k: RefCell<Option<Cont<A>>>,
    slot: CancelSlot,
}

impl<R: 'static, A: 'static> Driver<R, A> {
    fn drive(this: &Rc<Self>) {
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        loop {
            let polled = {
                let mut body = this.body.borrow_mut();
                let Some(fut) = body.as_mut() else {
                    return;
                };
                fut.as_mut().poll(&mut cx)
            };

            match polled {
                Poll::Ready(tail) => {
                    this.body.borrow_mut().take();
                    let Some(k) = this.k.borrow_mut().take() else {
                        return;
                    };
                    let generation = this.slot.advance();
                    let done = this.slot.clone();
                    let handle = tail.run(
                        &this.record,
                        Box::new(move |a: A| {
                            done.finish();
                            k(a)
                        }),
                    );
                    this.slot.install_for(generation, handle);
                    return;
                }
                Poll::Pending => {
                    let yielded = this.mailbox.yielded.borrow_mut().take();
                    let Some(yielded) = yielded else {
                        fail_fast(EffectError::ForeignSuspension);
                    };
                    let generation = this.slot.advance();
                    let state = Rc::new(Cell::new(StepState::Running));
                    let resume = {
                        let this = Rc::clone(this);
                        let state = Rc::clone(&state);
                        Box::new(move || match state.get() {
                            StepState::Running => state.set(StepState::CompletedSync),
                            _ => {
                                log_composer_step(generation, false);
                                Driver::drive(&this)
                            }
                        })
                    };
                    let handle = yielded(&this.record, resume);
                    if state.get() == StepState::CompletedSync {
                        log_composer_step(generation, true);
                        continue;
                    }
                    state.set(StepState::Suspended);
                    this.slot.install_for(generation, handle);
                    return;
                }
            }
        }
    }
}

//-----------------------------------------------------------------------------
// Composers
//-----------------------------------------------------------------------------

/// Build a computation from a coroutine body.
///
/// Every computation the body yields shares the composer's requirement list,
/// as does the tail it returns, so the composer needs the union of all of them.
/// The returned handle forwards to whichever step is in flight.
/// do_env : (Step R → Future (Eff R A)) → Eff R A
pub fn do_env<R, A, F, Fut>(body: F) -> Eff<R, A>
where
    R: 'static,
    A: 'static,
    F: Fn(Step<R>) -> Fut + 'static,
    Fut: Future<Output = Eff<R, A>> + 'static,
{
    Eff::from_runner(Rc::new(move |record: &Record, k: Cont<A>| {
        let mailbox = Rc::new(Mailbox::default());
        let coroutine = body(Step {
            mailbox: Rc::clone(&mailbox),
            _req: PhantomData,
        });
        let driver = Rc::new(Driver {
            record: record.clone(),
            mailbox,
            body: RefCell::new(Some(Box::pin(coroutine) as Body<R, A>)),
            k: RefCell::new(Some(k)),
            slot: CancelSlot::new(),
        });
        Driver::drive(&driver);
        driver.slot.handle()
    }))
}

/// Repeat a computation indefinitely; never produces a value
/// forever : Eff R A → Eff R B
pub fn forever<R, A, B>(e: Eff<R, A>) -> Eff<R, B>
where
    R: 'static,
    A: 'static,
    B: 'static,
{
    do_env(move |step: Step<R>| {
        let e = e.clone();
        async move {
            loop {
                step.perform(e.clone()).await;
            }
        }
    })
}

//-----------------------------------------------------------------------------
// Tests
//-----------------------------------------------------------------------------
