//! Capability records
//!
//! A capability is a Rust type whose value is the implementation a computation
//! calls into. A [`Record`] maps capability types to implementations and is
//! built from nested scopes: every `provide` pushes one scope, and lookups walk
//! from the innermost scope outwards, so the scope closest to the computation
//! wins when two scopes supply the same capability.
//!
//! [`Supply`] builds one scope while recording, at the type level, which
//! capabilities it carries. [`Env`] is the read-only view handed to a
//! computation; it only hands out capabilities the computation's requirement
//! list declares.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use capfx_error::{fail_fast, EffectError, EffectResult};
use frunk::hlist::{HCons, HNil};

use crate::requirement::Has;

//-----------------------------------------------------------------------------
// Capability Trait
//-----------------------------------------------------------------------------

/// A named capability a computation can require.
///
/// The implementing type is both the key in the record and the implementation
/// stored under it. `NAME` is used for diagnostics only.
pub trait Capability: 'static {
    /// Name the capability is known by, e.g. `"print"` or `"catchError"`
    const NAME: &'static str;
}

//-----------------------------------------------------------------------------
// Record
//-----------------------------------------------------------------------------

#[derive(Clone)]
struct Entry {
    name: &'static str,
    value: Rc<dyn Any>,
}

type Entries = HashMap<TypeId, Entry>;

struct Scope {
    entries: Rc<Entries>,
    parent: Option<Rc<Scope>>,
}

/// Runtime capability record: an immutable chain of scopes, innermost first.
///
/// Cloning is cheap; scopes are shared.
#[derive(Clone, Default)]
pub struct Record {
    scope: Option<Rc<Scope>>,
}

impl Record {
    /// The record with no capabilities
    pub fn empty() -> Self {
        Self::default()
    }

    /// A record with `layer` as its innermost scope and `self` as the residual
    pub fn extend(&self, layer: &Layer) -> Record {
        Record {
            scope: Some(Rc::new(Scope {
                entries: Rc::clone(&layer.entries),
                parent: self.scope.clone(),
            })),
        }
    }

    /// Find the innermost implementation of `C`
    pub fn lookup<C: Capability>(&self) -> EffectResult<&C> {
        let key = TypeId::of::<C>();
        let mut scope = self.scope.as_deref();
        while let Some(current) = scope {
            if let Some(entry) = current.entries.get(&key) {
                return entry
                    .value
                    .downcast_ref::<C>()
                    .ok_or(EffectError::CapabilityTypeMismatch { name: entry.name });
            }
            scope = current.parent.as_deref();
        }
        Err(EffectError::MissingCapability { name: C::NAME })
    }

    /// Number of scopes, innermost included
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut scope = self.scope.as_deref();
        while let Some(current) = scope {
            depth += 1;
            scope = current.parent.as_deref();
        }
        depth
    }

    /// Capability names visible through this record, innermost scope first
    pub fn names(&self) -> Vec<&'static str> {
        let mut seen = Vec::new();
        let mut names = Vec::new();
        let mut scope = self.scope.as_deref();
        while let Some(current) = scope {
            let mut layer: Vec<_> = current
                .entries
                .iter()
                .filter(|(key, _)| !seen.contains(*key))
                .map(|(key, entry)| (*key, entry.name))
                .collect();
            layer.sort_by_key(|(_, name)| *name);
            for (key, name) in layer {
                seen.push(key);
                names.push(name);
            }
            scope = current.parent.as_deref();
        }
        names
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("depth", &self.depth())
            .field("capabilities", &self.names())
            .finish()
    }
}

//-----------------------------------------------------------------------------
// Supplied Capabilities
//-----------------------------------------------------------------------------

/// One frozen scope of implementations, ready to be pushed onto a record
#[derive(Clone)]
pub struct Layer {
    entries: Rc<Entries>,
}

impl Layer {
    /// Capability names in this layer, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.values().map(|entry| entry.name).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Layer").field(&self.names()).finish()
    }
}

/// Builder for a set of capability implementations.
///
/// `S` lists the supplied capability types, most recently added first.
pub struct Supply<S> {
    entries: Entries,
    _caps: PhantomData<fn() -> S>,
}

impl Supply<HNil> {
    /// An empty supply
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            _caps: PhantomData,
        }
    }
}

impl Default for Supply<HNil> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Supply<S> {
    /// Add an implementation of `C`
    pub fn with<C: Capability>(mut self, capability: C) -> Supply<HCons<C, S>> {
        self.entries.insert(
            TypeId::of::<C>(),
            Entry {
                name: C::NAME,
                value: Rc::new(capability),
            },
        );
        Supply {
            entries: self.entries,
            _caps: PhantomData,
        }
    }

    /// Freeze into a scope
    pub fn into_layer(self) -> Layer {
        Layer {
            entries: Rc::new(self.entries),
        }
    }

    /// A standalone record holding exactly these capabilities
    pub fn into_record(self) -> Record {
        Record::empty().extend(&self.into_layer())
    }
}

impl<S> Clone for Supply<S> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            _caps: PhantomData,
        }
    }
}

impl<S> fmt::Debug for Supply<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.values().map(|entry| entry.name).collect();
        names.sort_unstable();
        f.debug_tuple("Supply").field(&names).finish()
    }
}

//-----------------------------------------------------------------------------
// Typed View
//-----------------------------------------------------------------------------

/// Read-only view of a record restricted to the requirement list `R`.
///
/// Only capabilities declared in `R` can be read:
///
/// ```compile_fail
/// use capfx_core::{Capability, Env, HList, Record};
///
/// struct Label(&'static str);
/// impl Capability for Label {
///     const NAME: &'static str = "label";
/// }
/// struct Secret(&'static str);
/// impl Capability for Secret {
///     const NAME: &'static str = "secret";
/// }
///
/// let record = Record::empty();
/// let env: Env<'_, HList![Label]> = Env::new(&record);
/// let _ = env.get::<Secret, _>();
/// ```
///
/// and the view does not hand out the record behind it:
///
/// ```compile_fail
/// use capfx_core::{Env, Empty, Record};
///
/// let record = Record::empty();
/// let env: Env<'_, Empty> = Env::new(&record);
/// let _ = env.record();
/// ```
pub struct Env<'a, R> {
    record: &'a Record,
    _req: PhantomData<fn() -> R>,
}

impl<'a, R> Env<'a, R> {
    /// View `record` as satisfying `R`.
    ///
    /// The caller vouches that every capability in `R` is present.
    pub fn new(record: &'a Record) -> Self {
        Self {
            record,
            _req: PhantomData,
        }
    }

    /// The implementation of a declared capability
    pub fn get<C, I>(&self) -> &'a C
    where
        C: Capability,
        R: Has<C, I>,
    {
        self.record
            .lookup::<C>()
            .unwrap_or_else(|err| fail_fast(err))
    }
}

impl<R> Clone for Env<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Env<'_, R> {}

impl<R> fmt::Debug for Env<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Env").field(self.record).finish()
    }
}

//-----------------------------------------------------------------------------
// Tests
//-----------------------------------------------------------------------------
