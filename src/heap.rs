//! Per-engine arena for `Object`/`Native` values.
//!
//! Grounded on `ouros::heap`'s arena-of-values design, scaled down: this
//! crate has no reference counting and no generational reuse bookkeeping.
//! `spec.md` §9 ("Object references and cycles") explicitly recommends an
//! arena with index-based handles over a tracing collector, since object
//! lifetime is bounded by the engine's lifetime and cycles through
//! `Handle`-typed fields never need to be collected mid-run.
//!
//! A [`HeapId`] is a raw index. It is only ever handed out by the [`Heap`]
//! that owns the slot it names; indexing a different engine's heap with it
//! is a caller bug, not a memory-safety hazard, since `Heap` uses checked
//! `Vec` indexing throughout.

use indexmap::IndexMap;

use crate::interop::NativeObject;
use crate::value::Value;

/// Stable index into a [`Heap`]'s arena. Doubles as the representation of a
/// non-null [`crate::value::Handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(pub(crate) usize);

impl HeapId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A script-visible class instance: a type name plus an ordered field map
/// (`spec.md` §3 "Runtime Values"), backed by `indexmap` (the crate `ouros`
/// itself reaches for in `object.rs` for this exact ordered-string-keyed-map
/// concern) so field iteration follows declaration order.
#[derive(Debug, Default)]
pub struct ObjectData {
    pub type_name: String,
    pub fields: IndexMap<String, Value>,
}

impl ObjectData {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }
}

/// Host-provided opaque value exposed to scripts (`spec.md` GLOSSARY
/// "Native"). Modeled as a boxed trait object plus a type tag, per
/// `spec.md` §9's suggested strategy for the "dynamic `any` at the native
/// boundary" (`Box<dyn Any>` there; here `dyn NativeObject` so the host can
/// additionally expose properties/methods/indexing to scripts).
pub struct NativeData {
    pub type_name: String,
    pub value: Box<dyn NativeObject>,
}

impl std::fmt::Debug for NativeData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeData").field("type_name", &self.type_name).finish_non_exhaustive()
    }
}

/// What a [`HeapId`] slot holds.
#[derive(Debug)]
pub enum HeapData {
    Object(ObjectData),
    Native(NativeData),
}

/// The per-engine arena. Never shrinks; slots are not recycled (no script in
/// this language's scope ever explicitly frees an object, and engine
/// lifetime bounds arena lifetime per `spec.md` §9).
#[derive(Debug, Default)]
pub struct Heap {
    slots: Vec<HeapData>,
}

impl Heap {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn allocate(&mut self, data: HeapData) -> HeapId {
        let id = HeapId(self.slots.len());
        self.slots.push(data);
        id
    }

    pub fn get(&self, id: HeapId) -> &HeapData {
        &self.slots[id.index()]
    }

    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.slots[id.index()]
    }

    pub fn object(&self, id: HeapId) -> Option<&ObjectData> {
        match self.get(id) {
            HeapData::Object(o) => Some(o),
            HeapData::Native(_) => None,
        }
    }

    pub fn object_mut(&mut self, id: HeapId) -> Option<&mut ObjectData> {
        match self.get_mut(id) {
            HeapData::Object(o) => Some(o),
            HeapData::Native(_) => None,
        }
    }

    pub fn native(&self, id: HeapId) -> Option<&NativeData> {
        match self.get(id) {
            HeapData::Native(n) => Some(n),
            HeapData::Object(_) => None,
        }
    }

    pub fn native_mut(&mut self, id: HeapId) -> Option<&mut NativeData> {
        match self.get_mut(id) {
            HeapData::Native(n) => Some(n),
            HeapData::Object(_) => None,
        }
    }

    /// Number of live slots. Exposed for tests and for a host curious about
    /// memory growth; there is no `HeapStats`/`HeapDiff` machinery here
    /// since this engine never recycles slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
