use std::fmt;
use std::rc::Rc;

use fxhash::FxHashMap;

use crate::{Universe, Value};

/// Stable handle to an object slot. Slots are never recycled, so a stale id
/// can always be interrogated for its destroyed flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u32);

impl fmt::Display for ObjectId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<Object:{}>", self.0)
	}
}

/// Fallback invoked by `get` when a key resolves to nothing on the object or
/// its prototypes.
pub type UnknownHook = Rc<dyn Fn(&mut Universe, ObjectId, &str) -> Value>;

/// Per-object "property did change" hook, invoked directly from
/// `notify_property_change`.
pub type ChangeHook = Rc<dyn Fn(&mut Universe, ObjectId, &str)>;

pub(crate) struct Slot {
	pub(crate) properties: FxHashMap<String, Value>,
	pub(crate) proto: Option<ObjectId>,
	pub(crate) unknown_property: Option<UnknownHook>,
	pub(crate) change_hook: Option<ChangeHook>,
	pub(crate) is_destroying: bool,
	pub(crate) is_destroyed: bool,
}

impl Slot {
	fn new(proto: Option<ObjectId>) -> Self {
		Slot {
			properties: FxHashMap::default(),
			proto,
			unknown_property: None,
			change_hook: None,
			is_destroying: false,
			is_destroyed: false,
		}
	}
}

pub(crate) struct ObjectArena {
	slots: Vec<Slot>,
}

impl ObjectArena {
	pub(crate) fn new() -> Self {
		ObjectArena { slots: Vec::new() }
	}

	pub(crate) fn alloc(&mut self, proto: Option<ObjectId>) -> ObjectId {
		let id = ObjectId(self.slots.len() as u32);
		self.slots.push(Slot::new(proto));
		id
	}

	pub(crate) fn slot(&self, id: ObjectId) -> &Slot {
		self.slots
			.get(id.0 as usize)
			.expect("object id does not belong to this universe")
	}

	pub(crate) fn slot_mut(&mut self, id: ObjectId) -> &mut Slot {
		self.slots
			.get_mut(id.0 as usize)
			.expect("object id does not belong to this universe")
	}
}

impl Universe {
	pub fn create_object(&mut self) -> ObjectId {
		self.objects.alloc(None)
	}

	pub fn create_object_with_proto(&mut self, proto: ObjectId) -> ObjectId {
		let _ = self.objects.slot(proto);
		self.objects.alloc(Some(proto))
	}

	pub fn proto_of(&self, obj: ObjectId) -> Option<ObjectId> {
		self.objects.slot(obj).proto
	}

	/// Marks an object as a prototype. Prototype metadata is never "live":
	/// notifications against it are swallowed, and instances materialize
	/// their own metadata instead of mutating the prototype's.
	pub fn mark_prototype(&mut self, obj: ObjectId) {
		self.meta_mut(obj).is_prototype_meta = true;
	}

	pub fn set_unknown_property(&mut self, obj: ObjectId, hook: UnknownHook) {
		self.objects.slot_mut(obj).unknown_property = Some(hook);
	}

	pub fn set_change_hook(&mut self, obj: ObjectId, hook: ChangeHook) {
		self.objects.slot_mut(obj).change_hook = Some(hook);
	}

	pub fn is_destroying(&self, obj: ObjectId) -> bool {
		self.objects.slot(obj).is_destroying
	}

	pub fn is_destroyed(&self, obj: ObjectId) -> bool {
		self.objects.slot(obj).is_destroyed
	}

	/// Begins tearing an object down. Cascades targeting the object become
	/// no-ops immediately; the heavier cleanup (chains, observers, metadata)
	/// runs as a finalize step, deferred to the end of the current batch when
	/// one is open.
	pub fn destroy_object(&mut self, obj: ObjectId) {
		let slot = self.objects.slot_mut(obj);
		if slot.is_destroying {
			return;
		}
		slot.is_destroying = true;
		self.meta_mut(obj).is_source_destroying = true;

		if self.batch_depth > 0 {
			self.pending_finalize.push(obj);
		} else {
			self.finalize_destroy(obj);
		}
	}

	pub(crate) fn finalize_destroy(&mut self, obj: ObjectId) {
		let root = self.metas.get(&obj).and_then(|m| m.root_chain);
		if let Some(root) = root {
			crate::chains::destroy_root(self, root);
		}
		self.observers.prune(obj);
		if let Some(meta) = self.metas.get_mut(&obj) {
			meta.is_meta_destroyed = true;
			meta.cache.clear();
			meta.tracked.clear();
			meta.deps.clear();
			meta.watching.clear();
			meta.lazy_chains.clear();
		}
		let slot = self.objects.slot_mut(obj);
		slot.is_destroyed = true;
		slot.properties.clear();
		slot.unknown_property = None;
		slot.change_hook = None;
	}
}
