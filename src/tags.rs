use fxhash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::{ObjectId, Universe};

/// A monotonic timestamp from the universe's revision clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(pub(crate) u64);

impl Revision {
	pub(crate) const INITIAL: Revision = Revision(1);
}

/// Handle to one tag. A tag carries nothing but the revision at which it was
/// last dirtied; every "has this possibly changed" question in the crate
/// (computed caches, observer snapshots, chain tags) reduces to comparing
/// tag revisions against a snapshot revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TagId(u32);

/// A combination of tags, validated as a unit.
#[derive(Clone, Debug, Default)]
pub struct TagSet(pub(crate) SmallVec<[TagId; 8]>);

impl TagSet {
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// The result of capturing a tracked computation: the tags it consumed plus
/// the clock value at capture time. Valid until any of the tags is dirtied
/// past that revision.
#[derive(Clone, Debug)]
pub struct TagSnapshot {
	pub(crate) tags: TagSet,
	pub(crate) revision: Revision,
}

struct Frame {
	consumed: FxHashSet<TagId>,
	muted: bool,
}

pub(crate) struct TagTable {
	revisions: Vec<Revision>,
	clock: Revision,
	frames: Vec<Frame>,
	property_tags: FxHashMap<(ObjectId, String), TagId>,
	object_tags: FxHashMap<ObjectId, TagId>,
}

impl TagTable {
	pub(crate) fn new() -> Self {
		TagTable {
			revisions: Vec::new(),
			clock: Revision::INITIAL,
			frames: Vec::new(),
			property_tags: FxHashMap::default(),
			object_tags: FxHashMap::default(),
		}
	}

	pub(crate) fn create(&mut self) -> TagId {
		let id = TagId(self.revisions.len() as u32);
		self.revisions.push(Revision::INITIAL);
		id
	}

	pub(crate) fn clock(&self) -> Revision {
		self.clock
	}

	pub(crate) fn revision_of(&self, tag: TagId) -> Revision {
		self.revisions[tag.0 as usize]
	}

	pub(crate) fn dirty(&mut self, tag: TagId) {
		self.clock = Revision(self.clock.0 + 1);
		self.revisions[tag.0 as usize] = self.clock;
	}

	/// Whether the tag was consumed by a still-open tracking frame. A write
	/// that trips this has produced a derivation from a value it is now
	/// changing.
	pub(crate) fn consumed_in_open_frame(&self, tag: TagId) -> bool {
		self.frames
			.iter()
			.any(|frame| !frame.muted && frame.consumed.contains(&tag))
	}

	pub(crate) fn consume(&mut self, tag: TagId) {
		if let Some(frame) = self.frames.last_mut() {
			if !frame.muted {
				frame.consumed.insert(tag);
			}
		}
	}

	pub(crate) fn is_tracking(&self) -> bool {
		self.frames.last().map(|f| !f.muted).unwrap_or(false)
	}

	pub(crate) fn push_frame(&mut self, muted: bool) {
		self.frames.push(Frame {
			consumed: FxHashSet::default(),
			muted,
		});
	}

	/// Pops the current frame. Consumptions propagate into the enclosing
	/// frame, so a computation depends transitively on everything its nested
	/// computations read.
	pub(crate) fn pop_frame(&mut self) -> TagSet {
		let frame = self.frames.pop().expect("unbalanced tracking frame");
		if !frame.muted {
			if let Some(parent) = self.frames.last_mut() {
				if !parent.muted {
					parent.consumed.extend(frame.consumed.iter().copied());
				}
			}
		}
		let mut tags: SmallVec<[TagId; 8]> = frame.consumed.into_iter().collect();
		tags.sort_unstable_by_key(|t| t.0);
		TagSet(tags)
	}

	pub(crate) fn property_tag(&mut self, obj: ObjectId, key: &str) -> TagId {
		if let Some(tag) = self.property_tags.get(&(obj, key.to_owned())) {
			return *tag;
		}
		let tag = self.create();
		self.property_tags.insert((obj, key.to_owned()), tag);
		tag
	}

	pub(crate) fn object_tag(&mut self, obj: ObjectId) -> TagId {
		if let Some(tag) = self.object_tags.get(&obj) {
			return *tag;
		}
		let tag = self.create();
		self.object_tags.insert(obj, tag);
		tag
	}

	pub(crate) fn value_of(&self, set: &TagSet) -> Revision {
		set.0
			.iter()
			.map(|tag| self.revision_of(*tag))
			.max()
			.unwrap_or(Revision::INITIAL)
	}
}

impl Universe {
	/// Lazily allocates the fine-grained tag for `(obj, key)`.
	pub fn tag_for_property(&mut self, obj: ObjectId, key: &str) -> TagId {
		self.tags.property_tag(obj, key)
	}

	/// The coarse whole-object tag, dirtied on every notification against
	/// the object.
	pub fn tag_for_object(&mut self, obj: ObjectId) -> TagId {
		self.tags.object_tag(obj)
	}

	/// Runs `f` inside a tracking frame and captures everything it consumed.
	pub fn track<R>(&mut self, f: impl FnOnce(&mut Universe) -> R) -> (R, TagSnapshot) {
		self.tags.push_frame(false);
		let result = f(self);
		let tags = self.tags.pop_frame();
		let revision = self.tags.clock();
		(result, TagSnapshot { tags, revision })
	}

	/// Runs `f` with consumption suppressed.
	pub fn untrack<R>(&mut self, f: impl FnOnce(&mut Universe) -> R) -> R {
		self.tags.push_frame(true);
		let result = f(self);
		let _ = self.tags.pop_frame();
		result
	}

	/// True while no tag in the snapshot has moved past the captured
	/// revision.
	pub fn validate(&self, snapshot: &TagSnapshot) -> bool {
		self.tags.value_of(&snapshot.tags) <= snapshot.revision
	}

	pub(crate) fn consume(&mut self, tag: TagId) {
		self.tags.consume(tag);
	}

	pub(crate) fn consume_set(&mut self, set: &TagSet) {
		for tag in set.0.clone() {
			self.tags.consume(tag);
		}
	}

	pub(crate) fn consume_property_tag(&mut self, obj: ObjectId, key: &str) {
		if self.tags.is_tracking() {
			let tag = self.tags.property_tag(obj, key);
			self.tags.consume(tag);
		}
	}

	pub(crate) fn dirty_property_tag(&mut self, obj: ObjectId, key: &str) {
		let tag = self.tags.property_tag(obj, key);
		if self.tags.consumed_in_open_frame(tag) {
			tracing::warn!(
				object = %obj,
				key,
				"property mutated after it was already read by the active computation"
			);
		}
		self.tags.dirty(tag);
	}

	pub(crate) fn dirty_object_tag(&mut self, obj: ObjectId) {
		let tag = self.tags.object_tag(obj);
		self.tags.dirty(tag);
	}
}
