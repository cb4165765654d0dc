use fxhash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::chains::ChainNodeId;
use crate::descriptor::Descriptor;
use crate::tags::{TagId, TagSnapshot};
use crate::{ObjectId, Universe, Value};

/// One slot in the per-object value cache. Computed properties store their
/// last result plus the snapshot it was captured under; aliases store a bare
/// marker recording that dependent-key bookkeeping is established.
#[derive(Clone, Debug)]
pub(crate) enum CacheEntry {
	Value {
		value: Value,
		snapshot: TagSnapshot,
	},
	Consumed,
}

/// The per-object side-table. Created lazily on the first operation that
/// needs bookkeeping and torn down when the owning object is finalized.
/// Instances never mutate their prototype's record: descriptor lookups walk
/// the prototype chain read-only, while counters and caches always land in
/// the instance's own record.
pub(crate) struct Meta {
	pub(crate) watching: FxHashMap<String, u32>,
	/// depKey -> dependerKey -> count.
	pub(crate) deps: FxHashMap<String, FxHashMap<String, u32>>,
	/// Keys whose dependent-key registrations are currently live.
	pub(crate) deps_registered: FxHashSet<String>,
	pub(crate) cache: FxHashMap<String, CacheEntry>,
	pub(crate) descriptors: FxHashMap<String, Descriptor>,
	pub(crate) chain_watchers: FxHashMap<String, SmallVec<[ChainNodeId; 2]>>,
	pub(crate) lazy_chains: FxHashMap<String, SmallVec<[TagId; 2]>>,
	/// Keys whose computed setter is currently executing on this object.
	pub(crate) suspended: FxHashSet<String>,
	pub(crate) tracked: FxHashMap<String, Value>,
	pub(crate) root_chain: Option<ChainNodeId>,
	pub(crate) is_initializing: bool,
	pub(crate) is_prototype_meta: bool,
	pub(crate) is_source_destroying: bool,
	pub(crate) is_meta_destroyed: bool,
}

impl Meta {
	pub(crate) fn new() -> Self {
		Meta {
			watching: FxHashMap::default(),
			deps: FxHashMap::default(),
			deps_registered: FxHashSet::default(),
			cache: FxHashMap::default(),
			descriptors: FxHashMap::default(),
			chain_watchers: FxHashMap::default(),
			lazy_chains: FxHashMap::default(),
			suspended: FxHashSet::default(),
			tracked: FxHashMap::default(),
			root_chain: None,
			is_initializing: false,
			is_prototype_meta: false,
			is_source_destroying: false,
			is_meta_destroyed: false,
		}
	}

	pub(crate) fn peek_watching(&self, key: &str) -> u32 {
		self.watching.get(key).copied().unwrap_or(0)
	}
}

impl Universe {
	pub(crate) fn meta(&self, obj: ObjectId) -> Option<&Meta> {
		self.metas.get(&obj)
	}

	pub(crate) fn meta_mut(&mut self, obj: ObjectId) -> &mut Meta {
		self.metas.entry(obj).or_insert_with(Meta::new)
	}

	/// Descriptor lookup walks the prototype chain; counters and caches do
	/// not.
	pub(crate) fn find_descriptor(&self, obj: ObjectId, key: &str) -> Option<Descriptor> {
		let mut cursor = Some(obj);
		while let Some(id) = cursor {
			if let Some(desc) = self.metas.get(&id).and_then(|m| m.descriptors.get(key)) {
				return Some(desc.clone());
			}
			cursor = self.objects.slot(id).proto;
		}
		None
	}

	/// Marks the object as mid-construction: notifications are swallowed
	/// until `finish_init`.
	pub fn begin_init(&mut self, obj: ObjectId) {
		self.meta_mut(obj).is_initializing = true;
	}

	pub fn finish_init(&mut self, obj: ObjectId) {
		self.meta_mut(obj).is_initializing = false;
	}
}
