pub mod macros;

mod alias;
mod chain_tags;
mod chains;
mod computed;
mod dependent_keys;
mod descriptor;
mod error;
mod meta;
mod object;
mod observer;
mod observer_set;
mod property_events;
mod property_get;
mod property_set;
mod tags;
mod tracked;
mod value;
mod watching;

use fxhash::{FxHashMap, FxHashSet};

pub use alias::{alias, AliasedProperty};
pub use computed::{computed, ComputedProperty, Getter, Setter};
pub use descriptor::Descriptor;
pub use error::Error;
pub use object::{ChangeHook, ObjectId, UnknownHook};
pub use observer::ObserverFn;
pub use tags::{Revision, TagId, TagSet, TagSnapshot};
pub use value::Value;

use chains::ChainArena;
use meta::Meta;
use object::ObjectArena;
use observer::ObserverRegistry;
use observer_set::ObserverSet;
use tags::TagTable;

/// One self-contained reactivity universe: the object graph, all per-object
/// metadata, the tag clock, chain watchers and observer registrations live
/// here. Universes are fully independent of each other, so tests can each
/// build their own.
pub struct Universe {
	pub(crate) objects: ObjectArena,
	pub(crate) metas: FxHashMap<ObjectId, Meta>,
	pub(crate) tags: TagTable,
	pub(crate) chains: ChainArena,
	pub(crate) observers: ObserverRegistry,
	pub(crate) queue: ObserverSet,
	pub(crate) batch_depth: u32,
	pub(crate) cascade_seen: Option<FxHashMap<ObjectId, FxHashSet<String>>>,
	pub(crate) pending_finalize: Vec<ObjectId>,
}

impl Universe {
	pub fn new() -> Self {
		Universe {
			objects: ObjectArena::new(),
			metas: FxHashMap::default(),
			tags: TagTable::new(),
			chains: ChainArena::new(),
			observers: ObserverRegistry::new(),
			queue: ObserverSet::new(),
			batch_depth: 0,
			cascade_seen: None,
			pending_finalize: Vec::new(),
		}
	}
}

impl Default for Universe {
	fn default() -> Self {
		Universe::new()
	}
}

pub(crate) const RESERVED_SEGMENTS: &[&str] = &["__proto__", "constructor", "prototype"];

pub(crate) fn assert_valid_path_segment(segment: &str) {
	assert!(
		!segment.is_empty(),
		"property paths must not contain empty segments"
	);
	assert!(
		!RESERVED_SEGMENTS.contains(&segment),
		"property paths must not traverse `{}`",
		segment
	);
}
