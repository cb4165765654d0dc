use std::rc::Rc;

use fxhash::FxHashMap;

use crate::tags::TagSnapshot;
use crate::{ObjectId, Universe};

pub type ObserverFn = Rc<dyn Fn(&mut Universe, ObjectId, &str)>;

struct ObserverEntry {
	func: ObserverFn,
	count: u32,
	snapshot: Option<TagSnapshot>,
}

/// Registry of active observers keyed by (object, path). Registering the
/// same function twice bumps a reference count instead of double-watching;
/// each entry keeps a tag snapshot so `flush_invalid_observers` can re-send
/// events for anything that moved outside the eager notification paths.
pub(crate) struct ObserverRegistry {
	entries: FxHashMap<(ObjectId, String), Vec<ObserverEntry>>,
}

impl ObserverRegistry {
	pub(crate) fn new() -> Self {
		ObserverRegistry {
			entries: FxHashMap::default(),
		}
	}

	pub(crate) fn prune(&mut self, obj: ObjectId) {
		self.entries.retain(|(o, _), _| *o != obj);
	}
}

impl Universe {
	/// Registers `func` to run when `path` changes on `obj`. Dotted paths
	/// are chain-watched; single keys are watched directly. Either way the
	/// entry captures a tag snapshot over the path.
	pub fn add_observer(&mut self, obj: ObjectId, path: &str, func: ObserverFn) {
		let existing = self
			.observers
			.entries
			.get_mut(&(obj, path.to_owned()))
			.and_then(|list| list.iter_mut().find(|e| Rc::ptr_eq(&e.func, &func)));
		if let Some(entry) = existing {
			// One watch per entry; a repeat registration only moves the count.
			entry.count += 1;
			return;
		}

		crate::watching::watch(self, obj, path);
		let snapshot = self.capture_observer_snapshot(obj, path);
		self.observers
			.entries
			.entry((obj, path.to_owned()))
			.or_default()
			.push(ObserverEntry {
				func,
				count: 1,
				snapshot: Some(snapshot),
			});
	}

	pub fn remove_observer(&mut self, obj: ObjectId, path: &str, func: &ObserverFn) {
		let Some(list) = self.observers.entries.get_mut(&(obj, path.to_owned())) else {
			return;
		};
		let Some(index) = list.iter().position(|e| Rc::ptr_eq(&e.func, func)) else {
			return;
		};
		list[index].count -= 1;
		if list[index].count == 0 {
			list.remove(index);
			if list.is_empty() {
				self.observers.entries.remove(&(obj, path.to_owned()));
			}
			crate::watching::unwatch(self, obj, path);
		}
	}

	/// Revalidates every observer snapshot and re-sends the event for those
	/// that fail, refreshing their snapshots. Destroyed targets are pruned
	/// opportunistically.
	pub fn flush_invalid_observers(&mut self) {
		let keys: Vec<(ObjectId, String)> = self.observers.entries.keys().cloned().collect();
		for (obj, path) in keys {
			if self.objects.slot(obj).is_destroying || self.objects.slot(obj).is_destroyed {
				self.observers.prune(obj);
				continue;
			}
			let stale: Vec<ObserverFn> = match self.observers.entries.get(&(obj, path.clone())) {
				Some(list) => list
					.iter()
					.filter(|e| match &e.snapshot {
						Some(snapshot) => !self.validate(snapshot),
						None => true,
					})
					.map(|e| e.func.clone())
					.collect(),
				None => continue,
			};
			if stale.is_empty() {
				continue;
			}
			for func in stale {
				func(self, obj, &path);
			}
			let snapshot = self.capture_observer_snapshot(obj, &path);
			if let Some(list) = self.observers.entries.get_mut(&(obj, path.clone())) {
				for entry in list.iter_mut() {
					entry.snapshot = Some(snapshot.clone());
				}
			}
		}
	}

	fn capture_observer_snapshot(&mut self, obj: ObjectId, path: &str) -> TagSnapshot {
		let ((), snapshot) = self.track(|u| {
			crate::chain_tags::consume_chain_tags(u, obj, path);
		});
		snapshot
	}
}

/// Synchronous delivery for every observer registered on exactly this
/// (object, path); snapshots refresh afterwards so the flush pass does not
/// double-fire.
pub(crate) fn deliver_observers(universe: &mut Universe, obj: ObjectId, path: &str) {
	let funcs: Vec<ObserverFn> = match universe.observers.entries.get(&(obj, path.to_owned())) {
		Some(list) => list.iter().map(|e| e.func.clone()).collect(),
		None => return,
	};
	for func in funcs {
		func(universe, obj, path);
	}
	let snapshot = universe.capture_observer_snapshot(obj, path);
	if let Some(list) = universe.observers.entries.get_mut(&(obj, path.to_owned())) {
		for entry in list.iter_mut() {
			entry.snapshot = Some(snapshot.clone());
		}
	}
}
