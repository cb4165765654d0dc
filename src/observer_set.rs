use fxhash::{FxHashMap, FxHashSet};

use crate::ObjectId;

/// Deferred observer deliveries accumulated during a batching region. An
/// (object, key) pair is queued once, at its first-trigger position;
/// re-queuing it is a no-op.
pub(crate) struct ObserverSet {
	added: FxHashMap<ObjectId, FxHashSet<String>>,
	queue: Vec<(ObjectId, String)>,
}

impl ObserverSet {
	pub(crate) fn new() -> Self {
		ObserverSet {
			added: FxHashMap::default(),
			queue: Vec::new(),
		}
	}

	pub(crate) fn add(&mut self, obj: ObjectId, key: &str) {
		let keys = self.added.entry(obj).or_default();
		if keys.insert(key.to_owned()) {
			self.queue.push((obj, key.to_owned()));
		}
	}

	/// Swaps the queue out so deliveries triggered by the flush enqueue into
	/// a fresh one.
	pub(crate) fn flush(&mut self) -> Vec<(ObjectId, String)> {
		self.added.clear();
		std::mem::take(&mut self.queue)
	}
}
