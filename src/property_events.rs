use fxhash::{FxHashMap, FxHashSet};

use crate::descriptor::Descriptor;
use crate::{ObjectId, Universe};

impl Universe {
	/// The single choke point for "this key possibly changed": invalidates
	/// descriptor caches, cascades through declared dependent keys, triggers
	/// chain revalidation, delivers (or enqueues) observers and dirties the
	/// autotracking tags.
	pub fn notify_property_change(&mut self, obj: ObjectId, key: &str) {
		if let Some(meta) = self.meta(obj) {
			if meta.is_initializing || meta.is_prototype_meta || meta.is_meta_destroyed {
				return;
			}
		}

		if let Some(Descriptor::Computed(cp)) = self.find_descriptor(obj, key) {
			cp.did_change(self, obj, key);
		}

		// Tags move before any observer runs, so snapshots refreshed during
		// delivery are captured against the post-change clock.
		let destroying = self
			.meta(obj)
			.map(|m| m.is_source_destroying)
			.unwrap_or(false);
		if !destroying {
			self.dirty_property_tag(obj, key);
			self.dirty_object_tag(obj);
		}

		let watched = self
			.meta(obj)
			.map(|m| m.peek_watching(key) > 0)
			.unwrap_or(false);
		if watched {
			self.dependent_keys_did_change(obj, key);
			crate::chains::chains_did_change(self, obj, key);
			self.notify_observers(obj, key);
		}

		if let Some(hook) = self.objects.slot(obj).change_hook.clone() {
			hook(self, obj, key);
		}
	}

	/// Recursively notifies every key that declared `key` as a dependent
	/// key. The seen map makes the traversal treat the dependency graph as a
	/// DAG: it is created by the outermost cascade and cleared when that
	/// cascade returns, so duplicate notification within one synchronous
	/// cascade is suppressed without leaking across independent top-level
	/// calls. A legitimate re-dirty of an already-notified key inside the
	/// same cascade is suppressed too; that is the accepted tradeoff.
	fn dependent_keys_did_change(&mut self, obj: ObjectId, key: &str) {
		let is_top = self.cascade_seen.is_none();
		if is_top {
			self.cascade_seen = Some(FxHashMap::default());
		}

		let dependers: Vec<String> = self
			.meta(obj)
			.and_then(|m| m.deps.get(key))
			.map(|d| d.keys().cloned().collect())
			.unwrap_or_default();

		for depender in dependers {
			let seen = self
				.cascade_seen
				.as_mut()
				.expect("cascade seen map is live")
				.entry(obj)
				.or_insert_with(FxHashSet::default);
			if !seen.insert(depender.clone()) {
				continue;
			}
			self.notify_property_change(obj, &depender);
		}

		if is_top {
			self.cascade_seen = None;
		}
	}

	fn notify_observers(&mut self, obj: ObjectId, key: &str) {
		if self.batch_depth > 0 {
			self.queue.add(obj, key);
		} else {
			crate::observer::deliver_observers(self, obj, key);
		}
	}

	/// Opens a reentrant batching region: observer delivery is redirected
	/// into the deferred queue until the outermost `end_property_changes`.
	pub fn begin_property_changes(&mut self) {
		self.batch_depth += 1;
	}

	pub fn end_property_changes(&mut self) {
		assert!(self.batch_depth > 0, "unbalanced end_property_changes");
		self.batch_depth -= 1;
		if self.batch_depth > 0 {
			return;
		}

		// Deliveries may enqueue further notifications; swap the queue out
		// so they land in a fresh one and keep flushing until quiet.
		loop {
			let entries = self.queue.flush();
			if entries.is_empty() {
				break;
			}
			for (obj, key) in entries {
				if self.objects.slot(obj).is_destroying || self.objects.slot(obj).is_destroyed {
					continue;
				}
				crate::observer::deliver_observers(self, obj, &key);
			}
		}

		let pending = std::mem::take(&mut self.pending_finalize);
		for obj in pending {
			self.finalize_destroy(obj);
		}
	}

	/// Runs `f` with property changes batched: within the block, setting the
	/// same key any number of times results in one delivery per observer,
	/// in first-touched order, after the block exits.
	pub fn change_properties(&mut self, f: impl FnOnce(&mut Universe)) {
		self.begin_property_changes();
		f(self);
		self.end_property_changes();
	}
}
