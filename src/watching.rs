use crate::{ObjectId, Universe};

pub(crate) fn watch(universe: &mut Universe, obj: ObjectId, path: &str) {
	if path.contains('.') {
		watch_path(universe, obj, path);
	} else {
		watch_key(universe, obj, path);
	}
}

pub(crate) fn unwatch(universe: &mut Universe, obj: ObjectId, path: &str) {
	if path.contains('.') {
		unwatch_path(universe, obj, path);
	} else {
		unwatch_key(universe, obj, path);
	}
}

pub(crate) fn watch_key(universe: &mut Universe, obj: ObjectId, key: &str) {
	let meta = universe.meta_mut(obj);
	let count = meta.watching.entry(key.to_owned()).or_insert(0);
	*count += 1;
	let first = *count == 1;
	if first {
		// All mutation flows through `set`, so becoming watched needs no
		// access trap; descriptors still get their hook.
		if let Some(desc) = universe.find_descriptor(obj, key) {
			desc.will_watch(universe, obj, key);
		}
	}
}

pub(crate) fn unwatch_key(universe: &mut Universe, obj: ObjectId, key: &str) {
	let Some(meta) = universe.metas.get_mut(&obj) else {
		return;
	};
	let Some(count) = meta.watching.get_mut(key) else {
		return;
	};
	if *count == 0 {
		return;
	}
	*count -= 1;
	if *count == 0 {
		meta.watching.remove(key);
		if let Some(desc) = universe.find_descriptor(obj, key) {
			desc.did_unwatch(universe, obj, key);
		}
	}
}

pub(crate) fn watch_path(universe: &mut Universe, obj: ObjectId, path: &str) {
	assert!(
		path.split('.').next() != Some("@each"),
		"`@each` must follow a list key"
	);
	let meta = universe.meta_mut(obj);
	*meta.watching.entry(path.to_owned()).or_insert(0) += 1;
	let root = crate::chains::root_chain(universe, obj);
	crate::chains::add(universe, root, path);
}

pub(crate) fn unwatch_path(universe: &mut Universe, obj: ObjectId, path: &str) {
	let Some(meta) = universe.metas.get_mut(&obj) else {
		return;
	};
	let Some(count) = meta.watching.get_mut(path) else {
		return;
	};
	if *count == 0 {
		return;
	}
	*count -= 1;
	if *count == 0 {
		meta.watching.remove(path);
	}
	if let Some(root) = universe.metas.get(&obj).and_then(|m| m.root_chain) {
		crate::chains::remove(universe, root, path);
	}
}

impl Universe {
	pub fn is_watching(&self, obj: ObjectId, key: &str) -> bool {
		self.meta(obj).map(|m| m.peek_watching(key) > 0).unwrap_or(false)
	}
}
