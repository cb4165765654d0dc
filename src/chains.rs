use fxhash::FxHashMap;
use smallvec::SmallVec;

use crate::descriptor::Descriptor;
use crate::meta::CacheEntry;
use crate::{ObjectId, Universe, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ChainNodeId(u32);

/// One segment of a watched dotted path. Nodes link to parent and children
/// by arena index, carry a per-child reference count, and remember which
/// (object, key) pairs they registered themselves on so re-parenting can
/// migrate the registrations.
pub(crate) struct ChainNode {
	pub(crate) parent: Option<ChainNodeId>,
	pub(crate) key: String,
	pub(crate) value: Option<Value>,
	pub(crate) children: FxHashMap<String, ChainNodeId>,
	pub(crate) counts: FxHashMap<String, u32>,
	/// Complete watched paths terminating at this node, by their original
	/// (untruncated) spelling, with a registration count each.
	pub(crate) paths: FxHashMap<String, u32>,
	pub(crate) watched: SmallVec<[(ObjectId, String); 1]>,
	pub(crate) root_object: Option<ObjectId>,
}

impl ChainNode {
	fn new(parent: Option<ChainNodeId>, key: &str) -> Self {
		ChainNode {
			parent,
			key: key.to_owned(),
			value: None,
			children: FxHashMap::default(),
			counts: FxHashMap::default(),
			paths: FxHashMap::default(),
			watched: SmallVec::new(),
			root_object: None,
		}
	}

	fn is_each(&self) -> bool {
		self.key == "@each"
	}
}

pub(crate) struct ChainArena {
	nodes: Vec<Option<ChainNode>>,
	free: Vec<u32>,
}

impl ChainArena {
	pub(crate) fn new() -> Self {
		ChainArena {
			nodes: Vec::new(),
			free: Vec::new(),
		}
	}

	fn alloc(&mut self, node: ChainNode) -> ChainNodeId {
		if let Some(index) = self.free.pop() {
			self.nodes[index as usize] = Some(node);
			ChainNodeId(index)
		} else {
			let id = ChainNodeId(self.nodes.len() as u32);
			self.nodes.push(Some(node));
			id
		}
	}

	fn release(&mut self, id: ChainNodeId) {
		self.nodes[id.0 as usize] = None;
		self.free.push(id.0);
	}

	pub(crate) fn node(&self, id: ChainNodeId) -> &ChainNode {
		self.nodes[id.0 as usize]
			.as_ref()
			.expect("chain node was released")
	}

	pub(crate) fn node_mut(&mut self, id: ChainNodeId) -> &mut ChainNode {
		self.nodes[id.0 as usize]
			.as_mut()
			.expect("chain node was released")
	}
}

/// Reads a property without triggering side effects: cached computed values
/// only (no speculative recomputation), aliases dereferenced so the chain
/// tracks whatever the alias points at.
pub(crate) fn lazy_get(universe: &mut Universe, obj: ObjectId, key: &str) -> Option<Value> {
	let slot = universe.objects.slot(obj);
	if slot.is_destroying || slot.is_destroyed {
		return None;
	}
	match universe.find_descriptor(obj, key) {
		Some(Descriptor::Computed(cp)) => {
			if cp.is_volatile() {
				return None;
			}
			match universe.meta(obj).and_then(|m| m.cache.get(key)) {
				Some(CacheEntry::Value { value, snapshot }) => {
					let use_tags = cp.is_auto() || cp.dependent_keys().is_empty();
					if !use_tags || universe.validate(snapshot) {
						Some(value.clone())
					} else {
						None
					}
				}
				_ => None,
			}
		}
		Some(Descriptor::Alias(a)) => lazy_get(universe, obj, a.alt_key()),
		None => {
			if let Some(v) = universe.meta(obj).and_then(|m| m.tracked.get(key)) {
				return Some(v.clone());
			}
			let mut cursor = Some(obj);
			while let Some(id) = cursor {
				let slot = universe.objects.slot(id);
				if let Some(v) = slot.properties.get(key) {
					return Some(v.clone());
				}
				cursor = slot.proto;
			}
			None
		}
	}
}

pub(crate) fn root_chain(universe: &mut Universe, obj: ObjectId) -> ChainNodeId {
	if let Some(root) = universe.meta(obj).and_then(|m| m.root_chain) {
		return root;
	}
	let mut node = ChainNode::new(None, "");
	node.value = Some(Value::Object(obj));
	node.root_object = Some(obj);
	let id = universe.chains.alloc(node);
	universe.meta_mut(obj).root_chain = Some(id);
	id
}

/// Segments actually materialized for a path: at most one level after
/// `@each`.
fn effective_segments(path: &str) -> Vec<String> {
	let mut segments = Vec::new();
	let mut after_each = false;
	for segment in path.split('.') {
		crate::assert_valid_path_segment(segment);
		segments.push(segment.to_owned());
		if after_each {
			break;
		}
		if segment == "@each" {
			after_each = true;
		}
	}
	segments
}

pub(crate) fn add(universe: &mut Universe, root: ChainNodeId, path: &str) {
	if path.contains("@each") {
		// Emits the depth warning for paths that arrive here unexpanded.
		let _ = crate::dependent_keys::expand_each_key(path);
	}
	let segments = effective_segments(path);
	let mut cursor = root;
	for segment in &segments {
		let existing = universe.chains.node(cursor).children.get(segment).copied();
		let child = match existing {
			Some(child) => child,
			None => {
				let node = ChainNode::new(Some(cursor), segment);
				let id = universe.chains.alloc(node);
				universe
					.chains
					.node_mut(cursor)
					.children
					.insert(segment.clone(), id);
				rewatch(universe, id);
				id
			}
		};
		*universe
			.chains
			.node_mut(cursor)
			.counts
			.entry(segment.clone())
			.or_insert(0) += 1;
		cursor = child;
	}
	*universe
		.chains
		.node_mut(cursor)
		.paths
		.entry(path.to_owned())
		.or_insert(0) += 1;
}

pub(crate) fn remove(universe: &mut Universe, root: ChainNodeId, path: &str) {
	let segments = effective_segments(path);
	remove_rec(universe, root, &segments, path);
}

fn remove_rec(universe: &mut Universe, node: ChainNodeId, segments: &[String], path: &str) {
	let Some((segment, rest)) = segments.split_first() else {
		let n = universe.chains.node_mut(node);
		if let Some(count) = n.paths.get_mut(path) {
			*count -= 1;
			if *count == 0 {
				n.paths.remove(path);
			}
		}
		return;
	};
	let Some(child) = universe.chains.node(node).children.get(segment).copied() else {
		return;
	};
	remove_rec(universe, child, rest, path);

	let n = universe.chains.node_mut(node);
	let count = n.counts.entry(segment.clone()).or_insert(0);
	if *count > 0 {
		*count -= 1;
	}
	if *count == 0 {
		n.counts.remove(segment);
		n.children.remove(segment);
		destroy_subtree(universe, child);
	}
}

/// Resolves the node's current value from its parent, without registering
/// anything.
fn resolve_value(universe: &mut Universe, node: ChainNodeId) -> Option<Value> {
	let (parent, key, root_object) = {
		let n = universe.chains.node(node);
		(n.parent, n.key.clone(), n.root_object)
	};
	let Some(parent) = parent else {
		return root_object.map(Value::Object);
	};
	let parent_value = universe.chains.node(parent).value.clone();
	if key == "@each" {
		// Passes the parent's list through; the children watch the items.
		return parent_value;
	}
	match parent_value {
		Some(Value::Object(pid)) => lazy_get(universe, pid, &key),
		_ => None,
	}
}

/// Computes where this node must register a chain watcher, given the
/// parent's current value.
fn registrations(universe: &mut Universe, node: ChainNodeId) -> SmallVec<[(ObjectId, String); 1]> {
	let (parent, key) = {
		let n = universe.chains.node(node);
		(n.parent, n.key.clone())
	};
	let Some(parent) = parent else {
		return SmallVec::new();
	};
	let mut out = SmallVec::new();
	if key == "@each" {
		let (owner, parent_key) = {
			let p = universe.chains.node(parent);
			let owner = p.watched.first().map(|w| w.0).or(p.root_object);
			(owner, p.key.clone())
		};
		if let Some(owner) = owner {
			let content_key = if parent_key.is_empty() {
				"[]".to_owned()
			} else {
				format!("{}.[]", parent_key)
			};
			out.push((owner, content_key));
		}
		return out;
	}
	let parent_is_each = universe.chains.node(parent).is_each();
	let parent_value = universe.chains.node(parent).value.clone();
	if parent_is_each {
		if let Some(Value::List(items)) = parent_value {
			for item in items.iter() {
				if let Value::Object(id) = item {
					out.push((*id, key.clone()));
				}
			}
		}
	} else if let Some(Value::Object(pid)) = parent_value {
		out.push((pid, key));
	}
	out
}

fn rewatch(universe: &mut Universe, node: ChainNodeId) {
	let value = resolve_value(universe, node);
	universe.chains.node_mut(node).value = value;
	let regs = registrations(universe, node);
	for (obj, key) in &regs {
		universe
			.meta_mut(*obj)
			.chain_watchers
			.entry(key.clone())
			.or_default()
			.push(node);
		crate::watching::watch_key(universe, *obj, key);
	}
	universe.chains.node_mut(node).watched = regs;
}

fn unwatch_node(universe: &mut Universe, node: ChainNodeId) {
	let watched = std::mem::take(&mut universe.chains.node_mut(node).watched);
	for (obj, key) in watched {
		if let Some(meta) = universe.metas.get_mut(&obj) {
			if let Some(list) = meta.chain_watchers.get_mut(&key) {
				list.retain(|id| *id != node);
				if list.is_empty() {
					meta.chain_watchers.remove(&key);
				}
			}
		}
		crate::watching::unwatch_key(universe, obj, &key);
	}
}

fn rewatch_subtree(universe: &mut Universe, node: ChainNodeId) {
	rewatch(universe, node);
	let children: Vec<ChainNodeId> = universe.chains.node(node).children.values().copied().collect();
	for child in children {
		rewatch_subtree(universe, child);
	}
}

fn unwatch_subtree(universe: &mut Universe, node: ChainNodeId) {
	let children: Vec<ChainNodeId> = universe.chains.node(node).children.values().copied().collect();
	for child in children {
		unwatch_subtree(universe, child);
	}
	unwatch_node(universe, node);
}

fn destroy_subtree(universe: &mut Universe, node: ChainNodeId) {
	let children: Vec<ChainNodeId> = universe.chains.node(node).children.values().copied().collect();
	for child in children {
		destroy_subtree(universe, child);
	}
	unwatch_node(universe, node);
	universe.chains.release(node);
}

pub(crate) fn destroy_root(universe: &mut Universe, root: ChainNodeId) {
	let root_object = universe.chains.node(root).root_object;
	destroy_subtree(universe, root);
	if let Some(obj) = root_object {
		if let Some(meta) = universe.metas.get_mut(&obj) {
			meta.root_chain = None;
		}
	}
}

pub(crate) fn root_object_of(universe: &Universe, node: ChainNodeId) -> Option<ObjectId> {
	let mut cursor = node;
	loop {
		let n = universe.chains.node(cursor);
		match n.parent {
			Some(parent) => cursor = parent,
			None => return n.root_object,
		}
	}
}

pub(crate) fn full_path(universe: &Universe, node: ChainNodeId) -> String {
	let mut keys: Vec<&str> = Vec::new();
	let mut cursor = Some(node);
	while let Some(id) = cursor {
		let n = universe.chains.node(id);
		if !n.key.is_empty() {
			keys.push(&n.key);
		}
		cursor = n.parent;
	}
	keys.reverse();
	keys.join(".")
}

/// Revalidates the node after its subject key changed. If the resolved value
/// changed identity, the children's watcher registrations migrate from the
/// old object graph to the new one before any notification goes out; full
/// paths that terminate in the revalidated subtree are accumulated into
/// `affected` for deferred delivery.
pub(crate) fn notify(
	universe: &mut Universe,
	node: ChainNodeId,
	revalidate: bool,
	affected: &mut Vec<(ObjectId, String)>,
) {
	if revalidate {
		let new_value = resolve_value(universe, node);
		let old_value = universe.chains.node(node).value.clone();
		let changed = match (&old_value, &new_value) {
			(None, None) => false,
			(Some(a), Some(b)) => !Value::same_identity(a, b),
			_ => true,
		};
		universe.chains.node_mut(node).value = new_value;
		if changed {
			tracing::trace!(path = %full_path(universe, node), "chain re-parenting");
			let children: Vec<ChainNodeId> =
				universe.chains.node(node).children.values().copied().collect();
			for child in &children {
				unwatch_subtree(universe, *child);
			}
			for child in &children {
				rewatch_subtree(universe, *child);
			}
		}
	}

	let children: Vec<ChainNodeId> = universe.chains.node(node).children.values().copied().collect();
	for child in children {
		notify(universe, child, true, affected);
	}

	let terminated: Vec<String> = universe.chains.node(node).paths.keys().cloned().collect();
	if !terminated.is_empty() {
		if let Some(root_obj) = root_object_of(universe, node) {
			for path in terminated {
				affected.push((root_obj, path));
			}
		}
	}
}

/// Entry point from `notify_property_change`: fans the change out to every
/// chain node watching `key` on `obj`, then delivers the accumulated path
/// notifications once the whole subtree has settled.
pub(crate) fn chains_did_change(universe: &mut Universe, obj: ObjectId, key: &str) {
	let Some(watchers) = universe
		.metas
		.get(&obj)
		.and_then(|m| m.chain_watchers.get(key))
		.cloned()
	else {
		return;
	};
	let mut affected = Vec::new();
	for node in watchers {
		notify(universe, node, true, &mut affected);
	}
	for (root_obj, path) in affected {
		universe.notify_property_change(root_obj, &path);
	}
}
