use crate::descriptor::Descriptor;
use crate::meta::CacheEntry;
use crate::{ObjectId, Universe, Value};

/// Consumes the tags a dotted path depends on, without invoking any computed
/// getter. Where the walk hits an uncached computed property it leaves a
/// lazy chain tag behind instead of recomputing speculatively; the tag is
/// finalized the next time that property is actually computed.
pub(crate) fn consume_chain_tags(universe: &mut Universe, obj: ObjectId, path: &str) {
	if path.contains('.') {
		universe.consume_property_tag(obj, path);
	}

	let segments: Vec<&str> = path.split('.').collect();
	let mut cursor = obj;
	let mut list_value: Option<Value> = None;

	let mut index = 0;
	while index < segments.len() {
		let segment = segments[index];

		if segment == "@each" {
			let Some(item_key) = segments.get(index + 1) else {
				break;
			};
			let Some(list_key) = index.checked_sub(1).map(|i| segments[i]) else {
				break;
			};
			universe.consume_property_tag(cursor, &format!("{}.[]", list_key));
			if let Some(Value::List(items)) = &list_value {
				for item in items.iter() {
					if let Value::Object(id) = item {
						universe.consume_property_tag(*id, item_key);
					}
				}
			}
			// One level only; anything deeper was already truncated with a
			// warning at declaration time.
			break;
		}

		crate::assert_valid_path_segment(segment);
		universe.consume_property_tag(cursor, segment);

		let value = match universe.find_descriptor(cursor, segment) {
			Some(Descriptor::Computed(cp)) => {
				let cached = match universe.meta(cursor).and_then(|m| m.cache.get(segment)) {
					Some(CacheEntry::Value { value, snapshot }) => {
						let use_tags = cp.is_auto() || cp.dependent_keys().is_empty();
						if !use_tags || universe.validate(snapshot) {
							Some((value.clone(), snapshot.tags.clone()))
						} else {
							None
						}
					}
					_ => None,
				};
				match cached {
					Some((value, tags)) => {
						// The snapshot has to move when anything the cached
						// computation read moves.
						universe.consume_set(&tags);
						Some(value)
					}
					None => {
						consume_lazy_chain_tag(universe, cursor, segment);
						break;
					}
				}
			}
			Some(Descriptor::Alias(_)) | None => crate::chains::lazy_get(universe, cursor, segment),
		};

		match value {
			Some(Value::Object(next)) => {
				cursor = next;
				list_value = None;
			}
			Some(list @ Value::List(_)) => {
				list_value = Some(list);
			}
			_ => break,
		}
		index += 1;
	}
}

fn consume_lazy_chain_tag(universe: &mut Universe, obj: ObjectId, key: &str) {
	let tag = universe.tags.create();
	universe
		.meta_mut(obj)
		.lazy_chains
		.entry(key.to_owned())
		.or_default()
		.push(tag);
	universe.consume(tag);
}

/// Called when a computed property recomputes: every lazy chain tag parked
/// on the key is dirtied so snapshots that stalled at the uncached property
/// revalidate and re-capture the now-resolvable deeper path.
pub(crate) fn finish_lazy_chains(universe: &mut Universe, obj: ObjectId, key: &str) {
	let Some(tags) = universe
		.metas
		.get_mut(&obj)
		.and_then(|m| m.lazy_chains.remove(key))
	else {
		return;
	};
	for tag in tags {
		universe.tags.dirty(tag);
	}
}
