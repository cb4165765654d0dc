use crate::{ObjectId, Universe};

/// Links a depender (a computed or alias key) to the keys it declared. Each
/// distinct (dependentKey, dependerKey) pair holds exactly one watch on the
/// dependent key, shared across however many times it is re-registered.
pub(crate) fn add_dependent_keys(
	universe: &mut Universe,
	obj: ObjectId,
	depender: &str,
	dep_keys: &[String],
) {
	for dep_key in dep_keys {
		let meta = universe.meta_mut(obj);
		let count = meta
			.deps
			.entry(dep_key.clone())
			.or_default()
			.entry(depender.to_owned())
			.or_insert(0);
		*count += 1;
		let first = *count == 1;
		if first {
			crate::watching::watch(universe, obj, dep_key);
		}
	}
}

pub(crate) fn remove_dependent_keys(
	universe: &mut Universe,
	obj: ObjectId,
	depender: &str,
	dep_keys: &[String],
) {
	for dep_key in dep_keys {
		let Some(meta) = universe.metas.get_mut(&obj) else {
			return;
		};
		let mut unwatch = false;
		if let Some(dependers) = meta.deps.get_mut(dep_key) {
			if let Some(count) = dependers.get_mut(depender) {
				// Counts never go below zero; removal at zero is a no-op.
				if *count > 0 {
					*count -= 1;
					if *count == 0 {
						dependers.remove(depender);
						unwatch = true;
					}
				}
			}
			if dependers.is_empty() {
				meta.deps.remove(dep_key);
			}
		}
		if unwatch {
			crate::watching::unwatch(universe, obj, dep_key);
		}
	}
}

/// Expands an `@each` dependent key to its supported single level. Deeper
/// chaining after `@each` is a deprecated pattern that silently under-
/// invalidates, so it is truncated with a warning.
pub(crate) fn expand_each_key(key: &str) -> String {
	let Some(pos) = key.find("@each.") else {
		return key.to_owned();
	};
	let rest = &key[pos + "@each.".len()..];
	if rest.contains('.') {
		let leaf = rest.split('.').next().unwrap_or(rest);
		let truncated = format!("{}@each.{}", &key[..pos], leaf);
		tracing::warn!(
			key,
			truncated = truncated.as_str(),
			"`@each` supports only one level of chaining; deeper segments are ignored"
		);
		return truncated;
	}
	key.to_owned()
}
