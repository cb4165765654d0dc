use crate::meta::CacheEntry;
use crate::{Error, ObjectId, Universe, Value};

#[derive(Clone, Copy, PartialEq, Eq)]
enum AliasKind {
	Normal,
	OneWay,
	ReadOnly,
}

/// A property that forwards every read and write to another key. It owns no
/// value of its own; the only per-object state is a `Consumed` marker in the
/// cache recording that dependent-key bookkeeping against the target is
/// established.
pub struct AliasedProperty {
	alt_key: String,
	kind: AliasKind,
}

pub fn alias(alt_key: &str) -> AliasedProperty {
	AliasedProperty {
		alt_key: alt_key.to_owned(),
		kind: AliasKind::Normal,
	}
}

impl AliasedProperty {
	/// Writes through the alias fail instead of reaching the target.
	pub fn read_only(mut self) -> Self {
		self.kind = AliasKind::ReadOnly;
		self
	}

	/// The first write detaches the alias, leaving a plain property that no
	/// longer follows the target.
	pub fn one_way(mut self) -> Self {
		self.kind = AliasKind::OneWay;
		self
	}

	pub(crate) fn alt_key(&self) -> &str {
		&self.alt_key
	}

	pub(crate) fn get(&self, universe: &mut Universe, obj: ObjectId, key: &str) -> Value {
		let value = universe.get(obj, &self.alt_key);
		self.consume(universe, obj, key);
		universe.consume_property_tag(obj, key);
		value
	}

	pub(crate) fn set(
		&self,
		universe: &mut Universe,
		obj: ObjectId,
		key: &str,
		value: Value,
	) -> Result<Value, Error> {
		match self.kind {
			AliasKind::Normal => universe.set(obj, &self.alt_key, value),
			AliasKind::ReadOnly => Err(Error::ReadOnly {
				object: obj.to_string(),
				key: key.to_owned(),
			}),
			AliasKind::OneWay => {
				universe.define_property(obj, key, None, Some(value.clone()));
				Ok(value)
			}
		}
	}

	fn consume(&self, universe: &mut Universe, obj: ObjectId, key: &str) {
		let consumed = matches!(
			universe.meta(obj).and_then(|m| m.cache.get(key)),
			Some(CacheEntry::Consumed)
		);
		if consumed {
			return;
		}
		crate::dependent_keys::add_dependent_keys(
			universe,
			obj,
			key,
			std::slice::from_ref(&self.alt_key),
		);
		universe
			.meta_mut(obj)
			.cache
			.insert(key.to_owned(), CacheEntry::Consumed);
	}

	fn unconsume(&self, universe: &mut Universe, obj: ObjectId, key: &str) {
		let consumed = matches!(
			universe.meta(obj).and_then(|m| m.cache.get(key)),
			Some(CacheEntry::Consumed)
		);
		if !consumed {
			return;
		}
		universe.meta_mut(obj).cache.remove(key);
		crate::dependent_keys::remove_dependent_keys(
			universe,
			obj,
			key,
			std::slice::from_ref(&self.alt_key),
		);
	}

	/// External code started watching the alias key directly; make sure the
	/// dependency on the target is live even without get traffic.
	pub(crate) fn will_watch(&self, universe: &mut Universe, obj: ObjectId, key: &str) {
		self.consume(universe, obj, key);
	}

	pub(crate) fn teardown(&self, universe: &mut Universe, obj: ObjectId, key: &str) {
		self.unconsume(universe, obj, key);
	}
}
