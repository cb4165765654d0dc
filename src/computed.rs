use std::rc::Rc;

use smallvec::SmallVec;

use crate::meta::CacheEntry;
use crate::tags::TagSnapshot;
use crate::{Error, ObjectId, Universe, Value};

pub type Getter = Rc<dyn Fn(&mut Universe, ObjectId, &str) -> Value>;

/// A computed setter receives the incoming value plus whatever was cached
/// before, and returns the value to cache.
pub type Setter = Rc<dyn Fn(&mut Universe, ObjectId, &str, Value, Option<Value>) -> Value>;

/// A derived property backed by a getter/setter pair. The descriptor itself
/// is instance-free; cached values and dependency registrations live in each
/// object's metadata.
pub struct ComputedProperty {
	get: Getter,
	set: Option<Setter>,
	dependent_keys: SmallVec<[String; 4]>,
	volatile: bool,
	read_only: bool,
	auto: bool,
	meta: Option<Value>,
}

pub fn computed(get: Getter) -> ComputedProperty {
	ComputedProperty {
		get,
		set: None,
		dependent_keys: SmallVec::new(),
		volatile: false,
		read_only: false,
		auto: false,
		meta: None,
	}
}

impl ComputedProperty {
	/// Overwrites the dependent-key list. Keys using `@each` are expanded to
	/// the single supported level.
	pub fn property(mut self, keys: &[&str]) -> Self {
		self.dependent_keys = keys
			.iter()
			.map(|k| crate::dependent_keys::expand_each_key(k))
			.collect();
		self
	}

	pub fn with_set(mut self, set: Setter) -> Self {
		assert!(
			!self.read_only,
			"a computed property cannot be read-only and carry a setter"
		);
		self.set = Some(set);
		self
	}

	/// A volatile property is recomputed on every read: no cache, no
	/// dependent-key registration.
	pub fn volatile(mut self) -> Self {
		self.volatile = true;
		self
	}

	pub fn read_only(mut self) -> Self {
		assert!(
			self.set.is_none(),
			"a computed property cannot be read-only and carry a setter"
		);
		self.read_only = true;
		self
	}

	/// Switches cache validation to autotracking: the getter's consumed tags
	/// decide staleness instead of declared dependent keys.
	pub fn auto(mut self) -> Self {
		self.auto = true;
		self
	}

	pub fn meta(mut self, meta: Value) -> Self {
		self.meta = Some(meta);
		self
	}

	pub fn meta_value(&self) -> Option<&Value> {
		self.meta.as_ref()
	}

	pub(crate) fn dependent_keys(&self) -> SmallVec<[String; 4]> {
		self.dependent_keys.clone()
	}

	pub(crate) fn is_volatile(&self) -> bool {
		self.volatile
	}

	pub(crate) fn is_auto(&self) -> bool {
		self.auto
	}

	fn use_tags(&self) -> bool {
		self.auto || self.dependent_keys.is_empty()
	}

	pub(crate) fn get(&self, universe: &mut Universe, obj: ObjectId, key: &str) -> Value {
		if self.volatile {
			let getter = self.get.clone();
			return universe.untrack(|u| getter(u, obj, key));
		}

		if let Some(CacheEntry::Value { value, snapshot }) =
			universe.meta(obj).and_then(|m| m.cache.get(key))
		{
			if !self.use_tags() || universe.validate(snapshot) {
				let value = value.clone();
				let snapshot = snapshot.clone();
				// A cache hit still makes the reader depend on everything
				// the cached computation read.
				universe.consume_property_tag(obj, key);
				if universe.tags.is_tracking() {
					universe.consume_set(&snapshot.tags);
				}
				return value;
			}
		}

		tracing::trace!(object = %obj, key, "computing");
		let getter = self.get.clone();
		let (value, snapshot) = universe.track(|u| getter(u, obj, key));
		universe.meta_mut(obj).cache.insert(
			key.to_owned(),
			CacheEntry::Value {
				value: value.clone(),
				snapshot,
			},
		);

		if !self.dependent_keys.is_empty() {
			let newly = universe.meta_mut(obj).deps_registered.insert(key.to_owned());
			if newly {
				crate::dependent_keys::add_dependent_keys(
					universe,
					obj,
					key,
					&self.dependent_keys,
				);
			}
		}

		crate::chain_tags::finish_lazy_chains(universe, obj, key);
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
		if self.read_only {
			return Err(Error::ReadOnly {
				object: obj.to_string(),
				key: key.to_owned(),
			});
		}

		let Some(setter) = self.set.clone() else {
			// No setter: clobber the computed property with a plain value.
			let previous = match universe.meta(obj).and_then(|m| m.cache.get(key)) {
				Some(CacheEntry::Value { value, .. }) => value.clone(),
				_ => Value::Undefined,
			};
			universe.define_property(obj, key, None, Some(previous));
			return universe.set(obj, key, value);
		};

		if self.volatile {
			let result = universe.untrack(|u| setter(u, obj, key, value, None));
			return Ok(result);
		}

		let previous = match universe.meta(obj).and_then(|m| m.cache.get(key)) {
			Some(CacheEntry::Value { value, snapshot }) => {
				Some((value.clone(), snapshot.tags.clone()))
			}
			_ => None,
		};
		let previous_value = previous.as_ref().map(|(v, _)| v.clone());

		// Suspended for the whole write, notification included, so the
		// setter's own side effects cannot invalidate the value it is about
		// to cache.
		universe.meta_mut(obj).suspended.insert(key.to_owned());
		let result = setter(universe, obj, key, value, previous_value.clone());

		if previous_value.as_ref() == Some(&result) {
			universe.meta_mut(obj).suspended.remove(key);
			return Ok(result);
		}

		// Cache before notifying so observers delivered inside the
		// notification read the fresh value.
		let tags = previous.map(|(_, tags)| tags).unwrap_or_default();
		let revision = universe.tags.clock();
		universe.meta_mut(obj).cache.insert(
			key.to_owned(),
			CacheEntry::Value {
				value: result.clone(),
				snapshot: TagSnapshot { tags, revision },
			},
		);
		universe.notify_property_change(obj, key);

		// Re-stamp past the notification's own tag dirtying.
		let clock = universe.tags.clock();
		if let Some(CacheEntry::Value { snapshot, .. }) =
			universe.meta_mut(obj).cache.get_mut(key)
		{
			snapshot.revision = clock;
		}
		universe.meta_mut(obj).suspended.remove(key);

		Ok(result)
	}

	/// Invalidation entry point, invoked when the property's own key is
	/// notified. Drops the cache and the dependent-key registrations unless
	/// the property is volatile or mid-set on this object.
	pub(crate) fn did_change(&self, universe: &mut Universe, obj: ObjectId, key: &str) {
		if self.volatile {
			return;
		}
		let Some(meta) = universe.metas.get_mut(&obj) else {
			return;
		};
		if meta.suspended.contains(key) {
			return;
		}
		let had_cache = matches!(meta.cache.remove(key), Some(CacheEntry::Value { .. }));
		if had_cache {
			tracing::trace!(object = %obj, key, "cache invalidated");
		}
		if meta.deps_registered.remove(key) {
			crate::dependent_keys::remove_dependent_keys(universe, obj, key, &self.dependent_keys);
		}
	}
}
