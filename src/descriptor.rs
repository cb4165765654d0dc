use std::rc::Rc;

use crate::alias::AliasedProperty;
use crate::computed::ComputedProperty;
use crate::{ObjectId, Universe, Value};

/// A descriptor replaces what a plain property slot would hold. One
/// descriptor is shared by every object it is installed on; per-object state
/// (cached values, registered dependent keys) lives in each object's
/// metadata.
#[derive(Clone)]
pub enum Descriptor {
	Computed(Rc<ComputedProperty>),
	Alias(Rc<AliasedProperty>),
}

impl Descriptor {
	pub(crate) fn will_watch(&self, universe: &mut Universe, obj: ObjectId, key: &str) {
		if let Descriptor::Alias(a) = self {
			a.will_watch(universe, obj, key);
		}
	}

	pub(crate) fn did_unwatch(&self, universe: &mut Universe, obj: ObjectId, key: &str) {
		if let Descriptor::Alias(a) = self {
			a.teardown(universe, obj, key);
		}
	}
}

impl From<ComputedProperty> for Descriptor {
	fn from(cp: ComputedProperty) -> Self {
		Descriptor::Computed(Rc::new(cp))
	}
}

impl From<AliasedProperty> for Descriptor {
	fn from(a: AliasedProperty) -> Self {
		Descriptor::Alias(Rc::new(a))
	}
}

impl Universe {
	/// Installs either a descriptor-backed property or a plain value,
	/// tearing down whatever was registered for the key before.
	pub fn define_property(
		&mut self,
		obj: ObjectId,
		key: &str,
		descriptor: Option<Descriptor>,
		value: Option<Value>,
	) {
		crate::assert_valid_path_segment(key);

		if let Some(old) = self.meta(obj).and_then(|m| m.descriptors.get(key).cloned()) {
			self.teardown_descriptor(&old, obj, key);
		}

		let watched = self
			.meta(obj)
			.map(|m| m.peek_watching(key) > 0)
			.unwrap_or(false);

		match descriptor {
			Some(desc) => {
				self.objects.slot_mut(obj).properties.remove(key);
				self.meta_mut(obj)
					.descriptors
					.insert(key.to_owned(), desc.clone());
				if watched {
					desc.will_watch(self, obj, key);
				}
			}
			None => {
				self.meta_mut(obj).descriptors.remove(key);
				self.objects
					.slot_mut(obj)
					.properties
					.insert(key.to_owned(), value.unwrap_or(Value::Undefined));
			}
		}

		self.notify_property_change(obj, key);
	}

	pub fn define_computed(&mut self, obj: ObjectId, key: &str, cp: ComputedProperty) {
		self.define_property(obj, key, Some(cp.into()), None);
	}

	pub fn define_alias(&mut self, obj: ObjectId, key: &str, a: AliasedProperty) {
		self.define_property(obj, key, Some(a.into()), None);
	}

	fn teardown_descriptor(&mut self, old: &Descriptor, obj: ObjectId, key: &str) {
		match old {
			Descriptor::Computed(cp) => {
				let registered = self
					.meta(obj)
					.map(|m| m.deps_registered.contains(key))
					.unwrap_or(false);
				if registered {
					crate::dependent_keys::remove_dependent_keys(
						self,
						obj,
						key,
						&cp.dependent_keys(),
					);
					self.meta_mut(obj).deps_registered.remove(key);
				}
				self.meta_mut(obj).cache.remove(key);
			}
			Descriptor::Alias(a) => {
				a.teardown(self, obj, key);
			}
		}
	}
}
