use crate::descriptor::Descriptor;
use crate::{Error, ObjectId, Universe, Value};

impl Universe {
	/// Universal write. Dotted paths resolve every segment but the last
	/// (tolerantly), then write the leaf. A plain write that does not change
	/// the value sends no notification.
	pub fn set(&mut self, obj: ObjectId, key_or_path: &str, value: Value) -> Result<Value, Error> {
		assert!(!key_or_path.is_empty(), "set requires a non-empty key");
		if key_or_path.contains('.') {
			self.set_path(obj, key_or_path, value, false)
		} else {
			self.set_single(obj, key_or_path, value, false)
		}
	}

	/// `set`, but unreachable paths and destroyed targets return `None`
	/// instead of failing. For teardown races where best-effort sync is
	/// acceptable.
	pub fn try_set(&mut self, obj: ObjectId, key_or_path: &str, value: Value) -> Option<Value> {
		let result = if key_or_path.contains('.') {
			self.set_path(obj, key_or_path, value, true)
		} else {
			self.set_single(obj, key_or_path, value, true)
		};
		result.ok()
	}

	fn set_path(
		&mut self,
		obj: ObjectId,
		path: &str,
		value: Value,
		tolerant: bool,
	) -> Result<Value, Error> {
		let (prefix, leaf) = path.rsplit_once('.').expect("path has at least two segments");
		let mut cursor = obj;
		for segment in prefix.split('.') {
			crate::assert_valid_path_segment(segment);
			match self.get_single(cursor, segment) {
				Value::Object(next) => cursor = next,
				_ => {
					if tolerant {
						return Ok(Value::Undefined);
					}
					return Err(Error::UnreachablePath {
						path: path.to_owned(),
						segment: segment.to_owned(),
					});
				}
			}
		}
		self.set_single(cursor, leaf, value, tolerant)
	}

	pub(crate) fn set_single(
		&mut self,
		obj: ObjectId,
		key: &str,
		value: Value,
		tolerant: bool,
	) -> Result<Value, Error> {
		crate::assert_valid_path_segment(key);
		let slot = self.objects.slot(obj);
		if slot.is_destroying || slot.is_destroyed {
			if tolerant {
				return Ok(value);
			}
			return Err(Error::Destroyed {
				object: obj.to_string(),
				key: key.to_owned(),
			});
		}

		if let Some(desc) = self.find_descriptor(obj, key) {
			return match desc {
				Descriptor::Computed(cp) => cp.set(self, obj, key, value),
				Descriptor::Alias(a) => a.set(self, obj, key, value),
			};
		}

		if self.tracked_value(obj, key).is_some() {
			self.write_tracked(obj, key, value.clone());
			return Ok(value);
		}

		let previous = self.objects.slot(obj).properties.get(key).cloned();
		if previous.as_ref() == Some(&value) {
			return Ok(value);
		}
		self.objects
			.slot_mut(obj)
			.properties
			.insert(key.to_owned(), value.clone());
		self.notify_property_change(obj, key);
		Ok(value)
	}
}
