use crate::descriptor::Descriptor;
use crate::{ObjectId, Universe, Value};

impl Universe {
	/// Universal read. Dotted paths resolve segment by segment and
	/// short-circuit to `Undefined` through missing or destroyed
	/// intermediates; single keys dispatch to descriptors, tracked storage,
	/// plain values and finally the `unknown_property` hook. Reading inside
	/// a tracking frame consumes the property's tag.
	pub fn get(&mut self, obj: ObjectId, key_or_path: &str) -> Value {
		assert!(!key_or_path.is_empty(), "get requires a non-empty key");
		if key_or_path.contains('.') {
			self.get_path(obj, key_or_path)
		} else {
			self.get_single(obj, key_or_path)
		}
	}

	fn get_path(&mut self, obj: ObjectId, path: &str) -> Value {
		for segment in path.split('.') {
			crate::assert_valid_path_segment(segment);
		}
		let mut cursor = obj;
		let mut segments = path.split('.').peekable();
		while let Some(segment) = segments.next() {
			if self.objects.slot(cursor).is_destroying || self.objects.slot(cursor).is_destroyed {
				return Value::Undefined;
			}
			let value = self.get_single(cursor, segment);
			if segments.peek().is_none() {
				return value;
			}
			match value {
				Value::Object(next) => cursor = next,
				_ => return Value::Undefined,
			}
		}
		Value::Undefined
	}

	pub(crate) fn get_single(&mut self, obj: ObjectId, key: &str) -> Value {
		crate::assert_valid_path_segment(key);
		let slot = self.objects.slot(obj);
		if slot.is_destroyed {
			return Value::Undefined;
		}

		if let Some(desc) = self.find_descriptor(obj, key) {
			return match desc {
				Descriptor::Computed(cp) => cp.get(self, obj, key),
				Descriptor::Alias(a) => a.get(self, obj, key),
			};
		}

		if let Some(value) = self.tracked_value(obj, key) {
			return self.read_tracked(obj, key, value);
		}

		let mut cursor = Some(obj);
		let mut found = None;
		while let Some(id) = cursor {
			let slot = self.objects.slot(id);
			if let Some(value) = slot.properties.get(key) {
				found = Some(value.clone());
				break;
			}
			cursor = slot.proto;
		}

		self.consume_property_tag(obj, key);

		match found {
			Some(value) => {
				if matches!(value, Value::List(_)) {
					self.consume_property_tag(obj, &format!("{}.[]", key));
				}
				value
			}
			None => {
				if let Some(hook) = self.objects.slot(obj).unknown_property.clone() {
					hook(self, obj, key)
				} else {
					Value::Undefined
				}
			}
		}
	}
}
