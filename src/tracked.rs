use crate::{ObjectId, Universe, Value};

/// Tracked fields are the autotracking-native storage mode: a backing value
/// in metadata plus the property tag. Reads consume the tag; writes dirty it
/// together with the object's self tag, so coarse-grained consumers see the
/// object move even when they never read the field itself.
impl Universe {
	pub fn define_tracked(&mut self, obj: ObjectId, key: &str, initial: Value) {
		crate::assert_valid_path_segment(key);
		self.objects.slot_mut(obj).properties.remove(key);
		self.meta_mut(obj).tracked.insert(key.to_owned(), initial);
	}

	pub(crate) fn tracked_value(&self, obj: ObjectId, key: &str) -> Option<Value> {
		self.meta(obj).and_then(|m| m.tracked.get(key).cloned())
	}

	pub(crate) fn read_tracked(&mut self, obj: ObjectId, key: &str, value: Value) -> Value {
		self.consume_property_tag(obj, key);
		if matches!(value, Value::List(_)) {
			self.consume_property_tag(obj, &format!("{}.[]", key));
		}
		value
	}

	pub(crate) fn write_tracked(&mut self, obj: ObjectId, key: &str, value: Value) {
		self.meta_mut(obj)
			.tracked
			.insert(key.to_owned(), value);
		self.dirty_property_tag(obj, key);
		self.dirty_object_tag(obj);
	}
}
