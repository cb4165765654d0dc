use std::fmt;
use std::rc::Rc;

use crate::ObjectId;

/// A dynamic property value. Objects are referenced by arena id, strings and
/// lists are cheaply clonable via `Rc`.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
	#[default]
	Undefined,
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(Rc<str>),
	Object(ObjectId),
	List(Rc<Vec<Value>>),
}

impl Value {
	pub fn str(value: impl AsRef<str>) -> Value {
		Value::Str(Rc::from(value.as_ref()))
	}

	pub fn list(items: Vec<Value>) -> Value {
		Value::List(Rc::new(items))
	}

	pub fn as_object(&self) -> Option<ObjectId> {
		match self {
			Value::Object(id) => Some(*id),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(n) => Some(*n),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_list(&self) -> Option<&[Value]> {
		match self {
			Value::List(items) => Some(items),
			_ => None,
		}
	}

	/// `Undefined` and `Null` both read as "nothing there" during path
	/// traversal.
	pub fn is_none_like(&self) -> bool {
		matches!(self, Value::Undefined | Value::Null)
	}

	/// Identity comparison used when deciding whether a chain has to
	/// re-parent: objects compare by id, everything else by value.
	pub(crate) fn same_identity(a: &Value, b: &Value) -> bool {
		match (a, b) {
			(Value::Object(x), Value::Object(y)) => x == y,
			(Value::List(x), Value::List(y)) => Rc::ptr_eq(x, y),
			_ => a == b,
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Undefined => write!(f, "undefined"),
			Value::Null => write!(f, "null"),
			Value::Bool(b) => write!(f, "{}", b),
			Value::Int(n) => write!(f, "{}", n),
			Value::Float(n) => write!(f, "{}", n),
			Value::Str(s) => write!(f, "{:?}", s),
			Value::Object(id) => write!(f, "{}", id),
			Value::List(items) => {
				write!(f, "[")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{}", item)?;
				}
				write!(f, "]")
			}
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Int(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Float(value)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::str(value)
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::Str(Rc::from(value.as_str()))
	}
}

impl From<ObjectId> for Value {
	fn from(value: ObjectId) -> Self {
		Value::Object(value)
	}
}
