pub use enclose::*;

/// Builds a [`ComputedProperty`](crate::ComputedProperty) from a closure,
/// optionally with declared dependent keys:
///
/// ```ignore
/// let full = computed!(["first", "last"] |u, obj, _key| {
///     Value::str(format!("{} {}", u.get(obj, "first"), u.get(obj, "last")))
/// });
/// ```
#[macro_export]
macro_rules! computed {
	([$($dep:expr),* $(,)?] |$u:ident, $obj:ident, $key:ident| $($b:tt)*) => {
		$crate::computed(::std::rc::Rc::new(
			move |$u: &mut $crate::Universe, $obj: $crate::ObjectId, $key: &str| { $($b)* },
		))
		.property(&[$($dep),*])
	};
	(|$u:ident, $obj:ident, $key:ident| $($b:tt)*) => {
		$crate::computed(::std::rc::Rc::new(
			move |$u: &mut $crate::Universe, $obj: $crate::ObjectId, $key: &str| { $($b)* },
		))
	};
}
