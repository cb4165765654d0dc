use std::cell::Cell;
use std::rc::Rc;

use trellis::{alias, computed, Error, ObjectId, Universe, Value};

mod mock;

use mock::Spy;

#[test]
fn write_then_read() {
	let mut u = Universe::new();
	let obj = u.create_object();

	u.set(obj, "name", Value::str("Tom")).unwrap();
	assert_eq!(u.get(obj, "name"), Value::str("Tom"));

	assert_eq!(u.get(obj, "missing"), Value::Undefined);
}

#[test]
fn computed_caches_between_writes() {
	let mut u = Universe::new();
	let obj = u.create_object();
	u.set(obj, "b", Value::Int(2)).unwrap();

	let calls = Rc::new(Cell::new(0u32));
	let cp = {
		let calls = calls.clone();
		computed(Rc::new(move |u: &mut Universe, obj: ObjectId, _key: &str| {
			calls.set(calls.get() + 1);
			Value::Int(u.get(obj, "b").as_int().unwrap() * 2)
		}))
		.property(&["b"])
	};
	u.define_computed(obj, "a", cp);

	assert_eq!(u.get(obj, "a"), Value::Int(4));
	assert_eq!(u.get(obj, "a"), Value::Int(4));
	assert_eq!(calls.get(), 1);

	u.set(obj, "b", Value::Int(5)).unwrap();
	assert_eq!(u.get(obj, "a"), Value::Int(10));
	assert_eq!(u.get(obj, "a"), Value::Int(10));
	assert_eq!(calls.get(), 2);
}

#[test]
fn classic_full_name() {
	let mut u = Universe::new();
	let obj = u.create_object();
	u.set(obj, "firstName", Value::str("Barack")).unwrap();
	u.set(obj, "lastName", Value::str("Obama")).unwrap();

	let cp = computed(Rc::new(|u: &mut Universe, obj: ObjectId, _key: &str| {
		let first = u.get(obj, "firstName");
		let last = u.get(obj, "lastName");
		Value::str(format!(
			"{} {}",
			first.as_str().unwrap(),
			last.as_str().unwrap()
		))
	}))
	.property(&["firstName", "lastName"]);
	u.define_computed(obj, "fullName", cp);

	assert_eq!(u.get(obj, "fullName"), Value::str("Barack Obama"));

	u.set(obj, "lastName", Value::str("Lincoln")).unwrap();
	assert_eq!(u.get(obj, "fullName"), Value::str("Barack Lincoln"));
}

#[test]
fn read_only_computed_rejects_set() {
	let mut u = Universe::new();
	let obj = u.create_object();

	let cp = computed(Rc::new(|_: &mut Universe, _: ObjectId, _: &str| {
		Value::Int(42)
	}))
	.read_only();
	u.define_computed(obj, "answer", cp);

	assert_eq!(u.get(obj, "answer"), Value::Int(42));
	assert!(matches!(
		u.set(obj, "answer", Value::Int(1)),
		Err(Error::ReadOnly { .. })
	));
	assert_eq!(u.get(obj, "answer"), Value::Int(42));
}

#[test]
fn computed_without_setter_clobbers() {
	let mut u = Universe::new();
	let obj = u.create_object();

	let calls = Rc::new(Cell::new(0u32));
	let cp = {
		let calls = calls.clone();
		computed(Rc::new(move |_: &mut Universe, _: ObjectId, _: &str| {
			calls.set(calls.get() + 1);
			Value::Int(7)
		}))
	};
	u.define_computed(obj, "n", cp);
	assert_eq!(u.get(obj, "n"), Value::Int(7));

	u.set(obj, "n", Value::Int(9)).unwrap();
	assert_eq!(u.get(obj, "n"), Value::Int(9));
	assert_eq!(calls.get(), 1);

	// Now a plain property: writes land directly, the getter stays retired.
	u.set(obj, "n", Value::Int(10)).unwrap();
	assert_eq!(u.get(obj, "n"), Value::Int(10));
	assert_eq!(calls.get(), 1);
}

#[test]
fn setter_echo_suppresses_notification() {
	let mut u = Universe::new();
	let obj = u.create_object();

	let cp = computed(Rc::new(|u: &mut Universe, obj: ObjectId, _: &str| {
		u.get(obj, "raw")
	}))
	.property(&["raw"])
	.with_set(Rc::new(
		|_: &mut Universe, _: ObjectId, _: &str, value: Value, previous: Option<Value>| {
			match previous {
				// Echo the cached value back: no change, no notification.
				Some(prev) if prev == value => prev,
				_ => value,
			}
		},
	));
	u.define_computed(obj, "wrapped", cp);
	u.set(obj, "raw", Value::Int(1)).unwrap();
	assert_eq!(u.get(obj, "wrapped"), Value::Int(1));

	let mock = mock::SharedMock::new();
	{
		let mock = mock.clone();
		let f: trellis::ObserverFn = Rc::new(move |_: &mut Universe, _: ObjectId, key: &str| {
			mock.get().trigger(key.to_owned());
		});
		u.add_observer(obj, "wrapped", f);
	}

	mock.get().expect_trigger().times(1).return_const(());
	u.set(obj, "wrapped", Value::Int(2)).unwrap();
	mock.get().checkpoint();

	mock.get().expect_trigger().times(0).return_const(());
	u.set(obj, "wrapped", Value::Int(2)).unwrap();
	mock.get().checkpoint();
}

#[test]
fn setter_suspension_preserves_written_value() {
	let mut u = Universe::new();
	let obj = u.create_object();
	u.set(obj, "raw", Value::str("a")).unwrap();

	let calls = Rc::new(Cell::new(0u32));
	let cp = {
		let calls = calls.clone();
		computed(Rc::new(move |u: &mut Universe, obj: ObjectId, _: &str| {
			calls.set(calls.get() + 1);
			u.get(obj, "raw")
		}))
	}
	.property(&["raw"])
	.with_set(Rc::new(
		|u: &mut Universe, obj: ObjectId, _: &str, value: Value, _: Option<Value>| {
			// Writing the dependency from inside the setter must not clobber
			// the value this setter is about to cache.
			u.set(obj, "raw", value.clone()).unwrap();
			value
		},
	));
	u.define_computed(obj, "name", cp);

	assert_eq!(u.get(obj, "name"), Value::str("a"));
	assert_eq!(calls.get(), 1);

	u.set(obj, "name", Value::str("b")).unwrap();
	assert_eq!(u.get(obj, "name"), Value::str("b"));
	assert_eq!(calls.get(), 1);

	// A direct write to the dependency still invalidates.
	u.set(obj, "raw", Value::str("c")).unwrap();
	assert_eq!(u.get(obj, "name"), Value::str("c"));
	assert_eq!(calls.get(), 2);
}

#[test]
fn volatile_never_caches() {
	let mut u = Universe::new();
	let obj = u.create_object();

	let calls = Rc::new(Cell::new(0u32));
	let cp = {
		let calls = calls.clone();
		computed(Rc::new(move |_: &mut Universe, _: ObjectId, _: &str| {
			calls.set(calls.get() + 1);
			Value::Int(calls.get() as i64)
		}))
	}
	.volatile();
	u.define_computed(obj, "ticker", cp);

	assert_eq!(u.get(obj, "ticker"), Value::Int(1));
	assert_eq!(u.get(obj, "ticker"), Value::Int(2));
	assert_eq!(calls.get(), 2);
}

#[test]
fn alias_reflects_and_writes_through() {
	let mut u = Universe::new();
	let obj = u.create_object();
	u.set(obj, "target", Value::Int(1)).unwrap();
	u.define_alias(obj, "mirror", alias("target"));

	assert_eq!(u.get(obj, "mirror"), Value::Int(1));

	u.set(obj, "mirror", Value::Int(2)).unwrap();
	assert_eq!(u.get(obj, "target"), Value::Int(2));
	assert_eq!(u.get(obj, "mirror"), Value::Int(2));

	u.set(obj, "target", Value::Int(3)).unwrap();
	assert_eq!(u.get(obj, "mirror"), Value::Int(3));
}

#[test]
fn one_way_alias_detaches_on_write() {
	let mut u = Universe::new();
	let obj = u.create_object();
	u.set(obj, "target", Value::Int(1)).unwrap();
	u.define_alias(obj, "view", alias("target").one_way());

	assert_eq!(u.get(obj, "view"), Value::Int(1));

	u.set(obj, "view", Value::Int(5)).unwrap();
	assert_eq!(u.get(obj, "view"), Value::Int(5));
	// Detached: the target neither received the write nor drives the value.
	assert_eq!(u.get(obj, "target"), Value::Int(1));
	u.set(obj, "target", Value::Int(9)).unwrap();
	assert_eq!(u.get(obj, "view"), Value::Int(5));
}

#[test]
fn read_only_alias_rejects_set() {
	let mut u = Universe::new();
	let obj = u.create_object();
	u.set(obj, "target", Value::Int(1)).unwrap();
	u.define_alias(obj, "frozen", alias("target").read_only());

	assert!(matches!(
		u.set(obj, "frozen", Value::Int(2)),
		Err(Error::ReadOnly { .. })
	));
	assert_eq!(u.get(obj, "frozen"), Value::Int(1));
}

#[test]
fn alias_tracks_target_through_observers() {
	let mut u = Universe::new();
	let obj = u.create_object();
	u.set(obj, "target", Value::Int(1)).unwrap();
	u.define_alias(obj, "mirror", alias("target"));

	let mock = mock::SharedMock::new();
	{
		let mock = mock.clone();
		let f: trellis::ObserverFn = Rc::new(move |_: &mut Universe, _: ObjectId, key: &str| {
			mock.get().trigger(key.to_owned());
		});
		u.add_observer(obj, "mirror", f);
	}

	mock.get().expect_trigger().times(1).return_const(());
	u.set(obj, "target", Value::Int(2)).unwrap();
	mock.get().checkpoint();
}

#[test]
fn batching_dedups_and_preserves_first_touch_order() {
	let mut u = Universe::new();
	let obj = u.create_object();
	u.set(obj, "a", Value::Int(0)).unwrap();
	u.set(obj, "b", Value::Int(0)).unwrap();

	let mock = mock::SharedMock::new();
	for key in ["a", "b"] {
		let mock = mock.clone();
		let f: trellis::ObserverFn = Rc::new(move |_: &mut Universe, _: ObjectId, key: &str| {
			mock.get().trigger(key.to_owned());
		});
		u.add_observer(obj, key, f);
	}

	let mut seq = mockall::Sequence::new();
	mock.get()
		.expect_trigger()
		.with(mockall::predicate::eq("a".to_owned()))
		.times(1)
		.in_sequence(&mut seq)
		.return_const(());
	mock.get()
		.expect_trigger()
		.with(mockall::predicate::eq("b".to_owned()))
		.times(1)
		.in_sequence(&mut seq)
		.return_const(());

	u.change_properties(|u| {
		u.set(obj, "a", Value::Int(1)).unwrap();
		u.set(obj, "a", Value::Int(2)).unwrap();
		u.set(obj, "b", Value::Int(1)).unwrap();
		u.set(obj, "a", Value::Int(3)).unwrap();
	});

	mock.get().checkpoint();
}

#[test]
fn unreachable_path_errors_name_the_segment() {
	let mut u = Universe::new();
	let obj = u.create_object();

	match u.set(obj, "a.b.c", Value::Int(1)) {
		Err(Error::UnreachablePath { segment, .. }) => assert_eq!(segment, "a"),
		other => panic!("expected unreachable path, got {:?}", other),
	}

	assert_eq!(u.try_set(obj, "a.b.c", Value::Int(1)), Some(Value::Undefined));
}

#[test]
fn set_on_destroyed_object() {
	let mut u = Universe::new();
	let obj = u.create_object();
	u.set(obj, "k", Value::Int(1)).unwrap();
	u.destroy_object(obj);

	assert!(matches!(
		u.set(obj, "k", Value::Int(2)),
		Err(Error::Destroyed { .. })
	));
	assert_eq!(u.try_set(obj, "k", Value::Int(2)), Some(Value::Int(2)));
	assert_eq!(u.get(obj, "k"), Value::Undefined);
}

#[test]
fn unknown_property_hook() {
	let mut u = Universe::new();
	let obj = u.create_object();
	u.set_unknown_property(
		obj,
		Rc::new(|_: &mut Universe, _: ObjectId, key: &str| {
			Value::str(format!("unknown:{}", key))
		}),
	);

	assert_eq!(u.get(obj, "mystery"), Value::str("unknown:mystery"));

	// A real value wins over the hook.
	u.set(obj, "mystery", Value::Int(1)).unwrap();
	assert_eq!(u.get(obj, "mystery"), Value::Int(1));
}

#[test]
fn prototype_descriptors_are_shared_caches_are_not() {
	let mut u = Universe::new();
	let proto = u.create_object();
	u.mark_prototype(proto);

	let calls = Rc::new(Cell::new(0u32));
	let cp = {
		let calls = calls.clone();
		computed(Rc::new(move |u: &mut Universe, obj: ObjectId, _: &str| {
			calls.set(calls.get() + 1);
			u.get(obj, "base")
		}))
		.property(&["base"])
	};
	u.define_computed(proto, "derived", cp);

	let a = u.create_object_with_proto(proto);
	let b = u.create_object_with_proto(proto);
	u.set(a, "base", Value::Int(1)).unwrap();
	u.set(b, "base", Value::Int(2)).unwrap();

	assert_eq!(u.get(a, "derived"), Value::Int(1));
	assert_eq!(u.get(b, "derived"), Value::Int(2));
	assert_eq!(calls.get(), 2);

	// Each instance caches independently.
	assert_eq!(u.get(a, "derived"), Value::Int(1));
	assert_eq!(u.get(b, "derived"), Value::Int(2));
	assert_eq!(calls.get(), 2);

	u.set(a, "base", Value::Int(3)).unwrap();
	assert_eq!(u.get(a, "derived"), Value::Int(3));
	assert_eq!(u.get(b, "derived"), Value::Int(2));
	assert_eq!(calls.get(), 3);
}

#[test]
fn redefining_a_property_tears_the_old_descriptor_down() {
	let mut u = Universe::new();
	let obj = u.create_object();
	u.set(obj, "dep", Value::Int(1)).unwrap();

	let cp = computed(Rc::new(|u: &mut Universe, obj: ObjectId, _: &str| {
		u.get(obj, "dep")
	}))
	.property(&["dep"]);
	u.define_computed(obj, "k", cp);
	assert_eq!(u.get(obj, "k"), Value::Int(1));

	u.define_property(obj, "k", None, Some(Value::Int(100)));
	assert_eq!(u.get(obj, "k"), Value::Int(100));

	// The dependency no longer reaches the retired computed property.
	u.set(obj, "dep", Value::Int(2)).unwrap();
	assert_eq!(u.get(obj, "k"), Value::Int(100));
}

#[test]
fn manual_notify_delivers_observers() {
	let mut u = Universe::new();
	let obj = u.create_object();
	u.set(obj, "items", Value::list(vec![Value::Int(1)])).unwrap();

	let mock = mock::SharedMock::new();
	{
		let mock = mock.clone();
		let f: trellis::ObserverFn = Rc::new(move |_: &mut Universe, _: ObjectId, key: &str| {
			mock.get().trigger(key.to_owned());
		});
		u.add_observer(obj, "items", f);
	}

	mock.get().expect_trigger().times(1).return_const(());
	u.notify_property_change(obj, "items");
	mock.get().checkpoint();
}

#[test]
fn duplicate_observer_registration_counts() {
	let mut u = Universe::new();
	let obj = u.create_object();
	u.set(obj, "k", Value::Int(0)).unwrap();

	let mock = mock::SharedMock::new();
	let f: trellis::ObserverFn = {
		let mock = mock.clone();
		Rc::new(move |_: &mut Universe, _: ObjectId, key: &str| {
			mock.get().trigger(key.to_owned());
		})
	};
	u.add_observer(obj, "k", f.clone());
	u.add_observer(obj, "k", f.clone());

	// One registration, not two deliveries.
	mock.get().expect_trigger().times(1).return_const(());
	u.set(obj, "k", Value::Int(1)).unwrap();
	mock.get().checkpoint();

	u.remove_observer(obj, "k", &f);
	mock.get().expect_trigger().times(1).return_const(());
	u.set(obj, "k", Value::Int(2)).unwrap();
	mock.get().checkpoint();

	u.remove_observer(obj, "k", &f);
	mock.get().expect_trigger().times(0).return_const(());
	u.set(obj, "k", Value::Int(3)).unwrap();
	mock.get().checkpoint();
}

#[test]
fn paired_observer_registration_releases_the_watch() {
	let mut u = Universe::new();
	let obj = u.create_object();
	u.set(obj, "k", Value::Int(0)).unwrap();

	let f: trellis::ObserverFn = Rc::new(|_: &mut Universe, _: ObjectId, _: &str| {});
	u.add_observer(obj, "k", f.clone());
	u.add_observer(obj, "k", f.clone());
	assert!(u.is_watching(obj, "k"));

	u.remove_observer(obj, "k", &f);
	assert!(u.is_watching(obj, "k"));

	u.remove_observer(obj, "k", &f);
	assert!(!u.is_watching(obj, "k"));
}

#[test]
fn computed_macro_builds_a_working_property() {
	let mut u = Universe::new();
	let obj = u.create_object();
	u.set(obj, "n", Value::Int(3)).unwrap();

	let cp = trellis::computed!(["n"] |u, obj, _key| {
		Value::Int(u.get(obj, "n").as_int().unwrap() + 1)
	});
	u.define_computed(obj, "next", cp);

	assert_eq!(u.get(obj, "next"), Value::Int(4));
	u.set(obj, "n", Value::Int(9)).unwrap();
	assert_eq!(u.get(obj, "next"), Value::Int(10));
}

#[test]
#[should_panic]
fn empty_key_is_a_programmer_error() {
	let mut u = Universe::new();
	let obj = u.create_object();
	let _ = u.get(obj, "");
}

#[test]
#[should_panic]
fn reserved_path_segments_are_rejected() {
	let mut u = Universe::new();
	let obj = u.create_object();
	let _ = u.get(obj, "a.__proto__");
}
