use std::cell::RefCell;
use std::rc::Rc;

use digest_scope::{
	listener, watch_fn, CallbackKind, Deregistration, DigestError, Equality, Phase, RootOptions,
	Value,
};

use super::{bump, counter, harness, harness_with};

#[test]
fn calls_listener_on_first_digest() {
	let h = harness();
	let calls = counter();

	h.scope.watch(
		watch_fn!(_s => "wat"),
		listener!((calls) |_, _, _| bump(&calls)),
	);
	h.scope.digest().unwrap();

	assert_eq!(calls.get(), 1);
}

#[test]
fn calls_watch_function_with_the_scope() {
	let h = harness();
	let seen = Rc::new(RefCell::new(None));

	h.scope.watch(
		{
			let seen = seen.clone();
			move |scope| {
				*seen.borrow_mut() = Some(scope.clone());
				Value::Undefined
			}
		},
		|_, _, _| {},
	);
	h.scope.digest().unwrap();

	assert_eq!(seen.borrow().as_ref(), Some(&h.scope));
}

#[test]
fn calls_listener_when_value_changes() {
	let h = harness();
	h.scope.set("someValue", "a");
	h.scope.set("counter", 0);

	h.scope.watch(
		|scope| scope.get("someValue"),
		|_, _, scope| {
			let n = scope.get("counter").as_f64().unwrap();
			scope.set("counter", n + 1.0);
		},
	);

	assert_eq!(h.scope.get("counter").as_f64(), Some(0.0));

	h.scope.digest().unwrap();
	assert_eq!(h.scope.get("counter").as_f64(), Some(1.0));

	h.scope.digest().unwrap();
	assert_eq!(h.scope.get("counter").as_f64(), Some(1.0));

	h.scope.set("someValue", "b");
	assert_eq!(h.scope.get("counter").as_f64(), Some(1.0));

	h.scope.digest().unwrap();
	assert_eq!(h.scope.get("counter").as_f64(), Some(2.0));
}

#[test]
fn calls_listener_when_first_value_is_undefined() {
	let h = harness();
	let calls = counter();

	h.scope.watch(
		|scope| scope.get("someValue"),
		listener!((calls) |_, _, _| bump(&calls)),
	);
	h.scope.digest().unwrap();

	assert_eq!(calls.get(), 1);
}

#[test]
fn first_call_gets_new_value_as_old_value() {
	let h = harness();
	h.scope.set("someValue", 123);
	let given = Rc::new(RefCell::new(Value::Undefined));

	h.scope.watch(
		|scope| scope.get("someValue"),
		listener!((given) |new, old, _| {
			assert!(new.same(old));
			*given.borrow_mut() = old.clone();
		}),
	);
	h.scope.digest().unwrap();

	assert_eq!(given.borrow().as_f64(), Some(123.0));
}

#[test]
fn may_have_watchers_without_listeners() {
	let h = harness();
	let calls = counter();

	h.scope.watch_with(
		watch_fn!((calls) _s => bump(&calls)),
		None,
		Equality::Reference,
	);
	h.scope.digest().unwrap();

	assert!(calls.get() > 0);
}

#[test]
fn triggers_chained_watchers_in_the_same_digest() {
	let h = harness();
	h.scope.set("name", "Jane");

	h.scope.watch(
		|scope| scope.get("nameUpper"),
		|new, _, scope| {
			if let Some(upper) = new.as_str() {
				scope.set("initial", format!("{}.", &upper[..1]));
			}
		},
	);
	h.scope.watch(
		|scope| scope.get("name"),
		|new, _, scope| {
			if let Some(name) = new.as_str() {
				scope.set("nameUpper", name.to_uppercase());
			}
		},
	);

	h.scope.digest().unwrap();
	assert_eq!(h.scope.get("initial").as_str(), Some("J."));

	h.scope.set("name", "Bob");
	h.scope.digest().unwrap();
	assert_eq!(h.scope.get("initial").as_str(), Some("B."));
}

#[test]
fn gives_up_after_ten_sweeps() {
	let h = harness();
	h.scope.set("counterA", 0);
	h.scope.set("counterB", 0);
	let sweeps = counter();

	h.scope.watch(
		watch_fn!((sweeps) scope => {
			bump(&sweeps);
			scope.get("counterA")
		}),
		|_, _, scope| {
			let n = scope.get("counterB").as_f64().unwrap();
			scope.set("counterB", n + 1.0);
		},
	);
	h.scope.watch(
		|scope| scope.get("counterB"),
		|_, _, scope| {
			let n = scope.get("counterA").as_f64().unwrap();
			scope.set("counterA", n + 1.0);
		},
	);

	assert_eq!(h.scope.digest(), Err(DigestError::TtlExceeded { ttl: 10 }));
	assert_eq!(sweeps.get(), 10);
	assert_eq!(h.scope.phase(), None);
}

#[test]
fn iteration_budget_is_configurable() {
	let h = harness_with(RootOptions::default().ttl(3));
	h.scope.set("n", 0);

	h.scope.watch(
		|scope| scope.get("n"),
		|new, _, scope| scope.set("n", new.as_f64().unwrap() + 1.0),
	);

	assert_eq!(h.scope.digest(), Err(DigestError::TtlExceeded { ttl: 3 }));
	assert_eq!(h.scope.get("n").as_f64(), Some(3.0));
}

#[test]
fn ends_digest_when_last_dirty_watcher_is_clean() {
	let h = harness();
	let items = Value::array((0..100).collect::<Vec<usize>>());
	h.scope.set("aValue", items.clone());
	let executions = counter();

	for i in 0..100 {
		h.scope.watch(
			watch_fn!((executions) scope => {
				bump(&executions);
				scope.get("aValue").as_array().unwrap().get(i)
			}),
			|_, _, _| {},
		);
	}

	h.scope.digest().unwrap();
	assert_eq!(executions.get(), 200);

	// The newest watcher is visited first, so after it changes the second
	// sweep stops right at it.
	items.as_array().unwrap().set(99, 420);
	h.scope.digest().unwrap();
	assert_eq!(executions.get(), 301);
}

#[test]
fn runs_watchers_added_from_a_listener() {
	let h = harness();
	h.scope.set("aValue", "abc");
	let calls = counter();

	h.scope.watch(
		|scope| scope.get("aValue"),
		listener!((calls) |_, _, scope| {
			scope.watch(
				|scope| scope.get("aValue"),
				listener!((calls) |_, _, _| bump(&calls)),
			);
		}),
	);
	h.scope.digest().unwrap();

	assert_eq!(calls.get(), 1);
}

#[test]
fn nan_equals_nan() {
	let h = harness();
	h.scope.set("number", f64::NAN);
	let calls = counter();

	h.scope.watch(
		|scope| scope.get("number"),
		listener!((calls) |_, _, _| bump(&calls)),
	);

	h.scope.digest().unwrap();
	assert_eq!(calls.get(), 1);

	h.scope.digest().unwrap();
	assert_eq!(calls.get(), 1);
}

#[test]
fn failing_watch_function_does_not_stop_the_digest() {
	let h = harness();
	h.scope.set("aValue", "abc");
	let calls = counter();

	h.scope.watch(|_| panic!("watch failed"), |_, _, _| {});
	h.scope.watch(
		|scope| scope.get("aValue"),
		listener!((calls) |_, _, _| bump(&calls)),
	);

	h.scope.digest().unwrap();
	assert_eq!(calls.get(), 1);
	assert!(h.failures.kinds().contains(&CallbackKind::Watch));
}

#[test]
fn failing_listener_does_not_stop_the_digest() {
	let h = harness();
	h.scope.set("aValue", "abc");
	let calls = counter();

	h.scope.watch(|scope| scope.get("aValue"), |_, _, _| panic!("listener failed"));
	h.scope.watch(
		|scope| scope.get("aValue"),
		listener!((calls) |_, _, _| bump(&calls)),
	);

	h.scope.digest().unwrap();
	assert_eq!(calls.get(), 1);
	assert_eq!(h.failures.kinds(), vec![CallbackKind::Listener]);
}

#[test]
fn deregistered_watcher_stops_firing() {
	let h = harness();
	h.scope.set("aValue", "abc");
	let calls = counter();

	let deregistration = h.scope.watch(
		|scope| scope.get("aValue"),
		listener!((calls) |_, _, _| bump(&calls)),
	);

	h.scope.digest().unwrap();
	assert_eq!(calls.get(), 1);

	h.scope.set("aValue", "def");
	h.scope.digest().unwrap();
	assert_eq!(calls.get(), 2);

	deregistration.deregister();
	deregistration.deregister();
	h.scope.set("aValue", "ghi");
	h.scope.digest().unwrap();
	assert_eq!(calls.get(), 2);
	assert_eq!(h.scope.watcher_count(), 0);
}

#[test]
fn watcher_may_deregister_itself_during_digest() {
	let h = harness();
	h.scope.set("aValue", "abc");
	let calls = Rc::new(RefCell::new(Vec::new()));
	let own: Rc<RefCell<Option<Deregistration>>> = Rc::new(RefCell::new(None));

	h.scope.watch(
		watch_fn!((calls) scope => {
			calls.borrow_mut().push("first");
			scope.get("aValue")
		}),
		|_, _, _| {},
	);
	let deregistration = h.scope.watch(
		watch_fn!((calls, own) _s => {
			calls.borrow_mut().push("second");
			if let Some(own) = own.borrow().as_ref() {
				own.deregister();
			}
		}),
		|_, _, _| {},
	);
	*own.borrow_mut() = Some(deregistration);
	h.scope.watch(
		watch_fn!((calls) scope => {
			calls.borrow_mut().push("third");
			scope.get("aValue")
		}),
		|_, _, _| {},
	);

	h.scope.digest().unwrap();

	assert_eq!(*calls.borrow(), vec!["third", "second", "first", "third", "first"]);
}

#[test]
fn deregistering_an_unvisited_watcher_keeps_it_from_firing() {
	let h = harness();
	h.scope.set("aValue", "abc");
	let calls = counter();

	// Registered first, so visited last.
	let victim = h.scope.watch(
		|scope| scope.get("aValue"),
		listener!((calls) |_, _, _| bump(&calls)),
	);
	h.scope.watch(
		|scope| scope.get("aValue"),
		move |_, _, _| victim.deregister(),
	);

	h.scope.digest().unwrap();
	assert_eq!(calls.get(), 0);
}

#[test]
fn several_watchers_may_be_deregistered_during_digest() {
	let h = harness();
	h.scope.set("aValue", "abc");
	let calls = counter();
	let victims: Rc<RefCell<Vec<Deregistration>>> = Rc::new(RefCell::new(Vec::new()));

	h.scope.watch(
		|scope| scope.get("aValue"),
		listener!((victims) |_, _, _| {
			for victim in victims.borrow().iter() {
				victim.deregister();
			}
		}),
	);
	let a = h.scope.watch(
		|scope| scope.get("aValue"),
		listener!((calls) |_, _, _| bump(&calls)),
	);
	let b = h.scope.watch(
		|scope| scope.get("aValue"),
		listener!((calls) |_, _, _| bump(&calls)),
	);
	victims.borrow_mut().extend([a, b]);

	h.scope.digest().unwrap();

	// Both were visited before the deregistering watcher.
	assert_eq!(calls.get(), 2);

	h.scope.set("aValue", "def");
	h.scope.digest().unwrap();
	assert_eq!(calls.get(), 2);
	assert_eq!(h.scope.watcher_count(), 1);
}

#[test]
fn reentrant_digest_is_rejected() {
	let h = harness();
	let result = Rc::new(RefCell::new(None));

	h.scope.watch(
		|_| Value::from(1),
		listener!((result) |_, _, scope| {
			*result.borrow_mut() = Some(scope.digest());
		}),
	);

	h.scope.digest().unwrap();

	assert_eq!(
		*result.borrow(),
		Some(Err(DigestError::InProgress { phase: Phase::Digest }))
	);
}

#[test]
fn digest_only_visits_the_subtree() {
	let h = harness();
	let child = h.scope.new_child();
	let parent_calls = counter();
	let child_calls = counter();

	h.scope.watch(
		|_| Value::from(1),
		listener!((parent_calls) |_, _, _| bump(&parent_calls)),
	);
	child.watch(
		|_| Value::from(1),
		listener!((child_calls) |_, _, _| bump(&child_calls)),
	);

	child.digest().unwrap();
	assert_eq!((parent_calls.get(), child_calls.get()), (0, 1));

	h.scope.digest().unwrap();
	assert_eq!((parent_calls.get(), child_calls.get()), (1, 1));
}

#[test]
fn phase_is_visible_from_callbacks() {
	let h = harness();
	let phases = Rc::new(RefCell::new(Vec::new()));

	h.scope.watch(
		watch_fn!((phases) scope => {
			phases.borrow_mut().push(scope.phase());
		}),
		|_, _, _| {},
	);

	h.scope
		.apply(|scope| {
			let phase = scope.phase();
			phases.borrow_mut().push(phase);
		})
		.unwrap();

	assert_eq!(
		*phases.borrow(),
		vec![Some(Phase::Apply), Some(Phase::Digest), Some(Phase::Digest)]
	);
	assert_eq!(h.scope.phase(), None);
}

#[test]
fn failed_watch_functions_report_their_error() {
	let h = harness();
	let calls = counter();

	h.scope.try_watch_with(
		|_| Err("cannot read".into()),
		|_, _, _| Ok(()),
		Equality::Reference,
	);
	h.scope.try_watch_with(
		|_| Ok(Value::from(1)),
		|_, _, _| Err("cannot write".into()),
		Equality::Reference,
	);
	h.scope.watch(
		|_| Value::from(2),
		listener!((calls) |_, _, _| bump(&calls)),
	);
	h.scope.digest().unwrap();

	assert_eq!(calls.get(), 1);
	assert_eq!(h.failures.kinds(), vec![CallbackKind::Listener, CallbackKind::Watch]);
	assert_eq!(h.failures.messages(), vec!["cannot write", "cannot read"]);
}

#[test]
fn destroying_a_scope_mid_sweep_skips_its_remaining_watchers() {
	let h = harness();
	let child = h.scope.new_child();
	let calls = counter();

	child.watch(
		|_| Value::from("older"),
		listener!((calls) |_, _, _| bump(&calls)),
	);
	child.watch(
		|_| Value::from("newer"),
		|_, _, scope| scope.destroy(),
	);
	h.scope.digest().unwrap();

	assert!(child.is_destroyed());
	assert_eq!(calls.get(), 0);
	assert!(h.failures.kinds().is_empty());
}
