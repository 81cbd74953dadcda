use std::cell::RefCell;
use std::rc::Rc;

use digest_scope::{listener, Value, DESTROY_EVENT};

use super::{bump, counter, harness};

#[test]
fn child_reads_parent_attributes() {
	let h = harness();
	h.scope.set("aValue", Value::array([1, 2, 3]));

	let child = h.scope.new_child();

	assert_eq!(child.get("aValue").to_string(), "[1,2,3]");
	assert!(!child.has_own("aValue"));
}

#[test]
fn child_sees_attributes_set_after_creation() {
	let h = harness();
	let child = h.scope.new_child();

	h.scope.set("aValue", "later");

	assert_eq!(child.get("aValue").as_str(), Some("later"));
}

#[test]
fn parent_does_not_see_child_attributes() {
	let h = harness();
	let child = h.scope.new_child();

	child.set("aValue", 1);

	assert!(h.scope.get("aValue").is_undefined());
}

#[test]
fn lookup_walks_several_levels() {
	let h = harness();
	let grandchild = h.scope.new_child().new_child();

	h.scope.set("aValue", 42);

	assert_eq!(grandchild.get("aValue").as_f64(), Some(42.0));
}

#[test]
fn child_writes_shadow_parent_attributes() {
	let h = harness();
	let child = h.scope.new_child();
	h.scope.set("name", "Joe");

	child.set("name", "Jill");

	assert_eq!(child.get("name").as_str(), Some("Jill"));
	assert_eq!(h.scope.get("name").as_str(), Some("Joe"));

	child.remove("name");
	assert_eq!(child.get("name").as_str(), Some("Joe"));
}

#[test]
fn shared_containers_are_mutated_through_the_child() {
	let h = harness();
	let child = h.scope.new_child();
	h.scope.set("user", Value::object([("name", "Joe")]));

	child.get("user").as_object().unwrap().insert("name", "Jill");

	assert_eq!(h.scope.get("user").as_object().unwrap().get("name").as_str(), Some("Jill"));
}

#[test]
fn isolated_child_does_not_read_parent_attributes() {
	let h = harness();
	h.scope.set("aValue", Value::array([1, 2, 3]));

	let child = h.scope.new_isolated();

	assert!(child.is_isolated());
	assert!(child.get("aValue").is_undefined());
}

#[test]
fn isolated_child_cannot_watch_parent_attributes() {
	let h = harness();
	let child = h.scope.new_isolated();
	h.scope.set("aValue", "abc");
	let seen = Rc::new(RefCell::new(Vec::new()));

	child.watch(
		|scope| scope.get("aValue"),
		listener!((seen) |new, _, _| seen.borrow_mut().push(new.clone())),
	);
	h.scope.digest().unwrap();

	assert_eq!(seen.borrow().len(), 1);
	assert!(seen.borrow()[0].is_undefined());
}

#[test]
fn root_digest_reaches_children_and_isolated_children() {
	let h = harness();
	let child = h.scope.new_child();
	let isolated = child.new_isolated();
	h.scope.set("aValue", "abc");
	let calls = counter();

	child.watch(
		|scope| scope.get("aValue"),
		listener!((calls) |_, _, _| bump(&calls)),
	);
	isolated.watch(
		|_| Value::from(1),
		listener!((calls) |_, _, _| bump(&calls)),
	);
	h.scope.digest().unwrap();

	assert_eq!(calls.get(), 2);
}

#[test]
fn isolated_child_shares_the_task_queues() {
	let h = harness();
	let isolated = h.scope.new_isolated();
	let evaluated = counter();
	let applied = counter();
	let post = counter();

	isolated.eval_async(enclose::enclose!((evaluated) move |_| bump(&evaluated)));
	assert_eq!(h.timers.pending(), 1);
	isolated.apply_async(enclose::enclose!((applied) move |_| bump(&applied)));
	isolated.post_digest(enclose::enclose!((post) move || bump(&post)));

	h.scope.digest().unwrap();

	assert_eq!((evaluated.get(), applied.get(), post.get()), (1, 1, 1));
}

#[test]
fn isolated_apply_digests_the_whole_tree() {
	let h = harness();
	let isolated = h.scope.new_isolated();
	let calls = counter();

	h.scope.watch(
		|_| Value::from(1),
		listener!((calls) |_, _, _| bump(&calls)),
	);
	isolated.apply(|_| ()).unwrap();

	assert_eq!(calls.get(), 1);
	assert!(isolated.root() == h.scope);
}

#[test]
fn hierarchy_parent_can_differ_from_attribute_parent() {
	let h = harness();
	let prototype_parent = h.scope.new_child();
	let hierarchy_parent = h.scope.new_child();
	let child = prototype_parent.new_child_of(false, &hierarchy_parent);
	let calls = counter();

	prototype_parent.set("aValue", 42);
	assert_eq!(child.get("aValue").as_f64(), Some(42.0));
	assert!(child.parent().unwrap() == hierarchy_parent);

	child.watch(
		|_| Value::from(1),
		listener!((calls) |_, _, _| bump(&calls)),
	);

	prototype_parent.digest().unwrap();
	assert_eq!(calls.get(), 0);

	hierarchy_parent.digest().unwrap();
	assert_eq!(calls.get(), 1);
}

#[test]
fn tree_navigation() {
	let h = harness();
	let a = h.scope.new_child();
	let b = h.scope.new_isolated();
	let a1 = a.new_child();

	assert_eq!(h.scope.children(), vec![a.clone(), b.clone()]);
	assert_eq!(a.children(), vec![a1.clone()]);
	assert!(h.scope.parent().is_none());
	assert!(a1.parent().unwrap() == a);
	assert!(a1.root() == h.scope);
	assert!(b.root() == h.scope);
}

#[test]
fn destroyed_scope_is_no_longer_digested() {
	let h = harness();
	let parent = h.scope.new_child();
	let child = parent.new_child();
	child.set("aValue", Value::array([1, 2, 3]));
	let calls = counter();

	child.watch(
		|scope| scope.get("aValue"),
		listener!((calls) |_, _, _| bump(&calls)),
	);
	parent.digest().unwrap();
	assert_eq!(calls.get(), 1);

	child.set("aValue", Value::array([4, 5, 6]));
	parent.digest().unwrap();
	assert_eq!(calls.get(), 2);

	child.destroy();
	assert!(parent.children().is_empty());
	assert!(child.is_destroyed());

	child.set("aValue", Value::array([7, 8, 9]));
	parent.digest().unwrap();
	assert_eq!(calls.get(), 2);
}

#[test]
fn destroy_broadcasts_to_the_subtree_first() {
	let h = harness();
	let child = h.scope.new_child();
	let grandchild = child.new_child();
	let log = Rc::new(RefCell::new(Vec::new()));

	for (label, scope) in [("child", &child), ("grandchild", &grandchild)] {
		let log = log.clone();
		scope.on(DESTROY_EVENT, move |event, _| {
			let attached = event
				.current_scope()
				.and_then(|scope| scope.parent())
				.map_or(false, |parent| parent.children().len() == 1);
			log.borrow_mut().push((label, attached));
		});
	}
	let root_calls = counter();
	h.scope.on(DESTROY_EVENT, {
		let root_calls = root_calls.clone();
		move |_, _| bump(&root_calls)
	});

	child.destroy();

	assert_eq!(*log.borrow(), vec![("child", true), ("grandchild", true)]);
	assert_eq!(root_calls.get(), 0);
	assert_eq!(child.listener_count(DESTROY_EVENT), 0);
}

#[test]
fn entry_points_are_inert_after_destroy() {
	let h = harness();
	let child = h.scope.new_child();
	child.destroy();
	let calls = counter();

	let deregistration = child.watch(
		|_| Value::from(1),
		listener!((calls) |_, _, _| bump(&calls)),
	);
	child.on("some-event", {
		let calls = calls.clone();
		move |_, _| bump(&calls)
	});
	child.eval_async(|_| panic!("must not run"));
	child.apply_async(|_| panic!("must not run"));
	child.post_digest(|| panic!("must not run"));

	assert_eq!(child.digest(), Ok(()));
	child.emit("some-event", &[]);
	child.broadcast("some-event", &[]);
	h.scope.digest().unwrap();
	h.timers.flush();
	deregistration.deregister();
	child.destroy();

	assert_eq!(calls.get(), 0);
	assert_eq!(child.watcher_count(), 0);
	assert_eq!(h.timers.pending(), 0);
	assert!(h.failures.kinds().is_empty());
}

#[test]
fn child_of_a_destroyed_scope_is_detached() {
	let h = harness();
	let parent = h.scope.new_child();
	parent.destroy();

	let child = parent.new_child();
	let adopted = h.scope.new_child_of(false, &parent);

	for scope in [&child, &adopted] {
		assert!(scope.is_destroyed());
		assert!(scope.parent().is_none());
	}
	assert!(parent.children().is_empty());
	assert!(h.scope.children().is_empty());
}
