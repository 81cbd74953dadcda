use std::cell::{Cell, RefCell};
use std::rc::Rc;

use digest_scope::{CallbackFailure, CallbackKind, ExceptionHandler, ManualScheduler, RootOptions, Scope};

mod digest;
mod hierarchy;

#[derive(Default)]
pub struct Failures(RefCell<Vec<CallbackFailure>>);

impl Failures {
	pub fn kinds(&self) -> Vec<CallbackKind> {
		self.0.borrow().iter().map(|failure| failure.kind).collect()
	}

	pub fn messages(&self) -> Vec<String> {
		self.0.borrow().iter().map(|failure| failure.message.clone()).collect()
	}
}

impl ExceptionHandler for Failures {
	fn handle(&self, failure: CallbackFailure) {
		self.0.borrow_mut().push(failure);
	}
}

pub struct Harness {
	pub scope: Scope,
	pub timers: Rc<ManualScheduler>,
	pub failures: Rc<Failures>,
}

pub fn harness() -> Harness {
	harness_with(RootOptions::default())
}

pub fn harness_with(options: RootOptions) -> Harness {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();

	let timers = Rc::new(ManualScheduler::new());
	let failures = Rc::new(Failures::default());
	let scope = Scope::with_options(
		options
			.scheduler(timers.clone())
			.exception_handler(failures.clone()),
	);

	Harness {
		scope,
		timers,
		failures,
	}
}

pub fn counter() -> Rc<Cell<u32>> {
	Rc::new(Cell::new(0))
}

pub fn bump(counter: &Cell<u32>) {
	counter.set(counter.get() + 1);
}
