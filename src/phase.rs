use std::fmt::Display;

use crate::error::DigestError;
use crate::tree::Tree;

/// What the tree is currently doing. Only one phase can be active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Digest,
	Apply,
}

impl Display for Phase {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Phase::Digest => f.write_str("$digest"),
			Phase::Apply => f.write_str("$apply"),
		}
	}
}

impl Tree {
	pub(crate) fn phase(&self) -> Option<Phase> {
		self.phase.get()
	}

	pub(crate) fn begin_phase(&self, phase: Phase) -> Result<(), DigestError> {
		if let Some(active) = self.phase.get() {
			return Err(DigestError::InProgress { phase: active });
		}
		self.phase.set(Some(phase));
		Ok(())
	}

	pub(crate) fn clear_phase(&self) {
		self.phase.set(None);
	}
}
