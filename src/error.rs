use thiserror::Error;

/// Recoverable failures surfaced by the `set` family of operations.
/// Programmer errors (null targets, reserved path segments, malformed
/// descriptors) are asserted instead and panic at the call site.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
	#[error("cannot set read-only property `{key}` on {object}")]
	ReadOnly { object: String, key: String },

	#[error("the path `{path}` could not be set: segment `{segment}` resolved to nothing")]
	UnreachablePath { path: String, segment: String },

	#[error("cannot set `{key}` on destroyed object {object}")]
	Destroyed { object: String, key: String },
}
