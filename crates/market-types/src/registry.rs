//! Registry trait for self-registering implementations.
//!
//! Pluggable backends implement this trait to declare the name they are
//! configured under and the factory that builds them.

/// Base trait for implementation registries.
///
/// Each pluggable module (currently the Record Store backends) provides a
/// Registry struct that implements this trait, so every implementation declares
/// its configuration name and a factory function.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// This should match the key used in the TOML configuration, for example:
	/// - "memory" for storage.implementations.memory
	/// - "file" for storage.implementations.file
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
