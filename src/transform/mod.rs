//! Transformation hooks
//!
//! The `hookfunction` transformer looks up a named hook in a
//! [`HookRegistry`] and runs it over the envelope. The built-in hooks live
//! here next to it.

mod character_stripper;
mod field_dropper;
mod field_setter;
mod hook_function;
mod registry;

pub use character_stripper::CharacterStripper;
pub use field_dropper::FieldDropper;
pub use field_setter::FieldSetter;
pub use hook_function::{HookConfig, HookTransformer};
pub use registry::{HookFn, HookRegistry};
