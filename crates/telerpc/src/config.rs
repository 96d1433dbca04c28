//! Dispatcher configuration.

use crate::val::UNDEFINED_SENTINEL;

/// How `null` and `undefined` argument values are treated by validation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NullPolicy {
    /// `null`/`undefined` satisfy every declared type. Null-handling is left
    /// to the invoked function.
    #[default]
    Permissive,
    /// `null`/`undefined` fail against primitives, arrays and object shapes.
    /// `any`, unverifiable type text and omitted optional parameters still
    /// pass.
    Strict,
}

/// Settings consumed by [`crate::Dispatcher`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    pub null_policy: NullPolicy,
    /// String value decoded as `undefined` by `Dispatcher::decode_request`.
    /// `None` disables the substitution.
    pub undefined_sentinel: Option<String>,
    /// Report a panicking handler as an invocation error instead of
    /// unwinding through the dispatcher.
    pub catch_panics: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            null_policy: NullPolicy::Permissive,
            undefined_sentinel: Some(UNDEFINED_SENTINEL.to_string()),
            catch_panics: true,
        }
    }
}
