//! # Argument Validation
//!
//! Checks wire arguments against declared parameter schemas before a
//! function is invoked.
//!
//! ## Rules (first match wins)
//! 1. Schema `any`, or a `null`/`undefined` value: passes (under
//!    [`NullPolicy::Permissive`]).
//! 2. Object shape: value must be a non-array object containing every
//!    required field; each present field is checked recursively. Optional
//!    (`name?: T`) fields may be absent. Extra fields are ignored.
//! 3. Opaque `T[]`: value must be an array; every item is checked against `T`.
//! 4. `string`, `number`, `boolean`: the value's type tag must match.
//! 5. Any other type text is unverifiable and passes.
//!
//! Validation is fail-fast: parameters left to right, fields in declared
//! order, and only the first violation is reported.

use std::fmt;

use teleschema::ParamInfo;
use teleschema::TypeSchema;

use crate::config::NullPolicy;
use crate::val::Val;

/// The specific violation found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Supplied argument count outside `[min, max]`.
    Arity { min: usize, max: usize, got: usize },
    /// A non-optional parameter past the end of the supplied arguments.
    Required { param: String },
    /// An object argument lacks a declared field.
    MissingProperty { property: String, path: String },
    /// The value's runtime type does not match the declared type.
    TypeMismatch { path: String, expected: String, found: &'static str },
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arity { min, max, got } if min == max => {
                write!(f, "Expected {} arguments, but got {}.", max, got)
            }
            Self::Arity { min, max, got } => {
                write!(f, "Expected {}-{} arguments, but got {}.", min, max, got)
            }
            Self::Required { param } => {
                write!(f, "Argument for '{}' is required but not provided.", param)
            }
            Self::MissingProperty { property, path } => {
                write!(f, "Missing property '{}' in argument '{}'.", property, path)
            }
            Self::TypeMismatch { path, expected, found } => {
                write!(f, "Argument '{}' expected type '{}' but got '{}'.", path, expected, found)
            }
        }
    }
}

/// A rejected call, tagged with where it was headed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    pub namespace: String,
    pub function: String,
    pub kind: ValidationErrorKind,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC call to \"{}:{}\": {}", self.namespace, self.function, self.kind)
    }
}

impl std::error::Error for ValidationError {}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Validates `args` against `params` under the default (permissive) policy.
pub fn validate_args(namespace: &str, function: &str, args: &[Val], params: &[ParamInfo]) -> Result<()> {
    Validator::default().validate_args(namespace, function, args, params)
}

/// A schema checker configured with a [`NullPolicy`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Validator {
    policy: NullPolicy,
}

impl Validator {
    pub fn new(policy: NullPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> NullPolicy {
        self.policy
    }

    /// Checks arity, then each parameter in declared order.
    pub fn validate_args(
        &self,
        namespace: &str,
        function: &str,
        args: &[Val],
        params: &[ParamInfo],
    ) -> Result<()> {
        let reject = |kind| ValidationError {
            namespace: namespace.to_string(),
            function: function.to_string(),
            kind,
        };

        let min = params.iter().filter(|p| !p.optional).count();
        let max = params.len();
        let got = args.len();
        if got < min || got > max {
            return Err(reject(ValidationErrorKind::Arity { min, max, got }));
        }

        for (i, param) in params.iter().enumerate() {
            let Some(arg) = args.get(i) else {
                if param.optional {
                    continue;
                }
                return Err(reject(ValidationErrorKind::Required { param: param.name.clone() }));
            };

            if param.optional && arg.is_nullish() {
                continue;
            }

            self.validate_value(&param.ty, arg, &param.name).map_err(reject)?;
        }

        Ok(())
    }

    /// Checks one value against one schema. `path` names the value in
    /// diagnostics (`a`, `a.user.name`, `a[2]`).
    pub fn validate_value(
        &self,
        schema: &TypeSchema,
        value: &Val,
        path: &str,
    ) -> std::result::Result<(), ValidationErrorKind> {
        if schema.is_any() {
            return Ok(());
        }

        if value.is_nullish() {
            return match self.policy {
                NullPolicy::Strict if is_verifiable(schema) => Err(mismatch(schema, value, path)),
                _ => Ok(()),
            };
        }

        match schema {
            TypeSchema::Object(shape) => {
                if !matches!(value, Val::Object(_)) {
                    return Err(mismatch(schema, value, path));
                }
                for field in shape.fields() {
                    let Some(present) = value.get(&field.name) else {
                        if field.optional {
                            continue;
                        }
                        return Err(ValidationErrorKind::MissingProperty {
                            property: field.name.clone(),
                            path: path.to_string(),
                        });
                    };
                    if field.optional && present.is_nullish() {
                        continue;
                    }
                    self.validate_value(&field.schema, present, &format!("{}.{}", path, field.name))?;
                }
                Ok(())
            }
            TypeSchema::Opaque(text) => {
                if let Some(item_schema) = schema.array_item() {
                    let Val::Array(items) = value else {
                        return Err(mismatch(schema, value, path));
                    };
                    for (i, item) in items.iter().enumerate() {
                        self.validate_value(&item_schema, item, &format!("{}[{}]", path, i))?;
                    }
                    return Ok(());
                }

                match primitive_tag(text) {
                    Some(tag) if value.type_tag() != tag => Err(mismatch(schema, value, path)),
                    _ => Ok(()),
                }
            }
        }
    }
}

/// The type tag a primitive type name requires.
fn primitive_tag(text: &str) -> Option<&'static str> {
    match text {
        "string" => Some("string"),
        "number" => Some("number"),
        "boolean" => Some("boolean"),
        _ => None,
    }
}

/// Whether the validator enforces anything for `schema`.
fn is_verifiable(schema: &TypeSchema) -> bool {
    match schema {
        TypeSchema::Object(_) => true,
        TypeSchema::Opaque(text) => schema.array_item().is_some() || primitive_tag(text).is_some(),
    }
}

fn mismatch(schema: &TypeSchema, value: &Val, path: &str) -> ValidationErrorKind {
    ValidationErrorKind::TypeMismatch {
        path: path.to_string(),
        expected: schema.to_string(),
        found: value.type_tag(),
    }
}
