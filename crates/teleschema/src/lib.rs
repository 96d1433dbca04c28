//! # teleschema
//!
//! Compiles declared parameter types into structural schemas for runtime
//! argument validation.
//!
//! - [`parse_type`]: one type annotation to a [`TypeSchema`].
//! - [`parse_params`]: a whole parameter list to ordered [`ParamInfo`]s.
//! - [`Manifest`]: the serialized namespace/function/params table a build
//!   step hands to the runtime.

mod scan;

pub mod manifest;
pub mod params;
pub mod parser;
pub mod schema;

pub use manifest::Manifest;
pub use params::parse_params;
pub use parser::parse_type;
pub use schema::ANY;
pub use schema::Field;
pub use schema::ObjectShape;
pub use schema::ParamInfo;
pub use schema::TypeSchema;
