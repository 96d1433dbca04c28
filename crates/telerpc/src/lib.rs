//! # telerpc
//!
//! Schema-validated RPC dispatch with request-scoped ambient context.
//!
//! ## Core Concepts
//!
//! - **Registry**: namespace → function → handler plus declared parameters
//! - **Validator**: checks wire arguments against the declared schemas
//! - **Context**: caller data made ambient for the duration of one call
//! - **Dispatcher**: lookup, validation and invocation for one request
//!
//! ## Example
//!
//! ```rust,no_run
//! use telerpc::{Context, Dispatcher, Registry, Request, Val, get_context};
//!
//! struct Session(String);
//!
//! # async fn example() -> anyhow::Result<()> {
//! let registry = Registry::builder()
//!     .declare("src/rpc/math.ts", "add", "a: number, b: number", |args: Vec<Val>| async move {
//!         let a = args[0].as_f64().unwrap_or_default();
//!         let b = args[1].as_f64().unwrap_or_default();
//!         anyhow::Ok(Val::from(a + b))
//!     })
//!     .declare("src/rpc/math.ts", "whoami", "", |_args: Vec<Val>| async move {
//!         let context = get_context()?;
//!         anyhow::Ok(context.get::<Session>().map(|s| Val::from(s.0.as_str())).unwrap_or_default())
//!     })
//!     .build()?;
//!
//! let dispatcher = Dispatcher::new(registry);
//! let request = Request::new("src/rpc/math.ts", "add", vec![Val::from(5), Val::from(7)])
//!     .with_context(Context::new(Session("alice".into())));
//! let response = dispatcher.handle_route(request).await?;
//! assert_eq!(response.result, Val::from(12));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod val;
pub mod validate;

pub use config::DispatchConfig;
pub use config::NullPolicy;
pub use context::Context;
pub use context::ContextBuilder;
pub use context::get_context;
pub use context::get_context_or_none;
pub use context::propagate;
pub use context::with_context;
pub use context::with_context_sync;
pub use dispatch::Dispatcher;
pub use dispatch::DispatcherBuilder;
pub use dispatch::Request;
pub use dispatch::Response;
pub use dispatch::handle_route;
pub use error::Error;
pub use error::Result;
pub use registry::Export;
pub use registry::FunctionEntry;
pub use registry::Handler;
pub use registry::Registry;
pub use registry::RegistryBuilder;
pub use val::UNDEFINED_SENTINEL;
pub use val::Val;
pub use validate::ValidationError;
pub use validate::ValidationErrorKind;
pub use validate::Validator;
pub use validate::validate_args;

pub use teleschema::Manifest;
pub use teleschema::ParamInfo;
pub use teleschema::TypeSchema;
pub use teleschema::parse_params;
pub use teleschema::parse_type;
