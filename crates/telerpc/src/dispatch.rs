//! # Request Dispatch
//!
//! Resolves a call against the [`Registry`], validates its arguments and
//! invokes the target with the request's context ambient.
//!
//! ## Order
//! 1. namespace lookup (`NamespaceNotFound`)
//! 2. function lookup (`FunctionNotFound`)
//! 3. argument validation (`Validation`)
//! 4. invocation under [`with_context`] (`Invocation` on error or panic)
//!
//! Steps 1-3 never call the target. Each call yields exactly one outcome.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::config::DispatchConfig;
use crate::config::NullPolicy;
use crate::context::Context;
use crate::context::with_context;
use crate::error::Error;
use crate::error::Result;
use crate::registry::Registry;
use crate::val::Val;
use crate::validate::Validator;

/// One RPC call as seen by the dispatcher.
#[derive(Clone, Debug)]
pub struct Request {
    pub namespace: String,
    pub function_name: String,
    pub args: Vec<Val>,
    pub context: Context,
}

/// Wire shape of a request body. `filePath` is accepted for `namespace`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestBody {
    #[serde(alias = "filePath")]
    namespace: String,
    function_name: String,
    #[serde(default)]
    args: Vec<Value>,
}

impl Request {
    pub fn new(namespace: impl Into<String>, function_name: impl Into<String>, args: Vec<Val>) -> Self {
        Self {
            namespace: namespace.into(),
            function_name: function_name.into(),
            args,
            context: Context::empty(),
        }
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Decodes `{"namespace"|"filePath", "functionName", "args"}`. String
    /// values equal to `sentinel` anywhere in `args` become `undefined`.
    ///
    /// # Errors
    /// `MalformedRequest` if the body is not valid JSON of that shape.
    pub fn from_json(body: &str, sentinel: Option<&str>) -> Result<Self> {
        let body: RequestBody =
            serde_json::from_str(body).map_err(|e| Error::MalformedRequest(e.to_string()))?;
        Ok(Self::from_body(body, sentinel))
    }

    /// Like [`Request::from_json`], for an already parsed body.
    pub fn from_value(body: Value, sentinel: Option<&str>) -> Result<Self> {
        let body: RequestBody =
            serde_json::from_value(body).map_err(|e| Error::MalformedRequest(e.to_string()))?;
        Ok(Self::from_body(body, sentinel))
    }

    fn from_body(body: RequestBody, sentinel: Option<&str>) -> Self {
        let args = body
            .args
            .into_iter()
            .map(|arg| Val::from_wire_json(arg, sentinel))
            .collect();
        Self::new(body.namespace, body.function_name, args)
    }
}

/// A successful call's result.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub result: Val,
}

impl Response {
    /// `{"result": ...}`; an `undefined` result leaves `result` out.
    pub fn to_json(&self) -> Value {
        if self.result.is_undefined() {
            return json!({});
        }
        json!({ "result": self.result.to_json() })
    }
}

/// Dispatches with default configuration.
pub async fn handle_route(registry: &Registry, request: Request) -> Result<Response> {
    dispatch(registry, Validator::default(), true, request).await
}

/// Routes requests over a shared, immutable [`Registry`].
#[derive(Clone, Debug)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(registry: impl Into<Arc<Registry>>) -> Self {
        Self {
            registry: registry.into(),
            config: DispatchConfig::default(),
        }
    }

    pub fn builder(registry: impl Into<Arc<Registry>>) -> DispatcherBuilder {
        DispatcherBuilder::new(registry)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Decodes a JSON request body using the configured sentinel.
    pub fn decode_request(&self, body: &str) -> Result<Request> {
        Request::from_json(body, self.config.undefined_sentinel.as_deref())
    }

    pub async fn handle_route(&self, request: Request) -> Result<Response> {
        let validator = Validator::new(self.config.null_policy);
        dispatch(&self.registry, validator, self.config.catch_panics, request).await
    }

    /// Decodes, dispatches and encodes in one step, returning the status a
    /// transport should answer with alongside the body.
    pub async fn handle_json(&self, body: &str, context: Context) -> (u16, Value) {
        let outcome = match self.decode_request(body) {
            Ok(request) => self.handle_route(request.with_context(context)).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(response) => (200, response.to_json()),
            Err(e) => (e.status_code(), e.to_json()),
        }
    }
}

/// Fluent configuration for a [`Dispatcher`].
pub struct DispatcherBuilder {
    registry: Arc<Registry>,
    config: DispatchConfig,
}

impl DispatcherBuilder {
    pub fn new(registry: impl Into<Arc<Registry>>) -> Self {
        Self {
            registry: registry.into(),
            config: DispatchConfig::default(),
        }
    }

    pub fn null_policy(mut self, policy: NullPolicy) -> Self {
        self.config.null_policy = policy;
        self
    }

    /// Sets the string decoded as `undefined`; `None` disables decoding.
    pub fn undefined_sentinel(mut self, sentinel: Option<&str>) -> Self {
        self.config.undefined_sentinel = sentinel.map(str::to_string);
        self
    }

    pub fn catch_panics(mut self, enabled: bool) -> Self {
        self.config.catch_panics = enabled;
        self
    }

    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            registry: self.registry,
            config: self.config,
        }
    }
}

#[tracing::instrument(
    name = "rpc.dispatch",
    skip_all,
    fields(namespace = %request.namespace, function = %request.function_name)
)]
async fn dispatch(
    registry: &Registry,
    validator: Validator,
    catch_panics: bool,
    request: Request,
) -> Result<Response> {
    let Request {
        namespace,
        function_name,
        args,
        context,
    } = request;

    let entry = registry.lookup(&namespace, &function_name).inspect_err(|e| {
        tracing::debug!(error = %e, "lookup rejected");
    })?;

    validator
        .validate_args(&namespace, &function_name, &args, entry.params())
        .inspect_err(|e| tracing::debug!(error = %e, "validation rejected"))?;

    let call = with_context(context, entry.handler().call(args));
    let outcome = if catch_panics {
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => Err(anyhow::anyhow!(panic_message(payload.as_ref()))),
        }
    } else {
        call.await
    };

    match outcome {
        Ok(result) => {
            tracing::trace!(result = %result, "call completed");
            Ok(Response { result })
        }
        Err(source) => {
            tracing::warn!(error = %source, "call failed");
            Err(Error::Invocation {
                namespace,
                function: function_name,
                source,
            })
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
