//! # Function Registry
//!
//! The table the dispatcher resolves calls against: namespace → exported
//! name → export. Built once with [`RegistryBuilder`], read-only afterwards,
//! and shared behind an `Arc` without locking.
//!
//! Signatures either come from a [`Manifest`] produced at build time (and are
//! then bound to handlers by name) or are declared inline next to the
//! handler.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use teleschema::Manifest;
use teleschema::ParamInfo;
use teleschema::parse_params;

use crate::error::Error as DispatchError;
use crate::val::Val;

/// Registry construction errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A handler was bound to a signature the manifest does not declare.
    UnknownSignature { namespace: String, function: String },
    /// A manifest signature was never given a handler.
    UnboundSignature { namespace: String, function: String },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSignature { namespace, function } => {
                write!(f, "No signature declared for \"{}:{}\"", namespace, function)
            }
            Self::UnboundSignature { namespace, function } => {
                write!(f, "No handler bound for \"{}:{}\"", namespace, function)
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// An invocable RPC target.
///
/// Arguments arrive positionally and already validated. Any closure
/// `Fn(Vec<Val>) -> impl Future<Output = anyhow::Result<Val>>` is a handler.
#[async_trait::async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, args: Vec<Val>) -> anyhow::Result<Val>;
}

#[async_trait::async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Vec<Val>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Val>> + Send + 'static,
{
    async fn call(&self, args: Vec<Val>) -> anyhow::Result<Val> {
        (self)(args).await
    }
}

/// A callable with its ordered parameter schemas.
#[derive(Clone)]
pub struct FunctionEntry {
    handler: Arc<dyn Handler>,
    params: Vec<ParamInfo>,
}

impl FunctionEntry {
    pub fn new(handler: impl Handler, params: Vec<ParamInfo>) -> Self {
        Self {
            handler: Arc::new(handler),
            params,
        }
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn params(&self) -> &[ParamInfo] {
        &self.params
    }
}

impl std::fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionEntry").field("params", &self.params).finish_non_exhaustive()
    }
}

/// Something a namespace exports.
#[derive(Clone, Debug)]
pub enum Export {
    Function(FunctionEntry),
    /// A plain value. Calling it is a `FunctionNotFound`.
    Value(Val),
}

/// Immutable namespace → name → export table.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    namespaces: HashMap<String, HashMap<String, Export>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Starts a builder whose signatures come from `manifest`. Each one must
    /// be bound to a handler before `build` succeeds.
    pub fn from_manifest(manifest: &Manifest) -> RegistryBuilder {
        RegistryBuilder::from_manifest(manifest)
    }

    /// Resolves a callable entry.
    ///
    /// # Errors
    /// `NamespaceNotFound` for an unknown namespace; `FunctionNotFound` for
    /// an unknown name or a non-function export.
    pub fn lookup(&self, namespace: &str, function: &str) -> std::result::Result<&FunctionEntry, DispatchError> {
        let exports = self
            .namespaces
            .get(namespace)
            .ok_or_else(|| DispatchError::NamespaceNotFound { namespace: namespace.to_string() })?;

        match exports.get(function) {
            Some(Export::Function(entry)) => Ok(entry),
            Some(Export::Value(_)) | None => Err(DispatchError::FunctionNotFound {
                namespace: namespace.to_string(),
                function: function.to_string(),
            }),
        }
    }

    pub fn export(&self, namespace: &str, name: &str) -> Option<&Export> {
        self.namespaces.get(namespace).and_then(|exports| exports.get(name))
    }

    pub fn contains_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    /// Names of the callable exports in `namespace`.
    pub fn functions<'a>(&'a self, namespace: &str) -> impl Iterator<Item = &'a str> {
        self.namespaces
            .get(namespace)
            .into_iter()
            .flat_map(|exports| exports.iter())
            .filter(|(_, export)| matches!(export, Export::Function(_)))
            .map(|(name, _)| name.as_str())
    }

    /// The signatures of every callable export.
    pub fn manifest(&self) -> Manifest {
        let mut manifest = Manifest::new();
        for (namespace, exports) in &self.namespaces {
            for (name, export) in exports {
                if let Export::Function(entry) = export {
                    manifest.insert(namespace.clone(), name.clone(), entry.params.clone());
                }
            }
        }
        manifest
    }
}

/// Fluent builder for a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    namespaces: HashMap<String, HashMap<String, Export>>,
    pending: HashMap<(String, String), Vec<ParamInfo>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_manifest(manifest: &Manifest) -> Self {
        let pending = manifest
            .signatures()
            .map(|(ns, name, params)| ((ns.to_string(), name.to_string()), params.to_vec()))
            .collect();
        Self {
            namespaces: HashMap::new(),
            pending,
        }
    }

    /// Registers `handler` with explicit parameter schemas.
    pub fn function(
        mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        params: Vec<ParamInfo>,
        handler: impl Handler,
    ) -> Self {
        self.insert(namespace.into(), name.into(), Export::Function(FunctionEntry::new(handler, params)));
        self
    }

    /// Registers `handler` with its declared parameter list text, e.g.
    /// `"a: number, b?: { label: string }"`.
    pub fn declare(
        self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        param_list: &str,
        handler: impl Handler,
    ) -> Self {
        self.function(namespace, name, parse_params(param_list), handler)
    }

    /// Registers a non-callable export.
    pub fn value(mut self, namespace: impl Into<String>, name: impl Into<String>, value: impl Into<Val>) -> Self {
        self.insert(namespace.into(), name.into(), Export::Value(value.into()));
        self
    }

    /// Binds `handler` to the manifest signature of `namespace:name`.
    ///
    /// # Errors
    /// `UnknownSignature` if the manifest has no such function.
    pub fn bind(mut self, namespace: &str, name: &str, handler: impl Handler) -> Result<Self> {
        let key = (namespace.to_string(), name.to_string());
        let params = self.pending.remove(&key).ok_or_else(|| Error::UnknownSignature {
            namespace: namespace.to_string(),
            function: name.to_string(),
        })?;
        let (namespace, name) = key;
        self.insert(namespace, name, Export::Function(FunctionEntry::new(handler, params)));
        Ok(self)
    }

    /// Finalizes the registry.
    ///
    /// # Errors
    /// `UnboundSignature` if a manifest signature has no handler.
    pub fn build(self) -> Result<Registry> {
        if let Some((namespace, function)) = self.pending.into_keys().min() {
            return Err(Error::UnboundSignature { namespace, function });
        }
        Ok(Registry {
            namespaces: self.namespaces,
        })
    }

    fn insert(&mut self, namespace: String, name: String, export: Export) {
        self.namespaces.entry(namespace).or_default().insert(name, export);
    }
}
