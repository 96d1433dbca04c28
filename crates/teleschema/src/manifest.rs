//! # Signature Manifest
//!
//! The serialized description of every exported function a build step
//! discovered: namespace → function name → ordered parameters.
//!
//! ```json
//! {
//!   "src/lib/tele/math.ts": {
//!     "add": [
//!       { "name": "a", "type": "number", "optional": false },
//!       { "name": "b", "type": "number", "optional": false }
//!     ]
//!   }
//! }
//! ```
//!
//! The runtime registry binds callables onto these signatures by name.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::params::parse_params;
use crate::schema::ParamInfo;

#[derive(Debug)]
pub enum Error {
    Json(serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(e) => write!(f, "Manifest JSON error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Discovered signatures, keyed by namespace then function name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    namespaces: BTreeMap<String, BTreeMap<String, Vec<ParamInfo>>>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Records a signature, replacing any earlier one for the same function.
    pub fn insert(
        &mut self,
        namespace: impl Into<String>,
        function: impl Into<String>,
        params: Vec<ParamInfo>,
    ) {
        self.namespaces
            .entry(namespace.into())
            .or_default()
            .insert(function.into(), params);
    }

    /// Records a signature from its declared parameter list text.
    pub fn insert_declared(
        &mut self,
        namespace: impl Into<String>,
        function: impl Into<String>,
        param_list: &str,
    ) {
        self.insert(namespace, function, parse_params(param_list));
    }

    pub fn get(&self, namespace: &str, function: &str) -> Option<&[ParamInfo]> {
        self.namespaces
            .get(namespace)
            .and_then(|funcs| funcs.get(function))
            .map(Vec::as_slice)
    }

    /// Iterates `(namespace, function, params)` in sorted order.
    pub fn signatures(&self) -> impl Iterator<Item = (&str, &str, &[ParamInfo])> {
        self.namespaces.iter().flat_map(|(ns, funcs)| {
            funcs
                .iter()
                .map(move |(name, params)| (ns.as_str(), name.as_str(), params.as_slice()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}
