//! Inject storage credentials attached to a Kubernetes service account into a
//! workload's container and pod templates.
//!
//! The entry point is [`CredentialBuilder::inject`], which looks up a service
//! account through a [`Lookup`] backend, classifies each attached secret, and
//! appends the matching environment variables, volumes and volume mounts to a
//! [`WorkloadDescriptor`].

#![warn(missing_docs)]

pub use anyhow;
pub use serde_json;

pub mod credentials;
pub mod errors;
pub mod k8s;
pub mod lookup;
pub mod tracing_support;

pub use crate::credentials::{classify, CredentialBuilder, CredentialShape, Patch};
pub use crate::errors::{Error, Result};
pub use crate::k8s::WorkloadDescriptor;
pub use crate::lookup::{KubectlConfig, KubectlLookup, Lookup, MemoryLookup};

/// Common imports used by many modules.
pub mod prelude {
    pub use anyhow::{format_err, Context as _};
    pub use serde::{Deserialize, Serialize};
    pub use std::collections::BTreeMap;
    pub use tracing::{debug, instrument, trace, warn};

    pub use super::errors::{Error, Result};
    pub use super::k8s::*;
}

