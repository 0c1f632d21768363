//! Error-handling code.

use std::{error::Error as StdError, fmt};

/// The kind of Kubernetes resource we were trying to look up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResourceKind {
    /// A `ServiceAccount`, whose attached secrets we inject.
    ServiceAccount,
    /// A `Secret` attached to a service account.
    Secret,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            ResourceKind::ServiceAccount => "serviceaccount",
            ResourceKind::Secret => "secret",
        };
        s.fmt(f)
    }
}

/// Errors returned by [`CredentialBuilder`](crate::CredentialBuilder).
///
/// Callers that retry should usually retry `Lookup` errors and give up on
/// `NotFound`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested resource does not exist.
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// What we were looking for.
        kind: ResourceKind,
        /// The namespace we looked in.
        namespace: String,
        /// The name of the resource.
        name: String,
    },

    /// The lookup backend failed while fetching a resource.
    #[error("could not fetch {kind} {namespace}/{name}")]
    Lookup {
        /// What we were looking for.
        kind: ResourceKind,
        /// The namespace we looked in.
        namespace: String,
        /// The name of the resource.
        name: String,
        /// The underlying backend failure.
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// Was this error caused by a missing resource?
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Result type for this crate's functions.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Support for displaying an error with a complete list of causes.
pub trait DisplayCausesExt {
    /// Display the error and its causes.
    fn display_causes(&self) -> DisplayCauses<'_>;
}

impl<E: StdError + 'static> DisplayCausesExt for E {
    fn display_causes(&self) -> DisplayCauses<'_> {
        DisplayCauses { err: self }
    }
}

/// Helper type used to display errors.
pub struct DisplayCauses<'a> {
    /// The error to display.
    err: &'a (dyn StdError + 'static),
}

impl fmt::Display for DisplayCauses<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.err)?;
        let mut source = self.err.source();
        while let Some(next) = source {
            write!(f, ": {}", next)?;
            source = next.source();
        }
        Ok(())
    }
}

#[test]
fn display_causes_includes_backend_failure() {
    let err = Error::Lookup {
        kind: ResourceKind::Secret,
        namespace: "default".to_owned(),
        name: "s3-secret".to_owned(),
        source: anyhow::format_err!("connection refused"),
    };
    assert_eq!(
        err.display_causes().to_string(),
        "could not fetch secret default/s3-secret: connection refused",
    );
    assert!(!err.is_not_found());
}
