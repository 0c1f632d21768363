//! Looking up service accounts and secrets.
//!
//! The credential builder never talks to a cluster directly. Instead, it asks a
//! [`Lookup`] backend for resources. Backends return `Ok(None)` when a resource
//! doesn't exist and `Err(_)` when the lookup itself fails, so that callers can
//! tell the two apart.

use serde::de::DeserializeOwned;
use std::{
    collections::{BTreeMap, BTreeSet},
    env,
    process::{Command, Stdio},
};

use crate::prelude::*;

/// Source of service accounts and secrets.
pub trait Lookup {
    /// Fetch the service account `namespace/name`, or `None` if it doesn't
    /// exist.
    fn service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<Option<ServiceAccount>>;

    /// Fetch the secret `namespace/name`, or `None` if it doesn't exist.
    fn secret(&self, namespace: &str, name: &str) -> anyhow::Result<Option<Secret>>;
}

impl<L: Lookup + ?Sized> Lookup for &L {
    fn service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<Option<ServiceAccount>> {
        (**self).service_account(namespace, name)
    }

    fn secret(&self, namespace: &str, name: &str) -> anyhow::Result<Option<Secret>> {
        (**self).secret(namespace, name)
    }
}

/// Key used to store namespaced resources.
type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_owned(), name.to_owned())
}

/// An in-memory [`Lookup`] backend, mostly useful for tests and dry runs.
#[derive(Clone, Debug, Default)]
pub struct MemoryLookup {
    service_accounts: BTreeMap<Key, ServiceAccount>,
    secrets: BTreeMap<Key, Secret>,
    failing_service_accounts: BTreeSet<Key>,
    failing_secrets: BTreeSet<Key>,
}

impl MemoryLookup {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a service account under its own namespace and name.
    pub fn insert_service_account(&mut self, service_account: ServiceAccount) {
        let meta = &service_account.metadata;
        self.service_accounts
            .insert(key(&meta.namespace, &meta.name), service_account);
    }

    /// Store a secret under its own namespace and name.
    pub fn insert_secret(&mut self, secret: Secret) {
        let meta = &secret.metadata;
        self.secrets.insert(key(&meta.namespace, &meta.name), secret);
    }

    /// Make every future service account lookup of `namespace/name` fail as
    /// if the backend were unavailable.
    pub fn fail_service_account(&mut self, namespace: &str, name: &str) {
        self.failing_service_accounts.insert(key(namespace, name));
    }

    /// Make every future secret lookup of `namespace/name` fail as if the
    /// backend were unavailable.
    pub fn fail_secret(&mut self, namespace: &str, name: &str) {
        self.failing_secrets.insert(key(namespace, name));
    }
}

impl Lookup for MemoryLookup {
    fn service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<Option<ServiceAccount>> {
        let key = key(namespace, name);
        if self.failing_service_accounts.contains(&key) {
            return Err(format_err!(
                "simulated failure fetching service account {}/{}",
                namespace,
                name,
            ));
        }
        Ok(self.service_accounts.get(&key).cloned())
    }

    fn secret(&self, namespace: &str, name: &str) -> anyhow::Result<Option<Secret>> {
        let key = key(namespace, name);
        if self.failing_secrets.contains(&key) {
            return Err(format_err!(
                "simulated failure fetching secret {}/{}",
                namespace,
                name,
            ));
        }
        Ok(self.secrets.get(&key).cloned())
    }
}

/// How should we run `kubectl`?
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KubectlConfig {
    /// The `kubectl` executable to run.
    pub program: String,
    /// The kubeconfig context to use, if not the current one.
    pub context: Option<String>,
}

impl Default for KubectlConfig {
    fn default() -> Self {
        KubectlConfig {
            program: "kubectl".to_owned(),
            context: None,
        }
    }
}

impl KubectlConfig {
    /// Read our configuration from `CREDINJECT_KUBECTL` and
    /// `CREDINJECT_KUBE_CONTEXT`.
    pub fn from_env() -> Self {
        Self::from_vars(|var| env::var(var).ok())
    }

    fn from_vars<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |var: &str| get(var).filter(|value: &String| !value.is_empty());
        KubectlConfig {
            program: non_empty("CREDINJECT_KUBECTL")
                .unwrap_or_else(|| "kubectl".to_owned()),
            context: non_empty("CREDINJECT_KUBE_CONTEXT"),
        }
    }
}

/// A [`Lookup`] backend which shells out to `kubectl`.
#[derive(Clone, Debug, Default)]
pub struct KubectlLookup {
    config: KubectlConfig,
}

impl KubectlLookup {
    /// Create a new backend using `config`.
    pub fn new(config: KubectlConfig) -> Self {
        KubectlLookup { config }
    }

    /// Run `kubectl get`, and parse the output as JSON. Returns `None` if
    /// `kubectl` reports that the resource doesn't exist.
    fn get<T: DeserializeOwned>(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<Option<T>> {
        let mut args = vec![];
        if let Some(context) = &self.config.context {
            args.extend_from_slice(&["--context", context.as_str()]);
        }
        args.extend_from_slice(&["get", kind, name, "--namespace", namespace, "-o", "json"]);
        trace!("running {} {:?}", self.config.program, args);

        let output = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| {
                format!("error starting {} with {:?}", self.config.program, args)
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_not_found(&stderr) {
                return Ok(None);
            }
            return Err(format_err!(
                "error running {} with {:?}: {}",
                self.config.program,
                args,
                stderr.trim(),
            ));
        }
        let parsed = serde_json::from_slice(&output.stdout).with_context(|| {
            format!("error parsing output of {} {:?}", self.config.program, args)
        })?;
        Ok(Some(parsed))
    }
}

impl Lookup for KubectlLookup {
    fn service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<Option<ServiceAccount>> {
        self.get("serviceaccount", namespace, name)
    }

    fn secret(&self, namespace: &str, name: &str) -> anyhow::Result<Option<Secret>> {
        self.get("secret", namespace, name)
    }
}

/// Does `kubectl`'s error output say the resource doesn't exist?
fn is_not_found(stderr: &str) -> bool {
    stderr.contains("(NotFound)")
}

#[test]
fn recognizes_kubectl_not_found() {
    assert!(is_not_found(
        "Error from server (NotFound): secrets \"s3-secret\" not found\n"
    ));
    assert!(!is_not_found(
        "Unable to connect to the server: dial tcp 10.0.0.1:443: i/o timeout\n"
    ));
}

#[test]
fn kubectl_config_from_vars() {
    let config = KubectlConfig::from_vars(|_| None);
    assert_eq!(config, KubectlConfig::default());

    let config = KubectlConfig::from_vars(|var| match var {
        "CREDINJECT_KUBECTL" => Some("/usr/local/bin/kubectl".to_owned()),
        "CREDINJECT_KUBE_CONTEXT" => Some(String::new()),
        _ => None,
    });
    assert_eq!(config.program, "/usr/local/bin/kubectl");
    assert_eq!(config.context, None);
}

#[test]
fn missing_kubectl_is_a_lookup_failure() {
    let lookup = KubectlLookup::new(KubectlConfig {
        program: "/nonexistent/credinject-kubectl".to_owned(),
        context: None,
    });
    assert!(lookup.secret("default", "s3-secret").is_err());
}

#[test]
fn memory_lookup_distinguishes_missing_from_failing() {
    let mut lookup = MemoryLookup::new();
    lookup.insert_secret(Secret {
        metadata: ObjectMeta {
            name: "present".to_owned(),
            namespace: "default".to_owned(),
            ..ObjectMeta::default()
        },
        ..Secret::default()
    });
    lookup.fail_secret("default", "broken");

    assert!(lookup.secret("default", "present").unwrap().is_some());
    assert!(lookup.secret("other", "present").unwrap().is_none());
    assert!(lookup.secret("default", "broken").is_err());
}
