//! Classifying secrets and turning them into container credentials.

use crate::errors::{DisplayCausesExt, ResourceKind};
use crate::lookup::Lookup;
use crate::prelude::*;

pub mod gcs;
pub mod s3;

/// The kinds of credential secret we know how to inject.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CredentialShape {
    /// An S3 access key pair, with an optional custom endpoint.
    ObjectStoreKeyPair {
        /// The value of the endpoint annotation, if present.
        endpoint: Option<String>,
    },
    /// A single credential file, such as a GCS service account key.
    FileBlobCredential,
    /// Not a secret we recognize. These are skipped.
    Unknown,
}

impl CredentialShape {
    /// Build the patch for `secret`, which must be the secret this shape was
    /// classified from.
    pub fn build_patch(&self, secret: &Secret) -> Patch {
        let secret_name = &secret.metadata.name;
        match self {
            CredentialShape::ObjectStoreKeyPair { endpoint } => {
                s3::build_patch(secret_name, endpoint.as_deref())
            }
            CredentialShape::FileBlobCredential => gcs::build_patch(secret_name),
            CredentialShape::Unknown => Patch::default(),
        }
    }
}

/// Decide what kind of credential `secret` holds, looking only at the names
/// of its keys and annotations. Extra keys are ignored.
///
/// If a secret somehow has the keys for both S3 and GCS, we treat it as S3.
pub fn classify(secret: &Secret) -> CredentialShape {
    if s3::matches(secret) {
        CredentialShape::ObjectStoreKeyPair {
            endpoint: s3::endpoint(secret),
        }
    } else if gcs::matches(secret) {
        CredentialShape::FileBlobCredential
    } else {
        CredentialShape::Unknown
    }
}

/// Things to append to a [`WorkloadDescriptor`] for a single secret.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Patch {
    /// Environment variables to append to the container.
    pub env: Vec<EnvVar>,
    /// Volumes to append to the pod.
    pub volumes: Vec<Volume>,
    /// Volume mounts to append to the container.
    pub volume_mounts: Vec<VolumeMount>,
}

impl Patch {
    /// Does this patch do nothing?
    pub fn is_empty(&self) -> bool {
        self.env.is_empty() && self.volumes.is_empty() && self.volume_mounts.is_empty()
    }

    /// Append everything in this patch to `descriptor`, in order. Existing
    /// entries are left alone, and nothing is deduplicated.
    pub fn apply_to(self, descriptor: &mut WorkloadDescriptor) {
        descriptor.container.env.extend(self.env);
        descriptor.container.volume_mounts.extend(self.volume_mounts);
        descriptor.pod_spec.volumes.extend(self.volumes);
    }
}

/// Injects the credentials attached to a service account into workloads.
#[derive(Clone, Debug)]
pub struct CredentialBuilder<L> {
    lookup: L,
}

impl<L: Lookup> CredentialBuilder<L> {
    /// Create a new builder which fetches resources from `lookup`.
    pub fn new(lookup: L) -> Self {
        CredentialBuilder { lookup }
    }

    /// Append credentials for every recognized secret attached to the service
    /// account `namespace/service_account_name` to `descriptor`, in the order
    /// the service account lists them.
    ///
    /// Each secret's patch is applied as soon as that secret is fetched. If a
    /// later fetch fails, earlier patches stay applied, so callers who need
    /// all-or-nothing behavior should pass in a clone. Calling this twice
    /// appends everything twice.
    #[instrument(level = "debug", skip(self, descriptor))]
    pub fn inject(
        &self,
        namespace: &str,
        service_account_name: &str,
        descriptor: &mut WorkloadDescriptor,
    ) -> Result<()> {
        self.for_each_patch(namespace, service_account_name, |patch| {
            patch.apply_to(descriptor)
        })
    }

    /// Return the patches `inject` would apply, without applying them.
    pub fn patches_for(
        &self,
        namespace: &str,
        service_account_name: &str,
    ) -> Result<Vec<Patch>> {
        let mut patches = vec![];
        self.for_each_patch(namespace, service_account_name, |patch| {
            patches.push(patch)
        })?;
        Ok(patches)
    }

    /// Resolve the service account's secrets one at a time, and pass a patch
    /// for each recognized secret to `f`.
    fn for_each_patch<F>(
        &self,
        namespace: &str,
        service_account_name: &str,
        mut f: F,
    ) -> Result<()>
    where
        F: FnMut(Patch),
    {
        let service_account = self.fetch(
            ResourceKind::ServiceAccount,
            namespace,
            service_account_name,
            |ns, name| self.lookup.service_account(ns, name),
        )?;

        for reference in &service_account.secrets {
            // References without a namespace point into the service
            // account's own namespace.
            let secret_namespace = if reference.namespace.is_empty() {
                namespace
            } else {
                reference.namespace.as_str()
            };
            let secret = self.fetch(
                ResourceKind::Secret,
                secret_namespace,
                &reference.name,
                |ns, name| self.lookup.secret(ns, name),
            )?;

            match classify(&secret) {
                CredentialShape::Unknown => {
                    trace!("skipping unrecognized secret {}", reference.name);
                }
                shape => {
                    debug!("injecting secret {} as {:?}", reference.name, shape);
                    f(shape.build_patch(&secret));
                }
            }
        }
        Ok(())
    }

    /// Fetch a resource using `get`, converting the result into our error
    /// types.
    fn fetch<T, G>(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        get: G,
    ) -> Result<T>
    where
        G: FnOnce(&str, &str) -> anyhow::Result<Option<T>>,
    {
        match get(namespace, name) {
            Ok(Some(resource)) => Ok(resource),
            Ok(None) => {
                debug!("{} {}/{} not found", kind, namespace, name);
                Err(Error::NotFound {
                    kind,
                    namespace: namespace.to_owned(),
                    name: name.to_owned(),
                })
            }
            Err(source) => {
                let err = Error::Lookup {
                    kind,
                    namespace: namespace.to_owned(),
                    name: name.to_owned(),
                    source,
                };
                warn!("{}", err.display_causes());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(keys: &[&str], annotations: &[(&str, &str)]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: "test-secret".to_owned(),
                namespace: "default".to_owned(),
                annotations: annotations
                    .iter()
                    .map(|&(k, v)| (k.to_owned(), v.to_owned()))
                    .collect(),
            },
            data: keys
                .iter()
                .map(|&k| (k.to_owned(), ByteString::default()))
                .collect(),
        }
    }

    #[test]
    fn classifies_s3_with_and_without_endpoint() {
        let keys = &[s3::AWS_ACCESS_KEY_ID_NAME, s3::AWS_SECRET_ACCESS_KEY_NAME];
        assert_eq!(
            classify(&secret(keys, &[])),
            CredentialShape::ObjectStoreKeyPair { endpoint: None },
        );
        assert_eq!(
            classify(&secret(keys, &[(s3::S3_ENDPOINT_ANNOTATION, "s3.aws.com")])),
            CredentialShape::ObjectStoreKeyPair {
                endpoint: Some("s3.aws.com".to_owned()),
            },
        );
    }

    #[test]
    fn s3_requires_both_keys() {
        assert_eq!(
            classify(&secret(&[s3::AWS_ACCESS_KEY_ID_NAME], &[])),
            CredentialShape::Unknown,
        );
        assert_eq!(
            classify(&secret(
                &[s3::AWS_SECRET_ACCESS_KEY_NAME],
                &[(s3::S3_ENDPOINT_ANNOTATION, "s3.aws.com")],
            )),
            CredentialShape::Unknown,
        );
    }

    #[test]
    fn classifies_gcs() {
        assert_eq!(
            classify(&secret(&[gcs::GCS_CREDENTIAL_FILE_NAME], &[])),
            CredentialShape::FileBlobCredential,
        );
    }

    #[test]
    fn extra_keys_are_ignored() {
        let shape = classify(&secret(
            &[gcs::GCS_CREDENTIAL_FILE_NAME, "ca.crt", "token"],
            &[("unrelated", "x")],
        ));
        assert_eq!(shape, CredentialShape::FileBlobCredential);
    }

    #[test]
    fn s3_wins_over_gcs() {
        let shape = classify(&secret(
            &[
                s3::AWS_ACCESS_KEY_ID_NAME,
                s3::AWS_SECRET_ACCESS_KEY_NAME,
                gcs::GCS_CREDENTIAL_FILE_NAME,
            ],
            &[],
        ));
        assert_eq!(shape, CredentialShape::ObjectStoreKeyPair { endpoint: None });
    }

    #[test]
    fn unknown_secrets_get_empty_patches() {
        let secret = secret(&["token", "ca.crt"], &[]);
        let shape = classify(&secret);
        assert_eq!(shape, CredentialShape::Unknown);
        assert!(shape.build_patch(&secret).is_empty());
    }

    #[test]
    fn apply_appends_after_existing_entries() {
        let mut descriptor = WorkloadDescriptor::default();
        descriptor.container.env.push(EnvVar::literal("EXISTING", "1"));
        descriptor
            .pod_spec
            .volumes
            .push(Volume::from_secret("existing", "existing"));

        gcs::build_patch("user-gcp-sa").apply_to(&mut descriptor);

        assert_eq!(descriptor.container.env.len(), 2);
        assert_eq!(descriptor.container.env[0].name, "EXISTING");
        assert_eq!(descriptor.container.env[1].name, gcs::GCS_CREDENTIAL_ENV_KEY);
        assert_eq!(descriptor.pod_spec.volumes[0].name, "existing");
        assert_eq!(
            descriptor.pod_spec.volumes[1].name,
            gcs::GCS_CREDENTIAL_VOLUME_NAME,
        );
        assert_eq!(descriptor.container.volume_mounts.len(), 1);
    }
}
