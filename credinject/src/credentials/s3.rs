//! Credentials for AWS S3 and S3-compatible storage.
//!
//! An S3 secret holds an access key pair, and may be annotated with a custom
//! endpoint:
//!
//! ```yaml
//! apiVersion: v1
//! kind: Secret
//! metadata:
//!   name: s3-secret
//!   annotations:
//!     serving.kubeflow.org/s3-endpoint: s3.aws.com
//! data:
//!   awsAccessKeyID: ...
//!   awsSecretAccessKey: ...
//! ```

use super::Patch;
use crate::prelude::*;

/// The secret key holding our `AWS_ACCESS_KEY_ID` value.
pub const AWS_ACCESS_KEY_ID_NAME: &str = "awsAccessKeyID";
/// The secret key holding our `AWS_SECRET_ACCESS_KEY` value.
pub const AWS_SECRET_ACCESS_KEY_NAME: &str = "awsSecretAccessKey";
/// The secret annotation holding a custom S3 endpoint (`host[:port]`).
pub const S3_ENDPOINT_ANNOTATION: &str = "serving.kubeflow.org/s3-endpoint";

/// Environment variable holding the access key ID.
pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
/// Environment variable holding the secret access key.
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
/// Environment variable holding the raw endpoint.
pub const S3_ENDPOINT: &str = "S3_ENDPOINT";
/// Environment variable holding the endpoint as an `https://` URL.
pub const AWS_ENDPOINT_URL: &str = "AWS_ENDPOINT_URL";

/// Is `secret` an S3 secret? Only key names are checked.
pub(crate) fn matches(secret: &Secret) -> bool {
    secret.has_key(AWS_ACCESS_KEY_ID_NAME) && secret.has_key(AWS_SECRET_ACCESS_KEY_NAME)
}

/// The custom endpoint for this secret, if any.
pub(crate) fn endpoint(secret: &Secret) -> Option<String> {
    secret.annotation(S3_ENDPOINT_ANNOTATION).map(str::to_owned)
}

/// Build the environment variables for the S3 secret named `secret_name`.
///
/// Keys are always passed by reference to the secret, never copied into the
/// manifest. The endpoint variables are only added if we have an endpoint.
pub(crate) fn build_patch(secret_name: &str, endpoint: Option<&str>) -> Patch {
    let mut env = vec![
        EnvVar::from_secret_key(AWS_ACCESS_KEY_ID, secret_name, AWS_ACCESS_KEY_ID_NAME),
        EnvVar::from_secret_key(
            AWS_SECRET_ACCESS_KEY,
            secret_name,
            AWS_SECRET_ACCESS_KEY_NAME,
        ),
    ];
    if let Some(endpoint) = endpoint {
        env.push(EnvVar::literal(S3_ENDPOINT, endpoint));
        env.push(EnvVar::literal(AWS_ENDPOINT_URL, format!("https://{}", endpoint)));
    }
    Patch {
        env,
        ..Patch::default()
    }
}

#[test]
fn endpoint_adds_literal_variables() {
    let patch = build_patch("s3-secret", Some("minio.local:9000"));
    let names = patch.env.iter().map(|e| e.name.as_str()).collect::<Vec<_>>();
    assert_eq!(
        names,
        &[AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, S3_ENDPOINT, AWS_ENDPOINT_URL],
    );
    assert_eq!(patch.env[2].value.as_deref(), Some("minio.local:9000"));
    assert_eq!(patch.env[3].value.as_deref(), Some("https://minio.local:9000"));
    assert!(patch.volumes.is_empty());
    assert!(patch.volume_mounts.is_empty());
}

#[test]
fn keys_are_never_inlined() {
    let patch = build_patch("s3-secret", None);
    assert_eq!(patch.env.len(), 2);
    for var in &patch.env {
        assert_eq!(var.value, None);
        let selector = var
            .value_from
            .as_ref()
            .and_then(|source| source.secret_key_ref.as_ref())
            .expect("missing secretKeyRef");
        assert_eq!(selector.name, "s3-secret");
    }
    assert_eq!(
        patch.env[1].value_from.as_ref().unwrap().secret_key_ref.as_ref().unwrap().key,
        AWS_SECRET_ACCESS_KEY_NAME,
    );
}
