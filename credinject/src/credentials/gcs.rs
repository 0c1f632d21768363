//! Credentials for Google Cloud Storage.
//!
//! A GCS secret holds a service account key file. We mount the secret as a
//! volume and point `GOOGLE_APPLICATION_CREDENTIALS` at it.

use super::Patch;
use crate::prelude::*;

/// The secret key holding the service account key file.
pub const GCS_CREDENTIAL_FILE_NAME: &str = "gcloud-application-credentials.json";
/// The name of the volume we mount the secret as.
pub const GCS_CREDENTIAL_VOLUME_NAME: &str = "user-gcp-sa";
/// Where we mount the secret inside the container.
pub const GCS_CREDENTIAL_VOLUME_MOUNT_PATH: &str = "/var/secrets/";
/// Environment variable telling Google client libraries where to look.
pub const GCS_CREDENTIAL_ENV_KEY: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Is `secret` a GCS secret? Only key names are checked.
pub(crate) fn matches(secret: &Secret) -> bool {
    secret.has_key(GCS_CREDENTIAL_FILE_NAME)
}

/// Build the volume, mount and environment variable for the GCS secret named
/// `secret_name`.
pub(crate) fn build_patch(secret_name: &str) -> Patch {
    Patch {
        env: vec![EnvVar::literal(
            GCS_CREDENTIAL_ENV_KEY,
            GCS_CREDENTIAL_VOLUME_MOUNT_PATH,
        )],
        volumes: vec![Volume::from_secret(GCS_CREDENTIAL_VOLUME_NAME, secret_name)],
        volume_mounts: vec![VolumeMount {
            name: GCS_CREDENTIAL_VOLUME_NAME.to_owned(),
            read_only: Some(true),
            mount_path: GCS_CREDENTIAL_VOLUME_MOUNT_PATH.to_owned(),
            ..VolumeMount::default()
        }],
    }
}

#[test]
fn env_points_at_mount() {
    let patch = build_patch("user-gcp-sa-secret");
    assert_eq!(patch.env.len(), 1);
    assert_eq!(patch.volumes.len(), 1);
    assert_eq!(patch.volume_mounts.len(), 1);

    let mount = &patch.volume_mounts[0];
    assert_eq!(mount.read_only, Some(true));
    assert_eq!(mount.name, patch.volumes[0].name);
    assert_eq!(patch.env[0].value.as_deref(), Some(mount.mount_path.as_str()));
    assert_eq!(
        patch.volumes[0].secret.as_ref().map(|s| s.secret_name.as_str()),
        Some("user-gcp-sa-secret"),
    );
}
