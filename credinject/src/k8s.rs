//! Local, `serde`-compatible models of the Kubernetes `core/v1` objects we
//! read and patch.
//!
//! These only include the fields we actually touch. Anything in a workload
//! template that we don't model is kept in an `other` map and written back out
//! unchanged. Read-only objects like `Secret` simply ignore unknown fields, so
//! full objects from `kubectl get -o json` deserialize fine.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{collections::BTreeMap, fmt};

/// Object metadata (missing lots of fields).
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// The name of the object.
    #[serde(default)]
    pub name: String,
    /// The namespace containing the object.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Free-form annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// A reference to another object, as found in `ServiceAccount.secrets`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    /// The name of the referenced object.
    #[serde(default)]
    pub name: String,
    /// The namespace of the referenced object. Empty means "the namespace of
    /// the referring object".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

/// A service account, which is the identity whose secrets we inject.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    /// Standard metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Secrets attached to this service account, in order.
    #[serde(default)]
    pub secrets: Vec<ObjectReference>,
}

/// A Kubernetes secret (missing lots of fields).
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    /// Standard metadata, including annotations.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Our secret data, keyed by field name.
    #[serde(default)]
    pub data: BTreeMap<String, ByteString>,
}

impl Secret {
    /// Does this secret contain a field named `key`? The value is never
    /// examined.
    pub fn has_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Look up an annotation on this secret.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata.annotations.get(key).map(String::as_str)
    }
}

/// Raw bytes, represented as a Base64-encoded string on the wire.
#[derive(Clone, Default, Eq, PartialEq)]
pub struct ByteString(pub Vec<u8>);

impl fmt::Debug for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret values.
        write!(f, "ByteString(<{} bytes>)", self.0.len())
    }
}

impl From<&str> for ByteString {
    fn from(s: &str) -> Self {
        ByteString(s.as_bytes().to_owned())
    }
}

impl Serialize for ByteString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for ByteString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = base64::decode(&encoded).map_err(|err| {
            de::Error::custom(format!("could not base64-decode secret: {}", err))
        })?;
        Ok(ByteString(bytes))
    }
}

/// An environment variable in a container.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    /// The variable name.
    pub name: String,
    /// A literal value. Mutually exclusive with `value_from`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Where to get the value from at runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<EnvVarSource>,
    /// Everything else, passed through untouched.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl EnvVar {
    /// An environment variable with a literal value.
    pub fn literal<N: Into<String>, V: Into<String>>(name: N, value: V) -> EnvVar {
        EnvVar {
            name: name.into(),
            value: Some(value.into()),
            ..EnvVar::default()
        }
    }

    /// An environment variable read from `key` in the secret `secret_name`.
    pub fn from_secret_key<N, S, K>(name: N, secret_name: S, key: K) -> EnvVar
    where
        N: Into<String>,
        S: Into<String>,
        K: Into<String>,
    {
        EnvVar {
            name: name.into(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: secret_name.into(),
                    key: key.into(),
                    ..SecretKeySelector::default()
                }),
                ..EnvVarSource::default()
            }),
            ..EnvVar::default()
        }
    }
}

/// The runtime source of an environment variable's value.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarSource {
    /// Read the value from a key in a secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_ref: Option<SecretKeySelector>,
    /// Everything else, passed through untouched.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// Selects a key of a secret in the pod's namespace.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    /// The name of the secret.
    pub name: String,
    /// The key to select.
    pub key: String,
    /// Everything else, passed through untouched.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// A volume available to the containers in a pod.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// The volume name, referenced by `VolumeMount::name`.
    pub name: String,
    /// Populate this volume from a secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretVolumeSource>,
    /// Everything else, passed through untouched.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl Volume {
    /// A volume containing one file per key in `secret_name`.
    pub fn from_secret<N: Into<String>, S: Into<String>>(name: N, secret_name: S) -> Volume {
        Volume {
            name: name.into(),
            secret: Some(SecretVolumeSource {
                secret_name: secret_name.into(),
                ..SecretVolumeSource::default()
            }),
            ..Volume::default()
        }
    }
}

/// Adapts a secret into a volume.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretVolumeSource {
    /// The name of the secret to mount.
    pub secret_name: String,
    /// Everything else, passed through untouched.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// Where to mount a volume inside a container.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    /// The name of the volume to mount.
    pub name: String,
    /// Is the mount read-only? Left as `None` when unspecified, so existing
    /// mounts serialize exactly as they were parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    /// The path inside the container.
    pub mount_path: String,
    /// Everything else, passed through untouched.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// A container (missing lots of fields). Any fields we don't model are
/// preserved in `other`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Environment variables, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    /// Volume mounts, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
    /// Everything else, passed through untouched.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// A pod spec (missing lots of fields). Any fields we don't model are
/// preserved in `other`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Volumes available to the pod's containers, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    /// Everything else, passed through untouched.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// The mutable workload template we inject credentials into: a container, and
/// the pod which encloses it.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadDescriptor {
    /// The container which will receive the credentials.
    #[serde(default)]
    pub container: Container,
    /// The pod which will hold any credential volumes.
    #[serde(default)]
    pub pod_spec: PodSpec,
}

#[test]
fn secret_data_is_base64_decoded() {
    let json = r#"{
  "apiVersion": "v1",
  "kind": "Secret",
  "metadata": {
    "name": "s3-secret",
    "namespace": "default",
    "annotations": { "serving.kubeflow.org/s3-endpoint": "s3.aws.com" }
  },
  "type": "Opaque",
  "data": { "awsAccessKeyID": "QUtJQQ==", "awsSecretAccessKey": "" }
}"#;
    let secret: Secret = serde_json::from_str(json).expect("parse error");
    assert_eq!(secret.metadata.name, "s3-secret");
    assert_eq!(secret.data["awsAccessKeyID"], ByteString::from("AKIA"));
    assert_eq!(secret.data["awsSecretAccessKey"], ByteString::from(""));
    assert_eq!(
        secret.annotation("serving.kubeflow.org/s3-endpoint"),
        Some("s3.aws.com"),
    );
}

#[test]
fn byte_string_debug_hides_contents() {
    let value = ByteString::from("hunter2");
    assert_eq!(format!("{:?}", value), "ByteString(<7 bytes>)");
}

#[test]
fn container_preserves_unmodeled_fields() {
    let json = r#"{"image": "example/model:1", "env": [{"name": "A", "value": "1"}]}"#;
    let container: Container = serde_json::from_str(json).expect("parse error");
    assert_eq!(container.env, vec![EnvVar::literal("A", "1")]);
    let round_trip = serde_json::to_value(&container).expect("serialize error");
    assert_eq!(round_trip["image"], "example/model:1");
    assert!(round_trip.get("volumeMounts").is_none());
}
