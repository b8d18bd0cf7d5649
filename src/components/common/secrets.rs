//! # Credentials Secrets
//!
//! Admin passwords and object-store keys. A generated admin credential is
//! written once and marked with an annotation; reconciles never regenerate
//! it. Rotation is an explicit user action: delete the annotation, delete
//! the key. User-referenced external secrets are consumed but never owned.

use crate::client::{owner_reference, ClusterClient};
use crate::components::common::labels::{artifact_labels, artifact_name};
use crate::constants::GENERATED_SECRET_ANNOTATION;
use crate::controller::error::Result;
use crate::crd::{AuthMode, AuthSpec, ComponentKind, ObjectStoreSpec, Platform};
use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, Secret, SecretKeySelector};
use kube::api::{Api, ObjectMeta, PostParams};
use kube::ResourceExt;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::info;

/// Key under which the admin password is stored
pub const ADMIN_PASSWORD_KEY: &str = "admin-password";

/// Key under which the admin user is stored
pub const ADMIN_USER_KEY: &str = "admin-user";

/// Ensure the admin credentials secret for a component exists. Returns the
/// secret name serving the credential, or None when the component runs
/// without authentication.
pub async fn ensure_admin_secret(
    cluster: &ClusterClient,
    platform: &Platform,
    kind: ComponentKind,
    auth: Option<&AuthSpec>,
) -> Result<Option<String>> {
    let Some(auth) = auth else {
        return Ok(None);
    };
    if auth.mode != AuthMode::Basic {
        return Ok(None);
    }

    // User-supplied secrets are consumed, not owned
    if let Some(external) = auth.admin_password_secret.as_deref() {
        return Ok(Some(external.to_string()));
    }

    let namespace = platform.namespace().unwrap_or_else(|| "default".to_string());
    let name = format!("{}-admin", artifact_name(platform, kind));
    let api: Api<Secret> = cluster.namespaced(&namespace);

    if let Some(existing) = api.get_opt(&name).await.map_err(crate::controller::error::Error::from)? {
        let generated = existing
            .metadata
            .annotations
            .as_ref()
            .is_some_and(|a| a.contains_key(GENERATED_SECRET_ANNOTATION));
        if generated {
            // Generated once; never rotated by the controller
            return Ok(Some(name));
        }
        // A foreign secret squats on our name; leave it alone and consume it
        return Ok(Some(name));
    }

    let admin_user = auth.admin_user.clone().unwrap_or_else(|| "admin".to_string());
    let mut string_data = BTreeMap::new();
    string_data.insert(ADMIN_USER_KEY.to_string(), admin_user);
    string_data.insert(ADMIN_PASSWORD_KEY.to_string(), generate_password(32));

    let mut annotations = BTreeMap::new();
    annotations.insert(
        GENERATED_SECRET_ANNOTATION.to_string(),
        chrono::Utc::now().to_rfc3339(),
    );

    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(namespace),
            labels: Some(artifact_labels(platform, kind)),
            annotations: Some(annotations),
            owner_references: Some(vec![owner_reference(platform)]),
            ..ObjectMeta::default()
        },
        string_data: Some(string_data),
        type_: Some("Opaque".to_string()),
        ..Secret::default()
    };

    match api.create(&PostParams::default(), &secret).await {
        Ok(_) => {
            info!("generated admin credential secret {name}");
            Ok(Some(name))
        }
        // Raced another pass; the existing secret wins
        Err(kube::Error::Api(resp)) if resp.code == 409 => Ok(Some(name)),
        Err(e) => Err(e.into()),
    }
}

/// Environment variables injecting object-store credentials into a
/// workload. Empty when the backend has no credentials secret (IAM-role
/// mode) or needs none.
#[must_use]
pub fn object_store_env(backend: &ObjectStoreSpec) -> Vec<EnvVar> {
    fn from_secret(name: &str, secret: &str, key: &str) -> EnvVar {
        EnvVar {
            name: name.to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: secret.to_string(),
                    key: key.to_string(),
                    optional: Some(false),
                }),
                ..EnvVarSource::default()
            }),
            ..EnvVar::default()
        }
    }

    match backend {
        ObjectStoreSpec::S3 {
            credentials_secret: Some(secret),
            ..
        } => vec![
            from_secret("AWS_ACCESS_KEY_ID", secret, "accessKeyId"),
            from_secret("AWS_SECRET_ACCESS_KEY", secret, "secretAccessKey"),
        ],
        ObjectStoreSpec::Gcs {
            credentials_secret: Some(secret),
            ..
        } => vec![from_secret("GOOGLE_APPLICATION_CREDENTIALS_JSON", secret, "key.json")],
        ObjectStoreSpec::Azure {
            credentials_secret: Some(secret),
            ..
        } => vec![from_secret("AZURE_STORAGE_ACCOUNT_KEY", secret, "accountKey")],
        // Credentials absent: IAM-role / workload-identity mode
        _ => Vec::new(),
    }
}

/// Random alphanumeric password
#[must_use]
pub fn generate_password(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_passwords_are_unique_and_sized() {
        let a = generate_password(32);
        let b = generate_password(32);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_object_store_env_absent_credentials_means_iam_mode() {
        let backend = ObjectStoreSpec::S3 {
            bucket: "b".into(),
            region: "us-east-1".into(),
            endpoint: None,
            credentials_secret: None,
        };
        assert!(object_store_env(&backend).is_empty());
    }

    #[test]
    fn test_object_store_env_injects_s3_keys() {
        let backend = ObjectStoreSpec::S3 {
            bucket: "b".into(),
            region: "us-east-1".into(),
            endpoint: None,
            credentials_secret: Some("s3-creds".into()),
        };
        let env = object_store_env(&backend);
        assert_eq!(env.len(), 2);
        assert_eq!(env[0].name, "AWS_ACCESS_KEY_ID");
        let selector = env[0]
            .value_from
            .as_ref()
            .and_then(|v| v.secret_key_ref.as_ref())
            .expect("secret ref");
        assert_eq!(selector.name, "s3-creds");
    }
}
