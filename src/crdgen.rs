//! # CRD Generator
//!
//! Generates CustomResourceDefinition YAML from the Rust type definitions.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/platforms.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```
//!
//! The generated CRDs include OpenAPI schema validation, required fields,
//! default values, printable columns, and the status subresource.

use kube::core::CustomResourceExt;
use platform_operator::crd::extras::{Dashboard, LogStoreConfig, ServiceMesh};
use platform_operator::crd::Platform;

fn main() {
    let crds = [
        Platform::crd(),
        LogStoreConfig::crd(),
        Dashboard::crd(),
        ServiceMesh::crd(),
    ];

    for crd in crds {
        print!(
            "---\n{}",
            serde_yaml::to_string(&crd).expect("CRD serializes to YAML")
        );
    }
}
