//! Server-side agent installer assembly: widget/tool selection, the
//! fleet-linked vs. standalone variant split, and embedded credentials
//! (spec §4.10).

pub mod builder;
pub mod error;
pub mod model;

pub use builder::PackageBuilder;
pub use error::PackagerError;
pub use model::{BuildSpec, EmbeddedCredentials, Manifest, StandaloneOptions, Variant};
