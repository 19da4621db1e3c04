//! Domain models stored in the shared table.

mod api_key;
mod artifact;
mod operations;
mod types;

pub use api_key::{generate_api_key_secret, hash_api_key_secret, ApiKey, Permission};
pub use artifact::{Artifact, ArtifactKind};
pub use operations::{validate_email, validate_name, validate_non_negative};
pub use types::{Listing, Order, OrderStatus, Robot, User};
