//! Object-store side of the data layer: key derivation, presigned URL
//! requests and multipart upload bookkeeping.

mod keys;
mod multipart;
mod presign;
mod traits;

pub use keys::{
    artifact_object_key, content_disposition, entity_object_key, sanitize_filename,
    ARTIFACT_ENTITY,
};
pub use multipart::{
    reconcile_parts, validate_completed_parts, validate_part_number, CompletedPart,
    MultipartState, MultipartUpload, UploadedPart, MAX_PART_NUMBER,
};
pub use presign::{
    checksum_sha256, validate_expires_in, ObjectUpload, PresignRequest, PresignedUrl,
    CHECKSUM_SHA256_HEADER, MAX_PRESIGN_EXPIRY, MIN_PRESIGN_EXPIRY,
};
pub use traits::ObjectStore;
