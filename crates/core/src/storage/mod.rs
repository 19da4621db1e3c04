mod batch;
mod error;
mod http_mapping;
mod index;
mod traits;
mod types;

pub use batch::{
    chunk_unique, clamp_chunk_size, group_by_attribute, reorder_by_ids, MAX_BATCH_SIZE,
};
pub use error::{RepositoryError, Result};
pub use http_mapping::repository_error_to_status_code;
pub use index::{index_name, is_indexed, INDEXED_ATTRIBUTES};
pub use traits::TableBackend;
pub use types::{
    ContinuationToken, FieldFilter, FilterOp, ListQuery, Page, RawPage, TextFilter,
    DEFAULT_PAGE_LIMIT,
};
