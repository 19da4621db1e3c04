//! DynamoDB table backend.
//!
//! Every item lives in one table keyed by `id`. Items of a type are reached
//! through the `type_index` GSI, and the other indexed attributes each have
//! an `{attribute}_index` GSI.

mod conversions;
mod error;
mod expressions;
mod table;

pub use table::DynamoDbTable;
