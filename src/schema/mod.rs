//! Schema inference from sampled rows.
//!
//! - [`normalize_field_name`] turns a source field or table name into a stable identifier
//! - [`infer_type`] classifies one observed value
//! - [`infer_stream_schema`] builds the object schema for a whole table sample

mod infer;
mod normalize;

pub use infer::{CREATED_TIME_PROPERTY, ID_PROPERTY, SchemaInferrer, infer_stream_schema, infer_type, seed_properties};
pub use normalize::normalize_field_name;
