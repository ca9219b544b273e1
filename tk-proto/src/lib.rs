//! Generated wire types for the rule sync and event ingestion protocol,
//! plus conversions to and from `tk-core`'s in-memory rule model.

pub mod convert;

tonic::include_proto!("trapperkeeper.v1");

pub use convert::{ConvertError, FromProtoTimestamp, ToProtoTimestamp};
