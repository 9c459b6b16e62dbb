//! Host-server datastream building blocks.
//!
//! This module contains:
//! - Constants: ports, server IDs, request IDs, code points
//! - Stream: the big-endian assembly/parse buffer and header writers
//! - Fields: dynamic `{LL, CP, data}` field scanning

pub mod constants;
pub mod fields;
pub mod stream;

pub use fields::{find, parse_fields, DynamicField};
pub use stream::{write_attribute_header, write_field, write_header, DataStream};
