//! Survey forms: vocabularies, sparse sheets and their persisted rows.

pub mod codec;
pub mod input;
pub mod key;
pub mod schema;
pub mod sheet;

pub use schema::FormKind;
