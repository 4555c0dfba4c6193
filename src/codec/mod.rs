//! Low-level byte encodings: key escaping, hexastore key assembly, and
//! triple value encodings.

pub mod escape;
pub mod key;
pub mod triple_codec;
