//! Reference scanners: locate memory-base-relative addresses in an
//! instruction's encoding or in its decoded operand text.

pub mod bytes;
pub mod text;

pub use self::bytes::ByteMatch;
