//! `keepio`: line framing for the keepmud text protocol.
//!
//! Each inbound line is one command. Lines end in LF with an optional CR; anything else is
//! payload. The reader splits lines out of a `BytesMut` without copying and hands back
//! either raw `Bytes` or a cleaned-up command string.

pub mod line;
