//! The stored envelope around an object body.
//!
//! ```text
//! <kind> SP <decimal byte length of body> NUL <body>
//! ```
//!
//! The envelope is what gets hashed and what the backing store holds under
//! the resulting digest.

use crate::error::{ObjectError, ObjectResult};
use crate::kind::ObjectKind;

/// Wrap a body in its envelope.
pub fn wrap(kind: ObjectKind, body: &[u8]) -> Vec<u8> {
    let header = format!("{} {}\0", kind, body.len());
    let mut out = Vec::with_capacity(header.len() + body.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(body);
    out
}

/// Split stored file contents into kind and body.
///
/// The declared length must be plain decimal (no sign or leading zeros) and
/// match the body exactly.
pub fn split(contents: &[u8]) -> ObjectResult<(ObjectKind, &[u8])> {
    let nul = contents
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| ObjectError::parse("missing NUL after envelope header"))?;
    let header = std::str::from_utf8(&contents[..nul])
        .map_err(|_| ObjectError::parse("envelope header is not UTF-8"))?;
    let (kind, len) = header
        .split_once(' ')
        .ok_or_else(|| ObjectError::parse(format!("malformed envelope header {header:?}")))?;
    let kind: ObjectKind = kind.parse()?;
    let len = match len.parse::<usize>() {
        Ok(n) if n.to_string() == len => n,
        _ => return Err(ObjectError::parse(format!("invalid body length {len:?}"))),
    };

    let body = &contents[nul + 1..];
    if body.len() != len {
        return Err(ObjectError::parse(format!(
            "body length mismatch: header says {len}, found {}",
            body.len()
        )));
    }
    Ok((kind, body))
}
