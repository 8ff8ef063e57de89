//! JVM type descriptor decoding.
//!
//! Only object references matter to the main dex computation, so the decoder
//! keeps primitives opaque and reduces arrays to their element type.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed type descriptor `{0}`")]
    MalformedType(String),
    #[error("malformed method descriptor `{0}`")]
    MalformedMethod(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<'a> {
    Primitive,
    ArrayOf(Box<Decoded<'a>>),
    ClassName(&'a str),
}

impl<'a> Decoded<'a> {
    pub fn class_name(&self) -> Option<&'a str> {
        match self {
            Decoded::Primitive => None,
            Decoded::ArrayOf(element) => element.class_name(),
            Decoded::ClassName(name) => Some(*name),
        }
    }
}

pub fn decode(descriptor: &str) -> Result<Decoded<'_>, DecodeError> {
    if !descriptor.ends_with(';') {
        if descriptor.starts_with('[') {
            return Ok(Decoded::ArrayOf(Box::new(Decoded::Primitive)));
        }
        return Ok(Decoded::Primitive);
    }

    let malformed = || DecodeError::MalformedType(descriptor.to_string());
    let bytes = descriptor.as_bytes();

    match descriptor.rfind('[') {
        None => {
            // Lcom/sample/Clazz;
            if bytes.len() < 3 || bytes[0] != b'L' {
                return Err(malformed());
            }
            Ok(Decoded::ClassName(&descriptor[1..descriptor.len() - 1]))
        }
        Some(last_brace) => {
            // [Lcom/sample/Clazz;
            if bytes.len() <= last_brace + 3 || bytes[last_brace + 1] != b'L' {
                return Err(malformed());
            }
            let name = &descriptor[last_brace + 2..descriptor.len() - 1];
            Ok(Decoded::ArrayOf(Box::new(Decoded::ClassName(name))))
        }
    }
}

/// Class name required by `descriptor`, if any.
pub fn referenced_class(descriptor: &str) -> Result<Option<&str>, DecodeError> {
    Ok(decode(descriptor)?.class_name())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodPrototype {
    pub parameters: Vec<String>,
    pub return_type: String,
}

/// Splits `(II[Ljava/lang/String;)V` into its parameter and return descriptors.
pub fn split_method_descriptor(descriptor: &str) -> Result<MethodPrototype, DecodeError> {
    let malformed = || DecodeError::MalformedMethod(descriptor.to_string());

    let rest = descriptor.strip_prefix('(').ok_or_else(malformed)?;
    let close = rest.find(')').ok_or_else(malformed)?;
    let (params, ret) = (&rest[..close], &rest[close + 1..]);

    let mut parameters = Vec::new();
    let mut remaining = params;
    while !remaining.is_empty() {
        let len = field_descriptor_len(remaining).ok_or_else(malformed)?;
        parameters.push(remaining[..len].to_string());
        remaining = &remaining[len..];
    }

    if ret != "V" && field_descriptor_len(ret) != Some(ret.len()) {
        return Err(malformed());
    }

    Ok(MethodPrototype {
        parameters,
        return_type: ret.to_string(),
    })
}

fn field_descriptor_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let dims = bytes.iter().take_while(|b| **b == b'[').count();
    match bytes.get(dims)? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => Some(dims + 1),
        b'L' => {
            let end = s[dims..].find(';')?;
            if end < 2 {
                return None;
            }
            Some(dims + end + 1)
        }
        _ => None,
    }
}
