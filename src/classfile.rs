//! Class names and the subset of the class-file format the closure needs.
//!
//! Only the constant pool, `this_class`, `super_class` and the interface table
//! are decoded. Fields, methods and attributes are never looked at: every type
//! they mention is already present in the constant pool.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::descriptor::{DecodeError, split_method_descriptor};

pub const CLASS_EXTENSION: &str = ".class";

const MAGIC: u32 = 0xCAFE_BABE;

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

/// A class in entry form: slash separated, always ending in `.class`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ClassName(String);

impl ClassName {
    /// From an archive entry or relative file path such as `a/b/C.class`.
    pub fn from_entry(entry: &str) -> Option<Self> {
        if !entry.ends_with(CLASS_EXTENSION) || entry.len() == CLASS_EXTENSION.len() {
            return None;
        }
        Some(Self(entry.to_string()))
    }

    /// From an internal name such as `a/b/C`.
    pub fn from_internal(name: &str) -> Self {
        if name.ends_with(CLASS_EXTENSION) {
            return Self(name.to_string());
        }
        Self(format!("{name}{CLASS_EXTENSION}"))
    }

    pub fn as_entry(&self) -> &str {
        &self.0
    }

    pub fn internal_name(&self) -> &str {
        self.0.strip_suffix(CLASS_EXTENSION).unwrap_or(&self.0)
    }

    /// Top-level class this entry belongs to, e.g. `a/B` for `a/B$1.class`.
    pub fn outer_class(&self) -> &str {
        let internal = self.internal_name();
        match internal.find('$') {
            Some(idx) => &internal[..idx],
            None => internal,
        }
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstantPoolEntry {
    TypeRef(String),
    FieldRef(String),
    MethodRef {
        return_type: String,
        parameters: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDescriptor {
    pub name: String,
    pub constant_pool: Vec<ConstantPoolEntry>,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ClassFileError {
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),
    #[error("truncated class file at offset {0}")]
    Truncated(usize),
    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownTag { tag: u8, index: u16 },
    #[error("constant pool index {index} is not a valid {expected} entry")]
    BadIndex { index: u16, expected: &'static str },
    #[error("invalid modified UTF-8 in constant pool entry {0}")]
    InvalidUtf8(u16),
    #[error(transparent)]
    Descriptor(#[from] DecodeError),
}

#[derive(Debug, Clone)]
enum RawConstant {
    Utf8(String),
    Class(u16),
    NameAndType { name: u16, descriptor: u16 },
    FieldRef { name_and_type: u16 },
    MethodRef { name_and_type: u16 },
    Other,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ClassFileError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(ClassFileError::Truncated(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ClassFileError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ClassFileError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

impl ClassDescriptor {
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassFileError> {
        let mut r = Reader::new(bytes);

        let magic = r.u32()?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic(magic));
        }
        let _minor = r.u16()?;
        let _major = r.u16()?;

        let pool = read_constant_pool(&mut r)?;

        let _access_flags = r.u16()?;
        let this_class = r.u16()?;
        let super_class = r.u16()?;
        let interface_count = r.u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            let index = r.u16()?;
            interfaces.push(class_name_at(&pool, index)?.to_string());
        }

        let name = class_name_at(&pool, this_class)?.to_string();
        let superclass = match super_class {
            0 => None,
            index => Some(class_name_at(&pool, index)?.to_string()),
        };

        let mut constant_pool = Vec::new();
        for (index, constant) in pool.iter().enumerate() {
            let Some(constant) = constant else {
                continue;
            };
            let index = index as u16;
            match constant {
                RawConstant::Class(name_index) => {
                    let name = utf8_at(&pool, *name_index)?;
                    constant_pool.push(ConstantPoolEntry::TypeRef(class_type_descriptor(name)));
                }
                RawConstant::FieldRef { name_and_type } => {
                    let descriptor = member_descriptor(&pool, *name_and_type, index)?;
                    constant_pool.push(ConstantPoolEntry::FieldRef(descriptor.to_string()));
                }
                RawConstant::MethodRef { name_and_type } => {
                    let descriptor = member_descriptor(&pool, *name_and_type, index)?;
                    let proto = split_method_descriptor(descriptor)?;
                    constant_pool.push(ConstantPoolEntry::MethodRef {
                        return_type: proto.return_type,
                        parameters: proto.parameters,
                    });
                }
                _ => {}
            }
        }

        Ok(Self {
            name,
            constant_pool,
            superclass,
            interfaces,
        })
    }
}

fn read_constant_pool(r: &mut Reader<'_>) -> Result<Vec<Option<RawConstant>>, ClassFileError> {
    let count = r.u16()?;
    let mut pool: Vec<Option<RawConstant>> = vec![None; count as usize];

    let mut index = 1u16;
    while index < count {
        let tag = r.u8()?;
        let mut slots = 1;
        let constant = match tag {
            TAG_UTF8 => {
                let len = r.u16()? as usize;
                let raw = r.take(len)?;
                RawConstant::Utf8(
                    decode_modified_utf8(raw).ok_or(ClassFileError::InvalidUtf8(index))?,
                )
            }
            TAG_CLASS => RawConstant::Class(r.u16()?),
            TAG_FIELDREF => {
                let _class = r.u16()?;
                RawConstant::FieldRef {
                    name_and_type: r.u16()?,
                }
            }
            TAG_METHODREF => {
                let _class = r.u16()?;
                RawConstant::MethodRef {
                    name_and_type: r.u16()?,
                }
            }
            // Interface method prototypes are not followed.
            TAG_INTERFACE_METHODREF => {
                r.take(4)?;
                RawConstant::Other
            }
            TAG_NAME_AND_TYPE => RawConstant::NameAndType {
                name: r.u16()?,
                descriptor: r.u16()?,
            },
            TAG_INTEGER | TAG_FLOAT => {
                r.take(4)?;
                RawConstant::Other
            }
            TAG_LONG | TAG_DOUBLE => {
                r.take(8)?;
                slots = 2;
                RawConstant::Other
            }
            TAG_STRING | TAG_METHOD_TYPE | TAG_MODULE | TAG_PACKAGE => {
                r.u16()?;
                RawConstant::Other
            }
            TAG_METHOD_HANDLE => {
                r.take(3)?;
                RawConstant::Other
            }
            TAG_DYNAMIC | TAG_INVOKE_DYNAMIC => {
                r.take(4)?;
                RawConstant::Other
            }
            tag => return Err(ClassFileError::UnknownTag { tag, index }),
        };
        pool[index as usize] = Some(constant);
        index = index.saturating_add(slots);
    }

    Ok(pool)
}

fn utf8_at(pool: &[Option<RawConstant>], index: u16) -> Result<&str, ClassFileError> {
    match pool.get(index as usize) {
        Some(Some(RawConstant::Utf8(s))) => Ok(s),
        _ => Err(ClassFileError::BadIndex {
            index,
            expected: "Utf8",
        }),
    }
}

fn class_name_at(pool: &[Option<RawConstant>], index: u16) -> Result<&str, ClassFileError> {
    match pool.get(index as usize) {
        Some(Some(RawConstant::Class(name))) => utf8_at(pool, *name),
        _ => Err(ClassFileError::BadIndex {
            index,
            expected: "Class",
        }),
    }
}

fn member_descriptor(
    pool: &[Option<RawConstant>],
    name_and_type: u16,
    owner: u16,
) -> Result<&str, ClassFileError> {
    match pool.get(name_and_type as usize) {
        Some(Some(RawConstant::NameAndType { name, descriptor })) => {
            utf8_at(pool, *name)?;
            utf8_at(pool, *descriptor)
        }
        _ => Err(ClassFileError::BadIndex {
            index: owner,
            expected: "NameAndType-backed member reference",
        }),
    }
}

// CONSTANT_Class holds an internal name, or a descriptor for array classes.
fn class_type_descriptor(name: &str) -> String {
    if name.starts_with('[') {
        name.to_string()
    } else {
        format!("L{name};")
    }
}

fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    if bytes.iter().all(|b| *b != 0 && *b < 0x80) {
        return std::str::from_utf8(bytes).ok().map(str::to_string);
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i] as u16;
        match bytes[i] {
            0x01..=0x7F => {
                units.push(b0);
                i += 1;
            }
            0xC0..=0xDF => {
                let b1 = *bytes.get(i + 1)? as u16;
                if b1 & 0xC0 != 0x80 {
                    return None;
                }
                units.push(((b0 & 0x1F) << 6) | (b1 & 0x3F));
                i += 2;
            }
            0xE0..=0xEF => {
                let b1 = *bytes.get(i + 1)? as u16;
                let b2 = *bytes.get(i + 2)? as u16;
                if b1 & 0xC0 != 0x80 || b2 & 0xC0 != 0x80 {
                    return None;
                }
                units.push(((b0 & 0x0F) << 12) | ((b1 & 0x3F) << 6) | (b2 & 0x3F));
                i += 3;
            }
            _ => return None,
        }
    }

    String::from_utf16(&units).ok()
}
