use std::collections::HashSet;

use crate::classfile::{ClassDescriptor, ClassName, ConstantPoolEntry};
use crate::descriptor::{DecodeError, referenced_class};

/// Classes referenced directly by the constant pool of `class`, in pool order.
pub fn referenced_class_names(class: &ClassDescriptor) -> Result<Vec<ClassName>, DecodeError> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    let mut check = |descriptor: &str| -> Result<(), DecodeError> {
        if let Some(name) = referenced_class(descriptor)?
            && seen.insert(name.to_string())
        {
            names.push(ClassName::from_internal(name));
        }
        Ok(())
    };

    for entry in &class.constant_pool {
        match entry {
            ConstantPoolEntry::TypeRef(descriptor) | ConstantPoolEntry::FieldRef(descriptor) => {
                check(descriptor)?;
            }
            ConstantPoolEntry::MethodRef {
                return_type,
                parameters,
            } => {
                check(return_type)?;
                for param in parameters {
                    check(param)?;
                }
            }
        }
    }

    Ok(names)
}
