//! Hand-assembled class files for tests.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ClassFileBuilder {
    pool: Vec<u8>,
    next_index: u16,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
}

impl ClassFileBuilder {
    pub fn new(name: &str) -> Self {
        let mut builder = Self {
            next_index: 1,
            ..Self::default()
        };
        builder.this_class = builder.class(name);
        builder
    }

    pub fn extends(mut self, name: &str) -> Self {
        self.super_class = self.class(name);
        self
    }

    pub fn implements(mut self, name: &str) -> Self {
        let index = self.class(name);
        self.interfaces.push(index);
        self
    }

    pub fn type_ref(mut self, name: &str) -> Self {
        self.class(name);
        self
    }

    pub fn field_ref(mut self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.member_ref(9, owner, name, descriptor);
        self
    }

    pub fn method_ref(mut self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.member_ref(10, owner, name, descriptor);
        self
    }

    pub fn interface_method_ref(mut self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.member_ref(11, owner, name, descriptor);
        self
    }

    pub fn string(mut self, value: &str) -> Self {
        let utf8 = self.utf8(value);
        self.pool.push(8);
        self.pool.extend_from_slice(&utf8.to_be_bytes());
        self.next_index += 1;
        self
    }

    pub fn long(mut self, value: i64) -> Self {
        self.pool.push(5);
        self.pool.extend_from_slice(&value.to_be_bytes());
        self.next_index += 2;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());
        out.extend_from_slice(&self.next_index.to_be_bytes());
        out.extend_from_slice(&self.pool);
        out.extend_from_slice(&0x0021u16.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for i in &self.interfaces {
            out.extend_from_slice(&i.to_be_bytes());
        }
        // fields, methods, attributes
        out.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        out
    }

    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(index) = self.utf8.get(value) {
            return *index;
        }
        self.pool.push(1);
        self.pool
            .extend_from_slice(&(value.len() as u16).to_be_bytes());
        self.pool.extend_from_slice(value.as_bytes());
        let index = self.next_index;
        self.next_index += 1;
        self.utf8.insert(value.to_string(), index);
        index
    }

    fn class(&mut self, name: &str) -> u16 {
        if let Some(index) = self.classes.get(name) {
            return *index;
        }
        let name_index = self.utf8(name);
        self.pool.push(7);
        self.pool.extend_from_slice(&name_index.to_be_bytes());
        let index = self.next_index;
        self.next_index += 1;
        self.classes.insert(name.to_string(), index);
        index
    }

    fn member_ref(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) {
        let class_index = self.class(owner);
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);

        self.pool.push(12);
        self.pool.extend_from_slice(&name_index.to_be_bytes());
        self.pool.extend_from_slice(&descriptor_index.to_be_bytes());
        let nat_index = self.next_index;
        self.next_index += 1;

        self.pool.push(tag);
        self.pool.extend_from_slice(&class_index.to_be_bytes());
        self.pool.extend_from_slice(&nat_index.to_be_bytes());
        self.next_index += 1;
    }
}
