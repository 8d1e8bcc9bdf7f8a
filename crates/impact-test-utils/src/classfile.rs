use std::collections::HashMap;

const OBJECT: &str = "java/lang/Object";

/// Builds a minimal but structurally valid class file.
///
/// Names are given in JVM internal form (`com/example/Foo`). The superclass
/// defaults to `java/lang/Object`.
#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    name: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    refs: Vec<PoolRef>,
    long_constants: Vec<i64>,
}

#[derive(Debug, Clone)]
enum PoolRef {
    Method { class: String, name: String },
    InterfaceMethod { class: String, name: String },
    Field { class: String, name: String },
}

impl ClassFileBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_class: Some(OBJECT.to_owned()),
            interfaces: Vec::new(),
            refs: Vec::new(),
            long_constants: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extends(mut self, super_class: impl Into<String>) -> Self {
        self.super_class = Some(super_class.into());
        self
    }

    /// Drops the superclass entirely, like `java/lang/Object` itself.
    pub fn without_super(mut self) -> Self {
        self.super_class = None;
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Records a `CONSTANT_Methodref` to `class.method`.
    pub fn calls(mut self, class: impl Into<String>, method: impl Into<String>) -> Self {
        self.refs.push(PoolRef::Method {
            class: class.into(),
            name: method.into(),
        });
        self
    }

    /// Records a `CONSTANT_InterfaceMethodref` to `class.method`.
    pub fn calls_interface(mut self, class: impl Into<String>, method: impl Into<String>) -> Self {
        self.refs.push(PoolRef::InterfaceMethod {
            class: class.into(),
            name: method.into(),
        });
        self
    }

    /// Records a `CONSTANT_Fieldref`, which must never be indexed as a call site.
    pub fn reads_field(mut self, class: impl Into<String>, field: impl Into<String>) -> Self {
        self.refs.push(PoolRef::Field {
            class: class.into(),
            name: field.into(),
        });
        self
    }

    /// Adds a two-slot `CONSTANT_Long` to exercise constant pool slot accounting.
    pub fn long_constant(mut self, value: i64) -> Self {
        self.long_constants.push(value);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = PoolWriter::default();

        for value in &self.long_constants {
            pool.long(*value);
        }
        let this_index = pool.class(&self.name);
        let super_index = self.super_class.as_deref().map(|s| pool.class(s));
        let interface_indices: Vec<u16> = self.interfaces.iter().map(|i| pool.class(i)).collect();
        for r in &self.refs {
            let (tag, class, name, descriptor) = match r {
                PoolRef::Method { class, name } => (10, class, name, "()V"),
                PoolRef::InterfaceMethod { class, name } => (11, class, name, "()V"),
                PoolRef::Field { class, name } => (9, class, name, "I"),
            };
            pool.member_ref(tag, class, name, descriptor);
        }

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFEBABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());
        out.extend_from_slice(&pool.count().to_be_bytes());
        out.extend_from_slice(&pool.bytes);
        // ACC_PUBLIC | ACC_SUPER
        out.extend_from_slice(&0x0021u16.to_be_bytes());
        out.extend_from_slice(&this_index.to_be_bytes());
        out.extend_from_slice(&super_index.unwrap_or(0).to_be_bytes());
        out.extend_from_slice(&(interface_indices.len() as u16).to_be_bytes());
        for index in interface_indices {
            out.extend_from_slice(&index.to_be_bytes());
        }
        // fields, methods, attributes
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }
}

#[derive(Default)]
struct PoolWriter {
    bytes: Vec<u8>,
    next_index: u16,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
}

impl PoolWriter {
    fn count(&self) -> u16 {
        self.next_index.max(1)
    }

    fn take_index(&mut self, slots: u16) -> u16 {
        if self.next_index == 0 {
            self.next_index = 1;
        }
        let index = self.next_index;
        self.next_index += slots;
        index
    }

    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(index) = self.utf8.get(value) {
            return *index;
        }
        let index = self.take_index(1);
        self.bytes.push(1);
        self.bytes.extend_from_slice(&(value.len() as u16).to_be_bytes());
        self.bytes.extend_from_slice(value.as_bytes());
        self.utf8.insert(value.to_owned(), index);
        index
    }

    fn class(&mut self, name: &str) -> u16 {
        if let Some(index) = self.classes.get(name) {
            return *index;
        }
        let name_index = self.utf8(name);
        let index = self.take_index(1);
        self.bytes.push(7);
        self.bytes.extend_from_slice(&name_index.to_be_bytes());
        self.classes.insert(name.to_owned(), index);
        index
    }

    fn long(&mut self, value: i64) -> u16 {
        let index = self.take_index(2);
        self.bytes.push(5);
        self.bytes.extend_from_slice(&value.to_be_bytes());
        index
    }

    fn member_ref(&mut self, tag: u8, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);

        let nat_index = self.take_index(1);
        self.bytes.push(12);
        self.bytes.extend_from_slice(&name_index.to_be_bytes());
        self.bytes.extend_from_slice(&descriptor_index.to_be_bytes());

        let index = self.take_index(1);
        self.bytes.push(tag);
        self.bytes.extend_from_slice(&class_index.to_be_bytes());
        self.bytes.extend_from_slice(&nat_index.to_be_bytes());
        index
    }
}
