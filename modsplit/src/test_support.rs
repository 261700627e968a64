//! Fixtures shared by the unit tests: synthetic class files, archives and
//! a small namespace layout.

use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::{Read, Write},
    path::Path,
};

use zip::{write::SimpleFileOptions, ZipArchive, ZipWriter};

use crate::{
    config::{Layout, NamespaceRoot, Settings, DEFAULT_API_BASE},
    jar::types::module::{ModuleAnnotation, StabilityTier},
};

const ACC_PUBLIC: u16 = 0x0001;
const ACC_SUPER: u16 = 0x0020;

/// An annotation element value.
#[derive(Debug, Clone)]
pub enum Element {
    Str(String),
    /// Enum type descriptor and constant name.
    Enum(String, String),
    /// Class literal descriptor.
    Class(String),
    Array(Vec<Element>),
}

/// Assembles a class file with a hand-built constant pool.
#[derive(Debug)]
pub struct ClassBuilder {
    pool: Vec<u8>,
    next_index: u16,
    utf8s: HashMap<String, u16>,
    classes: HashMap<String, u16>,
    this_class: u16,
    super_class: u16,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
    annotations: Vec<Vec<u8>>,
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        let mut builder = ClassBuilder {
            pool: Vec::new(),
            next_index: 1,
            utf8s: HashMap::new(),
            classes: HashMap::new(),
            this_class: 0,
            super_class: 0,
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
            annotations: Vec::new(),
        };
        builder.this_class = builder.class(name);
        builder.super_class = builder.class("java/lang/Object");
        builder
    }

    fn push_constant(&mut self, bytes: &[u8], slots: u16) -> u16 {
        let index = self.next_index;
        self.pool.extend_from_slice(bytes);
        self.next_index += slots;
        index
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        if let Some(index) = self.utf8s.get(value) {
            return *index;
        }
        let mut bytes = vec![1];
        put_u16(&mut bytes, value.len() as u16);
        bytes.extend_from_slice(value.as_bytes());
        let index = self.push_constant(&bytes, 1);
        self.utf8s.insert(value.to_string(), index);
        index
    }

    pub fn class(&mut self, name: &str) -> u16 {
        if let Some(index) = self.classes.get(name) {
            return *index;
        }
        let name_index = self.utf8(name);
        let mut bytes = vec![7];
        put_u16(&mut bytes, name_index);
        let index = self.push_constant(&bytes, 1);
        self.classes.insert(name.to_string(), index);
        index
    }

    pub fn long(&mut self, value: u64) -> u16 {
        let mut bytes = vec![5];
        bytes.extend_from_slice(&value.to_be_bytes());
        self.push_constant(&bytes, 2)
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut bytes = vec![12];
        put_u16(&mut bytes, name_index);
        put_u16(&mut bytes, descriptor_index);
        self.push_constant(&bytes, 1)
    }

    fn member_ref(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(owner);
        let name_and_type = self.name_and_type(name, descriptor);
        let mut bytes = vec![tag];
        put_u16(&mut bytes, class_index);
        put_u16(&mut bytes, name_and_type);
        self.push_constant(&bytes, 1)
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(9, owner, name, descriptor)
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(10, owner, name, descriptor)
    }

    fn member(&mut self, name: &str, descriptor: &str, attributes: &[Vec<u8>]) -> Vec<u8> {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut bytes = Vec::new();
        put_u16(&mut bytes, ACC_PUBLIC);
        put_u16(&mut bytes, name_index);
        put_u16(&mut bytes, descriptor_index);
        put_u16(&mut bytes, attributes.len() as u16);
        for attribute in attributes {
            bytes.extend_from_slice(attribute);
        }
        bytes
    }

    fn attribute(&mut self, name: &str, info: &[u8]) -> Vec<u8> {
        let name_index = self.utf8(name);
        let mut bytes = Vec::new();
        put_u16(&mut bytes, name_index);
        put_u32(&mut bytes, info.len() as u32);
        bytes.extend_from_slice(info);
        bytes
    }

    pub fn field(&mut self, name: &str, descriptor: &str) {
        let field = self.member(name, descriptor, &[]);
        self.fields.push(field);
    }

    pub fn method(&mut self, name: &str, descriptor: &str) {
        let method = self.member(name, descriptor, &[]);
        self.methods.push(method);
    }

    /// A method whose `Code` carries a `LocalVariableTable` with `locals`
    /// as (name, descriptor) pairs.
    pub fn method_with_locals(&mut self, name: &str, descriptor: &str, locals: &[(&str, &str)]) {
        let mut table = Vec::new();
        put_u16(&mut table, locals.len() as u16);
        for (slot, (local_name, local_descriptor)) in locals.iter().enumerate() {
            let name_index = self.utf8(local_name);
            let descriptor_index = self.utf8(local_descriptor);
            put_u16(&mut table, 0);
            put_u16(&mut table, 1);
            put_u16(&mut table, name_index);
            put_u16(&mut table, descriptor_index);
            put_u16(&mut table, slot as u16);
        }
        let table = self.attribute("LocalVariableTable", &table);

        let mut code = Vec::new();
        put_u16(&mut code, 1);
        put_u16(&mut code, locals.len() as u16);
        put_u32(&mut code, 1);
        code.push(0xB1);
        put_u16(&mut code, 0);
        put_u16(&mut code, 1);
        code.extend_from_slice(&table);
        let code = self.attribute("Code", &code);

        let method = self.member(name, descriptor, &[code]);
        self.methods.push(method);
    }

    pub fn class_signature(&mut self, signature: &str) {
        let signature_index = self.utf8(signature);
        let attribute = self.attribute("Signature", &signature_index.to_be_bytes());
        self.attributes.push(attribute);
    }

    /// Adds a class annotation; all of them end up in one
    /// `RuntimeVisibleAnnotations` attribute.
    pub fn annotation(&mut self, descriptor: &str, elements: Vec<(&str, Element)>) {
        let type_index = self.utf8(descriptor);
        let mut bytes = Vec::new();
        put_u16(&mut bytes, type_index);
        put_u16(&mut bytes, elements.len() as u16);
        for (name, value) in &elements {
            let name_index = self.utf8(name);
            put_u16(&mut bytes, name_index);
            self.element(value, &mut bytes);
        }
        self.annotations.push(bytes);
    }

    fn element(&mut self, value: &Element, out: &mut Vec<u8>) {
        match value {
            Element::Str(value) => {
                out.push(b's');
                let index = self.utf8(value);
                put_u16(out, index);
            }
            Element::Enum(descriptor, constant) => {
                out.push(b'e');
                let type_index = self.utf8(descriptor);
                let const_index = self.utf8(constant);
                put_u16(out, type_index);
                put_u16(out, const_index);
            }
            Element::Class(descriptor) => {
                out.push(b'c');
                let index = self.utf8(descriptor);
                put_u16(out, index);
            }
            Element::Array(values) => {
                out.push(b'[');
                put_u16(out, values.len() as u16);
                for value in values {
                    self.element(value, out);
                }
            }
        }
    }

    pub fn build(mut self) -> Vec<u8> {
        if !self.annotations.is_empty() {
            let mut info = Vec::new();
            put_u16(&mut info, self.annotations.len() as u16);
            for annotation in &self.annotations {
                info.extend_from_slice(annotation);
            }
            let attribute = self.attribute("RuntimeVisibleAnnotations", &info);
            self.attributes.push(attribute);
        }

        let mut out = Vec::new();
        put_u32(&mut out, 0xCAFE_BABE);
        put_u16(&mut out, 0);
        put_u16(&mut out, 52);
        put_u16(&mut out, self.next_index);
        out.extend_from_slice(&self.pool);
        put_u16(&mut out, ACC_PUBLIC | ACC_SUPER);
        put_u16(&mut out, self.this_class);
        put_u16(&mut out, self.super_class);
        put_u16(&mut out, 0);
        for table in [&self.fields, &self.methods, &self.attributes] {
            put_u16(&mut out, table.len() as u16);
            for entry in table {
                out.extend_from_slice(entry);
            }
        }
        out
    }
}

pub fn test_layout() -> Layout {
    Layout::new(
        "Example",
        ["Lcom/example/Module;".to_string()],
        vec![
            NamespaceRoot::new("com/example/module/", true),
            NamespaceRoot::new("com/example/logic/", true)
                .with_name_prefix("logic", Some("LogicBlocks".to_string())),
            NamespaceRoot::new("com/example/", false),
        ],
    )
}

pub fn test_settings() -> Settings {
    let mut layout = test_layout();
    layout.content_prefixes = vec!["com/".into(), "assets/".into()];
    Settings {
        game_versions: vec![6756],
        api_token: None,
        api_base: DEFAULT_API_BASE.into(),
        projects: BTreeMap::new(),
        combo_modules: BTreeMap::new(),
        suppressed: Default::default(),
        layout,
    }
}

pub fn annotation_with_tier(name: &str, tier: StabilityTier) -> ModuleAnnotation {
    ModuleAnnotation {
        name: name.to_string(),
        tier: Some(tier),
        dependencies: Vec::new(),
        conflicts: Vec::new(),
    }
}

pub fn annotation(name: &str, dependencies: &[&str]) -> ModuleAnnotation {
    ModuleAnnotation {
        dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
        ..annotation_with_tier(name, StabilityTier::Stable)
    }
}

/// A class declaring module `module` with the given profile constant.
pub fn module_class(class_name: &str, module: &str, profile: &str, dependencies: &[&str]) -> Vec<u8> {
    let mut builder = ClassBuilder::new(class_name);
    builder.annotation(
        "Lcom/example/Module;",
        vec![
            ("name", Element::Str(module.to_string())),
            ("profile", Element::Enum("Lcom/example/Profile;".into(), profile.to_string())),
            (
                "dependencies",
                Element::Array(dependencies.iter().map(|d| Element::Str(d.to_string())).collect()),
            ),
        ],
    );
    builder.build()
}

/// A class calling one method on each of `references`.
pub fn plain_class(class_name: &str, references: &[&str]) -> Vec<u8> {
    let mut builder = ClassBuilder::new(class_name);
    for reference in references {
        builder.method_ref(reference, "run", "()V");
    }
    builder.build()
}

/// Writes an archive; names ending in `/` become directories.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    for (name, data) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
    }
    zip.finish().unwrap();
}

pub fn read_zip(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut entries = BTreeMap::new();
    for i in 0..zip.len() {
        let mut file = zip.by_index(i).unwrap();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        entries.insert(file.name().to_string(), data);
    }
    entries
}
