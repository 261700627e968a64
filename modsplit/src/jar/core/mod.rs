//! Core class-file operations
//!
//! Parsing of the class-file container, annotation decoding and the
//! descriptor scanner shared by discovery, verification and rewriting.

pub mod annotation;
pub mod classfile;
pub mod descriptor;

pub use annotation::{class_annotations, Annotation, ElementValue};
pub use classfile::{parse, ClassFile, ClassFormatError, Constant, ConstantPool, UnitError};
pub use descriptor::{collect_class_constant, collect_type_names};
