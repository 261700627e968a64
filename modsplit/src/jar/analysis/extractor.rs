//! Symbol extraction from a compiled unit.

use std::collections::BTreeSet;

use crate::jar::core::{
    annotation::{
        is_annotation_attribute, is_parameter_annotation_attribute, parse_annotation_default,
        parse_annotations, parse_parameter_annotations, Annotation, ElementValue, ANNOTATION_DEFAULT,
    },
    classfile::{parse, Attribute, ClassFile, ClassFormatError, Constant, UnitError},
    descriptor::{collect_class_constant, collect_type_names},
};

const SIGNATURE: &str = "Signature";
const CODE: &str = "Code";
const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
const LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";

/// Everything one compiled unit refers to, as internal class names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassReferences {
    pub name: String,
    /// Referenced class names, the unit's own name excluded.
    pub symbols: BTreeSet<String>,
}

pub fn extract_references(data: &[u8], unit_path: &str) -> Result<ClassReferences, UnitError> {
    let class = parse(data).map_err(|e| UnitError::new(unit_path, e))?;
    references_of(&class).map_err(|e| UnitError::new(unit_path, e))
}

pub fn references_of(class: &ClassFile<'_>) -> Result<ClassReferences, ClassFormatError> {
    let mut names = Vec::new();

    for constant in class.pool.iter() {
        match constant {
            Constant::Class(name) => collect_class_constant(&class.pool.utf8(*name)?, &mut names)?,
            Constant::NameAndType { descriptor, .. } | Constant::MethodType(descriptor) => {
                collect_type_names(&class.pool.utf8(*descriptor)?, &mut names)?
            }
            _ => {}
        }
    }

    for member in class.fields.iter().chain(&class.methods) {
        collect_type_names(&class.pool.utf8(member.descriptor_index)?, &mut names)?;
        walk_attributes(class, &member.attributes, &mut names)?;
    }
    walk_attributes(class, &class.attributes, &mut names)?;

    let name = class.name()?.into_owned();
    let mut symbols = names.into_iter().collect::<BTreeSet<_>>();
    symbols.remove(&name);
    Ok(ClassReferences { name, symbols })
}

fn walk_attributes(
    class: &ClassFile<'_>,
    attributes: &[Attribute<'_>],
    out: &mut Vec<String>,
) -> Result<(), ClassFormatError> {
    for attribute in attributes {
        let name = class.attribute_name(attribute)?;
        match &*name {
            SIGNATURE => {
                let index = class.cursor_for(attribute).u16()?;
                collect_type_names(&class.pool.utf8(index)?, out)?;
            }
            CODE => walk_attributes(class, &class.code_attributes(attribute)?, out)?,
            LOCAL_VARIABLE_TABLE | LOCAL_VARIABLE_TYPE_TABLE => {
                let mut cursor = class.cursor_for(attribute);
                let count = cursor.u16()?;
                for _ in 0..count {
                    // start_pc, length, name_index
                    cursor.skip(6)?;
                    let descriptor = cursor.u16()?;
                    cursor.skip(2)?;
                    collect_type_names(&class.pool.utf8(descriptor)?, out)?;
                }
            }
            ANNOTATION_DEFAULT => {
                element_types(class, &parse_annotation_default(class, attribute)?, out)?
            }
            other if is_annotation_attribute(other) => {
                for annotation in parse_annotations(class, attribute)? {
                    annotation_types(class, &annotation, out)?;
                }
            }
            other if is_parameter_annotation_attribute(other) => {
                for annotation in parse_parameter_annotations(class, attribute)? {
                    annotation_types(class, &annotation, out)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn annotation_types(
    class: &ClassFile<'_>,
    annotation: &Annotation,
    out: &mut Vec<String>,
) -> Result<(), ClassFormatError> {
    collect_type_names(&class.pool.utf8(annotation.type_index)?, out)?;
    for pair in &annotation.elements {
        element_types(class, &pair.value, out)?;
    }
    Ok(())
}

fn element_types(
    class: &ClassFile<'_>,
    value: &ElementValue,
    out: &mut Vec<String>,
) -> Result<(), ClassFormatError> {
    match value {
        ElementValue::Const { .. } => {}
        ElementValue::Enum { type_index, .. } => {
            collect_type_names(&class.pool.utf8(*type_index)?, out)?
        }
        ElementValue::Class(index) => collect_type_names(&class.pool.utf8(*index)?, out)?,
        ElementValue::Annotation(nested) => annotation_types(class, nested, out)?,
        ElementValue::Array(values) => {
            for value in values {
                element_types(class, value, out)?;
            }
        }
    }
    Ok(())
}
