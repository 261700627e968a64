use super::classfile::{Attribute, ClassFile, ClassFormatError, ConstantPool, Cursor};

pub const VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
pub const INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";
pub const VISIBLE_PARAMETER_ANNOTATIONS: &str = "RuntimeVisibleParameterAnnotations";
pub const INVISIBLE_PARAMETER_ANNOTATIONS: &str = "RuntimeInvisibleParameterAnnotations";
pub const ANNOTATION_DEFAULT: &str = "AnnotationDefault";

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub type_index: u16,
    pub elements: Vec<ElementPair>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementPair {
    pub name_index: u16,
    pub value: ElementValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// Primitive or string constant; `tag` is one of `BCDFIJSZs`.
    Const { tag: u8, index: u16 },
    Enum {
        type_index: u16,
        const_index: u16,
        /// Absolute offset of `const_index` in the class bytes.
        const_offset: usize,
    },
    Class(u16),
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}

impl Annotation {
    pub fn element<'s>(
        &'s self,
        pool: &ConstantPool<'_>,
        name: &str,
    ) -> Result<Option<&'s ElementValue>, ClassFormatError> {
        for pair in &self.elements {
            if pool.utf8(pair.name_index)? == name {
                return Ok(Some(&pair.value));
            }
        }
        Ok(None)
    }
}

impl ElementValue {
    /// String payload of an `s` constant.
    pub fn as_string(&self, pool: &ConstantPool<'_>) -> Result<Option<String>, ClassFormatError> {
        match self {
            ElementValue::Const { tag: b's', index } => Ok(Some(pool.utf8(*index)?.into_owned())),
            _ => Ok(None),
        }
    }

    /// Every string in an array value, or the value itself when it is a lone string.
    pub fn as_strings(&self, pool: &ConstantPool<'_>) -> Result<Vec<String>, ClassFormatError> {
        match self {
            ElementValue::Array(values) => {
                let mut strings = Vec::with_capacity(values.len());
                for value in values {
                    if let Some(string) = value.as_string(pool)? {
                        strings.push(string);
                    }
                }
                Ok(strings)
            }
            other => Ok(other.as_string(pool)?.into_iter().collect()),
        }
    }
}

pub fn is_annotation_attribute(name: &str) -> bool {
    name == VISIBLE_ANNOTATIONS || name == INVISIBLE_ANNOTATIONS
}

pub fn is_parameter_annotation_attribute(name: &str) -> bool {
    name == VISIBLE_PARAMETER_ANNOTATIONS || name == INVISIBLE_PARAMETER_ANNOTATIONS
}

/// Decodes a `Runtime{Visible,Invisible}Annotations` body.
pub fn parse_annotations(
    class: &ClassFile<'_>,
    attribute: &Attribute<'_>,
) -> Result<Vec<Annotation>, ClassFormatError> {
    let mut cursor = Cursor::bounded(class.bytes, attribute.offset, attribute.info.len());
    let count = cursor.u16()?;
    (0..count).map(|_| parse_annotation(&mut cursor)).collect()
}

/// Decodes a `Runtime{Visible,Invisible}ParameterAnnotations` body, flattened
/// over all parameters.
pub fn parse_parameter_annotations(
    class: &ClassFile<'_>,
    attribute: &Attribute<'_>,
) -> Result<Vec<Annotation>, ClassFormatError> {
    let mut cursor = Cursor::bounded(class.bytes, attribute.offset, attribute.info.len());
    let parameters = cursor.u8()?;
    let mut annotations = Vec::new();
    for _ in 0..parameters {
        let count = cursor.u16()?;
        for _ in 0..count {
            annotations.push(parse_annotation(&mut cursor)?);
        }
    }
    Ok(annotations)
}

pub fn parse_annotation_default(
    class: &ClassFile<'_>,
    attribute: &Attribute<'_>,
) -> Result<ElementValue, ClassFormatError> {
    let mut cursor = Cursor::bounded(class.bytes, attribute.offset, attribute.info.len());
    parse_element_value(&mut cursor)
}

/// Class-level annotations, visible and invisible.
pub fn class_annotations(class: &ClassFile<'_>) -> Result<Vec<Annotation>, ClassFormatError> {
    let mut annotations = Vec::new();
    for attribute in &class.attributes {
        if is_annotation_attribute(&class.attribute_name(attribute)?) {
            annotations.extend(parse_annotations(class, attribute)?);
        }
    }
    Ok(annotations)
}

fn parse_annotation(cursor: &mut Cursor<'_>) -> Result<Annotation, ClassFormatError> {
    let type_index = cursor.u16()?;
    let count = cursor.u16()?;
    let mut elements = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = cursor.u16()?;
        let value = parse_element_value(cursor)?;
        elements.push(ElementPair { name_index, value });
    }
    Ok(Annotation {
        type_index,
        elements,
    })
}

fn parse_element_value(cursor: &mut Cursor<'_>) -> Result<ElementValue, ClassFormatError> {
    let tag = cursor.u8()?;
    let value = match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => ElementValue::Const {
            tag,
            index: cursor.u16()?,
        },
        b'e' => {
            let type_index = cursor.u16()?;
            let const_offset = cursor.pos();
            let const_index = cursor.u16()?;
            ElementValue::Enum {
                type_index,
                const_index,
                const_offset,
            }
        }
        b'c' => ElementValue::Class(cursor.u16()?),
        b'@' => ElementValue::Annotation(parse_annotation(cursor)?),
        b'[' => {
            let count = cursor.u16()?;
            let values = (0..count)
                .map(|_| parse_element_value(cursor))
                .collect::<Result<Vec<_>, _>>()?;
            ElementValue::Array(values)
        }
        other => return Err(ClassFormatError::BadElementTag(other as char)),
    };
    Ok(value)
}
