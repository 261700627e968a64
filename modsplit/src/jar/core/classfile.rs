//! Reader for the JVM class-file container.
//!
//! Only the structure is decoded: the constant pool, the member tables and
//! the attribute headers. Attribute bodies stay as borrowed slices together
//! with their absolute offset in the original buffer, so later passes can
//! decode the few attributes they care about and patch bytes in place.

use std::borrow::Cow;

use thiserror::Error;
use tracing::debug;

pub const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassFormatError {
    #[error("bad magic 0x{0:08x}")]
    BadMagic(u32),
    #[error("unexpected end of data at offset {offset} (wanted {wanted} bytes)")]
    Truncated { offset: usize, wanted: usize },
    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownTag { tag: u8, index: usize },
    #[error("constant pool index {index} is not a {expected}")]
    BadIndex { index: u16, expected: &'static str },
    #[error("malformed descriptor {0:?}")]
    BadDescriptor(String),
    #[error("unknown element value tag {0:?}")]
    BadElementTag(char),
    #[error("constant pool is full")]
    PoolOverflow,
}

/// A class-file error tied to the archive entry it came from.
#[derive(Debug, Error)]
#[error("{unit}: {source}")]
pub struct UnitError {
    pub unit: String,
    #[source]
    pub source: ClassFormatError,
}

impl UnitError {
    pub fn new(unit: impl Into<String>, source: ClassFormatError) -> Self {
        UnitError {
            unit: unit.into(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Cursor {
            data,
            pos: 0,
            end: data.len(),
        }
    }

    /// Cursor over `data[start..start + len]` that keeps absolute positions.
    pub(crate) fn bounded(data: &'a [u8], start: usize, len: usize) -> Self {
        Cursor {
            data,
            pos: start,
            end: (start + len).min(data.len()),
        }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.end - self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], ClassFormatError> {
        if n > self.remaining() {
            return Err(ClassFormatError::Truncated {
                offset: self.pos,
                wanted: n,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), ClassFormatError> {
        self.take(n).map(|_| ())
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ClassFormatError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, ClassFormatError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ClassFormatError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, ClassFormatError> {
        let high = self.u32()? as u64;
        let low = self.u32()? as u64;
        Ok(high << 32 | low)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant<'a> {
    /// Slot 0 and the second slot of a long or double.
    Unusable,
    Utf8(&'a [u8]),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class(u16),
    String(u16),
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPool<'a>(pub Vec<Constant<'a>>);

impl<'a> ConstantPool<'a> {
    /// The `constant_pool_count` as stored in the class file.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.len() <= 1
    }

    pub fn get(&self, index: u16) -> Option<&Constant<'a>> {
        self.0.get(index as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constant<'a>> {
        self.0.iter()
    }

    pub fn utf8(&self, index: u16) -> Result<Cow<'a, str>, ClassFormatError> {
        match self.get(index) {
            Some(Constant::Utf8(bytes)) => Ok(String::from_utf8_lossy(bytes)),
            _ => Err(ClassFormatError::BadIndex {
                index,
                expected: "Utf8",
            }),
        }
    }

    pub fn class_name(&self, index: u16) -> Result<Cow<'a, str>, ClassFormatError> {
        match self.get(index) {
            Some(Constant::Class(name)) => self.utf8(*name),
            _ => Err(ClassFormatError::BadIndex {
                index,
                expected: "Class",
            }),
        }
    }

    pub fn find_utf8(&self, value: &str) -> Option<u16> {
        self.0.iter().position(|entry| {
            matches!(entry, Constant::Utf8(bytes) if *bytes == value.as_bytes())
        })
        .map(|index| index as u16)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute<'a> {
    pub name_index: u16,
    /// Absolute offset of `info` in the class bytes.
    pub offset: usize,
    pub info: &'a [u8],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member<'a> {
    pub access: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute<'a>>,
}

#[derive(Debug, Clone)]
pub struct ClassFile<'a> {
    pub bytes: &'a [u8],
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool<'a>,
    /// Offset of the first byte after the constant pool.
    pub pool_end: usize,
    pub access: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Member<'a>>,
    pub methods: Vec<Member<'a>>,
    pub attributes: Vec<Attribute<'a>>,
}

impl<'a> ClassFile<'a> {
    pub fn name(&self) -> Result<Cow<'a, str>, ClassFormatError> {
        self.pool.class_name(self.this_class)
    }

    pub fn attribute_name(&self, attribute: &Attribute<'a>) -> Result<Cow<'a, str>, ClassFormatError> {
        self.pool.utf8(attribute.name_index)
    }

    pub(crate) fn cursor_for(&self, attribute: &Attribute<'a>) -> Cursor<'a> {
        Cursor::bounded(self.bytes, attribute.offset, attribute.info.len())
    }

    /// Attributes nested inside a `Code` attribute.
    pub fn code_attributes(&self, code: &Attribute<'a>) -> Result<Vec<Attribute<'a>>, ClassFormatError> {
        let mut cursor = self.cursor_for(code);
        cursor.skip(4)?;
        let code_length = cursor.u32()? as usize;
        cursor.skip(code_length)?;
        let exception_table_length = cursor.u16()? as usize;
        cursor.skip(exception_table_length * 8)?;
        parse_attributes(&mut cursor)
    }
}

pub fn parse(bytes: &[u8]) -> Result<ClassFile<'_>, ClassFormatError> {
    let mut cursor = Cursor::new(bytes);

    let magic = cursor.u32()?;
    if magic != MAGIC {
        return Err(ClassFormatError::BadMagic(magic));
    }
    let minor_version = cursor.u16()?;
    let major_version = cursor.u16()?;

    let pool = parse_pool(&mut cursor)?;
    let pool_end = cursor.pos();

    let access = cursor.u16()?;
    let this_class = cursor.u16()?;
    let super_class = cursor.u16()?;
    let interface_count = cursor.u16()?;
    let interfaces = (0..interface_count)
        .map(|_| cursor.u16())
        .collect::<Result<Vec<_>, _>>()?;

    let fields = parse_members(&mut cursor)?;
    let methods = parse_members(&mut cursor)?;
    let attributes = parse_attributes(&mut cursor)?;

    if cursor.remaining() != 0 {
        debug!("ignoring {} trailing bytes after the last attribute", cursor.remaining());
    }

    Ok(ClassFile {
        bytes,
        minor_version,
        major_version,
        pool,
        pool_end,
        access,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
    })
}

fn parse_pool<'a>(cursor: &mut Cursor<'a>) -> Result<ConstantPool<'a>, ClassFormatError> {
    let count = cursor.u16()? as usize;
    let mut entries = Vec::with_capacity(count.max(1));
    entries.push(Constant::Unusable);

    while entries.len() < count {
        let index = entries.len();
        let tag = cursor.u8()?;
        let constant = match tag {
            1 => {
                let length = cursor.u16()? as usize;
                Constant::Utf8(cursor.take(length)?)
            }
            3 => Constant::Integer(cursor.u32()?),
            4 => Constant::Float(cursor.u32()?),
            5 => Constant::Long(cursor.u64()?),
            6 => Constant::Double(cursor.u64()?),
            7 => Constant::Class(cursor.u16()?),
            8 => Constant::String(cursor.u16()?),
            9 => Constant::FieldRef {
                class: cursor.u16()?,
                name_and_type: cursor.u16()?,
            },
            10 => Constant::MethodRef {
                class: cursor.u16()?,
                name_and_type: cursor.u16()?,
            },
            11 => Constant::InterfaceMethodRef {
                class: cursor.u16()?,
                name_and_type: cursor.u16()?,
            },
            12 => Constant::NameAndType {
                name: cursor.u16()?,
                descriptor: cursor.u16()?,
            },
            15 => Constant::MethodHandle {
                kind: cursor.u8()?,
                reference: cursor.u16()?,
            },
            16 => Constant::MethodType(cursor.u16()?),
            17 => Constant::Dynamic {
                bootstrap: cursor.u16()?,
                name_and_type: cursor.u16()?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap: cursor.u16()?,
                name_and_type: cursor.u16()?,
            },
            19 => Constant::Module(cursor.u16()?),
            20 => Constant::Package(cursor.u16()?),
            tag => return Err(ClassFormatError::UnknownTag { tag, index }),
        };

        let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
        entries.push(constant);
        if wide {
            entries.push(Constant::Unusable);
        }
    }

    Ok(ConstantPool(entries))
}

fn parse_members<'a>(cursor: &mut Cursor<'a>) -> Result<Vec<Member<'a>>, ClassFormatError> {
    let count = cursor.u16()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        members.push(Member {
            access: cursor.u16()?,
            name_index: cursor.u16()?,
            descriptor_index: cursor.u16()?,
            attributes: parse_attributes(cursor)?,
        });
    }
    Ok(members)
}

pub(crate) fn parse_attributes<'a>(
    cursor: &mut Cursor<'a>,
) -> Result<Vec<Attribute<'a>>, ClassFormatError> {
    let count = cursor.u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = cursor.u16()?;
        let length = cursor.u32()? as usize;
        let offset = cursor.pos();
        let info = cursor.take(length)?;
        attributes.push(Attribute {
            name_index,
            offset,
            info,
        });
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ClassBuilder;

    #[test]
    fn parses_minimal_class() {
        let bytes = ClassBuilder::new("com/example/Foo").build();
        let class = parse(&bytes).unwrap();

        assert_eq!(class.name().unwrap(), "com/example/Foo");
        assert_eq!(class.pool.class_name(class.super_class).unwrap(), "java/lang/Object");
        assert!(class.fields.is_empty());
        assert!(class.attributes.is_empty());
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let mut builder = ClassBuilder::new("com/example/Wide");
        let long_index = builder.long(42);
        let after = builder.utf8("after");
        let bytes = builder.build();
        let class = parse(&bytes).unwrap();

        assert_eq!(after, long_index + 2);
        assert_eq!(class.pool.get(long_index + 1), Some(&Constant::Unusable));
        assert_eq!(class.pool.utf8(after).unwrap(), "after");
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = ClassBuilder::new("com/example/Foo").build();
        bytes[0] = 0;
        assert!(matches!(parse(&bytes), Err(ClassFormatError::BadMagic(_))));
    }

    #[test]
    fn rejects_truncated_class() {
        let bytes = ClassBuilder::new("com/example/Foo").build();
        let err = parse(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, ClassFormatError::Truncated { .. }));
    }

    #[test]
    fn tolerates_trailing_data() {
        let mut bytes = ClassBuilder::new("com/example/Foo").build();
        bytes.extend_from_slice(&[0, 0, 0]);
        let class = parse(&bytes).unwrap();
        assert_eq!(class.name().unwrap(), "com/example/Foo");
        assert!(class.attributes.is_empty());
    }

    #[test]
    fn attribute_offsets_point_into_the_buffer() {
        let mut builder = ClassBuilder::new("com/example/Sig");
        builder.class_signature("Ljava/util/ArrayList<Lcom/example/Item;>;");
        let bytes = builder.build();
        let class = parse(&bytes).unwrap();

        let attribute = &class.attributes[0];
        assert_eq!(class.attribute_name(attribute).unwrap(), "Signature");
        assert_eq!(
            &bytes[attribute.offset..attribute.offset + attribute.info.len()],
            attribute.info
        );
    }
}
