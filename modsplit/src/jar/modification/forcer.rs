//! Forces the profile of a module declaration so the unit activates on its
//! own once shipped in a standalone archive.

use tracing::debug;

use crate::{
    config::Layout,
    jar::{
        analysis::scanner::find_declaration,
        core::{
            annotation::{class_annotations, ElementValue},
            classfile::{parse, ClassFormatError},
        },
    },
};

const CONSTANT_POOL_COUNT_OFFSET: usize = 8;
const TAG_UTF8: u8 = 1;

/// Rewrites the declaration's profile constant to `layout.forced_tier`.
///
/// Returns `None` when the unit declares no module, has no profile, or its
/// profile is the exempt or the forced constant already. Only the constant
/// pool and the enum's `const_name_index` change; every other byte stays.
pub fn force_module_profile(data: &[u8], layout: &Layout) -> Result<Option<Vec<u8>>, ClassFormatError> {
    let class = parse(data)?;
    let annotations = class_annotations(&class)?;
    let Some(declaration) = find_declaration(&class, &annotations, layout)? else {
        return Ok(None);
    };

    let mut offsets = Vec::new();
    collect_profile_offsets(declaration.element(&class.pool, &layout.elements.profile)?, &mut offsets);

    let mut targets = Vec::new();
    for (const_index, const_offset) in offsets {
        let value = class.pool.utf8(const_index)?;
        if value != layout.exempt_tier && value != layout.forced_tier {
            debug!("forcing profile {} -> {}", value, layout.forced_tier);
            targets.push(const_offset);
        }
    }
    if targets.is_empty() {
        return Ok(None);
    }

    let (mut patched, forced_index, shift) = match class.pool.find_utf8(&layout.forced_tier) {
        Some(index) => (data.to_vec(), index, 0),
        None => append_utf8(data, class.pool.len(), class.pool_end, &layout.forced_tier)?,
    };

    for offset in targets {
        let at = offset + shift;
        patched[at..at + 2].copy_from_slice(&forced_index.to_be_bytes());
    }
    Ok(Some(patched))
}

fn collect_profile_offsets(value: Option<&ElementValue>, out: &mut Vec<(u16, usize)>) {
    match value {
        Some(ElementValue::Enum {
            const_index,
            const_offset,
            ..
        }) => out.push((*const_index, *const_offset)),
        Some(ElementValue::Array(values)) => {
            for value in values {
                collect_profile_offsets(Some(value), out);
            }
        }
        _ => {}
    }
}

/// Copy of `data` with a new `Utf8` constant at the end of the pool.
/// Returns the copy, the new constant's index and how far the bytes after
/// the pool moved.
fn append_utf8(
    data: &[u8],
    pool_count: usize,
    pool_end: usize,
    value: &str,
) -> Result<(Vec<u8>, u16, usize), ClassFormatError> {
    let index = u16::try_from(pool_count).map_err(|_| ClassFormatError::PoolOverflow)?;
    let count = index.checked_add(1).ok_or(ClassFormatError::PoolOverflow)?;
    let length = u16::try_from(value.len()).map_err(|_| ClassFormatError::PoolOverflow)?;

    let mut entry = Vec::with_capacity(3 + value.len());
    entry.push(TAG_UTF8);
    entry.extend_from_slice(&length.to_be_bytes());
    entry.extend_from_slice(value.as_bytes());

    let mut patched = Vec::with_capacity(data.len() + entry.len());
    patched.extend_from_slice(&data[..pool_end]);
    patched.extend_from_slice(&entry);
    patched.extend_from_slice(&data[pool_end..]);
    patched[CONSTANT_POOL_COUNT_OFFSET..CONSTANT_POOL_COUNT_OFFSET + 2]
        .copy_from_slice(&count.to_be_bytes());

    Ok((patched, index, entry.len()))
}
