use tracing::{debug, warn};

use crate::{
    config::Layout,
    jar::{
        core::{
            annotation::{class_annotations, Annotation, ElementValue},
            classfile::{ClassFile, ClassFormatError},
        },
        types::module::{ModuleAnnotation, StabilityTier},
    },
};

/// The module declaration annotation on `class`, if it carries one.
pub fn find_declaration<'c>(
    class: &ClassFile<'_>,
    annotations: &'c [Annotation],
    layout: &Layout,
) -> Result<Option<&'c Annotation>, ClassFormatError> {
    for annotation in annotations {
        if layout
            .annotations
            .contains(&*class.pool.utf8(annotation.type_index)?)
        {
            return Ok(Some(annotation));
        }
    }
    Ok(None)
}

/// Reads the module declaration off `class`.
///
/// Units without the annotation yield `None`. An annotation without a
/// `name` element is malformed.
pub fn scan_for_module_declaration(
    class: &ClassFile<'_>,
    layout: &Layout,
) -> Result<Option<ModuleAnnotation>, ClassFormatError> {
    let annotations = class_annotations(class)?;
    let Some(annotation) = find_declaration(class, &annotations, layout)? else {
        return Ok(None);
    };
    let pool = &class.pool;
    let elements = &layout.elements;

    let name = annotation
        .element(pool, &elements.name)?
        .map(|value| value.as_string(pool))
        .transpose()?
        .flatten()
        .ok_or_else(|| ClassFormatError::BadIndex {
            index: annotation.type_index,
            expected: "module annotation with a name",
        })?;

    let tier = match annotation.element(pool, &elements.profile)? {
        Some(ElementValue::Enum { const_index, .. }) => {
            let constant = pool.utf8(*const_index)?;
            match constant.parse::<StabilityTier>() {
                Ok(tier) => Some(tier),
                Err(_) => {
                    debug!("{} has profile {}, treating it as undeclared", name, constant);
                    None
                }
            }
        }
        Some(_) => {
            warn!("{} has a profile that is not an enum constant", name);
            None
        }
        None => None,
    };

    let strings = |element: &str| -> Result<Vec<String>, ClassFormatError> {
        match annotation.element(pool, element)? {
            Some(value) => value.as_strings(pool),
            None => Ok(Vec::new()),
        }
    };

    Ok(Some(ModuleAnnotation {
        dependencies: strings(&elements.dependencies)?,
        conflicts: strings(&elements.conflicts)?,
        name,
        tier,
    }))
}
