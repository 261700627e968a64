//! Scanner for field/method descriptors and generic signatures.
//!
//! Only the class names are of interest, so the scanner records every
//! `L...;` type it walks over and otherwise just checks the grammar well
//! enough to stay in sync.

use super::classfile::ClassFormatError;

struct Scanner<'s> {
    source: &'s str,
    bytes: &'s [u8],
    pos: usize,
}

impl<'s> Scanner<'s> {
    fn new(source: &'s str) -> Self {
        Scanner {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self) -> ClassFormatError {
        ClassFormatError::BadDescriptor(self.source.to_string())
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Result<u8, ClassFormatError> {
        let byte = self.peek().ok_or_else(|| self.error())?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, expected: u8) -> Result<(), ClassFormatError> {
        if self.bump()? != expected {
            return Err(self.error());
        }
        Ok(())
    }

    fn formal_type_parameters(&mut self, out: &mut Vec<String>) -> Result<(), ClassFormatError> {
        self.expect(b'<')?;
        while self.peek() != Some(b'>') {
            // identifier and the ':' opening the class bound
            while self.bump()? != b':' {}
            if matches!(self.peek(), Some(b'L') | Some(b'[') | Some(b'T')) {
                self.field_type(out)?;
            }
            while self.peek() == Some(b':') {
                self.pos += 1;
                self.field_type(out)?;
            }
        }
        self.expect(b'>')
    }

    fn field_type(&mut self, out: &mut Vec<String>) -> Result<(), ClassFormatError> {
        match self.bump()? {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V' => Ok(()),
            b'[' => self.field_type(out),
            b'T' => {
                while self.bump()? != b';' {}
                Ok(())
            }
            b'L' => self.class_type(out),
            _ => Err(self.error()),
        }
    }

    fn class_type(&mut self, out: &mut Vec<String>) -> Result<(), ClassFormatError> {
        let start = self.pos;
        let mut recorded = false;
        loop {
            let byte = self.bump()?;
            match byte {
                b';' | b'<' | b'.' => {
                    if !recorded {
                        let name = &self.source[start..self.pos - 1];
                        if name.is_empty() {
                            return Err(self.error());
                        }
                        out.push(name.to_string());
                        recorded = true;
                    }
                    match byte {
                        b';' => return Ok(()),
                        b'<' => self.type_arguments(out)?,
                        _ => {}
                    }
                }
                _ => {}
            }
        }
    }

    fn type_arguments(&mut self, out: &mut Vec<String>) -> Result<(), ClassFormatError> {
        loop {
            match self.peek() {
                Some(b'>') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(b'*') => {
                    self.pos += 1;
                }
                Some(b'+') | Some(b'-') => {
                    self.pos += 1;
                    self.field_type(out)?;
                }
                Some(_) => self.field_type(out)?,
                None => return Err(self.error()),
            }
        }
    }
}

/// Appends every class name mentioned in `signature` to `out`.
///
/// Accepts plain field descriptors, method descriptors and the generic
/// class/method/field signatures found in `Signature` attributes.
pub fn collect_type_names(signature: &str, out: &mut Vec<String>) -> Result<(), ClassFormatError> {
    let mut scanner = Scanner::new(signature);
    if scanner.peek() == Some(b'<') {
        scanner.formal_type_parameters(out)?;
    }
    while let Some(byte) = scanner.peek() {
        match byte {
            b'(' | b')' | b'^' => scanner.pos += 1,
            _ => scanner.field_type(out)?,
        }
    }
    Ok(())
}

/// Class name held by a `Class` constant: either an internal name or an
/// array descriptor.
pub fn collect_class_constant(name: &str, out: &mut Vec<String>) -> Result<(), ClassFormatError> {
    if name.starts_with('[') {
        collect_type_names(name, out)
    } else {
        out.push(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(signature: &str) -> Vec<String> {
        let mut out = Vec::new();
        collect_type_names(signature, &mut out).unwrap();
        out
    }

    #[test]
    fn field_descriptors() {
        assert_eq!(names("I"), Vec::<String>::new());
        assert_eq!(names("Lcom/example/Foo;"), vec!["com/example/Foo"]);
        assert_eq!(names("[[Lcom/example/Foo;"), vec!["com/example/Foo"]);
    }

    #[test]
    fn method_descriptor() {
        assert_eq!(
            names("(ILjava/lang/String;[J)Lcom/example/Bar;"),
            vec!["java/lang/String", "com/example/Bar"]
        );
    }

    #[test]
    fn generic_class_signature() {
        assert_eq!(
            names("<T:Ljava/lang/Object;U::Ljava/lang/Comparable<TT;>;>Lcom/example/Base<TT;>;Ljava/util/List<+Lcom/example/Item;>;"),
            vec![
                "java/lang/Object",
                "java/lang/Comparable",
                "com/example/Base",
                "java/util/List",
                "com/example/Item"
            ]
        );
    }

    #[test]
    fn generic_method_signature_with_inner_and_throws() {
        assert_eq!(
            names("<E:Ljava/lang/Exception;>(Lcom/example/Outer<*>.Inner;)V^TE;^Lcom/example/Oops;"),
            vec!["java/lang/Exception", "com/example/Outer", "com/example/Oops"]
        );
    }

    #[test]
    fn class_constants() {
        let mut out = Vec::new();
        collect_class_constant("com/example/Foo", &mut out).unwrap();
        collect_class_constant("[Lcom/example/Bar;", &mut out).unwrap();
        collect_class_constant("[I", &mut out).unwrap();
        assert_eq!(out, vec!["com/example/Foo", "com/example/Bar"]);
    }

    #[test]
    fn rejects_unterminated_type() {
        let mut out = Vec::new();
        assert!(collect_type_names("Lcom/example/Foo", &mut out).is_err());
        assert!(collect_type_names("Q", &mut out).is_err());
    }
}
