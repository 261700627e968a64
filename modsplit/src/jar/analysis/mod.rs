//! Static analysis of compiled units
//!
//! Symbol extraction, module declaration discovery and the cross-module
//! reference check.

pub mod extractor;
pub mod scanner;
pub mod verifier;

pub use extractor::{extract_references, references_of, ClassReferences};
pub use scanner::scan_for_module_declaration;
pub use verifier::{dependency_reaches, verify_unit, VerificationReport, Violation};
