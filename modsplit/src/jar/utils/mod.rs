//! Path helpers shared by the analysis and packaging passes.

pub mod paths;

pub use paths::{class_name_of, has_path_prefix, parent_dir, strip_inner_class};
