pub mod chain;
pub mod iv_extract;
pub mod term_structure;
