//! C front-end: preprocessing, parsing and declaration/reference extraction

pub mod error;
pub mod parser_pool;
pub mod preprocess;
pub mod unit;

mod declarations;
mod references;


#[cfg(test)]
pub mod test_utils;

pub use error::{FrontendError, Result};
pub use parser_pool::{ParseRequest, ParseResult, ParserPool, create_parser_pool};
pub use preprocess::{Preprocessed, Preprocessor, SourceFile};
pub use unit::{CTranslationUnit, Frontend};
