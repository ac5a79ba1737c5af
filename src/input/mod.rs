//! Reading source text from a file or stdin.

mod reader;

pub use reader::InputReader;
