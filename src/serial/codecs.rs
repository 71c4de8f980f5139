/// A codec for newline-delimited text lines.
pub(crate) mod lines;
