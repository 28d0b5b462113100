pub mod check;
pub mod sink;
pub mod source;
