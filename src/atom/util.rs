mod fourcc;
pub mod parser;
pub mod serializer;
mod time;

pub use fourcc::*;
pub use time::*;
