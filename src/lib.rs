pub mod atom;
pub mod parser;
pub mod writer;

pub use atom::{Atom, AtomData, FourCC};
pub use parser::{read_atoms, Metadata, ParseError, Parser};
pub use writer::{GuardedSink, MovWriter, TreeContext, WriteError};
