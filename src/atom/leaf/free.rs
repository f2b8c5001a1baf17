use futures_io::AsyncWrite;

use crate::{
    atom::FourCC,
    parser::ParseAtomData,
    writer::{GuardedSink, SerializeAtom, TreeContext, WriteError},
    ParseError,
};

pub const FREE: FourCC = FourCC::new(b"free");
pub const SKIP: FourCC = FourCC::new(b"skip");

/// Padding (`free` / `skip`) atom. Only the length matters; the contents
/// are discarded when parsing and written back as zeros.
#[derive(Debug, Clone)]
pub struct FreeAtom {
    atom_type: FourCC,
    size: u64,
}

impl FreeAtom {
    pub fn new(size: u64) -> Self {
        Self {
            atom_type: FREE,
            size,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl ParseAtomData for FreeAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        if atom_type != FREE && atom_type != SKIP {
            return Err(ParseError::unexpected_atom(atom_type, FREE));
        }
        Ok(Self {
            atom_type,
            size: input.len() as u64,
        })
    }
}

impl SerializeAtom for FreeAtom {
    fn atom_type(&self) -> FourCC {
        self.atom_type
    }

    fn encoded_size(&self) -> u64 {
        self.size
    }

    async fn write_atom_data<W: AsyncWrite + Unpin + Send>(
        &self,
        out: &mut GuardedSink<'_, W>,
        _ctx: TreeContext<'_>,
    ) -> Result<(), WriteError> {
        out.write_zeros(self.size).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::test_utils::atom_to_bytes;
    use crate::Atom;

    #[tokio::test]
    async fn test_free_atom_writes_zeros() {
        let atom = Atom::leaf(FreeAtom::new(16));
        assert_eq!(atom.declared_size(), 24);
        let bytes = atom_to_bytes(&atom).await.unwrap();
        assert_eq!(&bytes[4..8], b"free");
        assert_eq!(&bytes[8..], &[0u8; 16]);
    }

    #[test]
    fn test_parse_discards_contents() {
        let parsed = FreeAtom::parse_atom_data(SKIP, &[0xAB; 10]).unwrap();
        assert_eq!(parsed.size(), 10);
        assert_eq!(parsed.atom_type(), SKIP);
    }
}
