use std::fmt;

use futures_io::AsyncWrite;

use crate::{
    atom::FourCC,
    parser::ParseAtomData,
    writer::{GuardedSink, SerializeAtom, TreeContext, WriteError},
    ParseError,
};

/// Opaque leaf atom for identifiers this crate has no model for. The
/// payload is carried through byte for byte.
#[derive(Clone)]
pub struct RawDataAtom {
    atom_type: FourCC,
    data: Vec<u8>,
}

impl RawDataAtom {
    pub fn new(atom_type: FourCC, data: Vec<u8>) -> Self {
        Self { atom_type, data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for RawDataAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Ellipsis(usize);
        impl fmt::Debug for Ellipsis {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "...({})", self.0)
            }
        }

        f.debug_struct("RawDataAtom")
            .field("atom_type", &self.atom_type)
            .field("data", &Ellipsis(self.data.len()))
            .finish()
    }
}

impl ParseAtomData for RawDataAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        Ok(Self {
            atom_type,
            data: input.to_vec(),
        })
    }
}

impl SerializeAtom for RawDataAtom {
    fn atom_type(&self) -> FourCC {
        self.atom_type
    }

    fn encoded_size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn write_atom_data<W: AsyncWrite + Unpin + Send>(
        &self,
        out: &mut GuardedSink<'_, W>,
        _ctx: TreeContext<'_>,
    ) -> Result<(), WriteError> {
        out.write_all(&self.data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::test_utils::atom_to_bytes;
    use crate::Atom;

    #[tokio::test]
    async fn test_raw_atom_passes_data_through() {
        let data = vec![1u8, 2, 3, 4, 5];
        let atom = Atom::leaf(RawDataAtom::new(FourCC::new(b"abcd"), data.clone()));
        let bytes = atom_to_bytes(&atom).await.unwrap();
        assert_eq!(&bytes[4..8], b"abcd");
        assert_eq!(&bytes[8..], &data[..]);
    }

    #[test]
    fn test_debug_elides_payload() {
        let atom = RawDataAtom::new(FourCC::new(b"abcd"), vec![0u8; 1024]);
        let formatted = format!("{atom:?}");
        assert!(formatted.contains("...(1024)"));
        assert!(!formatted.contains("0, 0, 0"));
    }
}
