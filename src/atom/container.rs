use crate::FourCC;

pub const MOOV: FourCC = FourCC::new(b"moov");
pub const TRAK: FourCC = FourCC::new(b"trak");
pub const MDIA: FourCC = FourCC::new(b"mdia");
pub const MINF: FourCC = FourCC::new(b"minf");
pub const STBL: FourCC = FourCC::new(b"stbl");
pub const DINF: FourCC = FourCC::new(b"dinf");
pub const EDTS: FourCC = FourCC::new(b"edts");
pub const UDTA: FourCC = FourCC::new(b"udta");

const CONTAINER_ATOM_TYPES: [FourCC; 8] = [MOOV, TRAK, MDIA, MINF, STBL, DINF, EDTS, UDTA];

/// True for identifiers whose payload is a sequence of child atoms rather
/// than leaf data. Everything else is treated as a leaf, known or not.
pub fn is_container_atom(typ: FourCC) -> bool {
    CONTAINER_ATOM_TYPES.contains(&typ)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_classification() {
        assert!(is_container_atom(MOOV));
        assert!(is_container_atom(TRAK));
        assert!(!is_container_atom(FourCC::new(b"mvhd")));
        assert!(!is_container_atom(FourCC::new(b"free")));
    }
}
