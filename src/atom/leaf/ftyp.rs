use bon::Builder;

use futures_io::AsyncWrite;

use crate::{
    atom::{util::serializer, FourCC},
    parser::ParseAtomData,
    writer::{GuardedSink, SerializeAtom, TreeContext, WriteError},
    ParseError,
};

pub const FTYP: FourCC = FourCC::new(b"ftyp");

pub const BRAND_QT: FourCC = FourCC::new(b"qt  ");

/// File type (`ftyp`) atom.
#[derive(Debug, Clone, Builder)]
pub struct FileTypeAtom {
    /// Brand identifying the file format
    #[builder(default = BRAND_QT)]
    pub major_brand: FourCC,
    /// Minor version of the major brand
    #[builder(default = 0)]
    pub minor_version: u32,
    /// Brands the file claims compatibility with
    #[builder(default = vec![BRAND_QT])]
    pub compatible_brands: Vec<FourCC>,
}

impl ParseAtomData for FileTypeAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        crate::atom::util::parser::assert_atom_type!(atom_type, FTYP);
        use crate::atom::util::parser::stream;
        use winnow::Parser;
        Ok(parser::parse_ftyp_data.parse(stream(input))?)
    }
}

impl SerializeAtom for FileTypeAtom {
    fn atom_type(&self) -> FourCC {
        FTYP
    }

    fn encoded_size(&self) -> u64 {
        8 + 4 * self.compatible_brands.len() as u64
    }

    async fn write_atom_data<W: AsyncWrite + Unpin + Send>(
        &self,
        out: &mut GuardedSink<'_, W>,
        _ctx: TreeContext<'_>,
    ) -> Result<(), WriteError> {
        out.write_all(&self.major_brand.into_bytes()).await?;
        out.write_all(&serializer::be_u32(self.minor_version))
            .await?;
        for brand in &self.compatible_brands {
            out.write_all(&brand.into_bytes()).await?;
        }
        Ok(())
    }
}

mod parser {
    use winnow::{
        binary::be_u32,
        combinator::{repeat, seq, trace},
        error::StrContext,
        ModalResult, Parser,
    };

    use super::FileTypeAtom;
    use crate::atom::util::parser::{fourcc, Stream};

    pub fn parse_ftyp_data(input: &mut Stream<'_>) -> ModalResult<FileTypeAtom> {
        trace(
            "ftyp",
            seq!(FileTypeAtom {
                major_brand: fourcc.context(StrContext::Label("major_brand")),
                minor_version: be_u32.context(StrContext::Label("minor_version")),
                compatible_brands: repeat(0.., fourcc)
                    .context(StrContext::Label("compatible_brands")),
            }),
        )
        .parse_next(input)
    }
}
