use bon::Builder;

use std::time::Duration;

use futures_io::AsyncWrite;

use crate::{
    atom::{
        util::{qt_timestamp_now, serializer, unscaled_duration},
        FourCC,
    },
    parser::ParseAtomData,
    writer::{GuardedSink, SerializeAtom, TreeContext, WriteError},
    ParseError,
};

pub const MDHD: FourCC = FourCC::new(b"mdhd");

/// Payload size in bytes; 32 on the wire with the header.
const MDHD_DATA_SIZE: u64 = 24;

/// Packed ISO-639-2/T code for "und" (undetermined).
const LANGUAGE_UNDETERMINED: u16 = 0x55C4;

/// Media header (`mdhd`) atom.
#[derive(Debug, Clone, Builder)]
pub struct MediaHeaderAtom {
    /// Version byte of the mdhd atom format (0 in practice); preserved as
    /// read, re-emitted unchanged
    #[builder(default = 0)]
    pub version: u8,
    /// Flags for the mdhd atom (usually all zeros)
    #[builder(default = 0)]
    pub flags: u32,
    /// When the media was created (seconds since Jan 1, 1904 UTC)
    #[builder(default = qt_timestamp_now())]
    pub creation_time: u32,
    /// When the media was last modified (seconds since Jan 1, 1904 UTC)
    #[builder(default = creation_time)]
    pub modification_time: u32,
    /// Number of time units per second for this media
    pub timescale: u32,
    /// Duration of the media in its own timescale units
    pub duration: u32,
    /// Packed ISO-639-2/T language code
    #[builder(default = LANGUAGE_UNDETERMINED)]
    pub language: u16,
    /// Media playback quality
    #[builder(default = 0)]
    pub quality: u16,
}

impl MediaHeaderAtom {
    pub fn duration(&self) -> Duration {
        unscaled_duration(u64::from(self.duration), u64::from(self.timescale))
    }
}

impl ParseAtomData for MediaHeaderAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        crate::atom::util::parser::assert_atom_type!(atom_type, MDHD);
        use crate::atom::util::parser::stream;
        use winnow::Parser;
        Ok(parser::parse_mdhd_data.parse(stream(input))?)
    }
}

impl SerializeAtom for MediaHeaderAtom {
    fn atom_type(&self) -> FourCC {
        MDHD
    }

    fn encoded_size(&self) -> u64 {
        MDHD_DATA_SIZE
    }

    async fn write_atom_data<W: AsyncWrite + Unpin + Send>(
        &self,
        out: &mut GuardedSink<'_, W>,
        _ctx: TreeContext<'_>,
    ) -> Result<(), WriteError> {
        out.write_all(&[self.version]).await?;
        out.write_all(&serializer::be_u24(self.flags)).await?;
        out.write_all(&serializer::qt_date(self.creation_time))
            .await?;
        out.write_all(&serializer::qt_date(self.modification_time))
            .await?;
        out.write_all(&serializer::be_u32(self.timescale)).await?;
        out.write_all(&serializer::be_u32(self.duration)).await?;
        out.write_all(&serializer::be_u16(self.language)).await?;
        out.write_all(&serializer::be_u16(self.quality)).await?;
        Ok(())
    }
}

mod parser {
    use winnow::{
        binary::{be_u16, be_u32},
        combinator::{seq, trace},
        error::StrContext,
        ModalResult, Parser,
    };

    use super::MediaHeaderAtom;
    use crate::atom::util::parser::{flags, qt_date, version, Stream};

    pub fn parse_mdhd_data(input: &mut Stream<'_>) -> ModalResult<MediaHeaderAtom> {
        trace(
            "mdhd",
            seq!(MediaHeaderAtom {
                version: version,
                flags: flags,
                creation_time: qt_date.context(StrContext::Label("creation_time")),
                modification_time: qt_date.context(StrContext::Label("modification_time")),
                timescale: be_u32.context(StrContext::Label("timescale")),
                duration: be_u32.context(StrContext::Label("duration")),
                language: be_u16.context(StrContext::Label("language")),
                quality: be_u16.context(StrContext::Label("quality")),
            }),
        )
        .parse_next(input)
    }
}
