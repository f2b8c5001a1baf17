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

pub const TKHD: FourCC = FourCC::new(b"tkhd");

const IDENTITY_MATRIX: [i32; 9] = [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000];

/// Payload size in bytes; 92 on the wire with the header.
const TKHD_DATA_SIZE: u64 = 84;

/// Track enabled, in movie, in preview.
const TKHD_DEFAULT_FLAGS: u32 = 0x7;

/// Track header (`tkhd`) atom.
///
/// Like the movie header, the matrix and reserved regions are lossy: they
/// are skipped when parsing, and writing emits the identity matrix and
/// zeroed reserved bytes.
#[derive(Debug, Clone, Builder)]
pub struct TrackHeaderAtom {
    /// Version byte of the tkhd atom format (0 in practice); preserved as
    /// read, re-emitted unchanged
    #[builder(default = 0)]
    pub version: u8,
    /// Flags for the tkhd atom (bit flags for track properties)
    #[builder(default = TKHD_DEFAULT_FLAGS)]
    pub flags: u32,
    /// When the track was created (seconds since Jan 1, 1904 UTC)
    #[builder(default = qt_timestamp_now())]
    pub creation_time: u32,
    /// When the track was last modified (seconds since Jan 1, 1904 UTC)
    #[builder(default = creation_time)]
    pub modification_time: u32,
    /// Unique identifier for this track within the movie
    pub track_id: u32,
    /// Duration of the track in movie timescale units
    pub duration: u32,
    /// Layer for video compositing (lower numbers are towards the viewer)
    #[builder(default = 0)]
    pub layer: i16,
    /// Grouping of alternate tracks (0 = no group)
    #[builder(default = 0)]
    pub alternate_group: i16,
    /// Audio volume level (1.0 = full volume)
    #[builder(default = 1.0)]
    pub volume: f64,
    /// Visual presentation width in pixels
    #[builder(default = 0.0)]
    pub width: f64,
    /// Visual presentation height in pixels
    #[builder(default = 0.0)]
    pub height: f64,
}

impl TrackHeaderAtom {
    pub fn duration(&self, movie_timescale: u64) -> Duration {
        unscaled_duration(u64::from(self.duration), movie_timescale)
    }
}

impl ParseAtomData for TrackHeaderAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        crate::atom::util::parser::assert_atom_type!(atom_type, TKHD);
        use crate::atom::util::parser::stream;
        use winnow::Parser;
        Ok(parser::parse_tkhd_data.parse(stream(input))?)
    }
}

impl SerializeAtom for TrackHeaderAtom {
    fn atom_type(&self) -> FourCC {
        TKHD
    }

    fn encoded_size(&self) -> u64 {
        TKHD_DATA_SIZE
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
        out.write_all(&serializer::be_u32(self.track_id)).await?;
        out.write_zeros(4).await?;
        out.write_all(&serializer::be_u32(self.duration)).await?;
        out.write_zeros(8).await?;
        out.write_all(&serializer::be_i16(self.layer)).await?;
        out.write_all(&serializer::be_i16(self.alternate_group))
            .await?;
        out.write_all(&serializer::fixed_point_8x8(self.volume))
            .await?;
        out.write_zeros(2).await?;
        for value in IDENTITY_MATRIX {
            out.write_all(&serializer::be_i32(value)).await?;
        }
        out.write_all(&serializer::fixed_point_16x16(self.width))
            .await?;
        out.write_all(&serializer::fixed_point_16x16(self.height))
            .await?;
        Ok(())
    }
}

mod parser {
    use winnow::{
        binary::{be_i16, be_u32},
        combinator::{seq, trace},
        error::StrContext,
        ModalResult, Parser,
    };

    use super::TrackHeaderAtom;
    use crate::atom::util::parser::{
        fixed_point_16x16, fixed_point_8x8, flags, qt_date, skipped, version, Stream,
    };

    pub fn parse_tkhd_data(input: &mut Stream<'_>) -> ModalResult<TrackHeaderAtom> {
        trace(
            "tkhd",
            seq!(TrackHeaderAtom {
                version: version,
                flags: flags,
                creation_time: qt_date.context(StrContext::Label("creation_time")),
                modification_time: qt_date.context(StrContext::Label("modification_time")),
                track_id: be_u32.context(StrContext::Label("track_id")),
                _: skipped::<4>.context(StrContext::Label("reserved")),
                duration: be_u32.context(StrContext::Label("duration")),
                _: skipped::<8>.context(StrContext::Label("reserved")),
                layer: be_i16.context(StrContext::Label("layer")),
                alternate_group: be_i16.context(StrContext::Label("alternate_group")),
                volume: fixed_point_8x8.context(StrContext::Label("volume")),
                _: skipped::<2>.context(StrContext::Label("reserved")),
                _: skipped::<36>.context(StrContext::Label("matrix")),
                width: fixed_point_16x16.context(StrContext::Label("width")),
                height: fixed_point_16x16.context(StrContext::Label("height")),
            }),
        )
        .parse_next(input)
    }
}
