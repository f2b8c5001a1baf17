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

pub const MVHD: FourCC = FourCC::new(b"mvhd");

/// Payload size in bytes; the atom is always 108 bytes on the wire with
/// its header.
const MVHD_DATA_SIZE: u64 = 100;

/// Reserved bytes plus the 3x3 transformation matrix, a single zero-filled
/// region on write.
const MVHD_SKIPPED_SIZE: u64 = 10 + 36;

/// Movie header (`mvhd`) atom.
///
/// The transformation matrix and the reserved region are not modeled: they
/// are skipped when parsing and written back as zeros, so a round trip
/// normalizes them. The stored [`next_track_id`](Self::next_track_id) is
/// advisory only; the value emitted on the wire is always recomputed from
/// the tree being serialized.
#[derive(Debug, Clone, Builder)]
pub struct MovieHeaderAtom {
    /// Version byte of the mvhd atom format (0 in practice); preserved as
    /// read, re-emitted unchanged
    #[builder(default = 0)]
    pub version: u8,
    /// Flags for the mvhd atom (usually all zeros)
    #[builder(default = 0)]
    pub flags: u32,
    /// When the movie was created (seconds since Jan 1, 1904 UTC)
    #[builder(default = qt_timestamp_now())]
    pub creation_time: u32,
    /// When the movie was last modified (seconds since Jan 1, 1904 UTC)
    #[builder(default = creation_time)]
    pub modification_time: u32,
    /// Number of time units per second (e.g., 600 for the QuickTime default)
    pub timescale: u32,
    /// Duration of the movie in timescale units
    pub duration: u32,
    /// Playback rate (1.0 = normal speed)
    #[builder(default = 1.0)]
    pub rate: f64,
    /// Audio volume level (1.0 = full volume, 0.0 = muted)
    #[builder(default = 1.0)]
    pub volume: f64,
    /// Time when preview starts (in timescale units)
    #[builder(default = 0)]
    pub preview_time: u32,
    /// Duration of the preview (in timescale units)
    #[builder(default = 0)]
    pub preview_duration: u32,
    /// Time of poster frame to display when movie is not playing
    #[builder(default = 0)]
    pub poster_time: u32,
    /// Start time of current selection (in timescale units)
    #[builder(default = 0)]
    pub selection_time: u32,
    /// Duration of current selection (in timescale units)
    #[builder(default = 0)]
    pub selection_duration: u32,
    /// Current playback time position (in timescale units)
    #[builder(default = 0)]
    pub current_time: u32,
    /// Next-track-id as found when parsing. Advisory: serialization ignores
    /// it and writes `highest track id in the tree + 1` instead.
    pub next_track_id: Option<u32>,
}

impl MovieHeaderAtom {
    pub fn duration(&self) -> Duration {
        unscaled_duration(u64::from(self.duration), u64::from(self.timescale))
    }
}

impl ParseAtomData for MovieHeaderAtom {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError> {
        crate::atom::util::parser::assert_atom_type!(atom_type, MVHD);
        use crate::atom::util::parser::stream;
        use winnow::Parser;
        Ok(parser::parse_mvhd_data.parse(stream(input))?)
    }
}

impl SerializeAtom for MovieHeaderAtom {
    fn atom_type(&self) -> FourCC {
        MVHD
    }

    fn encoded_size(&self) -> u64 {
        MVHD_DATA_SIZE
    }

    async fn write_atom_data<W: AsyncWrite + Unpin + Send>(
        &self,
        out: &mut GuardedSink<'_, W>,
        ctx: TreeContext<'_>,
    ) -> Result<(), WriteError> {
        out.write_all(&[self.version]).await?;
        out.write_all(&serializer::be_u24(self.flags)).await?;
        out.write_all(&serializer::qt_date(self.creation_time))
            .await?;
        out.write_all(&serializer::qt_date(self.modification_time))
            .await?;
        out.write_all(&serializer::be_u32(self.timescale)).await?;
        out.write_all(&serializer::be_u32(self.duration)).await?;
        out.write_all(&serializer::fixed_point_16x16(self.rate))
            .await?;
        out.write_all(&serializer::fixed_point_8x8(self.volume))
            .await?;
        // Reserved region and matrix are not retained from parsing.
        out.write_zeros(MVHD_SKIPPED_SIZE).await?;
        out.write_all(&serializer::be_u32(self.preview_time)).await?;
        out.write_all(&serializer::be_u32(self.preview_duration))
            .await?;
        out.write_all(&serializer::be_u32(self.poster_time)).await?;
        out.write_all(&serializer::be_u32(self.selection_time))
            .await?;
        out.write_all(&serializer::be_u32(self.selection_duration))
            .await?;
        out.write_all(&serializer::be_u32(self.current_time)).await?;
        out.write_all(&serializer::be_u32(ctx.next_track_id()))
            .await?;
        Ok(())
    }
}

mod parser {
    use winnow::{
        binary::be_u32,
        combinator::{seq, trace},
        error::StrContext,
        ModalResult, Parser,
    };

    use super::MovieHeaderAtom;
    use crate::atom::util::parser::{
        fixed_point_16x16, fixed_point_8x8, flags, qt_date, skipped, version, Stream,
    };

    pub fn parse_mvhd_data(input: &mut Stream<'_>) -> ModalResult<MovieHeaderAtom> {
        trace(
            "mvhd",
            seq!(MovieHeaderAtom {
                version: version,
                flags: flags,
                creation_time: qt_date.context(StrContext::Label("creation_time")),
                modification_time: qt_date.context(StrContext::Label("modification_time")),
                timescale: be_u32.context(StrContext::Label("timescale")),
                duration: be_u32.context(StrContext::Label("duration")),
                rate: fixed_point_16x16.context(StrContext::Label("rate")),
                volume: fixed_point_8x8.context(StrContext::Label("volume")),
                _: skipped::<10>.context(StrContext::Label("reserved")),
                _: skipped::<36>.context(StrContext::Label("matrix")),
                preview_time: be_u32.context(StrContext::Label("preview_time")),
                preview_duration: be_u32.context(StrContext::Label("preview_duration")),
                poster_time: be_u32.context(StrContext::Label("poster_time")),
                selection_time: be_u32.context(StrContext::Label("selection_time")),
                selection_duration: be_u32.context(StrContext::Label("selection_duration")),
                current_time: be_u32.context(StrContext::Label("current_time")),
                next_track_id: be_u32.map(Some).context(StrContext::Label("next_track_id")),
            }),
        )
        .parse_next(input)
    }
}
