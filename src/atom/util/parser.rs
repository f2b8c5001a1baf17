use std::fmt::Debug;

use winnow::{
    binary::{be_u16, be_u32, u8},
    combinator::trace,
    error::{ParserError, StrContext, StrContextValue},
    token::take,
    Bytes, LocatingSlice, ModalResult, Parser,
};

use crate::FourCC;

pub type Stream<'i> = LocatingSlice<&'i Bytes>;

pub fn stream(b: &[u8]) -> Stream<'_> {
    LocatingSlice::new(Bytes::new(b))
}

macro_rules! assert_atom_type {
    ($got:expr, $want:expr) => {
        if $got != $want {
            return Err($crate::ParseError::unexpected_atom($got, $want));
        }
    };
}
pub(crate) use assert_atom_type;

pub fn fourcc(input: &mut Stream<'_>) -> ModalResult<FourCC> {
    trace(
        "fourcc",
        byte_array
            .map(FourCC)
            .context(StrContext::Label("fourcc")),
    )
    .parse_next(input)
}

pub fn version(input: &mut Stream<'_>) -> ModalResult<u8> {
    trace("version", u8)
        .context(StrContext::Label("version"))
        .parse_next(input)
}

pub fn be_u24(input: &mut Stream<'_>) -> ModalResult<u32> {
    trace(
        "be_u24",
        byte_array::<3>.map(|buf| u32::from_be_bytes([0, buf[0], buf[1], buf[2]])),
    )
    .parse_next(input)
}

/// 24-bit atom flags, packed into the low bits of a u32.
pub fn flags(input: &mut Stream<'_>) -> ModalResult<u32> {
    trace("flags", be_u24)
        .context(StrContext::Label("flags"))
        .parse_next(input)
}

/// Seconds since the QuickTime epoch (1904-01-01T00:00:00Z).
pub fn qt_date(input: &mut Stream<'_>) -> ModalResult<u32> {
    trace("qt_date", be_u32)
        .context(StrContext::Expected(StrContextValue::Description(
            "QuickTime date",
        )))
        .parse_next(input)
}

pub fn byte_array<const N: usize>(input: &mut Stream<'_>) -> ModalResult<[u8; N]> {
    trace("byte_array", fixed_array(u8)).parse_next(input)
}

/// Consumes exactly N bytes without interpreting them.
pub fn skipped<const N: usize>(input: &mut Stream<'_>) -> ModalResult<()> {
    trace("skipped", take(N).void()).parse_next(input)
}

pub fn fixed_array<'i, const N: usize, Input, Output, Error, ParseNext>(
    mut parser: ParseNext,
) -> impl Parser<Input, [Output; N], Error> + 'i
where
    Input: winnow::stream::Stream + 'i,
    ParseNext: Parser<Input, Output, Error> + 'i,
    Error: ParserError<Input> + 'i,
    Output: Debug + 'i,
{
    trace("fixed_array", move |input: &mut Input| {
        let mut list: Vec<Output> = Vec::with_capacity(N);
        for _ in 0..N {
            list.push(parser.by_ref().complete_err().parse_next(input)?);
        }
        let out: [Output; N] = list.try_into().unwrap();
        Ok(out)
    })
}

pub const FIXED_POINT_16X16_SCALE: f64 = 65536.0;

// f64 carries 32 significand bits losslessly, so every encoded fixed-point
// bit pattern survives a decode/re-encode cycle.
pub fn fixed_point_16x16(input: &mut Stream<'_>) -> ModalResult<f64> {
    trace(
        "fixed_point_16x16",
        be_u32.map(|v| f64::from(v) / FIXED_POINT_16X16_SCALE),
    )
    .parse_next(input)
}

pub const FIXED_POINT_8X8_SCALE: f64 = 256.0;

pub fn fixed_point_8x8(input: &mut Stream<'_>) -> ModalResult<f64> {
    trace(
        "fixed_point_8x8",
        be_u16.map(|v| f64::from(v) / FIXED_POINT_8X8_SCALE),
    )
    .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_point_16x16_one() {
        let value = fixed_point_16x16
            .parse(stream(&[0x00, 0x01, 0x00, 0x00]))
            .unwrap();
        assert_eq!(value, 1.0);
    }

    #[test]
    fn test_fixed_point_8x8_one() {
        let value = fixed_point_8x8.parse(stream(&[0x01, 0x00])).unwrap();
        assert_eq!(value, 1.0);
    }

    #[test]
    fn test_be_u24() {
        let value = be_u24.parse(stream(&[0x01, 0x02, 0x03])).unwrap();
        assert_eq!(value, 0x010203);
    }

    #[test]
    fn test_qt_date_epoch() {
        let value = qt_date.parse(stream(&[0, 0, 0, 0])).unwrap();
        assert_eq!(value, 0);
    }

    #[test]
    fn test_skipped_consumes_exactly() {
        let mut input = stream(&[0xFF; 12]);
        skipped::<10>.parse_next(&mut input).unwrap();
        let remainder = winnow::token::rest::<_, winnow::error::ErrMode<winnow::error::ContextError>>
            .parse_next(&mut input)
            .unwrap();
        assert_eq!(remainder.len(), 2);
    }

    #[test]
    fn test_fixed_point_bit_patterns_survive_reencoding() {
        use crate::atom::util::serializer;

        for pattern in [0u32, 1, 0x0001_0001, 0xFFFF_FF01, 0xFFFF_FFFF] {
            let decoded = fixed_point_16x16.parse(stream(&pattern.to_be_bytes())).unwrap();
            assert_eq!(serializer::fixed_point_16x16(decoded), pattern.to_be_bytes());
        }
        for pattern in [0u16, 1, 0x0101, 0xFF01, 0xFFFF] {
            let decoded = fixed_point_8x8.parse(stream(&pattern.to_be_bytes())).unwrap();
            assert_eq!(serializer::fixed_point_8x8(decoded), pattern.to_be_bytes());
        }
    }

    #[test]
    fn test_short_input_fails() {
        assert!(fixed_point_16x16.parse(stream(&[0x00, 0x01])).is_err());
        assert!(skipped::<10>.parse(stream(&[0u8; 9])).is_err());
    }
}
