mod free;
mod ftyp;
mod mdhd;
mod mvhd;
mod raw;
mod tkhd;

pub use free::{FreeAtom, FREE, SKIP};
pub use ftyp::{FileTypeAtom, BRAND_QT, FTYP};
pub use mdhd::{MediaHeaderAtom, MDHD};
pub use mvhd::{MovieHeaderAtom, MVHD};
pub use raw::RawDataAtom;
pub use tkhd::{TrackHeaderAtom, TKHD};
