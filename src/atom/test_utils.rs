//! Test helpers shared by the atom and writer tests.

use futures_util::io::Cursor;

use crate::{
    atom::container::{MOOV, TRAK},
    atom::{MovieHeaderAtom, TrackHeaderAtom},
    writer::{MovWriter, TreeContext, WriteError},
    Atom,
};

/// Serializes `atom` on its own, with an empty tree context, and returns
/// the emitted bytes.
pub async fn atom_to_bytes(atom: &Atom) -> Result<Vec<u8>, WriteError> {
    let mut writer = MovWriter::new(Cursor::new(Vec::new()));
    atom.write(&mut writer, TreeContext::empty()).await?;
    Ok(writer.into_inner().into_inner())
}

/// Serializes a whole tree, each atom seeing the full tree context.
pub async fn atoms_to_bytes(atoms: &[Atom]) -> Result<Vec<u8>, WriteError> {
    let mut writer = MovWriter::new(Cursor::new(Vec::new()));
    writer.write_atoms(atoms).await?;
    Ok(writer.into_inner().into_inner())
}

pub fn sample_mvhd() -> MovieHeaderAtom {
    MovieHeaderAtom::builder()
        .creation_time(3_600)
        .timescale(600)
        .duration(6_000)
        .build()
}

pub fn track_with_id(track_id: u32) -> Atom {
    Atom::container(
        TRAK,
        vec![Atom::leaf(
            TrackHeaderAtom::builder()
                .creation_time(3_600)
                .track_id(track_id)
                .duration(6_000)
                .build(),
        )],
    )
}

pub fn moov_with_track_ids(ids: &[u32]) -> Atom {
    let mut children = vec![Atom::leaf(sample_mvhd())];
    children.extend(ids.iter().copied().map(track_with_id));
    Atom::container(MOOV, children)
}
