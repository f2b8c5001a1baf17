pub mod container;
mod iter;
pub mod leaf;
#[cfg(test)]
pub mod test_utils;
pub mod util;

pub use self::{
    container::is_container_atom,
    iter::AtomIter,
    leaf::{
        FileTypeAtom, FreeAtom, MediaHeaderAtom, MovieHeaderAtom, RawDataAtom, TrackHeaderAtom,
    },
    util::FourCC,
};

use futures_io::AsyncWrite;
use futures_util::future::BoxFuture;

use crate::writer::{GuardedSink, MovWriter, SerializeAtom, TreeContext, WriteError};

/// Size of the generic atom header: a 4-byte big-endian size (inclusive of
/// the header itself) followed by the 4-byte identifier.
pub const ATOM_HEADER_SIZE: u64 = 8;

/// A node in the atom tree.
///
/// Atoms come in exactly two shapes: a [`Leaf`](Atom::Leaf) carries a typed
/// payload and no children, a [`Container`](Atom::Container) carries an
/// ordered list of child atoms and no payload of its own. A container owns
/// its children exclusively; tree-wide lookups go through
/// [`TreeContext`] rather than parent pointers.
#[derive(Debug, Clone)]
pub enum Atom {
    Leaf(AtomData),
    Container {
        atom_type: FourCC,
        children: Vec<Atom>,
    },
}

/// Typed payloads for the leaf atoms this crate understands.
///
/// Unknown identifiers round-trip through [`AtomData::Raw`].
#[derive(Debug, Clone)]
pub enum AtomData {
    MovieHeader(MovieHeaderAtom),
    TrackHeader(TrackHeaderAtom),
    MediaHeader(MediaHeaderAtom),
    FileType(FileTypeAtom),
    Free(FreeAtom),
    Raw(RawDataAtom),
}

impl From<MovieHeaderAtom> for AtomData {
    fn from(atom: MovieHeaderAtom) -> Self {
        AtomData::MovieHeader(atom)
    }
}

impl From<TrackHeaderAtom> for AtomData {
    fn from(atom: TrackHeaderAtom) -> Self {
        AtomData::TrackHeader(atom)
    }
}

impl From<MediaHeaderAtom> for AtomData {
    fn from(atom: MediaHeaderAtom) -> Self {
        AtomData::MediaHeader(atom)
    }
}

impl From<FileTypeAtom> for AtomData {
    fn from(atom: FileTypeAtom) -> Self {
        AtomData::FileType(atom)
    }
}

impl From<FreeAtom> for AtomData {
    fn from(atom: FreeAtom) -> Self {
        AtomData::Free(atom)
    }
}

impl From<RawDataAtom> for AtomData {
    fn from(atom: RawDataAtom) -> Self {
        AtomData::Raw(atom)
    }
}

impl SerializeAtom for AtomData {
    fn atom_type(&self) -> FourCC {
        match self {
            AtomData::MovieHeader(atom) => atom.atom_type(),
            AtomData::TrackHeader(atom) => atom.atom_type(),
            AtomData::MediaHeader(atom) => atom.atom_type(),
            AtomData::FileType(atom) => atom.atom_type(),
            AtomData::Free(atom) => atom.atom_type(),
            AtomData::Raw(atom) => atom.atom_type(),
        }
    }

    fn encoded_size(&self) -> u64 {
        match self {
            AtomData::MovieHeader(atom) => atom.encoded_size(),
            AtomData::TrackHeader(atom) => atom.encoded_size(),
            AtomData::MediaHeader(atom) => atom.encoded_size(),
            AtomData::FileType(atom) => atom.encoded_size(),
            AtomData::Free(atom) => atom.encoded_size(),
            AtomData::Raw(atom) => atom.encoded_size(),
        }
    }

    async fn write_atom_data<W: AsyncWrite + Unpin + Send>(
        &self,
        out: &mut GuardedSink<'_, W>,
        ctx: TreeContext<'_>,
    ) -> Result<(), WriteError> {
        match self {
            AtomData::MovieHeader(atom) => atom.write_atom_data(out, ctx).await,
            AtomData::TrackHeader(atom) => atom.write_atom_data(out, ctx).await,
            AtomData::MediaHeader(atom) => atom.write_atom_data(out, ctx).await,
            AtomData::FileType(atom) => atom.write_atom_data(out, ctx).await,
            AtomData::Free(atom) => atom.write_atom_data(out, ctx).await,
            AtomData::Raw(atom) => atom.write_atom_data(out, ctx).await,
        }
    }
}

impl Atom {
    pub fn leaf(data: impl Into<AtomData>) -> Self {
        Atom::Leaf(data.into())
    }

    pub fn container(atom_type: FourCC, children: Vec<Atom>) -> Self {
        Atom::Container {
            atom_type,
            children,
        }
    }

    pub fn atom_type(&self) -> FourCC {
        match self {
            Atom::Leaf(data) => data.atom_type(),
            Atom::Container { atom_type, .. } => *atom_type,
        }
    }

    /// Total encoded size of this atom, header included.
    ///
    /// Computed, never stored: `8 + payload` for leaves, `8 + Σ children`
    /// for containers. Pure with respect to the tree, so it can be called
    /// before any byte is emitted (there is no backward seek to patch a
    /// size field after the fact).
    pub fn declared_size(&self) -> u64 {
        match self {
            Atom::Leaf(data) => ATOM_HEADER_SIZE + data.encoded_size(),
            Atom::Container { children, .. } => {
                ATOM_HEADER_SIZE + children.iter().map(Atom::declared_size).sum::<u64>()
            }
        }
    }

    pub fn data(&self) -> Option<&AtomData> {
        match self {
            Atom::Leaf(data) => Some(data),
            Atom::Container { .. } => None,
        }
    }

    pub fn data_mut(&mut self) -> Option<&mut AtomData> {
        match self {
            Atom::Leaf(data) => Some(data),
            Atom::Container { .. } => None,
        }
    }

    pub fn children(&self) -> &[Atom] {
        match self {
            Atom::Leaf(_) => &[],
            Atom::Container { children, .. } => children,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Atom>> {
        match self {
            Atom::Leaf(_) => None,
            Atom::Container { children, .. } => Some(children),
        }
    }

    pub fn find_child(&self, typ: FourCC) -> Option<&Atom> {
        self.children().iter().find(|atom| atom.atom_type() == typ)
    }

    pub fn find_child_mut(&mut self, typ: FourCC) -> Option<&mut Atom> {
        self.children_mut()?
            .iter_mut()
            .find(|atom| atom.atom_type() == typ)
    }

    /// Depth-first traversal over this atom and all of its descendants.
    pub fn iter(&self) -> AtomIter<'_> {
        AtomIter::new(self)
    }

    /// Serializes this atom and its descendants to `writer`.
    ///
    /// Writes the 8-byte header, then opens a [`GuardedSink`] bounded to
    /// `declared_size() - 8` for the payload (leaf) or the children
    /// (container). The sink is closed, and its budget checked, before this
    /// call returns, so a size bug in any payload writer fails right at the
    /// atom that caused it.
    pub async fn write<W>(
        &self,
        writer: &mut MovWriter<W>,
        ctx: TreeContext<'_>,
    ) -> Result<(), WriteError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let atom_type = self.atom_type();
        self.write_parts(writer, ctx)
            .await
            .map_err(|err| err.with_atom(atom_type))
    }

    async fn write_parts<W>(
        &self,
        writer: &mut MovWriter<W>,
        ctx: TreeContext<'_>,
    ) -> Result<(), WriteError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let payload_size = self.declared_size() - ATOM_HEADER_SIZE;
        writer
            .write_atom_header(self.atom_type(), payload_size)
            .await?;
        let mut sink = GuardedSink::open(writer, payload_size)?;
        match self {
            Atom::Leaf(data) => data.write_atom_data(&mut sink, ctx).await?,
            Atom::Container { children, .. } => {
                for child in children {
                    child.write_boxed(sink.writer(), ctx).await?;
                }
            }
        }
        sink.close()
    }

    fn write_boxed<'a, W>(
        &'a self,
        writer: &'a mut MovWriter<W>,
        ctx: TreeContext<'a>,
    ) -> BoxFuture<'a, Result<(), WriteError>>
    where
        W: AsyncWrite + Unpin + Send,
    {
        Box::pin(self.write(writer, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::container::{MOOV, TRAK};
    use super::*;

    #[test]
    fn test_leaf_declared_size() {
        let atom = Atom::leaf(RawDataAtom::new(FourCC::new(b"test"), vec![0u8; 12]));
        assert_eq!(atom.declared_size(), 20);
    }

    #[test]
    fn test_container_declared_size_sums_children() {
        let moov = Atom::container(
            MOOV,
            vec![
                Atom::leaf(RawDataAtom::new(FourCC::new(b"tes1"), vec![0u8; 8])),
                Atom::container(
                    TRAK,
                    vec![Atom::leaf(RawDataAtom::new(FourCC::new(b"tes2"), vec![]))],
                ),
            ],
        );
        // 8 + (8 + 8) + (8 + 8)
        assert_eq!(moov.declared_size(), 40);
    }

    #[test]
    fn test_iter_depth_first() {
        let tree = Atom::container(
            MOOV,
            vec![
                Atom::container(
                    TRAK,
                    vec![Atom::leaf(RawDataAtom::new(FourCC::new(b"aaaa"), vec![]))],
                ),
                Atom::leaf(RawDataAtom::new(FourCC::new(b"bbbb"), vec![])),
            ],
        );
        let order: Vec<FourCC> = tree.iter().map(|atom| atom.atom_type()).collect();
        assert_eq!(
            order,
            vec![
                MOOV,
                TRAK,
                FourCC::new(b"aaaa"),
                FourCC::new(b"bbbb"),
            ]
        );
    }

    #[test]
    fn test_find_child() {
        let moov = Atom::container(
            MOOV,
            vec![Atom::leaf(RawDataAtom::new(FourCC::new(b"tes1"), vec![]))],
        );
        assert!(moov.find_child(FourCC::new(b"tes1")).is_some());
        assert!(moov.find_child(FourCC::new(b"tes2")).is_none());
    }
}
