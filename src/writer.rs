use derive_more::Display;
use futures_io::AsyncWrite;
use futures_util::AsyncWriteExt;
use thiserror::Error;

use crate::{
    atom::{util::serializer, ATOM_HEADER_SIZE},
    parser::Metadata,
    Atom, AtomData, FourCC,
};

#[derive(Debug, Error)]
#[error("{kind}{}{}",
    self.atom_type.map(|t| format!(" in `{t}` atom")).unwrap_or_default(),
    self.source.as_ref().map(|e| format!(" ({e})")).unwrap_or_default())]
pub struct WriteError {
    /// The kind of error that occurred during writing.
    kind: WriteErrorKind,
    /// The atom being serialized when the error occurred, if known.
    atom_type: Option<FourCC>,
    /// The source error that caused this error.
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Display)]
pub enum WriteErrorKind {
    #[display("I/O error")]
    Io,
    /// Total size (header included) does not fit the 32-bit size field.
    #[display("atom size {size} exceeds the 32-bit size field")]
    OversizeAtom { size: u64 },
    /// A payload writer tried to emit more bytes than the atom declared.
    #[display("write of {attempted} bytes exceeds the {remaining} remaining in the declared atom size")]
    SizeExceeded { attempted: u64, remaining: u64 },
    /// A payload writer finished with declared bytes still unwritten.
    #[display("atom payload fell {remaining} bytes short of its declared size")]
    SizeMismatch { remaining: u64 },
}

impl WriteError {
    fn new(kind: WriteErrorKind) -> Self {
        Self {
            kind,
            atom_type: None,
            source: None,
        }
    }

    fn io(source: futures_io::Error) -> Self {
        Self {
            kind: WriteErrorKind::Io,
            atom_type: None,
            source: Some(Box::new(source)),
        }
    }

    /// Attaches the atom identifier, keeping the innermost one on the way
    /// out of a nested write.
    pub(crate) fn with_atom(mut self, atom_type: FourCC) -> Self {
        self.atom_type.get_or_insert(atom_type);
        self
    }

    pub fn kind(&self) -> &WriteErrorKind {
        &self.kind
    }

    pub fn atom_type(&self) -> Option<FourCC> {
        self.atom_type
    }
}

/// Read-only view of the atom tree being serialized.
///
/// Payload writers that need facts about the rest of the tree (the movie
/// header's next-track-id, for one) get them through this context instead
/// of parent pointers, so atoms stay plain owned data.
#[derive(Debug, Clone, Copy)]
pub struct TreeContext<'a> {
    atoms: &'a [Atom],
}

impl<'a> TreeContext<'a> {
    pub fn new(atoms: &'a [Atom]) -> Self {
        Self { atoms }
    }

    /// Context over an empty tree, for writing an atom in isolation.
    pub fn empty() -> TreeContext<'static> {
        TreeContext { atoms: &[] }
    }

    /// Highest track id of any track header anywhere in the tree, or
    /// `None` when the tree has no tracks.
    pub fn highest_track_id(&self) -> Option<u32> {
        self.atoms
            .iter()
            .flat_map(Atom::iter)
            .filter_map(|atom| match atom.data() {
                Some(AtomData::TrackHeader(tkhd)) => Some(tkhd.track_id),
                _ => None,
            })
            .max()
    }

    /// The next-track-id value the movie header must carry: one past the
    /// highest track id currently in the tree. A tree without tracks
    /// yields 1.
    pub fn next_track_id(&self) -> u32 {
        self.highest_track_id().unwrap_or(0) + 1
    }
}

pub trait SerializeAtom {
    /// [FourCC] representing atom type
    fn atom_type(&self) -> FourCC;

    /// Exact payload size in bytes, header excluded.
    ///
    /// This is a promise: `write_atom_data` must emit exactly this many
    /// bytes into its sink.
    fn encoded_size(&self) -> u64;

    /// Serialize the atom's payload into `out`.
    fn write_atom_data<W: AsyncWrite + Unpin + Send>(
        &self,
        out: &mut GuardedSink<'_, W>,
        ctx: TreeContext<'_>,
    ) -> impl std::future::Future<Output = Result<(), WriteError>> + Send;
}

#[derive(Debug)]
pub struct MovWriter<W> {
    writer: W,
    offset: u64,
    /// Absolute end offsets of the open guarded sinks, innermost last.
    guards: Vec<u64>,
}

impl<W: AsyncWrite + Unpin> MovWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            offset: 0,
            guards: Vec::new(),
        }
    }

    pub fn current_offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub async fn flush(&mut self) -> Result<(), WriteError> {
        self.writer.flush().await.map_err(WriteError::io)
    }

    /// Serializes the full atom tree `atoms` in order, each atom able to
    /// see the whole tree through [`TreeContext`].
    pub async fn write_atoms(&mut self, atoms: &[Atom]) -> Result<(), WriteError>
    where
        W: Send,
    {
        let ctx = TreeContext::new(atoms);
        for atom in atoms {
            atom.write(self, ctx).await?;
        }
        self.flush().await
    }

    /// Serializes assembled metadata back out in full.
    pub async fn write_metadata(&mut self, metadata: &Metadata) -> Result<(), WriteError>
    where
        W: Send,
    {
        self.write_atoms(metadata.atoms()).await
    }

    pub async fn write_atom_header(
        &mut self,
        atom_type: FourCC,
        data_size: u64,
    ) -> Result<(), WriteError> {
        let total_size = ATOM_HEADER_SIZE + data_size;
        let size_field: u32 = total_size
            .try_into()
            .map_err(|_| WriteError::new(WriteErrorKind::OversizeAtom { size: total_size }))?;
        self.write_bytes(&serializer::be_u32(size_field)).await?;
        self.write_bytes(&atom_type.into_bytes()).await
    }

    /// Emits raw bytes, enforcing the innermost open size guard.
    async fn write_bytes(&mut self, data: &[u8]) -> Result<(), WriteError> {
        if let Some(&end_offset) = self.guards.last() {
            let remaining = end_offset - self.offset;
            if data.len() as u64 > remaining {
                return Err(WriteError::new(WriteErrorKind::SizeExceeded {
                    attempted: data.len() as u64,
                    remaining,
                }));
            }
        }
        self.writer.write_all(data).await.map_err(WriteError::io)?;
        self.offset += data.len() as u64;
        Ok(())
    }
}

/// Write handle scoped to a single atom's declared payload size.
///
/// Opened with a byte budget, it refuses any write that would run past the
/// budget and, on [`close`](GuardedSink::close), refuses to have left any
/// of the budget unwritten. Serialization is forward-only, so this is the
/// mechanism that keeps every declared size field honest without seeking
/// back to patch it.
#[derive(Debug)]
pub struct GuardedSink<'w, W> {
    writer: &'w mut MovWriter<W>,
    end_offset: u64,
}

impl<'w, W: AsyncWrite + Unpin> GuardedSink<'w, W> {
    pub(crate) fn open(
        writer: &'w mut MovWriter<W>,
        budget: u64,
    ) -> Result<Self, WriteError> {
        let end_offset = writer.offset + budget;
        if let Some(&parent_end) = writer.guards.last() {
            if end_offset > parent_end {
                return Err(WriteError::new(WriteErrorKind::SizeExceeded {
                    attempted: budget,
                    remaining: parent_end - writer.offset,
                }));
            }
        }
        writer.guards.push(end_offset);
        Ok(Self { writer, end_offset })
    }

    /// Bytes of the budget not yet written.
    pub fn remaining(&self) -> u64 {
        self.end_offset - self.writer.offset
    }

    pub async fn write_all(&mut self, data: &[u8]) -> Result<(), WriteError> {
        self.writer.write_bytes(data).await
    }

    /// Emits `count` zero bytes, for reserved and padding regions.
    pub async fn write_zeros(&mut self, mut count: u64) -> Result<(), WriteError> {
        const ZEROS: [u8; 64] = [0u8; 64];
        while count > 0 {
            let chunk = count.min(ZEROS.len() as u64) as usize;
            self.write_all(&ZEROS[..chunk]).await?;
            count -= chunk as u64;
        }
        Ok(())
    }

    /// The underlying writer, for serializing child atoms inside this
    /// sink's budget.
    pub(crate) fn writer(&mut self) -> &mut MovWriter<W> {
        self.writer
    }

    /// Verifies the budget was filled exactly.
    pub fn close(self) -> Result<(), WriteError> {
        let remaining = self.remaining();
        if remaining != 0 {
            return Err(WriteError::new(WriteErrorKind::SizeMismatch { remaining }));
        }
        Ok(())
    }
}

impl<W> Drop for GuardedSink<'_, W> {
    fn drop(&mut self) {
        self.writer.guards.pop();
    }
}

#[cfg(test)]
mod tests {
    use futures_util::io::Cursor;

    use super::*;
    use crate::atom::test_utils;

    #[tokio::test]
    async fn test_guarded_sink_exact_fill() {
        let mut writer = MovWriter::new(Cursor::new(Vec::new()));
        let mut sink = GuardedSink::open(&mut writer, 4).unwrap();
        sink.write_all(&[1, 2]).await.unwrap();
        assert_eq!(sink.remaining(), 2);
        sink.write_all(&[3, 4]).await.unwrap();
        sink.close().unwrap();
        assert_eq!(writer.current_offset(), 4);
        assert_eq!(writer.into_inner().into_inner(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_guarded_sink_rejects_overrun() {
        let mut writer = MovWriter::new(Cursor::new(Vec::new()));
        let mut sink = GuardedSink::open(&mut writer, 3).unwrap();
        sink.write_all(&[1, 2]).await.unwrap();
        let err = sink.write_all(&[3, 4]).await.unwrap_err();
        assert!(matches!(
            err.kind(),
            WriteErrorKind::SizeExceeded {
                attempted: 2,
                remaining: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_guarded_sink_rejects_underfill() {
        let mut writer = MovWriter::new(Cursor::new(Vec::new()));
        let mut sink = GuardedSink::open(&mut writer, 4).unwrap();
        sink.write_all(&[1]).await.unwrap();
        let err = sink.close().unwrap_err();
        assert!(matches!(
            err.kind(),
            WriteErrorKind::SizeMismatch { remaining: 3 }
        ));
    }

    #[tokio::test]
    async fn test_guarded_sink_write_zeros() {
        let mut writer = MovWriter::new(Cursor::new(Vec::new()));
        let mut sink = GuardedSink::open(&mut writer, 100).unwrap();
        sink.write_zeros(100).await.unwrap();
        sink.close().unwrap();
        assert_eq!(writer.into_inner().into_inner(), vec![0u8; 100]);
    }

    #[tokio::test]
    async fn test_nested_sink_bounded_by_parent() {
        let mut writer = MovWriter::new(Cursor::new(Vec::new()));
        let sink = GuardedSink::open(&mut writer, 8).unwrap();
        drop(sink);
        let mut outer = GuardedSink::open(&mut writer, 8).unwrap();
        let err = GuardedSink::open(outer.writer(), 16).unwrap_err();
        assert!(matches!(
            err.kind(),
            WriteErrorKind::SizeExceeded {
                attempted: 16,
                remaining: 8
            }
        ));
    }

    #[tokio::test]
    async fn test_write_atoms_emits_declared_sizes() {
        let atoms = vec![test_utils::moov_with_track_ids(&[1, 2])];
        let bytes = test_utils::atoms_to_bytes(&atoms).await.unwrap();
        assert_eq!(bytes.len() as u64, atoms[0].declared_size());

        let reparsed = crate::parser::read_atoms(bytes.as_slice()).await.unwrap();
        assert_eq!(reparsed.len(), 1);
        assert_eq!(reparsed[0].declared_size(), atoms[0].declared_size());
    }

    #[test]
    fn test_error_keeps_innermost_atom() {
        let err = WriteError::new(WriteErrorKind::SizeMismatch { remaining: 2 })
            .with_atom(FourCC::new(b"mvhd"))
            .with_atom(FourCC::new(b"moov"));
        assert_eq!(err.atom_type(), Some(FourCC::new(b"mvhd")));
        assert!(err.to_string().contains("`mvhd`"));
    }

    #[test]
    fn test_next_track_id_empty_tree() {
        assert_eq!(TreeContext::empty().next_track_id(), 1);
    }

    #[test]
    fn test_next_track_id_skips_gaps() {
        let moov = test_utils::moov_with_track_ids(&[1, 7, 3]);
        let atoms = [moov];
        let ctx = TreeContext::new(&atoms);
        assert_eq!(ctx.highest_track_id(), Some(7));
        assert_eq!(ctx.next_track_id(), 8);
    }
}
