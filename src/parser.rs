use derive_more::Display;
use futures_io::AsyncRead;
use futures_util::io::AsyncReadExt;
use futures_util::pin_mut;
use futures_util::stream::{Stream, StreamExt};
use thiserror::Error;

use crate::{
    atom::{
        container::MOOV,
        is_container_atom,
        leaf::{
            FileTypeAtom, FreeAtom, MediaHeaderAtom, MovieHeaderAtom, RawDataAtom,
            TrackHeaderAtom, FREE, FTYP, MDHD, MVHD, SKIP, TKHD,
        },
        FourCC, ATOM_HEADER_SIZE,
    },
    writer::TreeContext,
    Atom, AtomData,
};

/// Parses a leaf atom's payload, already isolated from the surrounding
/// stream, into its typed form.
pub trait ParseAtomData: Sized {
    fn parse_atom_data(atom_type: FourCC, input: &[u8]) -> Result<Self, ParseError>;
}

#[derive(Debug, Error)]
#[error(
    "{kind}{}",
    self.location.map(|(offset, length)|
        format!(" at offset {offset} with length {length}")).unwrap_or_default()
)]
pub struct ParseError {
    /// The kind of error that occurred during parsing.
    kind: ParseErrorKind,
    /// location is the (offset, length) of the input data related to the error
    location: Option<(u64, u64)>,
    /// The source error that caused this error.
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Display)]
pub enum ParseErrorKind {
    #[display("I/O error")]
    Io,
    #[display("EOF error")]
    Eof,
    /// Input ended inside an atom whose declared size promised more bytes.
    #[display("input truncated mid-atom")]
    ShortRead,
    /// Size field of 0 or 1 (to-end-of-file and 64-bit extended forms) or
    /// smaller than the 8-byte header.
    #[display("invalid atom size")]
    InvalidSize,
    #[display("unexpected `{got}` atom, expected `{want}`")]
    UnexpectedAtom { got: FourCC, want: FourCC },
    #[display("atom parsing failed")]
    AtomParsing,
    #[display("unbalanced container events")]
    UnbalancedTree,
}

impl ParseError {
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    pub fn location(&self) -> Option<(u64, u64)> {
        self.location
    }

    pub(crate) fn unexpected_atom(got: FourCC, want: FourCC) -> Self {
        ParseError {
            kind: ParseErrorKind::UnexpectedAtom { got, want },
            location: None,
            source: None,
        }
    }

    fn invalid_size(offset: u64, length: u64) -> Self {
        ParseError {
            kind: ParseErrorKind::InvalidSize,
            location: Some((offset, length)),
            source: None,
        }
    }

    fn into_short_read(mut self) -> Self {
        self.kind = ParseErrorKind::ShortRead;
        self
    }
}

impl<I> From<winnow::error::ParseError<I, winnow::error::ContextError>> for ParseError {
    fn from(err: winnow::error::ParseError<I, winnow::error::ContextError>) -> Self {
        let offset = err.offset() as u64;
        ParseError {
            kind: ParseErrorKind::AtomParsing,
            location: Some((offset, 0)),
            source: Some(err.into_inner().to_string().into()),
        }
    }
}

#[derive(Debug)]
pub enum ParseMetadataEvent {
    EnterContainer {
        atom_type: FourCC,
        offset: u64,
        size: u64,
    },
    Leaf {
        data: AtomData,
        offset: u64,
        size: u64,
    },
    ExitContainer,
}

pub struct Parser<R> {
    reader: R,
    current_offset: u64,
    peek_buffer: Vec<u8>,
}

struct ParsedAtom {
    atom_type: FourCC,
    size: u64,
    offset: u64,
    content_size: u64,
}

impl<R: AsyncRead + Unpin + Send> Parser<R> {
    pub fn new(reader: R) -> Self {
        Parser {
            reader,
            current_offset: 0,
            peek_buffer: Vec::new(),
        }
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Streams the atom structure as enter/leaf/exit events.
    ///
    /// Containers are never buffered whole; their extent is tracked as an
    /// end offset and an [`ExitContainer`](ParseMetadataEvent::ExitContainer)
    /// event is emitted once the input reaches it. A clean end of input at
    /// the top level terminates the stream; end of input while a container
    /// is still open is a [`ShortRead`](ParseErrorKind::ShortRead) error.
    pub fn stream_metadata(
        &mut self,
    ) -> impl Stream<Item = Result<ParseMetadataEvent, ParseError>> + '_ {
        async_stream::stream! {
            // End offsets of the containers entered so far, innermost last.
            let mut container_ends: Vec<u64> = Vec::new();

            loop {
                while container_ends
                    .last()
                    .is_some_and(|&end| self.current_offset >= end)
                {
                    container_ends.pop();
                    yield Ok(ParseMetadataEvent::ExitContainer);
                }

                let mut header = [0u8; 8];
                match self.peek_exact(&mut header).await {
                    Ok(()) => {}
                    Err(err) if matches!(err.kind, ParseErrorKind::Eof) => {
                        if container_ends.is_empty() {
                            break;
                        }
                        yield Err(err.into_short_read());
                        return;
                    }
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }

                let parsed_atom = match self.parse_next_atom().await {
                    Ok(parsed_atom) => parsed_atom,
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                };

                // An atom must not run past the container that holds it.
                if let Some(&end) = container_ends.last() {
                    if parsed_atom.offset + parsed_atom.size > end {
                        yield Err(ParseError::invalid_size(
                            parsed_atom.offset,
                            parsed_atom.size,
                        ));
                        return;
                    }
                }

                if is_container_atom(parsed_atom.atom_type) {
                    container_ends.push(parsed_atom.offset + parsed_atom.size);
                    yield Ok(ParseMetadataEvent::EnterContainer {
                        atom_type: parsed_atom.atom_type,
                        offset: parsed_atom.offset,
                        size: parsed_atom.size,
                    });
                } else {
                    let offset = parsed_atom.offset;
                    let size = parsed_atom.size;
                    let data = match self.parse_atom_data(parsed_atom).await {
                        Ok(data) => data,
                        Err(err) => {
                            yield Err(err);
                            return;
                        }
                    };
                    yield Ok(ParseMetadataEvent::Leaf { data, offset, size });
                }
            }
        }
    }

    async fn peek_exact(&mut self, buf: &mut [u8]) -> Result<(), ParseError> {
        let size = buf.len();
        if self.peek_buffer.len() < size {
            let mut temp_buf = vec![0u8; size - self.peek_buffer.len()];
            self.reader.read_exact(&mut temp_buf).await.map_err(|e| {
                let kind = if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    ParseErrorKind::Eof
                } else {
                    ParseErrorKind::Io
                };
                ParseError {
                    kind,
                    location: Some((self.current_offset, size as u64)),
                    source: Some(Box::new(e)),
                }
            })?;
            self.peek_buffer.extend_from_slice(&temp_buf[..]);
        }
        buf.copy_from_slice(&self.peek_buffer[..size]);
        Ok(())
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ParseError> {
        self.peek_exact(buf).await?;
        self.peek_buffer.drain(..buf.len());
        self.current_offset += buf.len() as u64;
        Ok(())
    }

    async fn read_data(&mut self, size: u64) -> Result<Vec<u8>, ParseError> {
        let mut data = vec![0u8; size as usize];
        self.read_exact(&mut data).await.map_err(|err| {
            if matches!(err.kind, ParseErrorKind::Eof) {
                err.into_short_read()
            } else {
                err
            }
        })?;
        Ok(data)
    }

    async fn parse_next_atom(&mut self) -> Result<ParsedAtom, ParseError> {
        let atom_offset = self.current_offset;

        let mut header = [0u8; 8];
        self.read_exact(&mut header).await?;

        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let atom_type = FourCC([header[4], header[5], header[6], header[7]]);

        // Size 0 (to end of file) and size 1 (64-bit extended) are not
        // supported; every atom carries an explicit 32-bit size.
        if size < ATOM_HEADER_SIZE {
            return Err(ParseError::invalid_size(atom_offset, size));
        }

        Ok(ParsedAtom {
            atom_type,
            size,
            offset: atom_offset,
            content_size: size - ATOM_HEADER_SIZE,
        })
    }

    async fn parse_atom_data(&mut self, parsed_atom: ParsedAtom) -> Result<AtomData, ParseError> {
        let content_data = self.read_data(parsed_atom.content_size).await?;
        let atom_type = parsed_atom.atom_type;
        match atom_type {
            FTYP => FileTypeAtom::parse_atom_data(atom_type, &content_data).map(AtomData::from),
            MVHD => MovieHeaderAtom::parse_atom_data(atom_type, &content_data).map(AtomData::from),
            TKHD => TrackHeaderAtom::parse_atom_data(atom_type, &content_data).map(AtomData::from),
            MDHD => MediaHeaderAtom::parse_atom_data(atom_type, &content_data).map(AtomData::from),
            FREE | SKIP => {
                FreeAtom::parse_atom_data(atom_type, &content_data).map(AtomData::from)
            }
            _ => RawDataAtom::parse_atom_data(atom_type, &content_data).map(AtomData::from),
        }
        .map_err(|err| ParseError {
            kind: ParseErrorKind::AtomParsing,
            location: Some((parsed_atom.offset, parsed_atom.size)),
            source: Some(Box::new(err)),
        })
    }
}

/// Reads the whole input and assembles the atoms into owned trees, one per
/// top-level atom.
pub async fn read_atoms<R: AsyncRead + Unpin + Send>(reader: R) -> Result<Vec<Atom>, ParseError> {
    let mut parser = Parser::new(reader);
    let stream = parser.stream_metadata();
    pin_mut!(stream);

    let mut roots: Vec<Atom> = Vec::new();
    let mut open: Vec<Atom> = Vec::new();

    fn attach(roots: &mut Vec<Atom>, open: &mut [Atom], atom: Atom) -> Result<(), ParseError> {
        match open.last_mut() {
            Some(parent) => {
                parent
                    .children_mut()
                    .ok_or(ParseError {
                        kind: ParseErrorKind::UnbalancedTree,
                        location: None,
                        source: None,
                    })?
                    .push(atom);
            }
            None => roots.push(atom),
        }
        Ok(())
    }

    while let Some(event) = stream.next().await {
        match event? {
            ParseMetadataEvent::EnterContainer { atom_type, .. } => {
                open.push(Atom::container(atom_type, Vec::new()));
            }
            ParseMetadataEvent::Leaf { data, .. } => {
                attach(&mut roots, &mut open, Atom::Leaf(data))?;
            }
            ParseMetadataEvent::ExitContainer => {
                let container = open.pop().ok_or(ParseError {
                    kind: ParseErrorKind::UnbalancedTree,
                    location: None,
                    source: None,
                })?;
                attach(&mut roots, &mut open, container)?;
            }
        }
    }

    if !open.is_empty() {
        return Err(ParseError {
            kind: ParseErrorKind::UnbalancedTree,
            location: None,
            source: None,
        });
    }

    Ok(roots)
}

/// Fully assembled metadata: the top-level atoms of a parsed file, owned.
#[derive(Debug, Clone)]
pub struct Metadata {
    atoms: Vec<Atom>,
}

impl Metadata {
    /// Reads and assembles every atom from `reader`.
    pub async fn parse<R: AsyncRead + Unpin + Send>(reader: R) -> Result<Self, ParseError> {
        Ok(Self {
            atoms: read_atoms(reader).await?,
        })
    }

    pub fn from_atoms(atoms: Vec<Atom>) -> Self {
        Self { atoms }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atoms_mut(&mut self) -> &mut Vec<Atom> {
        &mut self.atoms
    }

    pub fn into_atoms(self) -> Vec<Atom> {
        self.atoms
    }

    pub fn context(&self) -> TreeContext<'_> {
        TreeContext::new(&self.atoms)
    }

    pub fn moov(&self) -> Option<&Atom> {
        self.atoms.iter().find(|atom| atom.atom_type() == MOOV)
    }

    pub fn moov_mut(&mut self) -> Option<&mut Atom> {
        self.atoms.iter_mut().find(|atom| atom.atom_type() == MOOV)
    }

    pub fn highest_track_id(&self) -> Option<u32> {
        self.context().highest_track_id()
    }
}
