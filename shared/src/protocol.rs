//! Wire protocol shared by the server and its clients
//!
//! Every message travels as one frame:
//!
//! ```text
//! MAGIC (4) | TYPE (4, ASCII) | LENGTH (4, ASCII decimal) | PAYLOAD (LENGTH bytes)
//! ```
//!
//! The reader resynchronizes on the magic constant by sliding a 4-byte window
//! over the stream, so a peer that writes garbage between frames is tolerated
//! up to a fixed byte budget. A short read at any point is reported as
//! [`FrameError::Disconnected`], which callers treat as a transport failure
//! rather than a protocol violation.

use std::fmt;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Constant prefix of every frame
pub const MAGIC: &[u8; 4] = b"JOKE";
/// Bytes in the fixed header (magic, type, length)
pub const HEADER_LEN: usize = 12;
/// Largest payload the four decimal length digits can describe
pub const MAX_PAYLOAD_LEN: usize = 9999;
/// Bytes the reader may skip while hunting for the magic before giving up
pub const MAX_GARBAGE_BYTES: usize = 1024;

/// Closed catalog of the four-character message codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    // Identity and session
    Login,
    Quit,
    Okay,
    Error,
    Reconnected,
    // Room discovery and lifecycle
    RoomList,
    RoomListEmpty,
    RoomCreate,
    RoomCreated,
    RoomCreateFailed,
    RoomJoin,
    RoomJoined,
    RoomJoinFailed,
    RoomLeave,
    RoomLeft,
    RoomLeaveFailed,
    Owner,
    RoomInfo,
    // Readiness and start
    Ready,
    PlayersReady,
    Start,
    StartFailed,
    // Gameplay
    Turn,
    Wait,
    TakeFromDeck,
    TakeFromDiscard,
    Discard,
    LayDown,
    AddCard,
    Close,
    Cards,
    State,
    GameEnd,
    PlayAgain,
    Lobby,
    LeaveToLobby,
    // Connectivity
    Ping,
    Pong,
    Paused,
    Resumed,
    Notice,
}

impl MessageType {
    /// Every recognized message type, in catalog order
    pub const ALL: [MessageType; 41] = [
        MessageType::Login,
        MessageType::Quit,
        MessageType::Okay,
        MessageType::Error,
        MessageType::Reconnected,
        MessageType::RoomList,
        MessageType::RoomListEmpty,
        MessageType::RoomCreate,
        MessageType::RoomCreated,
        MessageType::RoomCreateFailed,
        MessageType::RoomJoin,
        MessageType::RoomJoined,
        MessageType::RoomJoinFailed,
        MessageType::RoomLeave,
        MessageType::RoomLeft,
        MessageType::RoomLeaveFailed,
        MessageType::Owner,
        MessageType::RoomInfo,
        MessageType::Ready,
        MessageType::PlayersReady,
        MessageType::Start,
        MessageType::StartFailed,
        MessageType::Turn,
        MessageType::Wait,
        MessageType::TakeFromDeck,
        MessageType::TakeFromDiscard,
        MessageType::Discard,
        MessageType::LayDown,
        MessageType::AddCard,
        MessageType::Close,
        MessageType::Cards,
        MessageType::State,
        MessageType::GameEnd,
        MessageType::PlayAgain,
        MessageType::Lobby,
        MessageType::LeaveToLobby,
        MessageType::Ping,
        MessageType::Pong,
        MessageType::Paused,
        MessageType::Resumed,
        MessageType::Notice,
    ];

    /// The four-character wire code
    pub fn code(self) -> &'static str {
        match self {
            MessageType::Login => "LOGI",
            MessageType::Quit => "QUIT",
            MessageType::Okay => "OKAY",
            MessageType::Error => "ERRR",
            MessageType::Reconnected => "RECO",
            MessageType::RoomList => "RLIS",
            MessageType::RoomListEmpty => "ELIS",
            MessageType::RoomCreate => "RCRT",
            MessageType::RoomCreated => "OCRT",
            MessageType::RoomCreateFailed => "ECRT",
            MessageType::RoomJoin => "RCNT",
            MessageType::RoomJoined => "OCNT",
            MessageType::RoomJoinFailed => "ECNT",
            MessageType::RoomLeave => "RDIS",
            MessageType::RoomLeft => "ODIS",
            MessageType::RoomLeaveFailed => "EDIS",
            MessageType::Owner => "BOSS",
            MessageType::RoomInfo => "RINF",
            MessageType::Ready => "REDY",
            MessageType::PlayersReady => "PRDY",
            MessageType::Start => "STRT",
            MessageType::StartFailed => "ESTR",
            MessageType::Turn => "TURN",
            MessageType::Wait => "WAIT",
            MessageType::TakeFromDeck => "TAKP",
            MessageType::TakeFromDiscard => "TAKT",
            MessageType::Discard => "THRW",
            MessageType::LayDown => "UNLO",
            MessageType::AddCard => "ADDC",
            MessageType::Close => "CLOS",
            MessageType::Cards => "CRDS",
            MessageType::State => "STAT",
            MessageType::GameEnd => "GEND",
            MessageType::PlayAgain => "PLAG",
            MessageType::Lobby => "LBBY",
            MessageType::LeaveToLobby => "CNNT",
            MessageType::Ping => "PING",
            MessageType::Pong => "PONG",
            MessageType::Paused => "PAUS",
            MessageType::Resumed => "RESU",
            MessageType::Notice => "NOTI",
        }
    }

    /// Looks up a wire code, returning None for anything outside the catalog
    pub fn from_code(code: &[u8]) -> Option<MessageType> {
        Self::ALL
            .iter()
            .copied()
            .find(|msg_type| msg_type.code().as_bytes() == code)
    }

    /// True for the card actions a player may take while holding the turn
    pub fn is_move(self) -> bool {
        matches!(
            self,
            MessageType::TakeFromDeck
                | MessageType::TakeFromDiscard
                | MessageType::LayDown
                | MessageType::AddCard
                | MessageType::Discard
                | MessageType::Close
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One complete protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: MessageType,
    pub payload: String,
}

impl Frame {
    pub fn new(msg_type: MessageType, payload: impl Into<String>) -> Self {
        Self {
            msg_type,
            payload: payload.into(),
        }
    }

    /// Serializes the frame into its wire representation
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        encode(self.msg_type, &self.payload)
    }
}

/// Failures while reading or writing frames
///
/// `Disconnected` and `Io` are transport failures. The remaining variants are
/// protocol violations after which the stream can no longer be trusted.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("peer closed the connection")]
    Disconnected,
    #[error("no frame start found after {discarded} garbage bytes")]
    Resync { discarded: usize },
    #[error("unknown message type {0:?}")]
    UnknownType(String),
    #[error("malformed length field {0:?}")]
    MalformedLength(String),
    #[error("payload of {0} bytes exceeds the 9999 byte limit")]
    PayloadTooLarge(usize),
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// True when the peer went away rather than sent something invalid
    pub fn is_transport(&self) -> bool {
        matches!(self, FrameError::Disconnected | FrameError::Io(_))
    }
}

/// Encodes a message type and payload into a frame
pub fn encode(msg_type: MessageType, payload: &str) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge(payload.len()));
    }

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(msg_type.code().as_bytes());
    bytes.extend_from_slice(format!("{:04}", payload.len()).as_bytes());
    bytes.extend_from_slice(payload.as_bytes());
    Ok(bytes)
}

/// Writes a single frame and flushes the writer
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = frame.encode()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the next frame using the default garbage budget
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, FrameError>
where
    R: AsyncRead + Unpin,
{
    read_frame_with_budget(reader, MAX_GARBAGE_BYTES).await
}

/// Reads the next frame, skipping at most `budget - 1` bytes of garbage
///
/// Bytes are consumed one at a time until the last four read equal [`MAGIC`].
/// Each byte pushed out of the full window counts against the budget.
pub async fn read_frame_with_budget<R>(reader: &mut R, budget: usize) -> Result<Frame, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut window = [0u8; 4];
    let mut filled = 0;
    let mut discarded = 0;

    loop {
        let byte = read_byte(reader).await?;
        if filled < window.len() {
            window[filled] = byte;
            filled += 1;
        } else {
            window.copy_within(1.., 0);
            window[3] = byte;
            discarded += 1;
        }

        if discarded >= budget {
            return Err(FrameError::Resync { discarded });
        }
        if filled == window.len() && &window == MAGIC {
            break;
        }
    }

    let mut header = [0u8; HEADER_LEN - 4];
    read_exact(reader, &mut header).await?;

    let (type_bytes, length_bytes) = header.split_at(4);
    let msg_type = MessageType::from_code(type_bytes).ok_or_else(|| {
        FrameError::UnknownType(String::from_utf8_lossy(type_bytes).into_owned())
    })?;

    if !length_bytes.iter().all(u8::is_ascii_digit) {
        return Err(FrameError::MalformedLength(
            String::from_utf8_lossy(length_bytes).into_owned(),
        ));
    }
    let length = length_bytes
        .iter()
        .fold(0usize, |acc, digit| acc * 10 + usize::from(digit - b'0'));

    let mut payload = vec![0u8; length];
    read_exact(reader, &mut payload).await?;

    let payload = String::from_utf8(payload).map_err(|_| FrameError::InvalidUtf8)?;
    Ok(Frame { msg_type, payload })
}

async fn read_byte<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u8, FrameError> {
    reader.read_u8().await.map_err(map_read_error)
}

async fn read_exact<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<(), FrameError> {
    reader.read_exact(buf).await.map_err(map_read_error)?;
    Ok(())
}

fn map_read_error(err: std::io::Error) -> FrameError {
    match err.kind() {
        std::io::ErrorKind::UnexpectedEof
        | std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::ConnectionAborted => FrameError::Disconnected,
        _ => FrameError::Io(err),
    }
}
