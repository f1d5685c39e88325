//! Command relay over the Chrome Native Messaging protocol.
//!
//! Each message is a 4-byte little-endian length followed by UTF-8 JSON.
//! The extension's side panel and embedded players understand
//! `PAUSE_REELS` / `PLAY_REELS`.

use crate::surface::Surface;
use crate::types::{SurfaceCommand, SurfaceError, SurfaceId};
use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::trace;

/// Largest frame accepted in either direction
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Message sent to an extension surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayMessage {
    PauseReels,
    PlayReels,
}

impl From<SurfaceCommand> for RelayMessage {
    fn from(command: SurfaceCommand) -> Self {
        match command {
            SurfaceCommand::Pause => RelayMessage::PauseReels,
            SurfaceCommand::Play => RelayMessage::PlayReels,
        }
    }
}

/// Write one framed message
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_vec(message)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    if json.len() > MAX_MESSAGE_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Message too large",
        ));
    }

    let len = (json.len() as u32).to_le_bytes();
    writer.write_all(&len).await?;
    writer.write_all(&json).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message
pub async fn read_message<R, T>(reader: &mut R) -> io::Result<T>
where
    R: AsyncRead + Unpin,
    T: for<'de> Deserialize<'de>,
{
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_MESSAGE_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Message too large",
        ));
    }

    let mut buffer = vec![0u8; len];
    reader.read_exact(&mut buffer).await?;

    serde_json::from_slice(&buffer)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

/// Surface reached through a native messaging pipe
pub struct RelaySurface<W> {
    id: SurfaceId,
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> RelaySurface<W> {
    pub fn new(id: impl Into<SurfaceId>, writer: W) -> Self {
        Self {
            id: id.into(),
            writer: Mutex::new(writer),
        }
    }

    async fn relay(&self, command: SurfaceCommand) -> Result<(), SurfaceError> {
        let message = RelayMessage::from(command);
        let mut writer = self.writer.lock().await;
        write_message(&mut *writer, &message).await?;
        trace!("Relayed {:?} to {}", message, self.id);
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> Surface for RelaySurface<W> {
    fn id(&self) -> SurfaceId {
        self.id.clone()
    }

    async fn pause_all(&self) -> Result<(), SurfaceError> {
        self.relay(SurfaceCommand::Pause).await
    }

    async fn play_all(&self) -> Result<(), SurfaceError> {
        self.relay(SurfaceCommand::Play).await
    }
}
