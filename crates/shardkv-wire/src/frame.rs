use std::io::{self, Read, Write};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{DEFAULT_BUFFER_SIZE, DEFAULT_MAX_FRAME_LEN};

/// Transport-level failure reading or writing a single frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("expected {expected} bytes, received {received} before the peer stopped sending")]
    ShortRead { expected: u32, received: u32 },
    #[error("declared frame length {0} exceeds the configured maximum of {1}")]
    FrameTooLarge(u32, u32),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Writes `payload` as a single frame: a 4-byte little-endian length prefix
/// followed by the payload bytes.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len())
        .map_err(|_| FrameError::FrameTooLarge(u32::MAX, DEFAULT_MAX_FRAME_LEN))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}

/// Reads a single frame, enforcing `max_len` on the declared length before
/// allocating the receive buffer.
pub fn read_frame<R: Read>(reader: &mut R, max_len: u32) -> Result<Vec<u8>, FrameError> {
    let mut prefix = [0u8; 4];
    match read_exact_or_eof(reader, &mut prefix)? {
        0 => return Err(FrameError::ConnectionClosed),
        4 => {}
        n => {
            return Err(FrameError::ShortRead {
                expected: 4,
                received: n as u32,
            })
        }
    }

    let declared_len = u32::from_le_bytes(prefix);
    if declared_len > max_len {
        return Err(FrameError::FrameTooLarge(declared_len, max_len));
    }

    let mut data = Vec::with_capacity(declared_len as usize);
    let mut remaining = declared_len as usize;
    let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];
    while remaining > 0 {
        let chunk_len = remaining.min(buf.len());
        let read = reader.read(&mut buf[..chunk_len])?;
        if read == 0 {
            return Err(FrameError::ShortRead {
                expected: declared_len,
                received: data.len() as u32,
            });
        }
        data.extend_from_slice(&buf[..read]);
        remaining -= read;
    }
    Ok(data)
}

/// Like [`read_frame`], but keeps reading even on a short intermediate read
/// until either EOF or `buf` is full; returns the number of bytes read.
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let read = reader.read(&mut buf[total..])?;
        if read == 0 {
            break;
        }
        total += read;
    }
    Ok(total)
}

/// Async counterpart of [`write_frame`].
pub async fn write_frame_async<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len())
        .map_err(|_| FrameError::FrameTooLarge(u32::MAX, DEFAULT_MAX_FRAME_LEN))?;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Async counterpart of [`read_frame`].
pub async fn read_frame_async<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_len: u32,
) -> Result<Vec<u8>, FrameError> {
    let mut prefix = [0u8; 4];
    match reader.read(&mut prefix).await? {
        0 => return Err(FrameError::ConnectionClosed),
        4 => {}
        n => {
            // Finish draining the rest of the 4-byte prefix; a peer that
            // split the prefix across TCP segments is not itself an error.
            let mut got = n;
            while got < 4 {
                let more = reader.read(&mut prefix[got..]).await?;
                if more == 0 {
                    return Err(FrameError::ShortRead {
                        expected: 4,
                        received: got as u32,
                    });
                }
                got += more;
            }
        }
    }

    let declared_len = u32::from_le_bytes(prefix);
    if declared_len > max_len {
        return Err(FrameError::FrameTooLarge(declared_len, max_len));
    }

    let mut data = vec![0u8; declared_len as usize];
    let mut filled = 0;
    while filled < data.len() {
        let end = (filled + DEFAULT_BUFFER_SIZE).min(data.len());
        let read = reader.read(&mut data[filled..end]).await?;
        if read == 0 {
            return Err(FrameError::ShortRead {
                expected: declared_len,
                received: filled as u32,
            });
        }
        filled += read;
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_cursor() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello shardkv").unwrap();
        let mut cursor = io::Cursor::new(buf);
        let decoded = read_frame(&mut cursor, DEFAULT_MAX_FRAME_LEN).unwrap();
        assert_eq!(decoded, b"hello shardkv");
    }

    #[test]
    fn empty_payload_is_not_an_error() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"").unwrap();
        let mut cursor = io::Cursor::new(buf);
        let decoded = read_frame(&mut cursor, DEFAULT_MAX_FRAME_LEN).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn zero_length_prefix_on_empty_stream_signals_close() {
        let mut cursor = io::Cursor::new(Vec::<u8>::new());
        let err = read_frame(&mut cursor, DEFAULT_MAX_FRAME_LEN).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn truncated_payload_is_a_short_read() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"0123456789").unwrap();
        buf.truncate(6); // 4-byte prefix + 2 payload bytes
        let mut cursor = io::Cursor::new(buf);
        let err = read_frame(&mut cursor, DEFAULT_MAX_FRAME_LEN).unwrap_err();
        assert!(matches!(err, FrameError::ShortRead { .. }));
    }

    #[test]
    fn oversized_declared_length_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&100u32.to_le_bytes());
        let mut cursor = io::Cursor::new(buf);
        let err = read_frame(&mut cursor, 10).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge(100, 10)));
    }

    #[tokio::test]
    async fn async_round_trips_through_a_duplex_pipe() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        write_frame_async(&mut client, b"async shardkv").await.unwrap();
        let decoded = read_frame_async(&mut server, DEFAULT_MAX_FRAME_LEN)
            .await
            .unwrap();
        assert_eq!(decoded, b"async shardkv");
    }
}
