//! Length-prefixed message framing over a byte stream.
//!
//! Format: `[4 bytes little-endian length][bincode payload]`.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Packet, ProtocolError, MAX_MESSAGE_SIZE};

/// Serializes a packet into a frame payload.
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let data = bincode::serialize(packet)?;
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(data.len(), MAX_MESSAGE_SIZE));
    }
    Ok(data)
}

pub async fn read_frame<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    read_exact_or_closed(stream, &mut len_buf).await?;

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(len, MAX_MESSAGE_SIZE));
    }

    let mut buf = vec![0u8; len];
    read_exact_or_closed(stream, &mut buf).await?;
    Ok(buf)
}

/// Reads one frame and decodes it.
///
/// A payload that fails to decode yields `ProtocolError::Codec`; the frame has
/// already been consumed, so the caller may keep reading.
pub async fn read_packet<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Packet, ProtocolError> {
    let frame = read_frame(stream).await?;
    Ok(bincode::deserialize(&frame)?)
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    stream: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(data.len(), MAX_MESSAGE_SIZE));
    }

    stream.write_all(&(data.len() as u32).to_le_bytes()).await?;
    stream.write_all(data).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_exact_or_closed<R: AsyncRead + Unpin>(
    stream: &mut R,
    buf: &mut [u8],
) -> Result<(), ProtocolError> {
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(ProtocolError::ConnectionClosed),
        Err(e) => Err(ProtocolError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Intent, Snapshot};

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut bytes = (payload.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    #[tokio::test]
    async fn test_read_packet_from_stream() {
        let packet = Packet::Joined {
            identity: 2,
            snapshot: Snapshot::default(),
        };
        let bytes = framed(&encode_packet(&packet).unwrap());
        let mut stream = tokio_test::io::Builder::new().read(&bytes).build();

        let received = read_packet(&mut stream).await.unwrap();
        assert_eq!(received, packet);
    }

    #[tokio::test]
    async fn test_write_frame_prefixes_length() {
        let payload = encode_packet(&Packet::Heartbeat).unwrap();
        let mut stream = tokio_test::io::Builder::new()
            .write(&(payload.len() as u32).to_le_bytes())
            .write(&payload)
            .build();

        write_frame(&mut stream, &payload).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplex_roundtrip_of_several_packets() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let sent = vec![
            Packet::Join {
                room: "game".to_string(),
                client_version: 1,
            },
            Packet::Key(Intent::new(1, 0, 0, 0)),
            Packet::Leave,
        ];

        for packet in &sent {
            write_frame(&mut client, &encode_packet(packet).unwrap())
                .await
                .unwrap();
        }
        drop(client);

        for packet in &sent {
            assert_eq!(&read_packet(&mut server).await.unwrap(), packet);
        }
        assert!(matches!(
            read_packet(&mut server).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_is_refused() {
        let len = (MAX_MESSAGE_SIZE as u32 + 1).to_le_bytes();
        let mut stream = tokio_test::io::Builder::new().read(&len).build();

        match read_frame(&mut stream).await {
            Err(ProtocolError::MessageTooLarge(n, max)) => {
                assert_eq!(n, MAX_MESSAGE_SIZE + 1);
                assert_eq!(max, MAX_MESSAGE_SIZE);
            }
            other => panic!("expected MessageTooLarge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbage_payload_is_recoverable() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, &[0xff, 0xff, 0xff, 0xff, 0xff])
            .await
            .unwrap();
        write_frame(&mut client, &encode_packet(&Packet::Heartbeat).unwrap())
            .await
            .unwrap();

        let err = read_packet(&mut server).await.unwrap_err();
        assert!(err.is_recoverable());
        // The bad frame was consumed; the stream is still usable.
        assert_eq!(read_packet(&mut server).await.unwrap(), Packet::Heartbeat);
    }

    #[tokio::test]
    async fn test_truncated_frame_reports_closed() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&10u32.to_le_bytes())
            .read(&[1, 2, 3])
            .build();

        assert!(matches!(
            read_frame(&mut stream).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }
}
