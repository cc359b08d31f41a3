//! Length-prefixed framing.
//!
//! Each frame is a 4-byte big-endian length followed by the payload. The
//! length counts itself, so an empty payload has length 4.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

pub const HEADER_LEN: usize = 4;

/// Refuse frames larger than this rather than allocate for them.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

pub const HELLO: &[u8] = b"nodelink/hello";
pub const HEARTBEAT: &[u8] = b"nodelink/heartbeat";

pub fn encode(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u32((HEADER_LEN + payload.len()) as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Read one frame. `Ok(None)` on clean EOF at a frame boundary.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Option<Bytes>> {
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_be_bytes(header) as usize;
    if !(HEADER_LEN..=MAX_FRAME_LEN).contains(&len) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("bad frame length {len}"),
        ));
    }

    let mut payload = vec![0u8; len - HEADER_LEN];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Bytes::from(payload)))
}
