//! Length-prefixed binary framing: an ASCII decimal byte count, a `\n`, then
//! exactly that many bytes of opaque payload. Used identically by the
//! Control, FaultPack and Data messages.

use std::io::{Read, Write};

use crate::error::IpcError;

/// Frames larger than this are almost certainly a protocol desync; refuse
/// to allocate for them rather than reading an attacker- or bug-controlled
/// amount of memory.
const MAX_FRAME_BYTES: usize = 256 * 1024 * 1024;

pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), IpcError> {
    let header = format!("{}\n", payload.len());
    writer
        .write_all(header.as_bytes())
        .and_then(|_| writer.write_all(payload))
        .and_then(|_| writer.flush())
        .map_err(|source| IpcError::Io {
            path: "<frame writer>".to_string(),
            source,
        })
}

pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, IpcError> {
    let mut length_digits = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        reader.read_exact(&mut byte).map_err(|source| IpcError::Io {
            path: "<frame reader>".to_string(),
            source,
        })?;
        if byte[0] == b'\n' {
            break;
        }
        length_digits.push(byte[0]);
    }
    let length_str = String::from_utf8_lossy(&length_digits).into_owned();
    let length: usize = length_str
        .parse()
        .map_err(|_| IpcError::BadFrameLength(length_str))?;
    if length > MAX_FRAME_BYTES {
        return Err(IpcError::FrameTooLarge(length));
    }
    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).map_err(|source| IpcError::Io {
        path: "<frame reader>".to_string(),
        source,
    })?;
    Ok(payload)
}

pub fn write_message<W: Write, T: serde::Serialize>(writer: &mut W, message: &T) -> Result<(), IpcError> {
    let payload = bincode::serialize(message)?;
    write_frame(writer, &payload)
}

pub fn read_message<R: Read, T: serde::de::DeserializeOwned>(reader: &mut R) -> Result<T, IpcError> {
    let payload = read_frame(reader)?;
    bincode::deserialize(&payload).map_err(IpcError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frame_round_trips() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").unwrap();
        assert_eq!(buf, b"5\nhello");
        let mut cursor = Cursor::new(buf);
        let read_back = read_frame(&mut cursor).unwrap();
        assert_eq!(read_back, b"hello");
    }

    #[test]
    fn message_round_trips() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Sample {
            a: u32,
            b: String,
        }
        let sample = Sample {
            a: 7,
            b: "x".to_string(),
        };
        let mut buf = Vec::new();
        write_message(&mut buf, &sample).unwrap();
        let mut cursor = Cursor::new(buf);
        let read_back: Sample = read_message(&mut cursor).unwrap();
        assert_eq!(read_back, sample);
    }

    #[test]
    fn bad_length_prefix_is_rejected() {
        let mut cursor = Cursor::new(b"notanumber\nxxxx".to_vec());
        assert!(read_frame(&mut cursor).is_err());
    }
}
