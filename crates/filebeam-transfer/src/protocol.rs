/// TCP frame format for checksummed file transfer.
///
/// ```text
/// [0..10]   Header length (10 ASCII bytes, right-justified decimal)
/// [10..]    Header payload (UTF-8, '|'-delimited fields)
/// [..]      Chunk body (chunk frames only; length declared in header)
/// ```
///
/// Two header shapes are used:
/// - metadata: `<file_name>|<file_size>` (once, right after connect)
/// - chunk:    `<chunk_len>|<md5_hex>`   (before each chunk body)
///
/// The all-zero length field `"0000000000"` is the stream terminator;
/// it is the only frame without a header payload.

use std::io::{self, Read};

use crate::error::{FrameError, TransferError};

/// Width of the outer length field in bytes.
pub const LEN_FIELD: usize = 10;

/// Field separator inside header payloads.
pub const DELIMITER: char = '|';

/// End-of-stream marker for one transfer.
pub const TERMINATOR: &[u8; LEN_FIELD] = b"0000000000";

/// Default bytes per chunk.
pub const DEFAULT_CHUNK_SIZE: u32 = 4096;

/// Upper bound on a declared header payload length. Real headers are a
/// file name plus two short numeric fields; anything above this is a
/// hostile or corrupt length field, not a header.
pub const MAX_HEADER_LEN: usize = 64 * 1024;

/// Upper bound on a declared chunk body length.
pub const MAX_CHUNK_LEN: usize = 64 * 1024 * 1024;

/// Encode the outer length field for a header payload of `len` bytes.
///
/// # Panics
/// Panics if `len` exceeds [`MAX_HEADER_LEN`].
pub fn encode_len_field(len: usize) -> [u8; LEN_FIELD] {
    assert!(len <= MAX_HEADER_LEN, "header payload too large to frame");
    let text = format!("{len:>width$}", width = LEN_FIELD);
    let mut field = [0u8; LEN_FIELD];
    field.copy_from_slice(text.as_bytes());
    field
}

/// Build the metadata frame sent once per transfer.
pub fn metadata_frame(file_name: &str, file_size: u64) -> Vec<u8> {
    frame(format!("{file_name}{DELIMITER}{file_size}").as_bytes())
}

/// Build the header frame preceding one chunk body.
pub fn chunk_header_frame(chunk_len: usize, digest: &str) -> Vec<u8> {
    frame(format!("{chunk_len}{DELIMITER}{digest}").as_bytes())
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(LEN_FIELD + payload.len());
    buf.extend_from_slice(&encode_len_field(payload.len()));
    buf.extend_from_slice(payload);
    buf
}

/// Parse a metadata payload into `(file_name, file_size)`.
///
/// Splits on the last delimiter so the size field stays unambiguous
/// even if the transmitted name contains one.
pub fn parse_metadata(payload: &str) -> Result<(String, u64), FrameError> {
    let (name, size) = payload
        .rsplit_once(DELIMITER)
        .ok_or(FrameError::MissingDelimiter)?;
    let size: u64 = size
        .trim()
        .parse()
        .map_err(|_| FrameError::BadNumber(size.to_string()))?;
    Ok((name.to_string(), size))
}

/// Parse a chunk header payload into `(chunk_len, digest)`.
pub fn parse_chunk_header(payload: &str) -> Result<(usize, String), FrameError> {
    let (len, digest) = payload
        .split_once(DELIMITER)
        .ok_or(FrameError::MissingDelimiter)?;
    let len: usize = len
        .trim()
        .parse()
        .map_err(|_| FrameError::BadNumber(len.to_string()))?;
    if len > MAX_CHUNK_LEN {
        return Err(FrameError::OversizedChunk(len));
    }
    Ok((len, digest.to_string()))
}

/// Read one outer length field. `Ok(None)` is the terminator.
///
/// A peer that closes the connection mid-field yields
/// [`FrameError::ConnectionClosed`], not an I/O error: short reads are
/// a protocol failure for the current transfer, never for the process.
pub fn read_len_field<R: Read>(r: &mut R) -> Result<Option<usize>, TransferError> {
    let mut field = [0u8; LEN_FIELD];
    r.read_exact(&mut field).map_err(map_read_err)?;
    if &field == TERMINATOR {
        return Ok(None);
    }
    let text = String::from_utf8_lossy(&field);
    let trimmed = text.trim();
    let len: usize = trimmed
        .parse()
        .map_err(|_| FrameError::BadLength(trimmed.to_string()))?;
    if len == 0 {
        return Err(FrameError::EmptyHeader.into());
    }
    if len > MAX_HEADER_LEN {
        return Err(FrameError::OversizedHeader(len).into());
    }
    Ok(Some(len))
}

/// Read exactly `len` bytes of header payload as UTF-8.
pub fn read_header<R: Read>(r: &mut R, len: usize) -> Result<String, TransferError> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(map_read_err)?;
    String::from_utf8(buf).map_err(|_| TransferError::Frame(FrameError::NotUtf8))
}

/// Read exactly `len` bytes of chunk body.
pub fn read_body<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>, TransferError> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(map_read_err)?;
    Ok(buf)
}

fn map_read_err(err: io::Error) -> TransferError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        FrameError::ConnectionClosed.into()
    } else {
        TransferError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn len_field_is_right_justified() {
        assert_eq!(&encode_len_field(7), b"         7");
        assert_eq!(&encode_len_field(1024), b"      1024");
    }

    #[test]
    fn metadata_frame_layout() {
        let frame = metadata_frame("a.txt", 3);
        assert_eq!(&frame[..LEN_FIELD], b"         7");
        assert_eq!(&frame[LEN_FIELD..], b"a.txt|3");
    }

    #[test]
    fn chunk_header_frame_layout() {
        let frame = chunk_header_frame(4096, "00ff");
        assert_eq!(&frame[..LEN_FIELD], b"         9");
        assert_eq!(&frame[LEN_FIELD..], b"4096|00ff");
    }

    #[test]
    fn metadata_roundtrip() {
        let frame = metadata_frame("report.pdf", 123_456);
        let mut cursor = Cursor::new(frame);
        let len = read_len_field(&mut cursor).unwrap().unwrap();
        let payload = read_header(&mut cursor, len).unwrap();
        assert_eq!(parse_metadata(&payload).unwrap(), ("report.pdf".into(), 123_456));
    }

    #[test]
    fn metadata_splits_on_last_delimiter() {
        let (name, size) = parse_metadata("odd|name.txt|42").unwrap();
        assert_eq!(name, "odd|name.txt");
        assert_eq!(size, 42);
    }

    #[test]
    fn metadata_without_delimiter_is_rejected() {
        assert!(matches!(
            parse_metadata("no-delimiter-here"),
            Err(FrameError::MissingDelimiter)
        ));
    }

    #[test]
    fn metadata_with_non_numeric_size_is_rejected() {
        assert!(matches!(
            parse_metadata("file.txt|lots"),
            Err(FrameError::BadNumber(_))
        ));
    }

    #[test]
    fn chunk_header_parses() {
        let (len, digest) = parse_chunk_header("512|d41d8cd98f00b204e9800998ecf8427e").unwrap();
        assert_eq!(len, 512);
        assert_eq!(digest, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn oversized_chunk_declaration_is_rejected() {
        let payload = format!("{}|abcd", MAX_CHUNK_LEN + 1);
        assert!(matches!(
            parse_chunk_header(&payload),
            Err(FrameError::OversizedChunk(_))
        ));
    }

    #[test]
    fn terminator_reads_as_none() {
        let mut cursor = Cursor::new(TERMINATOR.to_vec());
        assert!(read_len_field(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn garbage_len_field_is_rejected() {
        let mut cursor = Cursor::new(b"abcdefghij".to_vec());
        assert!(matches!(
            read_len_field(&mut cursor),
            Err(TransferError::Frame(FrameError::BadLength(_)))
        ));
    }

    #[test]
    fn zero_len_field_that_is_not_the_terminator_is_rejected() {
        let mut cursor = Cursor::new(b"         0".to_vec());
        assert!(matches!(
            read_len_field(&mut cursor),
            Err(TransferError::Frame(FrameError::EmptyHeader))
        ));
    }

    #[test]
    fn oversized_header_declaration_is_rejected() {
        let mut cursor = Cursor::new(b"9999999999".to_vec());
        assert!(matches!(
            read_len_field(&mut cursor),
            Err(TransferError::Frame(FrameError::OversizedHeader(_)))
        ));
    }

    #[test]
    fn truncated_field_is_a_protocol_failure() {
        let mut cursor = Cursor::new(b"    1".to_vec());
        assert!(matches!(
            read_len_field(&mut cursor),
            Err(TransferError::Frame(FrameError::ConnectionClosed))
        ));
    }

    #[test]
    fn truncated_body_is_a_protocol_failure() {
        let mut cursor = Cursor::new(b"short".to_vec());
        assert!(matches!(
            read_body(&mut cursor, 64),
            Err(TransferError::Frame(FrameError::ConnectionClosed))
        ));
    }
}
