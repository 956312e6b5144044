//! Demultiplexing of combined container log streams
//!
//! When a container runs without a TTY the runtime multiplexes stdout and
//! stderr into one byte stream. Each frame is an 8-byte header followed by
//! its payload:
//!
//! ```text
//! +--------+--------+--------+--------+--------+--------+--------+--------+
//! | stream |   0    |   0    |   0    |        payload length (BE u32)    |
//! +--------+--------+--------+--------+--------+--------+--------+--------+
//! ```
//!
//! Stream 1 is stdout and stream 2 is stderr.

/// Size of a frame header in bytes
pub const HEADER_LEN: usize = 8;

/// Stream a frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
    /// Any other stream byte; skipped by [`demultiplex`]
    Other(u8),
}

impl StreamKind {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => StreamKind::Stdin,
            1 => StreamKind::Stdout,
            2 => StreamKind::Stderr,
            other => StreamKind::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            StreamKind::Stdin => 0,
            StreamKind::Stdout => 1,
            StreamKind::Stderr => 2,
            StreamKind::Other(byte) => byte,
        }
    }
}

/// One complete frame borrowed from a log buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFrame<'a> {
    pub stream: StreamKind,
    pub payload: &'a [u8],
}

/// Append a framed payload to `out`
///
/// Payloads longer than `u32::MAX` bytes are split across several frames.
pub fn encode_frame(stream: StreamKind, payload: &[u8], out: &mut Vec<u8>) {
    if payload.is_empty() {
        write_header(stream, 0, out);
        return;
    }
    for chunk in payload.chunks(u32::MAX as usize) {
        write_header(stream, chunk.len() as u32, out);
        out.extend_from_slice(chunk);
    }
}

fn write_header(stream: StreamKind, len: u32, out: &mut Vec<u8>) {
    out.push(stream.as_byte());
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(&len.to_be_bytes());
}

/// Split a buffer into complete frames
///
/// Returns the parsed frames and the unparsed remainder. Parsing stops at the
/// first header that does not fit, or whose declared payload runs past the
/// end of the buffer; everything from that header on is returned as the
/// remainder. The buffer comes from a container that has already exited, so
/// a short tail is a truncated final frame, not data still in flight.
pub fn parse_frames(buf: &[u8]) -> (Vec<LogFrame<'_>>, &[u8]) {
    let mut frames = Vec::new();
    let mut offset = 0;

    while buf.len() - offset >= HEADER_LEN {
        let header = &buf[offset..offset + HEADER_LEN];
        let stream = StreamKind::from_byte(header[0]);
        let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

        let start = offset + HEADER_LEN;
        if buf.len() - start < len {
            break;
        }

        frames.push(LogFrame {
            stream,
            payload: &buf[start..start + len],
        });
        offset = start + len;
    }

    (frames, &buf[offset..])
}

/// Separated output of a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemuxedLogs {
    pub stdout: String,
    pub stderr: String,
    /// Bytes dropped from the end of the buffer as an incomplete frame
    pub discarded: usize,
}

/// Separate a combined log buffer into trimmed stdout and stderr text
///
/// Frames for streams other than stdout and stderr are ignored. A truncated
/// trailing frame is dropped, and its size reported in
/// [`DemuxedLogs::discarded`]. Invalid UTF-8 is replaced rather than rejected.
pub fn demultiplex(buf: &[u8]) -> DemuxedLogs {
    let (frames, remainder) = parse_frames(buf);

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    for frame in frames {
        match frame.stream {
            StreamKind::Stdout => stdout.extend_from_slice(frame.payload),
            StreamKind::Stderr => stderr.extend_from_slice(frame.payload),
            StreamKind::Stdin | StreamKind::Other(_) => {}
        }
    }

    DemuxedLogs {
        stdout: String::from_utf8_lossy(&stdout).trim().to_owned(),
        stderr: String::from_utf8_lossy(&stderr).trim().to_owned(),
        discarded: remainder.len(),
    }
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    fn arb_frames() -> impl Strategy<Value = Vec<(u8, Vec<u8>)>> {
        prop::collection::vec(
            (0u8..4, prop::collection::vec(any::<u8>(), 0..64)),
            0..16,
        )
    }

    proptest! {
        #[test]
        fn parse_recovers_every_encoded_frame(frames in arb_frames()) {
            let mut buf = Vec::new();
            for (stream, payload) in &frames {
                encode_frame(StreamKind::from_byte(*stream), payload, &mut buf);
            }
            let (parsed, remainder) = parse_frames(&buf);
            prop_assert!(remainder.is_empty());
            prop_assert_eq!(parsed.len(), frames.len());
            for (frame, (stream, payload)) in parsed.iter().zip(&frames) {
                prop_assert_eq!(frame.stream.as_byte(), *stream);
                prop_assert_eq!(frame.payload, payload.as_slice());
            }
        }

        #[test]
        fn any_truncation_yields_a_prefix(frames in arb_frames(), cut in any::<prop::sample::Index>()) {
            let mut buf = Vec::new();
            for (stream, payload) in &frames {
                encode_frame(StreamKind::from_byte(*stream), payload, &mut buf);
            }
            let cut = if buf.is_empty() { 0 } else { cut.index(buf.len() + 1) };
            let (parsed, remainder) = parse_frames(&buf[..cut]);
            prop_assert!(parsed.len() <= frames.len());
            prop_assert!(remainder.len() < HEADER_LEN + 64);
            for (frame, (stream, payload)) in parsed.iter().zip(&frames) {
                prop_assert_eq!(frame.stream.as_byte(), *stream);
                prop_assert_eq!(frame.payload, payload.as_slice());
            }
        }

        #[test]
        fn demultiplex_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
            let _ = demultiplex(&bytes);
        }
    }
}
