use bytes::{Buf, Bytes, BytesMut};
use tracing::debug;

use crate::codec::{FEND, FESC, TFEND, TFESC};
use crate::error::{FrameError, Result};

/// Default bound on bytes a [`KissDecoder`] holds for one unfinished frame.
pub const DEFAULT_MAX_BUFFER: usize = 8 * 1024;

/// Outcome of one tokenizer step.
#[derive(Debug)]
pub struct Split {
    /// Bytes to drop from the front of the buffer.
    pub consumed: usize,
    /// `Ok(Some(token))` for a decoded frame, `Ok(None)` when nothing was
    /// produced, `Err` for a framing error.
    pub result: Result<Option<Bytes>>,
}

impl Split {
    fn wait() -> Self {
        Self {
            consumed: 0,
            result: Ok(None),
        }
    }
}

enum Scan {
    /// No delimiter anywhere.
    Noise,
    /// A start delimiter with nothing closing it yet.
    Unterminated,
    /// `FESC` directly before the closing delimiter at `end`.
    DanglingEscape { end: usize },
    /// `FESC` followed by `byte`, frame closes at `end`.
    InvalidEscape { end: usize, byte: u8 },
    /// A whole frame closing at `end`.
    Frame { end: usize, token: Bytes },
}

fn scan(data: &[u8]) -> Scan {
    let Some(start) = data.iter().position(|&b| b == FEND) else {
        return Scan::Noise;
    };
    let Some(len) = data[start + 1..].iter().position(|&b| b == FEND) else {
        return Scan::Unterminated;
    };
    let end = start + 1 + len;
    let raw = &data[start + 1..end];

    let mut token = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] != FESC {
            token.push(raw[i]);
            i += 1;
            continue;
        }
        match raw.get(i + 1) {
            None => return Scan::DanglingEscape { end },
            Some(&TFEND) => token.push(FEND),
            Some(&TFESC) => token.push(FESC),
            Some(&byte) => return Scan::InvalidEscape { end, byte },
        }
        i += 2;
    }

    Scan::Frame {
        end,
        token: Bytes::from(token),
    }
}

/// One restartable tokenizer step over `data`.
///
/// Never consumes bytes it has not fully interpreted, so calling again with
/// more bytes appended is always safe:
/// - no delimiter: wait, or at EOF discard everything silently
/// - start without end: wait, or at EOF discard everything with
///   [`FrameError::IncompleteFrame`]
/// - dangling escape before the closing delimiter: wait, or at EOF fail with
///   [`FrameError::IncompleteEscape`] through the closing delimiter
/// - invalid escape: fail with [`FrameError::InvalidEscape`] through the
///   closing delimiter
/// - otherwise consume through the closing delimiter and emit the token
pub fn split(data: &[u8], at_eof: bool) -> Split {
    match scan(data) {
        Scan::Noise if at_eof => Split {
            consumed: data.len(),
            result: Ok(None),
        },
        Scan::Unterminated if at_eof => Split {
            consumed: data.len(),
            result: Err(FrameError::IncompleteFrame),
        },
        Scan::DanglingEscape { end } if at_eof => Split {
            consumed: end + 1,
            result: Err(FrameError::IncompleteEscape),
        },
        Scan::Noise | Scan::Unterminated | Scan::DanglingEscape { .. } => Split::wait(),
        Scan::InvalidEscape { end, byte } => Split {
            consumed: end + 1,
            result: Err(FrameError::InvalidEscape { byte }),
        },
        Scan::Frame { end, token } => Split {
            consumed: end + 1,
            result: Ok(Some(token)),
        },
    }
}

/// Pull the next token out of `buf`, advancing past whatever was interpreted.
///
/// Same rules as [`split`], plus two live-stream bounds so a link never
/// stalls: a dangling escape is resolved once bytes arrive beyond its closing
/// delimiter, and noise or an unterminated frame is dropped once the buffer
/// exceeds `max_buffer`.
pub(crate) fn next_token(
    buf: &mut BytesMut,
    at_eof: bool,
    max_buffer: usize,
) -> Option<Result<Bytes>> {
    loop {
        if buf.is_empty() {
            return None;
        }

        let step = match scan(buf) {
            Scan::DanglingEscape { end } if !at_eof && buf.len() > end + 1 => Split {
                consumed: end + 1,
                result: Err(FrameError::IncompleteEscape),
            },
            Scan::Unterminated if !at_eof && buf.len() > max_buffer => Split {
                consumed: buf.len(),
                result: Err(FrameError::FrameTooLong {
                    len: buf.len(),
                    max: max_buffer,
                }),
            },
            Scan::Noise if !at_eof && buf.len() > max_buffer => Split {
                consumed: buf.len(),
                result: Ok(None),
            },
            _ => split(buf, at_eof),
        };

        if step.consumed == 0 {
            return None;
        }
        buf.advance(step.consumed);

        match step.result {
            Ok(Some(token)) => return Some(Ok(token)),
            Ok(None) => {
                debug!(discarded = step.consumed, "discarded bytes outside any frame");
                continue;
            }
            Err(err) => return Some(Err(err)),
        }
    }
}

/// Incremental tokenizer that owns its buffer.
///
/// Feed it arbitrarily chunked bytes; call [`KissDecoder::finish`] once the
/// stream ends to flush whatever is left.
#[derive(Debug)]
pub struct KissDecoder {
    buf: BytesMut,
    max_buffer: usize,
}

impl Default for KissDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl KissDecoder {
    /// Create a decoder with [`DEFAULT_MAX_BUFFER`].
    pub fn new() -> Self {
        Self::with_max_buffer(DEFAULT_MAX_BUFFER)
    }

    /// Create a decoder with an explicit buffer bound.
    pub fn with_max_buffer(max_buffer: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(max_buffer.min(DEFAULT_MAX_BUFFER)),
            max_buffer,
        }
    }

    /// Append bytes without decoding.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Next token from the buffered bytes, if one is complete.
    pub fn next_token(&mut self, at_eof: bool) -> Option<Result<Bytes>> {
        next_token(&mut self.buf, at_eof, self.max_buffer)
    }

    /// Append bytes and drain every token now available.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Result<Bytes>> {
        self.push(data);
        std::iter::from_fn(|| self.next_token(false)).collect()
    }

    /// Signal end-of-stream and drain the remainder.
    pub fn finish(&mut self) -> Vec<Result<Bytes>> {
        std::iter::from_fn(|| self.next_token(true)).collect()
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;

    fn token(step: Split) -> Bytes {
        step.result.unwrap().expect("expected a token")
    }

    #[test]
    fn noise_waits_then_discards_at_eof() {
        let data = [0x01, 0x02, 0x03];

        let live = split(&data, false);
        assert_eq!(live.consumed, 0);
        assert!(matches!(live.result, Ok(None)));

        let eof = split(&data, true);
        assert_eq!(eof.consumed, data.len());
        assert!(matches!(eof.result, Ok(None)));
    }

    #[test]
    fn empty_buffer_at_eof_consumes_nothing() {
        let step = split(&[], true);
        assert_eq!(step.consumed, 0);
        assert!(matches!(step.result, Ok(None)));
    }

    #[test]
    fn unterminated_waits_then_fails_at_eof() {
        let data = [0xAA, FEND, 0x00, b'h', b'i'];

        let live = split(&data, false);
        assert_eq!(live.consumed, 0);
        assert!(matches!(live.result, Ok(None)));

        let eof = split(&data, true);
        assert_eq!(eof.consumed, data.len());
        assert!(matches!(eof.result, Err(FrameError::IncompleteFrame)));
    }

    #[test]
    fn consumes_exactly_one_frame_and_leaves_the_next() {
        let first = encode(0x00, b"first");
        let second = encode(0x10, b"second");
        let mut data = first.to_vec();
        data.extend_from_slice(&second);

        let step = split(&data, false);
        assert_eq!(step.consumed, first.len());
        let tok = token(step);
        assert_eq!(tok[0], 0x00);
        assert_eq!(&tok[1..6], b"first");

        let rest = &data[first.len()..];
        assert_eq!(rest, second.as_ref());
        let step = split(rest, false);
        assert_eq!(step.consumed, second.len());
        assert_eq!(token(step)[0], 0x10);
    }

    #[test]
    fn leading_noise_is_consumed_with_the_frame() {
        let mut data = vec![0x55, 0x66];
        data.extend_from_slice(&encode(0x00, b"abc"));

        let step = split(&data, false);
        assert_eq!(step.consumed, data.len());
        assert_eq!(&token(step)[1..4], b"abc");
    }

    #[test]
    fn unescapes_transposed_bytes() {
        let data = [FEND, 0x00, FESC, TFEND, 0x41, FESC, TFESC, FEND];
        let step = split(&data, false);
        assert_eq!(token(step).as_ref(), &[0x00, FEND, 0x41, FESC]);
    }

    #[test]
    fn dangling_escape_waits_then_fails_at_eof() {
        let data = [FEND, 0x00, 0x41, FESC, FEND];

        let live = split(&data, false);
        assert_eq!(live.consumed, 0);
        assert!(matches!(live.result, Ok(None)));

        let eof = split(&data, true);
        assert_eq!(eof.consumed, data.len());
        assert!(matches!(eof.result, Err(FrameError::IncompleteEscape)));
    }

    #[test]
    fn invalid_escape_consumes_through_closing_delimiter() {
        let mut data = vec![FEND, 0x00, FESC, 0x41, FEND];
        let tail = encode(0x00, b"ok");
        data.extend_from_slice(&tail);

        let step = split(&data, false);
        assert_eq!(step.consumed, 5);
        assert!(matches!(
            step.result,
            Err(FrameError::InvalidEscape { byte: 0x41 })
        ));
        assert_eq!(&data[step.consumed..], tail.as_ref());
    }

    #[test]
    fn back_to_back_delimiters_yield_empty_token() {
        let step = split(&[FEND, FEND], false);
        assert_eq!(step.consumed, 2);
        assert!(token(step).is_empty());
    }

    #[test]
    fn decoder_survives_byte_at_a_time_delivery() {
        let mut wire = vec![0x13, 0x37];
        wire.extend_from_slice(&encode(0x00, &[FEND, b'x', FESC]));
        wire.extend_from_slice(&encode(0x20, b"second frame here"));

        let mut decoder = KissDecoder::new();
        let mut tokens = Vec::new();
        for byte in &wire {
            for result in decoder.feed(std::slice::from_ref(byte)) {
                tokens.push(result.unwrap());
            }
        }
        assert!(decoder.finish().is_empty());

        assert_eq!(tokens.len(), 2);
        assert_eq!(&tokens[0][..4], &[0x00, FEND, b'x', FESC]);
        assert_eq!(tokens[1][0], 0x20);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn decoder_resyncs_after_invalid_escape() {
        let mut decoder = KissDecoder::new();
        let mut wire = vec![FEND, 0x00, FESC, 0x00, FEND];
        wire.extend_from_slice(&encode(0x00, b"good"));

        let results = decoder.feed(&wire);
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(FrameError::InvalidEscape { byte: 0x00 })));
        assert_eq!(&results[1].as_ref().unwrap()[1..5], b"good");
    }

    #[test]
    fn decoder_resolves_dangling_escape_once_more_data_arrives() {
        let mut decoder = KissDecoder::new();
        assert!(decoder.feed(&[FEND, 0x00, 0x41, FESC, FEND]).is_empty());
        assert_eq!(decoder.buffered(), 5);

        let results = decoder.feed(&encode(0x00, b"next"));
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(FrameError::IncompleteEscape)));
        assert_eq!(&results[1].as_ref().unwrap()[1..5], b"next");
    }

    #[test]
    fn decoder_bounds_unterminated_frames() {
        let mut decoder = KissDecoder::with_max_buffer(16);
        assert!(decoder.feed(&[FEND, 0x00, 1, 2, 3]).is_empty());

        let results = decoder.feed(&[0x41; 16]);
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(FrameError::FrameTooLong { len: 21, max: 16 })
        ));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn decoder_drops_unbounded_noise() {
        let mut decoder = KissDecoder::with_max_buffer(8);
        assert!(decoder.feed(&[0x01; 9]).is_empty());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn decoder_finish_reports_truncated_frame() {
        let mut decoder = KissDecoder::new();
        assert!(decoder.feed(&[FEND, 0x00, b'h']).is_empty());

        let results = decoder.finish();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(FrameError::IncompleteFrame)));
        assert_eq!(decoder.buffered(), 0);
    }
}
