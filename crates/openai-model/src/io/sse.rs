use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading server-sent events from a chunk stream.
///
/// Only the `data` field is surfaced. Comment lines and the other fields
/// (`event`, `id`, `retry`) are skipped, and events without any data are
/// dropped.
pub struct Sse {
    buf: String,
    // Bytes of a multi-byte character split across two chunks.
    pending: Vec<u8>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: String::new(),
            pending: Vec::new(),
            chunks,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain complete events from the buffer before reading more.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                // Whatever is left in the buffer is an unterminated event,
                // which should be discarded.
                return Ok(None);
            };
            self.pending.extend_from_slice(&bytes);
            match str::from_utf8(&self.pending) {
                Ok(s) => {
                    self.buf.push_str(s);
                    self.pending.clear();
                }
                Err(err) if err.error_len().is_none() => {
                    let valid = err.valid_up_to();
                    let s = str::from_utf8(&self.pending[..valid])
                        .map_err(|_| Error::InvalidPayload)?;
                    self.buf.push_str(s);
                    self.pending.drain(..valid);
                }
                Err(_) => return Err(Error::InvalidPayload),
            }
        }
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            if self.buf.is_empty() {
                return Ok(None);
            }

            // event         = *( comment / field ) end-of-line
            // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
            //
            // For `end-of-line`, we handle line feed and carriage return +
            // line feed.
            if self.buf.contains('\r') {
                self.buf = self.buf.replace("\r\n", "\n");
            }
            let Some(eol_idx) = self.buf.find("\n\n") else {
                return Ok(None);
            };

            let mut data: Option<String> = None;
            for line in self.buf[..eol_idx].lines() {
                if line.starts_with(':') {
                    continue;
                }
                let (name, value) = match line.split_once(':') {
                    Some((name, value)) => {
                        (name, value.strip_prefix(' ').unwrap_or(value))
                    }
                    None => (line, ""),
                };
                match name {
                    "data" => {
                        let data = data.get_or_insert_default();
                        if !data.is_empty() {
                            data.push('\n');
                        }
                        data.push_str(value);
                    }
                    "event" | "id" | "retry" => {}
                    _ => return Err(Error::InvalidPayload),
                }
            }

            // Consume the bytes from the buffer.
            self.buf.drain(0..eol_idx + 2);

            if data.is_some() {
                return Ok(data);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn test_normal_events() {
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::from_static(b"data: hello\n\n"),
                Bytes::from_static(b"data: bye\n\n"),
            ]
            .into(),
        );
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "bye");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_quirk_streaming() {
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::from_static(b"data:"),
                Bytes::from_static(b" hello\n"),
                Bytes::from_static(b"\n"),
            ]
            .into(),
        );
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_comments_and_crlf() {
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::from_static(b": keep-alive\n\n"),
                Bytes::from_static(b"event: message\r\ndata: {}\r\n\r\n"),
                Bytes::from_static(b"data: [DONE]\n\n"),
            ]
            .into(),
        );
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "{}");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "[DONE]");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_utf8() {
        let text = "data: Dürer\n\n".as_bytes();
        // Split inside the two-byte `ü`.
        let split = text.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::copy_from_slice(&text[..split]),
                Bytes::copy_from_slice(&text[split..]),
            ]
            .into(),
        );
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "Dürer");
    }

    #[tokio::test]
    async fn test_split_utf8_across_many_chunks() {
        // A four-byte character delivered one byte at a time.
        let text = "data: 🎨 oil\n\n".as_bytes();
        let chunks = Chunks::from_vec_deque(
            text.iter().map(|b| Bytes::copy_from_slice(&[*b])).collect(),
        );
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "🎨 oil");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_data() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(b"xxxxxx: 1\n\n")].into(),
        );
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap_err(), Error::InvalidPayload);

        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(b"data: hello\n")].into(),
        );
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap(), None);

        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(&[0xFF, 0xFE, b'\n', b'\n'])].into(),
        );
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap_err(), Error::InvalidPayload);
    }
}
