use super::AudioError;
use tracing::debug;

/// Bytes of one voice capture, from the start chunk until capture end
///
/// A buffer only grows; [`AudioBuffer::seal`] consumes it so the captured
/// bytes can be read exactly once.
#[derive(Debug)]
pub struct AudioBuffer {
    mime_type: String,
    bytes: Vec<u8>,
    max_bytes: usize,
}

impl AudioBuffer {
    pub fn new(mime_type: impl Into<String>, max_bytes: usize) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: Vec::new(),
            max_bytes,
        }
    }

    /// Append a chunk; fails without modifying the buffer when the cap would be exceeded
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), AudioError> {
        let total = self.bytes.len() + chunk.len();
        if total > self.max_bytes {
            return Err(AudioError::TooLarge {
                limit: self.max_bytes,
            });
        }

        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Close the capture and hand out its contents
    pub fn seal(self) -> SealedAudio {
        let filename = format!("input_audio.{}", extension_for_mime(&self.mime_type));
        debug!("Sealed {} bytes of {} as {}", self.bytes.len(), self.mime_type, filename);

        SealedAudio {
            mime_type: self.mime_type,
            filename,
            bytes: self.bytes,
        }
    }
}

/// A finished capture ready for transcription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedAudio {
    pub mime_type: String,
    /// `input_audio.<ext>`; the transcription API picks its decoder from the extension
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// File extension the transcription API expects for a MIME type
///
/// `audio/webm;codecs=opus` -> `webm`, `audio/x-wav` -> `wav`, `audio/mpeg` -> `mpeg`.
pub fn extension_for_mime(mime_type: &str) -> String {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    let subtype = essence
        .split_once('/')
        .map(|(_, sub)| sub)
        .unwrap_or(essence)
        .to_ascii_lowercase();
    let subtype = subtype.strip_prefix("x-").unwrap_or(&subtype);

    match subtype {
        "wave" | "vnd.wave" => "wav".to_string(),
        "" => "webm".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_parameters_and_vendor_prefixes() {
        assert_eq!(extension_for_mime("audio/webm;codecs=opus"), "webm");
        assert_eq!(extension_for_mime("audio/x-wav"), "wav");
        assert_eq!(extension_for_mime("audio/wave"), "wav");
        assert_eq!(extension_for_mime("audio/x-m4a"), "m4a");
        assert_eq!(extension_for_mime("audio/mpeg"), "mpeg");
        assert_eq!(extension_for_mime("AUDIO/OGG"), "ogg");
    }

    #[test]
    fn malformed_mime_falls_back_to_webm() {
        assert_eq!(extension_for_mime(""), "webm");
        assert_eq!(extension_for_mime("audio/"), "webm");
    }

    #[test]
    fn rejected_chunk_leaves_buffer_untouched() {
        let mut buffer = AudioBuffer::new("audio/webm", 4);
        buffer.append(&[1, 2, 3]).unwrap();

        let err = buffer.append(&[4, 5]).unwrap_err();
        assert!(matches!(err, AudioError::TooLarge { limit: 4 }));
        assert_eq!(buffer.len(), 3);
    }
}
