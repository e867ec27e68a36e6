//! Chunk-to-line splitting for subprocess output.

/// Accumulates raw pipe chunks and yields complete lines
///
/// Both `\n` and `\r` end a line, so pacman progress bars come out as
/// separate updates. Lines are trimmed and empty ones dropped.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                let raw = std::mem::take(&mut self.pending);
                push_line(&mut lines, &raw);
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Flush the unterminated remainder
    pub fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.pending);
        let mut lines = Vec::with_capacity(1);
        push_line(&mut lines, &raw);
        lines.pop()
    }
}

fn push_line(lines: &mut Vec<String>, raw: &[u8]) {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        lines.push(trimmed.to_string());
    }
}
