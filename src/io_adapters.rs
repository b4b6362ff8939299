use crate::command::{Stdin, Stdout, StreamKind};
use std::cell::RefCell;
use std::io::{Cursor, Read, Result as IoResult, Write};
use std::rc::Rc;

/// Memory-backed reader feeding a command from an earlier pipeline stage.
pub struct MemReader {
    cursor: Cursor<Vec<u8>>,
}

impl MemReader {
    /// Create a MemReader that will read from the provided buffer.
    pub fn new(buf: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }
}

impl Read for MemReader {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        self.cursor.read(out)
    }
}

impl Stdin for MemReader {
    fn kind(&self) -> StreamKind {
        StreamKind::Captured
    }
}

/// Memory-backed writer capturing a command's output for the next pipeline
/// stage or a redirect target.
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    pub fn new() -> Self {
        Self {
            buf: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Convenience: create writer and return (writer, rc_handle) so the
    /// caller can read collected bytes after command execution.
    pub fn with_handle() -> (Self, Rc<RefCell<Vec<u8>>>) {
        let mw = MemWriter::new();
        let rc = mw.buf.clone();
        (mw, rc)
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl Stdout for MemWriter {
    fn kind(&self) -> StreamKind {
        StreamKind::Captured
    }
}

/// The shell's own standard input, handed to commands that are not fed by a
/// pipe.
pub struct InheritedStdin;

impl Read for InheritedStdin {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        std::io::stdin().lock().read(buf)
    }
}

impl Stdin for InheritedStdin {
    fn kind(&self) -> StreamKind {
        StreamKind::Inherit
    }
}

/// The shell's own standard output.
pub struct InheritedStdout;

impl Write for InheritedStdout {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        std::io::stdout().write(data)
    }

    fn flush(&mut self) -> IoResult<()> {
        std::io::stdout().flush()
    }
}

impl Stdout for InheritedStdout {
    fn kind(&self) -> StreamKind {
        StreamKind::Inherit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_writer_handle_sees_writes() {
        let (mut mw, handle) = MemWriter::with_handle();
        mw.write_all(b"captured").unwrap();
        drop(mw);
        assert_eq!(&*handle.borrow(), b"captured");
    }

    #[test]
    fn test_mem_reader_round_trip() {
        let mut reader = MemReader::new(b"abc".to_vec());
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "abc");
        assert_eq!(reader.kind(), StreamKind::Captured);
    }
}
