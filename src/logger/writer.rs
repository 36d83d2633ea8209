use crate::batch::Batcher;
use crate::entry::Entry;
use crate::Error;
use std::io;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing_subscriber::fmt::MakeWriter;

/// Synchronous writer that turns each write into a raw entry.
///
/// Plugs into `tracing_subscriber::fmt().with_writer(logger.make_writer())`.
/// Writes never wait: a full queue yields [`io::ErrorKind::WouldBlock`] and a
/// closed batcher [`io::ErrorKind::BrokenPipe`]. Disable ANSI colors on the
/// fmt layer, otherwise escape codes end up in the payload.
#[derive(Clone)]
pub struct LogWriter {
    batcher: Arc<Batcher>,
}

impl LogWriter {
    pub(crate) fn new(batcher: Arc<Batcher>) -> Self {
        Self { batcher }
    }
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let line = String::from_utf8_lossy(buf);
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Ok(buf.len());
        }
        let entry = Entry::raw(line).with_timestamp(OffsetDateTime::now_utc());
        match self.batcher.try_write(entry) {
            Ok(()) => Ok(buf.len()),
            Err(Error::QueueFull) => Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "log queue is full",
            )),
            Err(e) => Err(io::Error::new(io::ErrorKind::BrokenPipe, e.to_string())),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
