//! In-process pipes
//!
//! A [`PipeWriter`]/[`PipeReader`] pair behaves like one direction of a named
//! pipe: bytes become visible to the reader only when the writer flushes, and
//! dropping the writer ends the stream. Chunks travel over a
//! `crossbeam_channel`, so each end can live on its own thread.
//!
//! [`connected_pair`] wires two pipes into the request/response layout used by
//! [`ClassifierChannel`](super::ClassifierChannel) and
//! [`ClassifierPeer`](super::ClassifierPeer).

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io::{self, BufRead, Read, Write};

/// Writing end of an in-process pipe
#[derive(Debug)]
pub struct PipeWriter {
    tx: Sender<Vec<u8>>,
    pending: Vec<u8>,
}

/// Reading end of an in-process pipe
#[derive(Debug)]
pub struct PipeReader {
    rx: Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
}

/// Create one unidirectional pipe
pub fn pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = unbounded();
    (
        PipeWriter {
            tx,
            pending: Vec::new(),
        },
        PipeReader {
            rx,
            chunk: Vec::new(),
            pos: 0,
        },
    )
}

/// The two stream ends held by one side of a conversation
#[derive(Debug)]
pub struct Endpoints {
    pub reader: PipeReader,
    pub writer: PipeWriter,
}

/// Request and response pipes joined as `(task side, classifier side)`
pub fn connected_pair() -> (Endpoints, Endpoints) {
    let (request_tx, request_rx) = pipe();
    let (response_tx, response_rx) = pipe();
    (
        Endpoints {
            reader: response_rx,
            writer: request_tx,
        },
        Endpoints {
            reader: request_rx,
            writer: response_tx,
        },
    )
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::take(&mut self.pending);
        self.tx
            .send(chunk)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed"))
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl BufRead for PipeReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        while self.pos >= self.chunk.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                // Writer gone: end of stream
                Err(_) => return Ok(&[]),
            }
        }
        Ok(&self.chunk[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.chunk.len());
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}
