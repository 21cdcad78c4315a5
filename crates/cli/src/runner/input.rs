//! Input reader - feeds lines into the dispatcher's intake channel

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader, ReadBuf};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument};

use crate::error::{CliError, Result};

/// Where inputs come from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InputSpec {
    /// Standard input
    #[default]
    Stdin,
    /// A file, one input per line
    File(PathBuf),
}

impl InputSpec {
    /// `None` or `-` means stdin
    pub fn from_arg(path: Option<&Path>) -> Self {
        match path {
            Some(p) if p != Path::new("-") => Self::File(p.to_path_buf()),
            _ => Self::Stdin,
        }
    }

    /// Open the input as a buffered async reader
    pub async fn open(&self) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
        match self {
            Self::Stdin => {
                let stdin = ThreadReader::spawn("jobpool-stdin", io::stdin())?;
                Ok(Box::new(BufReader::new(stdin)))
            }
            Self::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|source| CliError::InputOpen {
                        path: path.clone(),
                        source,
                    })?;
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }
}

const CHUNK_SIZE: usize = 8 * 1024;

/// Async reader over a blocking reader driven by a detached OS thread
///
/// `tokio::io::stdin` parks its read on the blocking pool, and runtime
/// shutdown waits for that read to return. The thread here is never joined,
/// so a read that never completes cannot keep the process alive after the
/// run has finished. The thread exits at EOF, on a read error, or on its
/// next read once this reader is dropped.
#[derive(Debug)]
pub struct ThreadReader {
    rx: mpsc::Receiver<io::Result<Vec<u8>>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl ThreadReader {
    pub fn spawn<R>(name: &str, mut reader: R) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(16);
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut buf = vec![0u8; CHUNK_SIZE];
                loop {
                    let message = match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => Ok(buf[..n].to_vec()),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => Err(e),
                    };
                    let failed = message.is_err();
                    if tx.blocking_send(message).is_err() || failed {
                        break;
                    }
                }
            })?;

        Ok(Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
        })
    }
}

impl AsyncRead for ThreadReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if this.pos < this.chunk.len() {
                let n = buf.remaining().min(this.chunk.len() - this.pos);
                buf.put_slice(&this.chunk[this.pos..this.pos + n]);
                this.pos += n;
                return Poll::Ready(Ok(()));
            }

            match ready!(this.rx.poll_recv(cx)) {
                Some(Ok(chunk)) => {
                    this.chunk = chunk;
                    this.pos = 0;
                }
                Some(Err(e)) => return Poll::Ready(Err(e)),
                // Sender gone: EOF
                None => return Poll::Ready(Ok(())),
            }
        }
    }
}

/// Forward non-blank, trimmed lines into `tx` until EOF or a stop request
///
/// Returns the number of inputs forwarded. Dropping `tx` on return is what
/// closes the dispatcher's source.
#[instrument(name = "input_reader", skip_all)]
pub async fn forward_lines<R>(
    reader: R,
    tx: mpsc::Sender<String>,
    mut stop_rx: watch::Receiver<bool>,
) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0u64;

    loop {
        let line = tokio::select! {
            biased;
            Ok(_) = stop_rx.wait_for(|stop| *stop) => {
                info!(forwarded, "Stop requested, no further inputs will be read");
                break;
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            debug!(forwarded, "Input exhausted");
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        tokio::select! {
            biased;
            Ok(_) = stop_rx.wait_for(|stop| *stop) => {
                info!(forwarded, "Stop requested, no further inputs will be read");
                break;
            }
            sent = tx.send(input.to_string()) => {
                if sent.is_err() {
                    debug!("Intake closed, stopping reader");
                    break;
                }
                forwarded += 1;
            }
        }
    }

    Ok(forwarded)
}
