//! Record input and redirected output.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::trace;

/// Splits a byte stream into records according to RS.
pub(crate) struct RecordReader<'a> {
    inner: Box<dyn BufRead + 'a>,
}

impl<'a> RecordReader<'a> {
    pub(crate) fn new(reader: impl BufRead + 'a) -> Self {
        Self {
            inner: Box::new(reader),
        }
    }

    /// Next record, without its terminator. An empty RS means paragraph
    /// mode; otherwise only the first byte of RS separates records.
    pub(crate) fn read_record(&mut self, rs: &str) -> io::Result<Option<String>> {
        let Some(&sep) = rs.as_bytes().first() else {
            return self.read_paragraph();
        };

        let mut buf = Vec::new();
        if self.inner.read_until(sep, &mut buf)? == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&sep) {
            buf.pop();
            if sep == b'\n' && buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        Ok(Some(into_string(buf)))
    }

    /// Blank lines separate records; runs of them count as one.
    fn read_paragraph(&mut self) -> io::Result<Option<String>> {
        let mut record = String::new();
        let mut line = Vec::new();

        loop {
            line.clear();
            if self.inner.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            while matches!(line.last(), Some(b'\n' | b'\r')) {
                line.pop();
            }
            if line.is_empty() {
                if record.is_empty() {
                    continue;
                }
                break;
            }
            if !record.is_empty() {
                record.push('\n');
            }
            record.push_str(&String::from_utf8_lossy(&line));
        }

        Ok((!record.is_empty()).then_some(record))
    }
}

fn into_string(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn shell(cmd: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd);
    command
}

/// A getline source opened by name: a file or a command's stdout.
pub(crate) struct InputSource<'a> {
    pub(crate) reader: RecordReader<'a>,
    child: Option<Child>,
}

impl InputSource<'_> {
    pub(crate) fn open_file(path: &str) -> io::Result<Self> {
        trace!(path, "opening getline file");
        let reader = if path == "-" || path == "/dev/stdin" {
            RecordReader::new(BufReader::new(io::stdin()))
        } else {
            RecordReader::new(BufReader::new(File::open(path)?))
        };
        Ok(Self {
            reader,
            child: None,
        })
    }

    pub(crate) fn open_command(cmd: &str) -> io::Result<Self> {
        trace!(cmd, "spawning getline command");
        let mut child = shell(cmd).stdout(Stdio::piped()).spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("command has no stdout"))?;
        Ok(Self {
            reader: RecordReader::new(BufReader::new(stdout)),
            child: Some(child),
        })
    }

    /// Closes the source, returning the command's exit status for pipes.
    pub(crate) fn close(self) -> io::Result<i32> {
        drop(self.reader);
        match self.child {
            Some(mut child) => Ok(child.wait()?.code().unwrap_or(-1)),
            None => Ok(0),
        }
    }
}

/// Destination of a redirected print or printf
pub(crate) enum OutputFile {
    File(BufWriter<File>),
    Pipe {
        child: Child,
        stdin: BufWriter<ChildStdin>,
    },
    Stderr(io::Stderr),
}

impl OutputFile {
    pub(crate) fn open_file(path: &str, append: bool) -> io::Result<Self> {
        trace!(path, append, "opening output file");
        if path == "/dev/stderr" {
            return Ok(OutputFile::Stderr(io::stderr()));
        }
        let file = if append {
            OpenOptions::new().create(true).append(true).open(path)?
        } else {
            File::create(path)?
        };
        Ok(OutputFile::File(BufWriter::new(file)))
    }

    pub(crate) fn open_pipe(cmd: &str) -> io::Result<Self> {
        trace!(cmd, "spawning output command");
        let mut child = shell(cmd).stdin(Stdio::piped()).spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("command has no stdin"))?;
        Ok(OutputFile::Pipe {
            child,
            stdin: BufWriter::new(stdin),
        })
    }

    /// Flushes and closes; for pipes, waits for the command and returns its
    /// exit status.
    pub(crate) fn close(self) -> io::Result<i32> {
        match self {
            OutputFile::File(mut file) => {
                file.flush()?;
                Ok(0)
            }
            OutputFile::Pipe { mut child, mut stdin } => {
                stdin.flush()?;
                drop(stdin);
                Ok(child.wait()?.code().unwrap_or(-1))
            }
            OutputFile::Stderr(mut stderr) => {
                stderr.flush()?;
                Ok(0)
            }
        }
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputFile::File(f) => f.write(buf),
            OutputFile::Pipe { stdin, .. } => stdin.write(buf),
            OutputFile::Stderr(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputFile::File(f) => f.flush(),
            OutputFile::Pipe { stdin, .. } => stdin.flush(),
            OutputFile::Stderr(e) => e.flush(),
        }
    }
}
