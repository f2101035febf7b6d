use std::{
    fmt,
    io::{self, BufRead, Read, Write},
};

/// Maximum allowed line length to prevent unbounded allocation from a
/// misbehaving peer. A full 26-card hand line is ~400 bytes.
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Reads one newline-terminated message, stripping the terminator.
/// EOF before any byte is `UnexpectedEof`; a line longer than
/// [`MAX_LINE_LENGTH`] is `InvalidData`.
pub fn read_line<R: BufRead>(reader: &mut R) -> io::Result<String> {
    let mut limited = reader.take(MAX_LINE_LENGTH as u64 + 1);
    let mut line = String::new();
    let n = limited.read_line(&mut line)?;
    if n == 0 {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    if line.len() > MAX_LINE_LENGTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line exceeds maximum allowed length of {MAX_LINE_LENGTH} bytes"),
        ));
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

/// Writes one message followed by a newline in a single syscall-sized
/// chunk, so a reader never observes a partial line boundary.
pub fn write_line<W: Write>(writer: &mut W, msg: &impl fmt::Display) -> io::Result<()> {
    let mut buf = msg.to_string().into_bytes();
    if buf.len() > MAX_LINE_LENGTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line exceeds maximum allowed length of {MAX_LINE_LENGTH} bytes"),
        ));
    }
    buf.push(b'\n');
    writer.write_all(&buf)
}

/// Pops the first complete line out of a nonblocking read buffer, if
/// one has arrived. Used by the manager's event loop, which cannot
/// block on a peer.
pub fn split_line(buf: &mut Vec<u8>) -> Option<String> {
    let idx = buf.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = buf.drain(..=idx).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}
