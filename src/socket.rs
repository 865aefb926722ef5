use crate::error::Error;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

/// Size of the read-ahead buffer. One standard Ethernet frame of payload fits
/// with room to spare.
pub const READ_AHEAD_SIZE: usize = 2048;

/// Connected TCP endpoint with a fixed read-ahead buffer.
///
/// `begin..end` marks the unread bytes left over from the last `recv`;
/// `begin == end` means the buffer is drained. The closed flag latches: after
/// the first terminal failure every operation reports [`Error::Closed`].
pub struct Socket {
    stream: TcpStream,
    buffer: [u8; READ_AHEAD_SIZE],
    begin: usize,
    end: usize,
    closed: bool,
}

impl Socket {
    /// Resolves `host` and connects to the first address that accepts.
    pub fn connect(host: &str, port: u16) -> Result<Socket, Error> {
        let mut last_error: Option<io::Error> = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect(addr) {
                Ok(stream) => return Ok(Socket::new(stream)),
                Err(err) => last_error = Some(err),
            }
        }
        Err(match last_error {
            Some(err) => err.into(),
            None => io::Error::new(ErrorKind::AddrNotAvailable, "hostname resolved to no addresses").into(),
        })
    }

    pub fn new(stream: TcpStream) -> Socket {
        Socket {
            stream,
            buffer: [0u8; READ_AHEAD_SIZE],
            begin: 0,
            end: 0,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn latch_closed(&mut self) {
        self.closed = true;
    }

    pub fn set_nodelay(&mut self, nodelay: bool) -> Result<(), Error> {
        self.stream.set_nodelay(nodelay)?;
        Ok(())
    }

    pub fn set_nonblocking(&mut self, nonblocking: bool) -> Result<(), Error> {
        self.stream.set_nonblocking(nonblocking)?;
        Ok(())
    }

    /// Second handle onto the same OS socket, for a supervisor that wants to
    /// force-close it from another thread.
    pub fn try_clone_stream(&self) -> io::Result<TcpStream> {
        self.stream.try_clone()
    }

    /// Fills `dst` completely, blocking (or spinning on `EAGAIN` when the fd
    /// is non-blocking) until every byte arrived.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<(), Error> {
        self.read_into(dst, None, false)
    }

    /// As `read`, but XORs every byte of `dst` with `mask[i mod 4]`, `i`
    /// counting from zero over the bytes of this call.
    pub fn read_masked(&mut self, dst: &mut [u8], mask: [u8; 4]) -> Result<(), Error> {
        self.read_into(dst, Some(mask), false)
    }

    /// Non-blocking variant: reports [`Error::NoData`] if no byte of this
    /// request can be served immediately. Once the first byte arrived it
    /// commits and loops until `dst` is full.
    pub fn read_nonblocking(&mut self, dst: &mut [u8], mask: Option<[u8; 4]>) -> Result<(), Error> {
        self.read_into(dst, mask, true)
    }

    fn read_into(&mut self, dst: &mut [u8], mask: Option<[u8; 4]>, return_on_no_data: bool) -> Result<(), Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        let mut filled = 0;
        while self.begin != self.end && filled < dst.len() {
            dst[filled] = self.buffer[self.begin];
            self.begin += 1;
            filled += 1;
        }
        while filled < dst.len() {
            match self.stream.read(&mut self.buffer) {
                Ok(0) => {
                    self.closed = true;
                    return Err(Error::Closed);
                }
                Ok(count) => {
                    self.begin = 0;
                    self.end = count;
                    while self.begin != self.end && filled < dst.len() {
                        dst[filled] = self.buffer[self.begin];
                        self.begin += 1;
                        filled += 1;
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if return_on_no_data && filled == 0 {
                        return Err(Error::NoData);
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(_) => {
                    self.closed = true;
                    return Err(Error::Closed);
                }
            }
        }
        if let Some(mask) = mask {
            for (i, byte) in dst.iter_mut().enumerate() {
                *byte ^= mask[i & 3];
            }
        }
        Ok(())
    }

    /// Writes all of `src`, spinning on `EAGAIN`. A failed or zero-length
    /// `send` latches the closed flag.
    pub fn write(&mut self, mut src: &[u8]) -> Result<(), Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        while !src.is_empty() {
            match self.stream.write(src) {
                Ok(0) => {
                    self.closed = true;
                    return Err(Error::Closed);
                }
                Ok(count) => src = &src[count..],
                Err(err) if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::Interrupted => {}
                Err(_) => {
                    self.closed = true;
                    return Err(Error::Closed);
                }
            }
        }
        Ok(())
    }
}
