use crate::error::Error;
use crate::frame::OpCode;
use crate::output::{OutputMessage, HEADER_RESERVE, OUTPUT_BUFFER_SIZE};
use crate::request::{build_upgrade_request, validate_upgrade_response};
use crate::socket::Socket;
use bytes::BytesMut;
use std::io;
use std::net::TcpStream;

/// Fixed client-to-server masking key. RFC 6455 only requires the key to be
/// present, not unpredictable, and a constant key lets the payload XOR be
/// precomputed against a known word.
pub const FIXED_MASK: [u8; 4] = [0x12, 0x34, 0x56, 0x78];

const MAX_RESPONSE_LINE: usize = 1024;

/// RFC 6455 client endpoint over a [`Socket`].
///
/// One outbound frame at a time is composed in the owned [`OutputMessage`]:
/// acquiring it through [`WebSocket::output_message`] resets it, and
/// [`WebSocket::send_last_output_message`] seals and transmits it. Inbound
/// messages are defragmented into a caller-provided buffer without copying
/// payload bytes more than once.
pub struct WebSocket {
    socket: Socket,
    use_mask: bool,
    output: OutputMessage,
}

impl WebSocket {
    /// Connects, performs the HTTP upgrade, and switches the socket into its
    /// operating mode: `TCP_NODELAY` always, non-blocking unless
    /// `wait_on_socket` asks for kernel-parked reads.
    pub fn connect(
        host: &str,
        port: u16,
        path: &str,
        use_mask: bool,
        wait_on_socket: bool,
    ) -> Result<WebSocket, Error> {
        let mut socket = Socket::connect(host, port)?;
        let request = build_upgrade_request(host, port, path);
        socket.write(request.as_bytes())?;

        // Collect the response head line by line until the CRLF-only line,
        // then check it in one go.
        let mut head = BytesMut::with_capacity(1024);
        let mut line = [0u8; MAX_RESPONSE_LINE];
        loop {
            let length = read_line(&mut socket, &mut line)?;
            if length == 0 {
                break;
            }
            head.extend_from_slice(&line[..length]);
            head.extend_from_slice(b"\r\n");
        }
        head.extend_from_slice(b"\r\n");
        validate_upgrade_response(&head)?;

        socket.set_nodelay(true)?;
        if !wait_on_socket {
            socket.set_nonblocking(true)?;
        }

        Ok(WebSocket {
            socket,
            use_mask,
            output: OutputMessage::new(),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.socket.is_closed()
    }

    /// See [`Socket::try_clone_stream`].
    pub fn try_clone_stream(&self) -> io::Result<TcpStream> {
        self.socket.try_clone_stream()
    }

    /// The outbound scratch buffer, reset and ready for a fresh payload.
    pub fn output_message(&mut self) -> &mut OutputMessage {
        self.output.reset();
        &mut self.output
    }

    /// Seals the composed payload into one frame (header prefixed in place,
    /// payload masked in place when masking is on) and transmits it with a
    /// single write.
    pub fn send_last_output_message(&mut self, opcode: OpCode) -> Result<(), Error> {
        let mask = if self.use_mask { Some(FIXED_MASK) } else { None };
        let frame = self.output.seal(opcode, mask);
        self.socket.write(frame)
    }

    /// Receives one message into `dst`, reassembling fragments and handling
    /// control frames in between:
    ///
    /// - PING is answered with a PONG carrying the same payload.
    /// - PONG is consumed; with `return_on_pong` the call returns right after
    ///   one, which makes round-trip probes possible.
    /// - CLOSE and unknown opcodes latch the connection closed.
    ///
    /// With `return_on_no_data`, a dry socket before the first header byte of
    /// a message surfaces as [`Error::NoData`].
    ///
    /// On success the payload occupies `dst[..length]` and `dst[length]`
    /// holds a NUL terminator, so the slice can be handed to C-string minded
    /// tooling when debugging.
    pub fn get_message(
        &mut self,
        dst: &mut [u8],
        return_on_no_data: bool,
        return_on_pong: bool,
    ) -> Result<usize, Error> {
        let mut committed = 0usize;
        let mut header = [0u8; 16];
        loop {
            if return_on_no_data && committed == 0 {
                self.socket.read_nonblocking(&mut header[..2], None)?;
            } else {
                self.socket.read(&mut header[..2])?;
            }
            let fin = header[0] & 0x80 != 0;
            let opcode = match OpCode::from(header[0] & 0x0f) {
                Ok(opcode) => opcode,
                Err(_) => {
                    self.socket.latch_closed();
                    return Err(Error::Closed);
                }
            };
            let masked = header[1] & 0x80 != 0;
            let n0 = (header[1] & 0x7f) as usize;
            let header_size = 2
                + if n0 == 126 { 2 } else { 0 }
                + if n0 == 127 { 8 } else { 0 }
                + if masked { 4 } else { 0 };
            self.socket.read(&mut header[2..header_size])?;

            let (payload_len, mask_offset) = match n0 {
                126 => (u16::from_be_bytes([header[2], header[3]]) as u64, 4),
                127 => (
                    u64::from_be_bytes([
                        header[2], header[3], header[4], header[5], header[6], header[7],
                        header[8], header[9],
                    ]),
                    10,
                ),
                n => (n as u64, 2),
            };
            // RFC 6455: "the most significant bit MUST be 0". There is no way
            // to resynchronize after a length like that, so give the
            // connection up.
            if payload_len & 0x8000_0000_0000_0000 != 0 {
                self.socket.latch_closed();
                return Err(Error::Closed);
            }
            let mask = if masked {
                Some([
                    header[mask_offset],
                    header[mask_offset + 1],
                    header[mask_offset + 2],
                    header[mask_offset + 3],
                ])
            } else {
                None
            };
            let length = payload_len as usize;
            if committed + length + 1 > dst.len() {
                self.socket.latch_closed();
                return Err(Error::Closed);
            }

            match opcode {
                OpCode::Text | OpCode::Binary | OpCode::Continue => {
                    self.read_payload(&mut dst[committed..committed + length], mask)?;
                    committed += length;
                    if fin {
                        dst[committed] = 0;
                        return Ok(committed);
                    }
                }
                OpCode::Ping => {
                    // The payload lands past the committed bytes and is not
                    // kept; it only has to survive until the PONG went out.
                    self.read_payload(&mut dst[committed..committed + length], mask)?;
                    if length > OUTPUT_BUFFER_SIZE - HEADER_RESERVE {
                        self.socket.latch_closed();
                        return Err(Error::Closed);
                    }
                    {
                        let output = self.output_message();
                        output.push_slice(&dst[committed..committed + length]);
                    }
                    self.send_last_output_message(OpCode::Pong)?;
                }
                OpCode::Pong => {
                    self.read_payload(&mut dst[committed..committed + length], mask)?;
                    if return_on_pong {
                        dst[committed] = 0;
                        return Ok(committed);
                    }
                }
                OpCode::Close => {
                    self.socket.latch_closed();
                    return Err(Error::Closed);
                }
            }
        }
    }

    fn read_payload(&mut self, dst: &mut [u8], mask: Option<[u8; 4]>) -> Result<(), Error> {
        match mask {
            Some(mask) => self.socket.read_masked(dst, mask),
            None => self.socket.read(dst),
        }
    }
}

/// Reads one CRLF-terminated line into `buffer`, returning its length
/// without the terminator. A line that does not fit is treated as a failed
/// handshake.
fn read_line(socket: &mut Socket, buffer: &mut [u8]) -> Result<usize, Error> {
    let mut length = 0;
    let mut byte = [0u8; 1];
    loop {
        socket.read(&mut byte)?;
        if byte[0] == b'\n' && length > 0 && buffer[length - 1] == b'\r' {
            return Ok(length - 1);
        }
        if length == buffer.len() {
            socket.latch_closed();
            return Err(Error::Closed);
        }
        buffer[length] = byte[0];
        length += 1;
    }
}
