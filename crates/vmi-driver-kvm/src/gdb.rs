//! A minimal GDB remote serial protocol client.
//!
//! Used as the fallback memory/register channel when the monitor has no
//! patched fast-access command: QEMU's `-gdb tcp::<port>` exposes the same
//! stub real-mode debuggers use, which happens to be enough to read/write
//! guest memory (`m`/`M`) and the general register file (`g`/`G`).
//!
//! Every exchange is `client sends packet -> server acks ('+') -> server
//! sends reply packet -> client acks`. Packets are framed as
//! `$<payload>#<checksum>`, the checksum being the sum of the payload bytes
//! mod 256, in lowercase hex.

use std::{
    io::{Read, Write as _},
    net::{TcpStream, ToSocketAddrs},
};

use crate::error::Error;

pub struct GdbClient {
    stream: TcpStream,
}

impl GdbClient {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, Error> {
        Ok(Self { stream: TcpStream::connect(addr)? })
    }

    fn send_packet(&mut self, payload: &str) -> Result<(), Error> {
        let checksum: u8 = payload.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
        let packet = format!("${payload}#{checksum:02x}");
        self.stream.write_all(packet.as_bytes())?;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, Error> {
        let mut byte = [0u8; 1];
        self.stream.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn read_ack(&mut self) -> Result<(), Error> {
        match self.read_byte()? {
            b'+' => Ok(()),
            _ => Err(Error::GdbProtocol),
        }
    }

    fn read_packet(&mut self) -> Result<String, Error> {
        loop {
            if self.read_byte()? == b'$' {
                break;
            }
        }

        let mut payload = Vec::new();
        loop {
            let byte = self.read_byte()?;
            if byte == b'#' {
                break;
            }
            payload.push(byte);
        }

        let mut checksum = [0u8; 2];
        self.stream.read_exact(&mut checksum)?;

        self.stream.write_all(b"+")?;

        String::from_utf8(payload).map_err(|_| Error::GdbProtocol)
    }

    fn transact(&mut self, payload: &str) -> Result<String, Error> {
        self.send_packet(payload)?;
        self.read_ack()?;
        let reply = self.read_packet()?;

        if let Some(code) = reply.strip_prefix('E') {
            let code = u8::from_str_radix(code, 16).map_err(|_| Error::GdbProtocol)?;
            return Err(Error::GdbError(code));
        }

        Ok(reply)
    }

    /// Reads the raw general-register blob (the `g` packet's payload,
    /// decoded from hex). The byte layout is target-specific; see
    /// `registers.rs` for the amd64 offsets into this blob.
    pub fn read_general_registers(&mut self) -> Result<Vec<u8>, Error> {
        decode_hex(&self.transact("g")?)
    }

    /// Writes back the full general-register blob. The GDB stub offers no
    /// partial register set, so callers must fetch, patch, and write the
    /// whole blob.
    pub fn write_general_registers(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let reply = self.transact(&format!("G{}", encode_hex(bytes)))?;
        if reply != "OK" {
            return Err(Error::GdbProtocol);
        }
        Ok(())
    }

    /// Selects the thread (vCPU) subsequent `g`/`G`/`m`/`M` operations apply
    /// to, via the `Hg` packet.
    pub fn select_thread(&mut self, tid: u64) -> Result<(), Error> {
        let reply = self.transact(&format!("Hg{tid:x}"))?;
        if reply != "OK" {
            return Err(Error::GdbProtocol);
        }
        Ok(())
    }

    pub fn read_memory(&mut self, addr: u64, len: usize) -> Result<Vec<u8>, Error> {
        decode_hex(&self.transact(&format!("m{addr:x},{len:x}"))?)
    }

    pub fn write_memory(&mut self, addr: u64, data: &[u8]) -> Result<(), Error> {
        let reply = self.transact(&format!("M{addr:x},{:x}:{}", data.len(), encode_hex(data)))?;
        if reply != "OK" {
            return Err(Error::GdbProtocol);
        }
        Ok(())
    }
}

impl std::fmt::Debug for GdbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("GdbClient").finish_non_exhaustive()
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn decode_hex(hex: &str) -> Result<Vec<u8>, Error> {
    if hex.len() % 2 != 0 {
        return Err(Error::GdbProtocol);
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| Error::GdbProtocol))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trips() {
        let bytes = [0x00, 0x7f, 0xff, 0x10];
        assert_eq!(decode_hex(&encode_hex(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn odd_length_hex_is_an_error() {
        assert!(matches!(decode_hex("abc"), Err(Error::GdbProtocol)));
    }
}
