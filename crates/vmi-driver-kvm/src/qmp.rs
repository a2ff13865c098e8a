//! A minimal QEMU Machine Protocol client.
//!
//! QMP is newline-delimited JSON over a TCP (or UNIX) socket: the server
//! greets with a `QMPCapabilities` banner, the client replies with
//! `qmp_capabilities` to leave negotiation mode, and every command after
//! that is a `{"execute": ..., "arguments": ...}` object answered by either
//! `{"return": ...}` or `{"error": {...}}`.

use std::{
    io::{BufRead, BufReader, Write as _},
    net::{TcpStream, ToSocketAddrs},
};

use serde_json::{json, Value};

use crate::error::Error;

pub struct QmpClient {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl QmpClient {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, Error> {
        let stream = TcpStream::connect(addr)?;
        let reader = BufReader::new(stream.try_clone()?);

        let mut client = Self { writer: stream, reader };

        // The server's greeting is itself a JSON object (containing
        // `QMP.version`); read and discard it before negotiating.
        client.read_line()?;
        client.execute("qmp_capabilities", Value::Null)?;

        Ok(client)
    }

    fn read_line(&mut self) -> Result<Value, Error> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self.reader.read_line(&mut line)?;
            if read == 0 {
                return Err(Error::Io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)));
            }

            let value: Value = serde_json::from_str(line.trim())?;

            // The monitor may interleave asynchronous `"event"` objects with
            // command replies; skip those and keep waiting for a `return`
            // or `error`.
            if value.get("event").is_some() {
                tracing::debug!(event = %value, "skipping QMP event while waiting for reply");
                continue;
            }

            return Ok(value);
        }
    }

    /// Executes `command` with `arguments` and returns the `"return"`
    /// payload.
    pub fn execute(&mut self, command: &str, arguments: Value) -> Result<Value, Error> {
        let mut request = json!({ "execute": command });
        if !arguments.is_null() {
            request["arguments"] = arguments;
        }

        let mut line = serde_json::to_vec(&request)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;

        let reply = self.read_line()?;

        if let Some(error) = reply.get("error") {
            let desc = error
                .get("desc")
                .and_then(Value::as_str)
                .unwrap_or("unknown QMP error")
                .to_string();
            return Err(Error::QmpCommand(desc));
        }

        Ok(reply.get("return").cloned().unwrap_or(Value::Null))
    }

    /// Runs a human monitor command (`info registers`, `pmemaccess`, ...)
    /// through `human-monitor-command` and returns its text output.
    ///
    /// Returns `Err(Error::QmpCommand(_))` if the command is not recognized
    /// by this QEMU build — callers use that to decide whether to fall back
    /// to the GDB stub.
    pub fn human_monitor_command(&mut self, command: &str) -> Result<String, Error> {
        let reply = self.execute(
            "human-monitor-command",
            json!({ "command-line": command }),
        )?;

        Ok(reply.as_str().unwrap_or_default().to_string())
    }

    pub fn stop(&mut self) -> Result<(), Error> {
        self.execute("stop", Value::Null).map(drop)
    }

    pub fn cont(&mut self) -> Result<(), Error> {
        self.execute("cont", Value::Null).map(drop)
    }

    /// Number of vCPUs, via `query-cpus-fast` (the non-deprecated variant).
    pub fn vcpu_count(&mut self) -> Result<u16, Error> {
        let cpus = self.execute("query-cpus-fast", Value::Null)?;
        Ok(cpus.as_array().map(Vec::len).unwrap_or(0) as u16)
    }

    /// Total guest RAM, in bytes, via `query-memory-size-summary`.
    pub fn memory_size(&mut self) -> Result<u64, Error> {
        let summary = self.execute("query-memory-size-summary", Value::Null)?;
        Ok(summary.get("base-memory").and_then(Value::as_u64).unwrap_or(0))
    }
}

impl std::fmt::Debug for QmpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("QmpClient").finish_non_exhaustive()
    }
}
