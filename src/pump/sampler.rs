// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use std::fmt;
use std::io;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, warn};
use serde::Serialize;

/// How long to wait for a freshly spawned sampler to announce itself.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
/// Per-sample bound for the path-length sampler.  A subject which the
/// engine cannot dispatch within this window is reported as a timeout
/// sentinel rather than a cost.
pub const PATH_SAMPLE_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-sample bound for the wall-clock sampler, which pays JIT warmup
/// on top of the match itself.
pub const WALL_SAMPLE_TIMEOUT: Duration = Duration::from_secs(15);
/// Path-length budget handed to the sampler binary.
const MAX_PATH_LENGTH: u64 = 1_000_000_000;

/// The outcome of one cost measurement.  Timeouts are first-class
/// data here, not errors: the pumper folds them into its profile
/// statuses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    /// The engine's reported cost: an instruction count for the
    /// path-length sampler, milliseconds for the wall-clock sampler.
    Cost(f64),
    /// The sampler failed to answer within its per-sample bound and
    /// has been killed; the next request will re-open it.
    TimedOut,
}

/// A source of cost measurements for subject strings.  The production
/// implementation drives an external subprocess; tests substitute a
/// synthetic function.
pub trait Sampler {
    fn sample(&mut self, subject: &[u8]) -> Result<Sample, SamplerError>;
}

// ============================================================================
// Sampler Error
// ============================================================================

/// An error which arises when driving a sampler subprocess.  Observe
/// that a per-sample timeout is _not_ an error (see
/// [`Sample::TimedOut`]); these cover the cases where the subprocess
/// could not be reached at all, or spoke something other than its
/// protocol.
pub enum SamplerError {
    /// The subprocess could not be spawned.
    Spawn(io::Error),
    /// The subprocess never produced its handshake line.
    HandshakeTimeout,
    /// The subprocess exited (or closed its pipe) mid-conversation.
    Died,
    /// The subprocess produced a line the protocol does not allow.
    Protocol(String),
    /// A pipe write failed.
    Io(io::Error),
}

impl fmt::Debug for SamplerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SamplerError::Spawn(e) => write!(f, "could not spawn sampler ({})", e),
            SamplerError::HandshakeTimeout => write!(f, "sampler handshake timed out"),
            SamplerError::Died => write!(f, "sampler process died"),
            SamplerError::Protocol(line) => {
                write!(f, "unexpected sampler output: {}", line.trim_end())
            }
            SamplerError::Io(e) => write!(f, "sampler pipe error ({})", e),
        }
    }
}

impl fmt::Display for SamplerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Just reuse debug formatting.
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for SamplerError {}

// ============================================================================
// Subprocess plumbing
// ============================================================================

/// A running sampler subprocess with line-oriented pipes.  Reads are
/// funnelled through a channel fed by a dedicated reader thread,
/// which is what makes bounded-time reads possible without an async
/// runtime.  The subprocess is killed when this value is dropped, so
/// the close-on-error discipline holds on every control-flow exit.
struct SamplerProcess {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
}

impl SamplerProcess {
    fn spawn(mut command: Command) -> Result<SamplerProcess, SamplerError> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        let mut child = command.spawn().map_err(SamplerError::Spawn)?;
        debug!("spawned sampler with pid={}", child.id());
        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let (sender, lines) = crossbeam_channel::unbounded();
        thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if sender.send(line).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Ok(SamplerProcess {
            child,
            stdin,
            lines,
        })
    }

    /// Write one request line and flush it through.
    fn send_line(&mut self, line: &str) -> Result<(), SamplerError> {
        self.stdin.write_all(line.as_bytes()).map_err(SamplerError::Io)?;
        self.stdin.write_all(b"\n").map_err(SamplerError::Io)?;
        self.stdin.flush().map_err(SamplerError::Io)
    }

    /// Await one response line within the given bound.  `Ok(None)`
    /// marks a timeout; a closed pipe is reported as [`SamplerError::Died`].
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, SamplerError> {
        match self.lines.recv_timeout(timeout) {
            Ok(line) => Ok(Some(line)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SamplerError::Died),
        }
    }

    /// Consume lines until one containing `marker` appears.  Returns
    /// `false` when the bound expires first.
    fn await_marker(&mut self, marker: &str, timeout: Duration) -> Result<bool, SamplerError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            match self.read_line(remaining)? {
                Some(line) if line.contains(marker) => {
                    return Ok(true);
                }
                Some(_) => {}
                None => {
                    return Ok(false);
                }
            }
        }
    }

    fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for SamplerProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

// ============================================================================
// Path-length sampler
// ============================================================================

/// Client for the instrumented engine binary, which reports the
/// number of bytecode steps taken to match one subject.  The protocol
/// is line oriented: after the `feed base64 lines now` handshake, the
/// client writes one base64-encoded subject per line and reads back
/// one `TOTCOUNT <n>` line per subject.
pub struct PathLengthSampler {
    binary: PathBuf,
    regexp: Vec<u8>,
    flags: String,
    width: u8,
    core: Option<usize>,
    process: Option<SamplerProcess>,
}

impl PathLengthSampler {
    pub fn new(
        binary: PathBuf,
        regexp: Vec<u8>,
        flags: String,
        width: u8,
        core: Option<usize>,
    ) -> Self {
        assert!(width == 1 || width == 2);
        PathLengthSampler {
            binary,
            regexp,
            flags,
            width,
            core,
            process: None,
        }
    }

    fn command(&self) -> Command {
        // Pinning to a core goes through taskset, as the measurements
        // are only comparable when the sampler is not migrated.
        let mut command = match self.core {
            Some(core) => {
                let mut c = Command::new("taskset");
                c.arg("-c").arg(core.to_string()).arg(&self.binary);
                c
            }
            None => Command::new(&self.binary),
        };
        command.arg("--bregexp").arg(BASE64.encode(&self.regexp));
        if !self.flags.is_empty() {
            command.arg("--flags").arg(&self.flags);
        }
        command
            .arg("-w")
            .arg(self.width.to_string())
            .arg("--maxpath")
            .arg(MAX_PATH_LENGTH.to_string())
            .arg("--count-paths");
        command
    }

    fn open(&mut self) -> Result<(), SamplerError> {
        debug!("opening sampler");
        // Dropping any previous instance kills it.
        self.process = None;
        let mut process = SamplerProcess::spawn(self.command())?;
        if !process.await_marker("feed base64 lines now", HANDSHAKE_TIMEOUT)? {
            warn!("could not open sampler binary");
            return Err(SamplerError::HandshakeTimeout);
        }
        self.process = Some(process);
        Ok(())
    }

    /// Best-effort shutdown of the subprocess.
    pub fn close(&mut self) {
        self.process = None;
    }
}

impl Sampler for PathLengthSampler {
    fn sample(&mut self, subject: &[u8]) -> Result<Sample, SamplerError> {
        if self.process.is_none() {
            self.open()?;
        }
        let process = self.process.as_mut().expect("sampler open");
        let request = BASE64.encode(subject);
        if let Err(e) = process.send_line(&request) {
            self.process = None;
            return Err(e);
        }
        match process.read_line(PATH_SAMPLE_TIMEOUT) {
            Ok(Some(line)) => {
                let Some(count) = line.strip_prefix("TOTCOUNT ") else {
                    warn!("not sure what to do with this line: {}", line.trim_end());
                    self.process = None;
                    return Err(SamplerError::Protocol(line));
                };
                match count.trim().parse::<u64>() {
                    Ok(n) => Ok(Sample::Cost(n as f64)),
                    Err(_) => {
                        self.process = None;
                        Err(SamplerError::Protocol(line))
                    }
                }
            }
            Ok(None) => {
                debug!("sampler timeout");
                self.process = None;
                Ok(Sample::TimedOut)
            }
            Err(e) => {
                self.process = None;
                Err(e)
            }
        }
    }
}

// ============================================================================
// Wall-clock sampler
// ============================================================================

/// One timing request, shipped to the wall-clock sampler script as a
/// single JSON line.  All byte-string fields travel base64-encoded.
#[derive(Serialize)]
struct WallClockRequest<'a> {
    pattern: String,
    flags: String,
    witness: String,
    char_encoding: &'a str,
    pump_pos: usize,
    pump_len: usize,
    num_pumps: usize,
    times: usize,
}

/// Client for the wall-clock sampler, a node script which constructs
/// the pumped subject itself and reports elapsed milliseconds.  After
/// the `READY` handshake, each request is answered with a
/// `WARMING_UP` marker, one `RESULT(<ms>)` line per timed run, and an
/// `ENDRESULT` terminator.
pub struct WallTimeSampler {
    script: PathBuf,
    pattern: Vec<u8>,
    flags: Vec<u8>,
    witness: Vec<u8>,
    char_width: u8,
    pump_pos: usize,
    pump_len: usize,
    core: Option<usize>,
    process: Option<SamplerProcess>,
}

impl WallTimeSampler {
    pub fn new(
        script: PathBuf,
        pattern: Vec<u8>,
        flags: Vec<u8>,
        witness: Vec<u8>,
        char_width: u8,
        pump_pos: usize,
        pump_len: usize,
        core: Option<usize>,
    ) -> Self {
        assert!(char_width == 1 || char_width == 2);
        WallTimeSampler {
            script,
            pattern,
            flags,
            witness,
            char_width,
            pump_pos,
            pump_len,
            core,
            process: None,
        }
    }

    fn command(&self) -> Command {
        let mut command = match self.core {
            Some(core) => {
                let mut c = Command::new("taskset");
                c.arg("-c").arg(core.to_string()).arg("node");
                c
            }
            None => Command::new("node"),
        };
        command.arg(&self.script);
        command
    }

    fn open(&mut self) -> Result<(), SamplerError> {
        debug!("opening sampler");
        self.process = None;
        let mut process = SamplerProcess::spawn(self.command())?;
        if !process.await_marker("READY", HANDSHAKE_TIMEOUT)? {
            warn!("could not open sampler script");
            return Err(SamplerError::HandshakeTimeout);
        }
        self.process = Some(process);
        Ok(())
    }

    /// Time one pumped subject, constructed by the sampler from the
    /// stored witness and `num_pumps` repetitions of the pump slice.
    pub fn time_pump(&mut self, num_pumps: usize) -> Result<Sample, SamplerError> {
        assert!(num_pumps > 0);
        debug!("testing {} pumps", num_pumps);
        if self.process.is_none() {
            self.open()?;
        }
        let request = WallClockRequest {
            pattern: BASE64.encode(&self.pattern),
            flags: BASE64.encode(&self.flags),
            witness: BASE64.encode(&self.witness),
            char_encoding: if self.char_width == 1 {
                "latin1"
            } else {
                "utf16le"
            },
            pump_pos: self.pump_pos,
            pump_len: self.pump_len,
            num_pumps,
            times: 1,
        };
        let line = serde_json::to_string(&request).expect("serializable request");
        let process = self.process.as_mut().expect("sampler open");
        if let Err(e) = process.send_line(&line) {
            self.process = None;
            return Err(e);
        }
        // The script announces warmup before it starts timing runs.
        match process.await_marker("WARMING_UP", HANDSHAKE_TIMEOUT) {
            Ok(true) => {}
            Ok(false) => {
                debug!("sampler timeout");
                self.process = None;
                return Ok(Sample::TimedOut);
            }
            Err(e) => {
                self.process = None;
                return Err(e);
            }
        }
        // Gather result lines until the terminator; the first
        // reported run is the one returned.
        let deadline = Instant::now() + WALL_SAMPLE_TIMEOUT;
        let mut result = None;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match process.read_line(remaining) {
                Ok(Some(line)) => {
                    if let Some(rest) = line.strip_prefix("RESULT(") {
                        if let Some(end) = rest.find(')') {
                            if result.is_none() {
                                result = rest[..end].parse::<f64>().ok();
                            }
                        }
                    } else if line.starts_with("ENDRESULT") {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("sampler timeout");
                    self.process = None;
                    return Ok(Sample::TimedOut);
                }
                Err(e) => {
                    self.process = None;
                    return Err(e);
                }
            }
        }
        match result {
            Some(ms) => Ok(Sample::Cost(ms)),
            None => {
                self.process = None;
                Err(SamplerError::Protocol("ENDRESULT without RESULT".to_string()))
            }
        }
    }

    pub fn close(&mut self) {
        self.process = None;
    }
}
