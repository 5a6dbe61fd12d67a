/// Structured logging module for the MelloOS exec path
/// Provides logging with format: [pid=X][subsys][LEVEL] message
/// Supports log levels: ERROR, WARN, INFO, DEBUG, TRACE
use core::fmt;
use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use spin::Mutex;

/// Log levels for kernel logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Critical errors that may cause system instability
    Error = 0,
    /// Warning conditions that should be addressed
    Warn = 1,
    /// Informational messages about important events
    Info = 2,
    /// Detailed debugging information
    Debug = 3,
    /// Very verbose tracing information
    Trace = 4,
}

impl LogLevel {
    /// Get the string representation of the log level
    pub const fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Global log level filter
/// Only messages at or below this level will be logged
static LOG_LEVEL: AtomicU8 = AtomicU8::new(crate::config::DEFAULT_LOG_LEVEL as u8);

/// Pid stamped on log lines, 0 while no process is being served
static LOG_PID: AtomicU32 = AtomicU32::new(0);

/// Set the global log level
pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Get the current global log level
pub fn get_log_level() -> LogLevel {
    match LOG_LEVEL.load(Ordering::Relaxed) {
        0 => LogLevel::Error,
        1 => LogLevel::Warn,
        2 => LogLevel::Info,
        3 => LogLevel::Debug,
        4 => LogLevel::Trace,
        _ => LogLevel::Info,
    }
}

/// Check if a log level should be logged
#[inline]
pub fn should_log(level: LogLevel) -> bool {
    level <= get_log_level()
}

/// Record which process subsequent log lines belong to
pub fn set_log_pid(pid: u32) {
    LOG_PID.store(pid, Ordering::Relaxed);
}

/// Console output hook
///
/// The kernel binary installs its serial writer here during early boot.
/// Until then (and on the host) messages only land in the log buffer.
pub type ConsoleWriter = fn(&str);

static CONSOLE: Mutex<Option<ConsoleWriter>> = Mutex::new(None);

/// Install the console writer used for every log line
pub fn set_console(writer: ConsoleWriter) {
    *CONSOLE.lock() = Some(writer);
}

/// Kernel log buffer for dmesg
/// Uses a fixed-size circular buffer to store log messages
const LOG_BUFFER_SIZE: usize = 16384; // 16KB buffer
const MAX_LOG_ENTRIES: usize = 256;
const LOG_LINE_SIZE: usize = 512;

struct LogBuffer {
    buffer: [u8; LOG_BUFFER_SIZE],
    write_pos: usize,
    entries: usize,
}

impl LogBuffer {
    const fn new() -> Self {
        Self {
            buffer: [0; LOG_BUFFER_SIZE],
            write_pos: 0,
            entries: 0,
        }
    }

    fn add_message(&mut self, message: &str) {
        let bytes = message.as_bytes();
        let len = bytes.len();

        if len >= LOG_BUFFER_SIZE {
            return;
        }

        // If we would overflow, wrap around
        if self.write_pos + len + 1 > LOG_BUFFER_SIZE {
            self.write_pos = 0;
            self.entries = 0;
        }

        self.buffer[self.write_pos..self.write_pos + len].copy_from_slice(bytes);
        self.buffer[self.write_pos + len] = b'\n';
        self.write_pos += len + 1;

        if self.entries < MAX_LOG_ENTRIES {
            self.entries += 1;
        }
    }

    fn read_all(&self) -> &[u8] {
        &self.buffer[..self.write_pos]
    }
}

static LOG_BUFFER: Mutex<LogBuffer> = Mutex::new(LogBuffer::new());

/// Read the kernel log buffer into a provided buffer
/// Returns the number of bytes copied
pub fn read_log_buffer(dest: &mut [u8]) -> usize {
    let buffer = LOG_BUFFER.lock();
    let data = buffer.read_all();
    let to_copy = core::cmp::min(data.len(), dest.len());
    dest[..to_copy].copy_from_slice(&data[..to_copy]);
    to_copy
}

/// Fixed-size formatter; output past the end of the line is dropped
struct LineWriter {
    buffer: [u8; LOG_LINE_SIZE],
    pos: usize,
}

impl LineWriter {
    fn new() -> Self {
        Self {
            buffer: [0u8; LOG_LINE_SIZE],
            pos: 0,
        }
    }

    fn as_str(&self) -> &str {
        match core::str::from_utf8(&self.buffer[..self.pos]) {
            Ok(s) => s,
            // Truncation split a multi-byte character
            Err(e) => core::str::from_utf8(&self.buffer[..e.valid_up_to()]).unwrap_or(""),
        }
    }
}

impl fmt::Write for LineWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let remaining = self.buffer.len() - self.pos;
        let to_write = core::cmp::min(bytes.len(), remaining);
        self.buffer[self.pos..self.pos + to_write].copy_from_slice(&bytes[..to_write]);
        self.pos += to_write;
        Ok(())
    }
}

/// Internal logging function
/// Format: [pid=X][subsys][LEVEL] message
#[doc(hidden)]
pub fn _log(level: LogLevel, subsys: &str, args: fmt::Arguments) {
    use core::fmt::Write;

    if !should_log(level) {
        return;
    }

    let pid = LOG_PID.load(Ordering::Relaxed);
    let mut writer = LineWriter::new();
    let _ = write!(
        writer,
        "[pid={}][{}][{}] {}",
        pid,
        subsys,
        level.as_str(),
        args
    );
    let line = writer.as_str();

    let console = *CONSOLE.lock();
    if let Some(console) = console {
        console(line);
    }

    LOG_BUFFER.lock().add_message(line);
}

/// Log an error message
/// Format: [pid=X][subsys][ERROR] message
#[macro_export]
macro_rules! log_error {
    ($subsys:expr, $($arg:tt)*) => {
        $crate::log::_log(
            $crate::log::LogLevel::Error,
            $subsys,
            format_args!($($arg)*)
        )
    };
}

/// Log a warning message
/// Format: [pid=X][subsys][WARN] message
#[macro_export]
macro_rules! log_warn {
    ($subsys:expr, $($arg:tt)*) => {
        $crate::log::_log(
            $crate::log::LogLevel::Warn,
            $subsys,
            format_args!($($arg)*)
        )
    };
}

/// Log an informational message
/// Format: [pid=X][subsys][INFO] message
#[macro_export]
macro_rules! log_info {
    ($subsys:expr, $($arg:tt)*) => {
        $crate::log::_log(
            $crate::log::LogLevel::Info,
            $subsys,
            format_args!($($arg)*)
        )
    };
}

/// Log a debug message
/// Format: [pid=X][subsys][DEBUG] message
#[macro_export]
macro_rules! log_debug {
    ($subsys:expr, $($arg:tt)*) => {
        $crate::log::_log(
            $crate::log::LogLevel::Debug,
            $subsys,
            format_args!($($arg)*)
        )
    };
}

/// Log a trace message
/// Format: [pid=X][subsys][TRACE] message
#[macro_export]
macro_rules! log_trace {
    ($subsys:expr, $($arg:tt)*) => {
        $crate::log::_log(
            $crate::log::LogLevel::Trace,
            $subsys,
            format_args!($($arg)*)
        )
    };
}
