//! The build context passed as the `context` argument of the heightfield functions.
//!
//! Corresponds to an `rcContext` that keeps its log messages so callers on the other side
//! of the boundary can read them back.

use std::ffi::{CStr, c_char};

/// Severity of a message logged to a [`BuildContext`]. Matches `rcLogCategory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum LogCategory {
    /// A progress log entry.
    Progress = 1,
    /// A warning log entry.
    Warning = 2,
    /// An error log entry.
    Error = 3,
}

impl LogCategory {
    /// Converts the raw value used across the boundary.
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Progress),
            2 => Some(Self::Warning),
            3 => Some(Self::Error),
            _ => None,
        }
    }
}

/// A diagnostics sink owned by the caller.
///
/// Every message is forwarded to `tracing`. While logging is enabled, messages are also
/// kept, up to [`BuildContext::MAX_MESSAGES`], so they can be read back with
/// [`nmbc_get_log_messages`].
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    log_enabled: bool,
    messages: Vec<(LogCategory, String)>,
}

impl BuildContext {
    /// The maximum number of messages that are kept.
    pub const MAX_MESSAGES: usize = 1000;
    /// The maximum length of a kept message in bytes, excluding the NUL terminator.
    pub const MAX_MESSAGE_LEN: usize = 255;

    /// Creates a context with an empty log.
    pub fn new(log_enabled: bool) -> Self {
        Self {
            log_enabled,
            messages: Vec::new(),
        }
    }

    /// Returns `true` if messages are being kept.
    pub fn is_log_enabled(&self) -> bool {
        self.log_enabled
    }

    /// Starts or stops keeping messages. Already kept messages stay.
    pub fn enable_log(&mut self, enabled: bool) {
        self.log_enabled = enabled;
    }

    /// Drops all kept messages.
    pub fn reset_log(&mut self) {
        self.messages.clear();
    }

    /// Logs a message.
    ///
    /// The kept copy is cut at the first NUL and at [`BuildContext::MAX_MESSAGE_LEN`] bytes.
    pub fn log(&mut self, category: LogCategory, message: impl Into<String>) {
        let mut message = message.into();
        match category {
            LogCategory::Progress => tracing::info!("{message}"),
            LogCategory::Warning => tracing::warn!("{message}"),
            LogCategory::Error => tracing::error!("{message}"),
        }
        if !self.log_enabled || self.messages.len() >= Self::MAX_MESSAGES {
            return;
        }
        if let Some(nul) = message.find('\0') {
            message.truncate(nul);
        }
        if message.len() > Self::MAX_MESSAGE_LEN {
            let mut end = Self::MAX_MESSAGE_LEN;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        self.messages.push((category, message));
    }

    /// The number of kept messages.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Iterates over the kept messages, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = (LogCategory, &str)> {
        self.messages
            .iter()
            .map(|(category, message)| (*category, message.as_str()))
    }

    /// Copies kept messages into `buffer`, each followed by a NUL byte, for as long as they fit.
    /// Returns the number of messages copied.
    pub fn write_messages(&self, buffer: &mut [u8]) -> usize {
        let mut offset = 0;
        let mut count = 0;
        for (_, message) in self.messages() {
            let end = offset + message.len();
            if end >= buffer.len() {
                break;
            }
            buffer[offset..end].copy_from_slice(message.as_bytes());
            buffer[end] = 0;
            offset = end + 1;
            count += 1;
        }
        count
    }
}

/// Allocates a new build context. Release it with [`nmbc_free_context`].
#[unsafe(no_mangle)]
pub extern "C" fn nmbc_alloc_context(log_enabled: bool) -> *mut BuildContext {
    Box::into_raw(Box::new(BuildContext::new(log_enabled)))
}

/// Releases a context allocated by [`nmbc_alloc_context`]. Does nothing for null.
///
/// # Safety
///
/// `context` must be null or a pointer returned by [`nmbc_alloc_context`] that was not released yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmbc_free_context(context: *mut BuildContext) {
    if context.is_null() {
        return;
    }
    // SAFETY: the pointer came from `Box::into_raw` and is released exactly once.
    drop(unsafe { Box::from_raw(context) });
}

/// Starts or stops keeping log messages. Does nothing for null.
///
/// # Safety
///
/// `context` must be null or a live context with no other access during the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmbc_enable_log(context: *mut BuildContext, enabled: bool) {
    // SAFETY: upheld by the caller.
    if let Some(context) = unsafe { context.as_mut() } {
        context.enable_log(enabled);
    }
}

/// Drops all kept log messages. Does nothing for null.
///
/// # Safety
///
/// `context` must be null or a live context with no other access during the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmbc_reset_log(context: *mut BuildContext) {
    // SAFETY: upheld by the caller.
    if let Some(context) = unsafe { context.as_mut() } {
        context.reset_log();
    }
}

/// Returns the number of kept log messages, or 0 for null.
///
/// # Safety
///
/// `context` must be null or a live context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmbc_get_message_count(context: *const BuildContext) -> i32 {
    // SAFETY: upheld by the caller.
    unsafe { context.as_ref() }.map_or(0, |context| context.message_count() as i32)
}

/// Copies the kept log messages into `buffer` as consecutive NUL-terminated strings.
///
/// Stops at the first message that does not fit. Returns the number of messages copied,
/// 0 if `context` or `buffer` is null.
///
/// # Safety
///
/// `context` must be null or a live context, and `buffer` must be null or valid for
/// `buffer_size` bytes of writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmbc_get_log_messages(
    context: *const BuildContext,
    buffer: *mut c_char,
    buffer_size: i32,
) -> i32 {
    // SAFETY: upheld by the caller.
    let Some(context) = (unsafe { context.as_ref() }) else {
        return 0;
    };
    if buffer.is_null() {
        return 0;
    }
    let len = usize::try_from(buffer_size).unwrap_or(0);
    // SAFETY: non-null and valid for `len` bytes per the caller's contract.
    let buffer = unsafe { std::slice::from_raw_parts_mut(buffer.cast::<u8>(), len) };
    context.write_messages(buffer) as i32
}

/// Logs a NUL-terminated message with the given `rcLogCategory` value.
/// Does nothing if `context` or `message` is null or the category is unknown.
///
/// # Safety
///
/// `context` must be null or a live context with no other access during the call,
/// and `message` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nmbc_log(
    context: *mut BuildContext,
    category: i32,
    message: *const c_char,
) {
    // SAFETY: upheld by the caller.
    let Some(context) = (unsafe { context.as_mut() }) else {
        return;
    };
    if message.is_null() {
        return;
    }
    let Some(category) = LogCategory::from_raw(category) else {
        tracing::warn!("Ignoring message with unknown log category {category}");
        return;
    };
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    let message = unsafe { CStr::from_ptr(message) };
    context.log(category, message.to_string_lossy());
}
