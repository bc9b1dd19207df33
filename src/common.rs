/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2026 The Selboard contributors

The project to which this file belongs is licensed under either of
the Apache 2.0 or the MIT license at the licensee's choice. The terms
and conditions of the chosen license apply to this file.
*/

use std::{fmt, time::Duration};

/// Selects which of the two logical selections an operation acts on.
///
/// X11 keeps these as two independent buffers. Windows and macOS only have
/// the one global clipboard; operations on [`Primary`](SelectionMode::Primary)
/// there report "nothing owned / cannot set" instead of failing the context.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SelectionMode {
	/// The explicit cut/copy/paste buffer.
	Clipboard,

	/// The mouse-selection buffer, accessible via middle click on X11.
	Primary,
}

/// Tuning knobs for a clipboard context. All fields have working defaults.
#[derive(Clone, Debug)]
pub struct ClipboardOptions {
	/// Max time to wait for an inbound transfer or a single INCR step (X11 only).
	pub x11_action_timeout: Duration,
	/// Threshold and chunk size for incremental transfers, in bytes (X11 only).
	/// Must be a multiple of 4.
	pub x11_transfer_size: u32,
	/// The X11 display to connect to. `None` uses the `DISPLAY` environment
	/// variable.
	pub x11_display_name: Option<String>,
	/// Max number of retries when the clipboard lock is held elsewhere (Windows only).
	pub win32_max_retries: u32,
	/// Delay between such retries (Windows only).
	pub win32_retry_delay: Duration,
}

impl ClipboardOptions {
	pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_millis(1500);
	pub const DEFAULT_TRANSFER_SIZE: u32 = 1 << 20;
	pub const DEFAULT_MAX_RETRIES: u32 = 5;
	pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(5);

	/// Replaces values the backends cannot work with by their defaults. The
	/// retry budget and the retry delay are left alone; any value is valid
	/// for those.
	pub(crate) fn sanitized(mut self) -> Self {
		if self.x11_action_timeout.is_zero() {
			self.x11_action_timeout = Self::DEFAULT_ACTION_TIMEOUT;
		}
		if self.x11_transfer_size == 0 || self.x11_transfer_size % 4 != 0 {
			self.x11_transfer_size = Self::DEFAULT_TRANSFER_SIZE;
		}
		self
	}
}

impl Default for ClipboardOptions {
	fn default() -> Self {
		Self {
			x11_action_timeout: Self::DEFAULT_ACTION_TIMEOUT,
			x11_transfer_size: Self::DEFAULT_TRANSFER_SIZE,
			x11_display_name: None,
			win32_max_retries: Self::DEFAULT_MAX_RETRIES,
			win32_retry_delay: Self::DEFAULT_RETRY_DELAY,
		}
	}
}

/// An error that might happen during a clipboard operation.
///
/// These never cross the public API boundary; `crate::Clipboard` reports
/// every failure as the neutral value of the operation's return type.
// Not every platform constructs every variant.
#[allow(dead_code)]
#[non_exhaustive]
#[derive(Debug)]
pub(crate) enum Error {
	/// The selection owner did not offer text, the selection is empty, or the
	/// answer did not arrive within the configured timeout.
	ContentNotAvailable,

	/// The requested selection does not exist with the current system
	/// configuration, for example the primary selection on Windows or macOS.
	ClipboardNotSupported,

	/// Another program holds the clipboard lock or the selection ownership
	/// could not be acquired.
	ClipboardOccupied,

	/// The text that was about to be transferred to or from the clipboard
	/// could not be converted to the appropriate format.
	ConversionFailure,

	/// Any error that doesn't fit the other categories. The `description`
	/// mostly serves the logs.
	Unknown { description: String },
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::ContentNotAvailable => f.write_str(
				"The clipboard contents were not available in the requested format or the selection is empty.",
			),
			Error::ClipboardNotSupported => f.write_str(
				"The selected clipboard is not supported with the current system configuration.",
			),
			Error::ClipboardOccupied => {
				f.write_str("The clipboard was unaccessible when attempting to interact with it.")
			}
			Error::ConversionFailure => f.write_str(
				"The text that was about to be transferred to/from the clipboard could not be converted to the appropriate format.",
			),
			Error::Unknown { description } => {
				write!(f, "Unknown error while interacting with the clipboard: {description}")
			}
		}
	}
}

impl std::error::Error for Error {}

impl Error {
	#[allow(dead_code)]
	pub(crate) fn unknown<M: Into<String>>(message: M) -> Self {
		Error::Unknown { description: message.into() }
	}
}

/// Runs the callback when dropped, no matter how the enclosing scope exits.
pub(crate) struct ScopeGuard<F: FnOnce()> {
	callback: Option<F>,
}

impl<F: FnOnce()> ScopeGuard<F> {
	#[allow(dead_code)]
	pub(crate) fn new(callback: F) -> Self {
		ScopeGuard { callback: Some(callback) }
	}
}

impl<F: FnOnce()> Drop for ScopeGuard<F> {
	fn drop(&mut self) {
		if let Some(callback) = self.callback.take() {
			(callback)();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_options_are_already_sane() {
		let opts = ClipboardOptions::default().sanitized();
		assert_eq!(opts.x11_action_timeout, ClipboardOptions::DEFAULT_ACTION_TIMEOUT);
		assert_eq!(opts.x11_transfer_size, ClipboardOptions::DEFAULT_TRANSFER_SIZE);
		assert_eq!(opts.win32_max_retries, ClipboardOptions::DEFAULT_MAX_RETRIES);
		assert_eq!(opts.win32_retry_delay, ClipboardOptions::DEFAULT_RETRY_DELAY);
	}

	#[test]
	fn zero_timeout_falls_back_to_default() {
		let opts = ClipboardOptions { x11_action_timeout: Duration::ZERO, ..Default::default() };
		assert_eq!(opts.sanitized().x11_action_timeout, ClipboardOptions::DEFAULT_ACTION_TIMEOUT);
	}

	#[test]
	fn misaligned_transfer_size_falls_back_to_default() {
		for size in [1, 2, 3, 1023] {
			let opts = ClipboardOptions { x11_transfer_size: size, ..Default::default() };
			assert_eq!(opts.sanitized().x11_transfer_size, ClipboardOptions::DEFAULT_TRANSFER_SIZE);
		}
		let opts = ClipboardOptions { x11_transfer_size: 4096, ..Default::default() };
		assert_eq!(opts.sanitized().x11_transfer_size, 4096);
	}

	#[test]
	fn retry_options_are_independent() {
		let opts = ClipboardOptions {
			win32_max_retries: 11,
			win32_retry_delay: Duration::from_millis(23),
			..Default::default()
		}
		.sanitized();
		assert_eq!(opts.win32_max_retries, 11);
		assert_eq!(opts.win32_retry_delay, Duration::from_millis(23));
	}

	#[test]
	fn scope_guard_runs_on_drop() {
		let mut ran = false;
		{
			let _guard = ScopeGuard::new(|| ran = true);
		}
		assert!(ran);
	}
}
