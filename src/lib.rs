/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2026 The Selboard contributors

The project to which this file belongs is licensed under either of
the Apache 2.0 or the MIT license at the licensee's choice. The terms
and conditions of the chosen license apply to this file.
*/

//! Text handling for the OS clipboard and primary selection.
//!
//! A [`Clipboard`] context gives synchronous access to the platform's
//! selection service: UTF-8 text can be placed on, read from and cleared off
//! one of two logical selections ([`SelectionMode`]). On X11 the context
//! runs a background thread that serves the selection protocol, including
//! incremental (INCR) transfers of large payloads, behind the synchronous
//! calls. On Windows and macOS the global clipboard is wrapped directly.
//!
//! Failures are reported as the neutral value of each operation (`None`,
//! `false` or a plain no-op), never as a panic or an error type. Callers
//! that care about the cause can enable a [`log`](https://docs.rs/log)
//! backend.
//!
//! ```no_run
//! use selboard::{Clipboard, SelectionMode};
//!
//! let cb = Clipboard::new().expect("selection service unavailable");
//! cb.set_text("hello", SelectionMode::Clipboard);
//! assert_eq!(cb.get_text(SelectionMode::Clipboard).as_deref(), Some("hello"));
//! ```
//!
//! Note that clipboard contents are global, mutable state shared with every
//! other program on the system. Another client may take a selection over at
//! any moment; such races are inherent to the platform protocols.

mod common;
mod platform;

pub use common::{ClipboardOptions, SelectionMode};

use std::borrow::Cow;

/// A handle onto the platform selection service.
///
/// The context may be shared freely across threads by reference. Dropping
/// the last handle shuts the service down; on X11 any selections still owned
/// by the context become empty for other clients at that point.
pub struct Clipboard {
	platform: platform::Clipboard,
}

impl Clipboard {
	/// Creates a context with default [`ClipboardOptions`]. Returns `None`
	/// when the platform selection service is unavailable, for example when
	/// no X server can be reached.
	pub fn new() -> Option<Self> {
		Self::with_options(ClipboardOptions::default())
	}

	/// Creates a context with the given options. Out-of-range option values
	/// are replaced by their defaults.
	pub fn with_options(options: ClipboardOptions) -> Option<Self> {
		match platform::Clipboard::new(&options.sanitized()) {
			Ok(platform) => Some(Clipboard { platform }),
			Err(_) => None,
		}
	}

	/// Fetches the UTF-8 text currently held on the selection, or `None` if
	/// the selection is empty, holds no text, the owner did not answer within
	/// the configured timeout, or the context is no longer serviceable.
	pub fn get_text(&self, mode: SelectionMode) -> Option<String> {
		self.platform.get_text(mode).ok()
	}

	/// Places `text` on the selection and takes ownership of it. Empty text
	/// is rejected; use [`clear`](Self::clear) to empty a selection.
	///
	/// Returns `true` once the request has been handed to the platform. On
	/// X11 a later takeover by another client revokes ownership
	/// asynchronously.
	pub fn set_text<'a, T: Into<Cow<'a, str>>>(&self, text: T, mode: SelectionMode) -> bool {
		let text = text.into();
		if text.is_empty() {
			return false;
		}
		self.platform.set_text(text, mode).is_ok()
	}

	/// Empties the selection. A no-op when the platform cannot satisfy the
	/// mode.
	pub fn clear(&self, mode: SelectionMode) {
		let _ = self.platform.clear(mode);
	}

	/// Whether this context currently owns the selection, meaning the data
	/// other clients see is served from here. Windows and macOS report
	/// `false` for [`SelectionMode::Primary`].
	pub fn has_ownership(&self, mode: SelectionMode) -> bool {
		self.platform.has_ownership(mode)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const fn assert_send_sync<T: Send + Sync + 'static>() {}

	#[test]
	fn context_is_shareable() {
		assert_send_sync::<Clipboard>();
	}
}
