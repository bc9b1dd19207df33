/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2026 The Selboard contributors

The project to which this file belongs is licensed under either of
the Apache 2.0 or the MIT license at the licensee's choice. The terms
and conditions of the chosen license apply to this file.
*/

use crate::common::{ClipboardOptions, Error, SelectionMode};
use objc2::{
	msg_send,
	rc::{autoreleasepool, Retained},
	runtime::ProtocolObject,
	ClassType,
};
use objc2_app_kit::{NSPasteboard, NSPasteboardTypeString};
use objc2_foundation::{NSArray, NSString};
use std::{
	borrow::Cow,
	panic::{RefUnwindSafe, UnwindSafe},
	sync::atomic::{AtomicIsize, Ordering},
};

pub(crate) struct Clipboard {
	pasteboard: Retained<NSPasteboard>,

	/// The pasteboard's change count as of our last successful write. The
	/// pasteboard bumps the live count on every write by anyone, so equality
	/// means nobody wrote after us.
	last_change_count: AtomicIsize,
}

unsafe impl Send for Clipboard {}
unsafe impl Sync for Clipboard {}
impl UnwindSafe for Clipboard {}
impl RefUnwindSafe for Clipboard {}

impl Clipboard {
	pub(crate) fn new(_options: &ClipboardOptions) -> Result<Clipboard, Error> {
		// Rust only supports 10.7+, while `generalPasteboard` first appeared
		// in 10.0, so this should always be available.
		//
		// However, in some edge cases, like running under launchd (in some
		// modes) as a daemon, the clipboard object may be unavailable, and
		// then `generalPasteboard` will return NULL even though it's
		// documented not to.
		//
		// Otherwise we'd just use `NSPasteboard::generalPasteboard()` here.
		let pasteboard: Option<Retained<NSPasteboard>> =
			unsafe { msg_send![NSPasteboard::class(), generalPasteboard] };

		if let Some(pasteboard) = pasteboard {
			// A fresh context never owns the pasteboard; the change count is
			// never negative, so -1 can stand in for "not us".
			Ok(Clipboard { pasteboard, last_change_count: AtomicIsize::new(-1) })
		} else {
			Err(Error::ClipboardNotSupported)
		}
	}

	pub(crate) fn get_text(&self, mode: SelectionMode) -> Result<String, Error> {
		if mode == SelectionMode::Primary {
			return Err(Error::ClipboardNotSupported);
		}
		// XXX: There does not appear to be an alternative for obtaining text without the need for
		// autorelease behavior.
		autoreleasepool(|_| {
			// XXX: We explicitly use `pasteboardItems` and not `stringForType` since the latter
			// will concat multiple strings, if present, into one and return it instead of
			// reading just the first.
			let contents = unsafe { self.pasteboard.pasteboardItems() }
				.ok_or_else(|| Error::unknown("NSPasteboard#pasteboardItems errored"))?;

			for item in contents {
				if let Some(string) = unsafe { item.stringForType(NSPasteboardTypeString) } {
					return Ok(string.to_string());
				}
			}

			Err(Error::ContentNotAvailable)
		})
	}

	pub(crate) fn set_text(&self, text: Cow<'_, str>, mode: SelectionMode) -> Result<(), Error> {
		if mode == SelectionMode::Primary {
			return Err(Error::ClipboardNotSupported);
		}

		unsafe { self.pasteboard.clearContents() };

		let string_array = NSArray::from_retained_slice(&[ProtocolObject::from_retained(
			NSString::from_str(&text),
		)]);
		let success = unsafe { self.pasteboard.writeObjects(&string_array) };

		if success {
			// Remember the count our write produced so `has_ownership` can
			// compare against it later.
			let serial = unsafe { self.pasteboard.changeCount() };
			self.last_change_count.store(serial, Ordering::SeqCst);
			Ok(())
		} else {
			Err(Error::unknown("NSPasteboard#writeObjects: returned false"))
		}
	}

	pub(crate) fn clear(&self, mode: SelectionMode) -> Result<(), Error> {
		if mode == SelectionMode::Primary {
			return Err(Error::ClipboardNotSupported);
		}
		unsafe { self.pasteboard.clearContents() };
		Ok(())
	}

	pub(crate) fn has_ownership(&self, mode: SelectionMode) -> bool {
		if mode == SelectionMode::Primary {
			return false;
		}
		let serial = unsafe { self.pasteboard.changeCount() };
		serial == self.last_change_count.load(Ordering::SeqCst)
	}
}
