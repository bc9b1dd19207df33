use std::borrow::Cow;

use crate::common::{ClipboardOptions, Error, SelectionMode};

mod x11;

fn into_unknown<E: std::fmt::Display>(error: E) -> Error {
	Error::Unknown { description: format!("{}", error) }
}

/// Thin dispatcher over the X11 backend. Wayland environments are served
/// through XWayland.
pub(crate) struct Clipboard {
	x11: x11::Clipboard,
}

impl Clipboard {
	pub(crate) fn new(options: &ClipboardOptions) -> Result<Self, Error> {
		Ok(Self { x11: x11::Clipboard::new(options)? })
	}

	pub(crate) fn get_text(&self, mode: SelectionMode) -> Result<String, Error> {
		self.x11.get_text(mode)
	}

	pub(crate) fn set_text(&self, text: Cow<'_, str>, mode: SelectionMode) -> Result<(), Error> {
		self.x11.set_text(text, mode)
	}

	pub(crate) fn clear(&self, mode: SelectionMode) -> Result<(), Error> {
		self.x11.clear(mode)
	}

	pub(crate) fn has_ownership(&self, mode: SelectionMode) -> bool {
		self.x11.has_ownership(mode)
	}
}
