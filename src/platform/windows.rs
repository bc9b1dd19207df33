/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2026 The Selboard contributors

The project to which this file belongs is licensed under either of
the Apache 2.0 or the MIT license at the licensee's choice. The terms
and conditions of the chosen license apply to this file.
*/

use crate::common::{ClipboardOptions, Error, ScopeGuard, SelectionMode};
use std::{
	borrow::Cow,
	io,
	iter::once,
	marker::PhantomData,
	mem::size_of,
	ptr::{copy_nonoverlapping, null, null_mut},
	slice, thread,
	time::Duration,
};
use windows_sys::Win32::{
	Foundation::{
		GetLastError, ERROR_ACCESS_DENIED, ERROR_CLASS_ALREADY_EXISTS, HANDLE, HGLOBAL, HWND,
		LPARAM, LRESULT, WPARAM,
	},
	System::{
		DataExchange::{
			CloseClipboard, EmptyClipboard, GetClipboardData, GetClipboardOwner, OpenClipboard,
			SetClipboardData,
		},
		Memory::{GlobalAlloc, GlobalFree, GlobalLock, GlobalSize, GlobalUnlock, GMEM_MOVEABLE},
		Ole::CF_UNICODETEXT,
	},
	UI::WindowsAndMessaging::{
		CreateWindowExW, DefWindowProcW, DestroyWindow, RegisterClassExW, HWND_MESSAGE,
		WNDCLASSEXW,
	},
};

unsafe fn global_alloc(bytes: usize) -> Result<HGLOBAL, Error> {
	let hdata = GlobalAlloc(GMEM_MOVEABLE, bytes);
	if hdata.is_null() {
		Err(last_error("Could not allocate global memory object"))
	} else {
		Ok(hdata)
	}
}

unsafe fn global_lock(hmem: HGLOBAL) -> Result<*mut u8, Error> {
	let data_ptr = GlobalLock(hmem).cast::<u8>();
	if data_ptr.is_null() {
		Err(last_error("Could not lock the global memory object"))
	} else {
		Ok(data_ptr)
	}
}

unsafe fn global_unlock_checked(hdata: HGLOBAL) {
	// If the memory object is unlocked after decrementing the lock count, the function
	// returns zero and GetLastError returns NO_ERROR. If it fails, the return value is
	// zero and GetLastError returns a value other than NO_ERROR.
	if GlobalUnlock(hdata) == 0 {
		let err = io::Error::last_os_error();
		if err.raw_os_error() != Some(0) {
			log::error!("Failed calling GlobalUnlock when writing data: {}", err);
		}
	}
}

fn last_error(message: &str) -> Error {
	let os_error = io::Error::last_os_error();
	Error::unknown(format!("{message}: {os_error}"))
}

/// Widens UTF-8 into the NUL-terminated UTF-16 buffer `CF_UNICODETEXT`
/// expects. The terminator lives inside the returned allocation.
fn to_wide_with_nul(text: &str) -> Vec<u16> {
	text.encode_utf16().chain(once(0)).collect()
}

/// Narrows clipboard UTF-16 back into UTF-8, failing explicitly on invalid
/// sequences such as lone surrogates.
fn from_wide(wide: &[u16]) -> Result<String, Error> {
	String::from_utf16(wide).map_err(|_| Error::ConversionFailure)
}

unsafe extern "system" fn message_window_proc(
	hwnd: HWND,
	msg: u32,
	wparam: WPARAM,
	lparam: LPARAM,
) -> LRESULT {
	DefWindowProcW(hwnd, msg, wparam, lparam)
}

/// The invisible message-only window whose handle identifies this context to
/// the clipboard: it is passed to `OpenClipboard` so that
/// `GetClipboardOwner` can later tell whether the last writer was us.
struct MessageWindow {
	hwnd: HWND,
}

impl MessageWindow {
	fn new() -> Result<Self, Error> {
		let class_name: Vec<u16> = "selboard".encode_utf16().chain(once(0)).collect();
		unsafe {
			let mut wndclass: WNDCLASSEXW = std::mem::zeroed();
			wndclass.cbSize = size_of::<WNDCLASSEXW>() as u32;
			wndclass.lpfnWndProc = Some(message_window_proc);
			wndclass.lpszClassName = class_name.as_ptr();
			// Other contexts in this process may have registered it already.
			if RegisterClassExW(&wndclass) == 0 && GetLastError() != ERROR_CLASS_ALREADY_EXISTS {
				return Err(last_error("Could not register the clipboard window class"));
			}

			let hwnd = CreateWindowExW(
				0,
				class_name.as_ptr(),
				class_name.as_ptr(),
				0,
				0,
				0,
				0,
				0,
				HWND_MESSAGE,
				null_mut(),
				null_mut(),
				null(),
			);
			if hwnd.is_null() {
				return Err(last_error("Could not create the clipboard message window"));
			}
			Ok(Self { hwnd })
		}
	}
}

impl Drop for MessageWindow {
	fn drop(&mut self) {
		unsafe {
			DestroyWindow(self.hwnd);
		}
	}
}

pub(crate) struct Clipboard {
	window: MessageWindow,
	max_retries: u32,
	retry_delay: Duration,
}

// The window handle is only an identity for clipboard calls; the window
// never processes messages and every clipboard session is opened and closed
// within a single method call on the calling thread.
unsafe impl Send for Clipboard {}
unsafe impl Sync for Clipboard {}

/// An open clipboard session. Windows only allows one thread on the entire
/// system to have the clipboard open at once, so sessions are kept as short
/// as possible and closed by `Drop`.
struct OpenClipboardGuard<'clipboard> {
	// The clipboard may not move to another thread while open.
	_marker: PhantomData<*const ()>,
	_for_shim: &'clipboard Clipboard,
}

impl Drop for OpenClipboardGuard<'_> {
	fn drop(&mut self) {
		unsafe {
			CloseClipboard();
		}
	}
}

impl Clipboard {
	pub(crate) fn new(options: &ClipboardOptions) -> Result<Self, Error> {
		Ok(Self {
			window: MessageWindow::new()?,
			max_retries: options.win32_max_retries,
			retry_delay: options.win32_retry_delay,
		})
	}

	/// Attempts to open the clipboard, retrying only while the failure is
	/// `ERROR_ACCESS_DENIED` (someone else briefly holds the lock, which is
	/// common). Any other error aborts immediately.
	fn open(&self) -> Result<OpenClipboardGuard<'_>, Error> {
		let mut attempts = self.max_retries;
		loop {
			if unsafe { OpenClipboard(self.window.hwnd) } != 0 {
				return Ok(OpenClipboardGuard { _marker: PhantomData, _for_shim: self });
			}
			let error = unsafe { GetLastError() };
			if error != ERROR_ACCESS_DENIED {
				return Err(last_error("Could not open the clipboard"));
			}
			if attempts == 0 {
				return Err(Error::ClipboardOccupied);
			}
			attempts -= 1;
			thread::sleep(self.retry_delay);
		}
	}

	pub(crate) fn get_text(&self, mode: SelectionMode) -> Result<String, Error> {
		if mode == SelectionMode::Primary {
			return Err(Error::ClipboardNotSupported);
		}
		let _open = self.open()?;
		unsafe {
			let hdata = GetClipboardData(CF_UNICODETEXT as u32);
			if hdata.is_null() {
				return Err(Error::ContentNotAvailable);
			}
			let data_ptr = global_lock(hdata as HGLOBAL)?.cast::<u16>();
			let _unlock = ScopeGuard::new(|| global_unlock_checked(hdata as HGLOBAL));

			let units = GlobalSize(hdata as HGLOBAL) / size_of::<u16>();
			let wide = slice::from_raw_parts(data_ptr, units);
			// The allocation may be larger than the string; stop at the
			// terminator.
			let len = wide.iter().position(|&unit| unit == 0).unwrap_or(wide.len());
			from_wide(&wide[..len])
		}
	}

	pub(crate) fn set_text(&self, text: Cow<'_, str>, mode: SelectionMode) -> Result<(), Error> {
		if mode == SelectionMode::Primary {
			return Err(Error::ClipboardNotSupported);
		}

		let wide = to_wide_with_nul(&text);
		unsafe {
			let hdata = global_alloc(wide.len() * size_of::<u16>())?;
			{
				let data_ptr = global_lock(hdata)?.cast::<u16>();
				copy_nonoverlapping(wide.as_ptr(), data_ptr, wide.len());
				global_unlock_checked(hdata);
			}

			let open = match self.open() {
				Ok(open) => open,
				Err(e) => {
					GlobalFree(hdata);
					return Err(e);
				}
			};
			// EmptyClipboard must be called to properly update clipboard ownership.
			if EmptyClipboard() == 0 {
				GlobalFree(hdata);
				return Err(last_error("Failed to empty the clipboard"));
			}
			if SetClipboardData(CF_UNICODETEXT as u32, hdata as HANDLE).is_null() {
				GlobalFree(hdata);
				return Err(last_error("SetClipboardData failed with error"));
			}
			// The system owns the buffer from here on.
			drop(open);
		}
		Ok(())
	}

	pub(crate) fn clear(&self, mode: SelectionMode) -> Result<(), Error> {
		if mode == SelectionMode::Primary {
			return Err(Error::ClipboardNotSupported);
		}
		let _open = self.open()?;
		if unsafe { EmptyClipboard() } == 0 {
			Err(last_error("Failed to empty the clipboard"))
		} else {
			Ok(())
		}
	}

	pub(crate) fn has_ownership(&self, mode: SelectionMode) -> bool {
		if mode == SelectionMode::Primary {
			return false;
		}
		unsafe { GetClipboardOwner() == self.window.hwnd }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transcode_round_trips() {
		for text in ["test", "未来", "a\r\n b\r\n c\r\n"] {
			let wide = to_wide_with_nul(text);
			assert_eq!(wide.last(), Some(&0));
			assert_eq!(from_wide(&wide[..wide.len() - 1]).unwrap(), text);
		}
	}

	#[test]
	fn lone_surrogate_is_rejected() {
		assert!(from_wide(&[0xD800]).is_err());
	}
}
