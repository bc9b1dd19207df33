/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2026 The Selboard contributors

The project to which this file belongs is licensed under either of
the Apache 2.0 or the MIT license at the licensee's choice. The terms
and conditions of the chosen license apply to this file.
*/

use std::{
	sync::Mutex,
	thread,
	time::{Duration, Instant},
};

use selboard::{Clipboard, ClipboardOptions, SelectionMode};

/// The clipboard is global mutable state shared with the whole session, so
/// the tests in this binary must not run against it concurrently.
static CLIPBOARD_LOCK: Mutex<()> = Mutex::new(());

fn setup() -> std::sync::MutexGuard<'static, ()> {
	let _ = env_logger::builder().is_test(true).try_init();
	CLIPBOARD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Creates a context, or `None` on headless machines (no display server).
/// Tests skip silently in that case instead of failing.
fn new_clipboard() -> Option<Clipboard> {
	let cb = Clipboard::new();
	if cb.is_none() {
		eprintln!("selection service unavailable; skipping");
	}
	cb
}

/// Transfers between contexts are asynchronous; poll for the expected value
/// instead of sleeping for a fixed amount of wall clock.
fn eventually<T, F>(mut probe: F, expected: &T) -> T
where
	T: PartialEq,
	F: FnMut() -> T,
{
	let deadline = Instant::now() + Duration::from_secs(5);
	loop {
		let value = probe();
		if &value == expected || Instant::now() >= deadline {
			return value;
		}
		thread::sleep(Duration::from_millis(10));
	}
}

#[test]
fn instantiation() {
	let _lock = setup();
	let Some(cb) = new_clipboard() else { return };
	drop(cb);

	let opts = ClipboardOptions {
		x11_action_timeout: Duration::from_millis(500),
		..Default::default()
	};
	assert!(Clipboard::with_options(opts).is_some());
}

#[test]
fn multiple_instantiation() {
	let _lock = setup();
	let Some(cb1) = new_clipboard() else { return };
	let Some(cb2) = new_clipboard() else { return };
	drop(cb2);
	drop(cb1);
}

#[test]
fn set_and_get_text() {
	let _lock = setup();
	let Some(cb1) = new_clipboard() else { return };
	let Some(cb2) = new_clipboard() else { return };

	assert!(cb1.set_text("test", SelectionMode::Clipboard));
	// Reading our own selection is served from the local record.
	assert_eq!(cb1.get_text(SelectionMode::Clipboard).as_deref(), Some("test"));
	let got = eventually(
		|| cb2.get_text(SelectionMode::Clipboard),
		&Some("test".to_owned()),
	);
	assert_eq!(got.as_deref(), Some("test"));
	assert_eq!(got.map(|s| s.len()), Some(4));

	assert!(cb2.set_text("string", SelectionMode::Clipboard));
	let got = eventually(
		|| cb1.get_text(SelectionMode::Clipboard),
		&Some("string".to_owned()),
	);
	assert_eq!(got.as_deref(), Some("string"));

	// The caller picks how much of the text goes out.
	assert!(cb1.set_text(&"test"[..1], SelectionMode::Clipboard));
	assert_eq!(cb1.get_text(SelectionMode::Clipboard).as_deref(), Some("t"));
	let got = eventually(|| cb2.get_text(SelectionMode::Clipboard), &Some("t".to_owned()));
	assert_eq!(got.as_deref(), Some("t"));
}

#[test]
fn set_text_edge_cases() {
	let _lock = setup();
	let Some(cb) = new_clipboard() else { return };

	for mode in [SelectionMode::Clipboard, SelectionMode::Primary] {
		assert!(!cb.set_text("", mode));
		assert!(!cb.set_text(String::new(), mode));
	}
}

#[test]
fn ownership_handover() {
	let _lock = setup();
	let Some(cb1) = new_clipboard() else { return };
	let Some(cb2) = new_clipboard() else { return };

	for mode in [SelectionMode::Clipboard, SelectionMode::Primary] {
		assert!(!cb1.has_ownership(mode));
		assert!(!cb2.has_ownership(mode));
	}

	// This test is inherently subject to race conditions as any other
	// application could take the clipboard between setting and asserting.
	assert!(cb1.set_text("test", SelectionMode::Clipboard));
	assert!(cb1.has_ownership(SelectionMode::Clipboard));
	assert!(!cb2.has_ownership(SelectionMode::Clipboard));

	// The read below is present only for synchronisation purposes: it makes
	// sure cb2 observed cb1's data before cb2 takes the selection over.
	let got = eventually(
		|| cb2.get_text(SelectionMode::Clipboard),
		&Some("test".to_owned()),
	);
	assert!(got.is_some());

	assert!(cb2.set_text("test2", SelectionMode::Clipboard));
	// cb1 loses ownership once the server delivers the SelectionClear.
	assert!(!eventually(|| cb1.has_ownership(SelectionMode::Clipboard), &false));
	assert!(cb2.has_ownership(SelectionMode::Clipboard));

	let got = eventually(
		|| cb1.get_text(SelectionMode::Clipboard),
		&Some("test2".to_owned()),
	);
	assert_eq!(got.as_deref(), Some("test2"));
	assert_eq!(cb2.get_text(SelectionMode::Clipboard).as_deref(), Some("test2"));
}

#[test]
fn clearing_the_clipboard() {
	let _lock = setup();
	let Some(cb) = new_clipboard() else { return };

	assert!(cb.set_text("cleartest", SelectionMode::Clipboard));
	assert_eq!(cb.get_text(SelectionMode::Clipboard).as_deref(), Some("cleartest"));

	cb.clear(SelectionMode::Clipboard);
	assert!(!eventually(|| cb.has_ownership(SelectionMode::Clipboard), &false));
	assert_eq!(eventually(|| cb.get_text(SelectionMode::Clipboard), &None), None);
}

#[cfg(all(
	unix,
	not(any(target_os = "macos", target_os = "android", target_os = "emscripten"))
))]
#[test]
fn primary_selection_round_trip() {
	let _lock = setup();
	let Some(cb1) = new_clipboard() else { return };
	let Some(cb2) = new_clipboard() else { return };

	assert!(cb1.set_text("middle click", SelectionMode::Primary));
	assert!(cb1.has_ownership(SelectionMode::Primary));
	let got = eventually(
		|| cb2.get_text(SelectionMode::Primary),
		&Some("middle click".to_owned()),
	);
	assert_eq!(got.as_deref(), Some("middle click"));

	// The two selections stay independent.
	assert!(!cb1.has_ownership(SelectionMode::Clipboard));
}

#[test]
fn utf8_round_trip() {
	let _lock = setup();
	let Some(cb1) = new_clipboard() else { return };
	let Some(cb2) = new_clipboard() else { return };

	let text = "\u{672a}\u{6765}";
	assert!(cb1.set_text(text, SelectionMode::Clipboard));
	assert_eq!(cb1.get_text(SelectionMode::Clipboard).as_deref(), Some(text));

	let got = eventually(|| cb2.get_text(SelectionMode::Clipboard), &Some(text.to_owned()));
	assert_eq!(got.as_deref(), Some(text));
	assert_eq!(got.map(|s| s.len()), Some(6));
}

#[test]
fn newline_preservation() {
	let _lock = setup();
	let Some(cb1) = new_clipboard() else { return };
	let Some(cb2) = new_clipboard() else { return };

	for text in ["a\r\n b\r\n c\r\n", "a\n b\n c\n", "a\r b\r c\r"] {
		assert!(cb1.set_text(text, SelectionMode::Clipboard));
		let got = eventually(|| cb2.get_text(SelectionMode::Clipboard), &Some(text.to_owned()));
		assert_eq!(got.as_deref(), Some(text));
	}
}

#[cfg(all(
	unix,
	not(any(target_os = "macos", target_os = "android", target_os = "emscripten"))
))]
#[test]
fn incr_transfer_large_payload() {
	let _lock = setup();
	let Some(cb1) = new_clipboard() else { return };
	let Some(cb2) = new_clipboard() else { return };

	// 4 MiB forces the incremental protocol with the default transfer size.
	let payload = "0123456789abcdef".repeat((4 << 20) / 16);
	assert!(cb1.set_text(payload.as_str(), SelectionMode::Clipboard));

	let expected = Some(payload.clone());
	let got = eventually(|| cb2.get_text(SelectionMode::Clipboard), &expected);
	assert!(got == expected, "large payload was mangled in transfer");
}

#[cfg(all(
	unix,
	not(any(target_os = "macos", target_os = "android", target_os = "emscripten"))
))]
#[test]
fn incr_transfer_small_chunks() {
	let _lock = setup();
	// A tiny transfer size forces many INCR round trips even for a modest
	// payload.
	let opts = ClipboardOptions { x11_transfer_size: 1024, ..Default::default() };
	let Some(cb1) = Clipboard::with_options(opts.clone()) else {
		eprintln!("selection service unavailable; skipping");
		return;
	};
	let Some(cb2) = Clipboard::with_options(opts) else { return };

	let payload = "chunked ".repeat(100_000 / 8);
	assert!(cb1.set_text(payload.as_str(), SelectionMode::Clipboard));

	let expected = Some(payload.clone());
	let got = eventually(|| cb2.get_text(SelectionMode::Clipboard), &expected);
	assert!(got == expected, "chunked payload was mangled in transfer");
}

#[test]
fn rapid_create_destroy_smoke() {
	let _lock = setup();
	if new_clipboard().is_none() {
		return;
	}

	for _ in 0..500 {
		let cb = Clipboard::new().expect("context creation started failing mid-loop");
		drop(cb);
	}
}
