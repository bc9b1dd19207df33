/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2026 The Selboard contributors

The project to which this file belongs is licensed under either of
the Apache 2.0 or the MIT license at the licensee's choice. The terms
and conditions of the chosen license apply to this file.
*/

// More info about using the clipboard on X11:
// https://tronche.com/gui/x/icccm/sec-2.html#s-2.6
// https://freedesktop.org/wiki/ClipboardManager/

use std::{
	borrow::Cow,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	thread::{self, JoinHandle},
	time::{Duration, Instant},
};

use log::{error, trace, warn};
use parking_lot::{Condvar, Mutex};
use x11rb::{
	connection::{Connection, RequestConnection},
	protocol::{
		xproto::{
			Atom, AtomEnum, ChangeWindowAttributesAux, ConnectionExt as _, CreateWindowAux,
			EventMask, PropMode, Property, PropertyNotifyEvent, SelectionNotifyEvent,
			SelectionRequestEvent, Time, Window, WindowClass, SELECTION_NOTIFY_EVENT,
		},
		Event,
	},
	rust_connection::RustConnection,
	wrapper::ConnectionExt as _,
	COPY_DEPTH_FROM_PARENT, COPY_FROM_PARENT, NONE,
};

use super::into_unknown;
use crate::common::{ClipboardOptions, Error, ScopeGuard, SelectionMode};

type Result<T, E = Error> = std::result::Result<T, E>;

x11rb::atom_manager! {
	pub Atoms: AtomCookies {
		CLIPBOARD,
		PRIMARY,

		TARGETS,
		LENGTH,
		MULTIPLE,
		TIMESTAMP,
		ATOM,
		INCR,

		UTF8_STRING,
	}
}

/// How long the event loop sleeps between polls while outbound incremental
/// transfers are in flight and have to be checked for expiry.
const INCR_POLL_DUR: Duration = Duration::from_millis(5);

/// A `ChangeProperty` request carries this much framing on top of the data.
const CHANGE_PROPERTY_HEADER: usize = 24;

struct XContext {
	conn: RustConnection,
	win_id: Window,
}

impl XContext {
	fn new(display_name: Option<&str>) -> Result<Self> {
		let (conn, screen_num): (RustConnection, _) = RustConnection::connect(display_name)
			.map_err(|_| Error::unknown("could not connect to the X11 server"))?;
		let screen = conn
			.setup()
			.roots
			.get(screen_num)
			.ok_or_else(|| Error::unknown("no screen found"))?;
		let win_id = conn.generate_id().map_err(into_unknown)?;

		let event_mask =
            // Property changes on our own window carry inbound INCR segments.
            EventMask::PROPERTY_CHANGE |
            // To receive DestroyNotify event and stop the message loop.
            EventMask::STRUCTURE_NOTIFY;
		// create the invisible window that receives all selection traffic
		conn.create_window(
			COPY_DEPTH_FROM_PARENT,
			win_id,
			screen.root,
			0,
			0,
			1,
			1,
			0,
			WindowClass::COPY_FROM_PARENT,
			COPY_FROM_PARENT,
			&CreateWindowAux::new().event_mask(event_mask),
		)
		.map_err(into_unknown)?;
		conn.flush().map_err(into_unknown)?;

		Ok(Self { conn, win_id })
	}
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TransferState {
	/// `ConvertSelection` has been issued, no answer yet.
	AwaitingNotify,
	/// The owner announced an INCR stream; segments are being appended.
	IncrReceiving,
	DoneOk,
	DoneErr,
}

/// An inbound transfer the façade is currently sleeping on. Only the event
/// loop advances `state`; the façade inspects it under the context mutex and
/// removes the record when it is done with it (including on timeout).
struct PendingTransfer {
	state: TransferState,
	buffer: Vec<u8>,
	/// Extended by the event loop whenever a segment arrives, so that a slow
	/// INCR stream is not cut off mid-way.
	deadline: Instant,
}

/// Per-selection record: what we currently advertise to other clients, or
/// what a remote owner last handed to us.
struct Selection {
	/// The atom naming this selection on the server (`CLIPBOARD` or `PRIMARY`).
	atom: Atom,
	/// The target under which `data` is served, `UTF8_STRING` for everything
	/// we publish.
	target: Atom,
	data: Option<Vec<u8>>,
	has_ownership: bool,
	pending: Option<PendingTransfer>,
}

impl Selection {
	fn new(atom: Atom, target: Atom) -> Self {
		Self { atom, target, data: None, has_ownership: false, pending: None }
	}
}

struct Shared {
	clipboard: Selection,
	primary: Selection,
}

impl Shared {
	fn slot(&self, mode: SelectionMode) -> &Selection {
		match mode {
			SelectionMode::Clipboard => &self.clipboard,
			SelectionMode::Primary => &self.primary,
		}
	}

	fn slot_mut(&mut self, mode: SelectionMode) -> &mut Selection {
		match mode {
			SelectionMode::Clipboard => &mut self.clipboard,
			SelectionMode::Primary => &mut self.primary,
		}
	}
}

/// An outbound INCR session: a requestor asked for a payload too large for a
/// single property and now drives the transfer by deleting the property
/// after consuming each segment. Owned exclusively by the event loop.
struct IncrSend {
	requestor: Window,
	property: Atom,
	target: Atom,
	data: Vec<u8>,
	offset: usize,
	deadline: Instant,
}

struct Inner {
	server: XContext,
	atoms: Atoms,
	action_timeout: Duration,
	transfer_size: usize,

	shared: Mutex<Shared>,
	/// Signalled when a pending transfer reaches a terminal state or its
	/// slot frees up.
	transfer_done: Condvar,

	serve_stopped: AtomicBool,
}

impl Inner {
	fn new(options: &ClipboardOptions) -> Result<Self> {
		let server = XContext::new(options.x11_display_name.as_deref())?;
		let atoms =
			Atoms::new(&server.conn).map_err(into_unknown)?.reply().map_err(into_unknown)?;

		Ok(Self {
			server,
			shared: Mutex::new(Shared {
				clipboard: Selection::new(atoms.CLIPBOARD, atoms.UTF8_STRING),
				primary: Selection::new(atoms.PRIMARY, atoms.UTF8_STRING),
			}),
			atoms,
			action_timeout: options.x11_action_timeout,
			transfer_size: options.x11_transfer_size as usize,
			transfer_done: Condvar::new(),
			serve_stopped: AtomicBool::new(false),
		})
	}

	fn atom_of(&self, mode: SelectionMode) -> Atom {
		match mode {
			SelectionMode::Clipboard => self.atoms.CLIPBOARD,
			SelectionMode::Primary => self.atoms.PRIMARY,
		}
	}

	fn mode_of(&self, atom: Atom) -> Option<SelectionMode> {
		match atom {
			a if a == self.atoms.CLIPBOARD => Some(SelectionMode::Clipboard),
			a if a == self.atoms.PRIMARY => Some(SelectionMode::Primary),
			_ => None,
		}
	}

	fn ensure_serving(&self) -> Result<()> {
		if self.serve_stopped.load(Ordering::Relaxed) {
			Err(Error::unknown(
				"the selection handler thread has stopped; logging may reveal the cause",
			))
		} else {
			Ok(())
		}
	}

	/// The largest payload that still fits a single `ChangeProperty` request;
	/// anything bigger goes through INCR. The configured transfer size is
	/// capped by what the server accepts in one request.
	fn effective_transfer_size(&self) -> usize {
		self.transfer_size
			.min(self.server.conn.maximum_request_bytes() - CHANGE_PROPERTY_HEADER)
	}

	fn write(&self, bytes: Vec<u8>, mode: SelectionMode) -> Result<()> {
		self.ensure_serving()?;

		let mut shared = self.shared.lock();
		let slot = shared.slot_mut(mode);

		// ICCCM version 2, section 2.6.1.3 states that we should re-assert
		// ownership whenever data changes.
		self.server
			.conn
			.set_selection_owner(self.server.win_id, slot.atom, Time::CURRENT_TIME)
			.map_err(|_| Error::ClipboardOccupied)?;
		self.server.conn.flush().map_err(into_unknown)?;

		// The event loop cannot observe the record before we release the
		// mutex, so committing after the flush keeps the record clean when
		// the requests could not be sent.
		slot.target = self.atoms.UTF8_STRING;
		slot.data = Some(bytes);
		slot.has_ownership = true;

		// The serving thread takes care of the rest. Authority over the
		// selection rests with the server from this point; a later
		// `SelectionClear` revokes our copy asynchronously.
		Ok(())
	}

	/// Relinquishes the selection server-side. Local state is left alone on
	/// purpose: the server answers with a `SelectionClear` which the event
	/// loop applies, keeping one source of truth for ownership loss.
	fn clear(&self, mode: SelectionMode) -> Result<()> {
		self.server
			.conn
			.set_selection_owner(NONE, self.atom_of(mode), Time::CURRENT_TIME)
			.map_err(into_unknown)?;
		self.server.conn.flush().map_err(into_unknown)
	}

	fn is_owner(&self, mode: SelectionMode) -> bool {
		self.shared.lock().slot(mode).has_ownership
	}

	fn read(&self, mode: SelectionMode) -> Result<Vec<u8>> {
		self.ensure_serving()?;

		let mut shared = self.shared.lock();

		// While we own the selection the answer is already here; no server
		// round trip.
		if shared.slot(mode).has_ownership {
			return shared.slot(mode).data.clone().ok_or(Error::ContentNotAvailable);
		}

		// Only one inbound request per selection may be outstanding. Wait for
		// a concurrent reader to finish rather than superseding its transfer.
		let slot_deadline = Instant::now() + self.action_timeout;
		while shared.slot(mode).pending.is_some() {
			if self.transfer_done.wait_until(&mut shared, slot_deadline).timed_out()
				&& shared.slot(mode).pending.is_some()
			{
				return Err(Error::ContentNotAvailable);
			}
		}
		// Ownership may have arrived while we were parked.
		if shared.slot(mode).has_ownership {
			return shared.slot(mode).data.clone().ok_or(Error::ContentNotAvailable);
		}

		let selection = shared.slot(mode).atom;
		shared.slot_mut(mode).pending = Some(PendingTransfer {
			state: TransferState::AwaitingNotify,
			buffer: Vec::new(),
			deadline: Instant::now() + self.action_timeout,
		});

		let issued = (|| {
			// Delete the transfer property first so the owner's write
			// produces a clean NewValue notification.
			self.server.conn.delete_property(self.server.win_id, selection)?;
			self.server.conn.convert_selection(
				self.server.win_id,
				selection,
				self.atoms.UTF8_STRING,
				selection,
				Time::CURRENT_TIME,
			)?;
			self.server.conn.flush()
		})();
		if let Err(e) = issued {
			shared.slot_mut(mode).pending = None;
			self.transfer_done.notify_all();
			return Err(into_unknown(e));
		}

		loop {
			let (state, deadline) = match &shared.slot(mode).pending {
				Some(pending) => (pending.state, pending.deadline),
				// Only the reader that created the record removes it, so this
				// arm is unreachable; report a failed transfer if it happens.
				None => return Err(Error::ContentNotAvailable),
			};
			match state {
				TransferState::DoneOk => {
					let buffer =
						shared.slot_mut(mode).pending.take().map(|p| p.buffer).unwrap_or_default();
					self.transfer_done.notify_all();
					return Ok(buffer);
				}
				TransferState::DoneErr => {
					shared.slot_mut(mode).pending = None;
					self.transfer_done.notify_all();
					return Err(Error::ContentNotAvailable);
				}
				TransferState::AwaitingNotify | TransferState::IncrReceiving => {
					if Instant::now() >= deadline {
						shared.slot_mut(mode).pending = None;
						self.transfer_done.notify_all();
						log::info!("Time-out hit while reading the selection.");
						return Err(Error::ContentNotAvailable);
					}
					// The wait result does not matter: the state is
					// re-checked and the deadline re-read either way.
					self.transfer_done.wait_until(&mut shared, deadline);
				}
			}
		}
	}

	/// First answer to our `ConvertSelection`. Either carries the payload
	/// directly, announces an INCR stream, or reports that the conversion
	/// could not be made.
	fn handle_transfer_notify(&self, event: &SelectionNotifyEvent) -> Result<()> {
		let mode = match self.mode_of(event.selection) {
			Some(mode) => mode,
			None => {
				trace!("SelectionNotify for a selection we never requested; ignoring.");
				return Ok(());
			}
		};

		let mut shared = self.shared.lock();
		let slot = shared.slot_mut(mode);
		match slot.pending.as_ref().map(|p| p.state) {
			Some(TransferState::AwaitingNotify) => {}
			_ => {
				trace!("SelectionNotify without a matching pending transfer; ignoring.");
				return Ok(());
			}
		}

		// The property being set to NONE means that the `convert_selection`
		// failed. The target must echo what we requested.
		if event.property == NONE || event.target != self.atoms.UTF8_STRING {
			self.finish_pending(slot, TransferState::DoneErr);
			return Ok(());
		}

		// Read and delete the property; the deletion tells the owner we are
		// ready for more.
		let reply = match self
			.server
			.conn
			.get_property(true, event.requestor, event.property, event.target, 0, u32::MAX / 4)
			.map_err(into_unknown)
			.and_then(|cookie| cookie.reply().map_err(into_unknown))
		{
			Ok(reply) => reply,
			Err(e) => {
				self.finish_pending(slot, TransferState::DoneErr);
				return Err(e);
			}
		};

		if reply.type_ == self.atoms.UTF8_STRING {
			if let Some(pending) = slot.pending.as_mut() {
				pending.buffer = reply.value;
				// Keep a copy in the record; it lives there until a
				// SelectionClear or the next transfer replaces it.
				slot.data = Some(pending.buffer.clone());
			}
			slot.target = self.atoms.UTF8_STRING;
			self.finish_pending(slot, TransferState::DoneOk);
		} else if reply.type_ == self.atoms.INCR {
			// The get_property above did not delete anything because the
			// requested type did not match; repeat with INCR so the deletion
			// actually happens and the stream starts.
			let reply = match self
				.server
				.conn
				.get_property(
					true,
					event.requestor,
					event.property,
					self.atoms.INCR,
					0,
					u32::MAX / 4,
				)
				.map_err(into_unknown)
				.and_then(|cookie| cookie.reply().map_err(into_unknown))
			{
				Ok(reply) => reply,
				Err(e) => {
					self.finish_pending(slot, TransferState::DoneErr);
					return Err(e);
				}
			};
			trace!("Receiving INCR segments");
			if let Some(pending) = slot.pending.as_mut() {
				if reply.value_len == 4 {
					let announced =
						reply.value32().and_then(|mut vals| vals.next()).unwrap_or(0);
					pending.buffer.reserve(announced as usize);
				}
				pending.state = TransferState::IncrReceiving;
				pending.deadline = Instant::now() + self.action_timeout;
			}
		} else {
			// We only ever ask for UTF8_STRING, so nothing else should come back.
			warn!("Unexpected property type received from the selection owner.");
			self.finish_pending(slot, TransferState::DoneErr);
		}
		Ok(())
	}

	/// One INCR segment written by the owner into the transfer property on
	/// our window. A zero-length segment terminates the stream.
	fn handle_transfer_segment(&self, event: &PropertyNotifyEvent) -> Result<()> {
		let mode = match self.mode_of(event.atom) {
			Some(mode) => mode,
			None => return Ok(()),
		};

		let mut shared = self.shared.lock();
		let slot = shared.slot_mut(mode);
		match slot.pending.as_ref().map(|p| p.state) {
			Some(TransferState::IncrReceiving) => {}
			// The owner also touches the property while preparing the
			// non-INCR answer; nothing to do for those notifications.
			_ => return Ok(()),
		}

		let reply = match self
			.server
			.conn
			.get_property(true, event.window, event.atom, self.atoms.UTF8_STRING, 0, u32::MAX / 4)
			.map_err(into_unknown)
			.and_then(|cookie| cookie.reply().map_err(into_unknown))
		{
			Ok(reply) => reply,
			Err(e) => {
				self.finish_pending(slot, TransferState::DoneErr);
				return Err(e);
			}
		};

		if reply.value_len == 0 {
			trace!("INCR transfer finished");
			if let Some(pending) = slot.pending.as_ref() {
				slot.data = Some(pending.buffer.clone());
			}
			slot.target = self.atoms.UTF8_STRING;
			self.finish_pending(slot, TransferState::DoneOk);
		} else if let Some(pending) = slot.pending.as_mut() {
			pending.buffer.extend(reply.value);
			// A valid segment arrived; give the stream a fresh deadline.
			pending.deadline = Instant::now() + self.action_timeout;
		}
		Ok(())
	}

	fn finish_pending(&self, slot: &mut Selection, state: TransferState) {
		if let Some(pending) = slot.pending.as_mut() {
			pending.state = state;
		}
		self.transfer_done.notify_all();
	}

	/// Another client asked for the contents of a selection. Exactly one
	/// reply (`SelectionNotify`) goes back, with `property` echoed on
	/// success and `NONE` on refusal.
	fn handle_selection_request(
		&self,
		event: &SelectionRequestEvent,
		incr_sends: &mut Vec<IncrSend>,
	) -> Result<()> {
		let mode = match self.mode_of(event.selection) {
			Some(mode) => mode,
			None => {
				warn!("Received a selection request for a selection other than CLIPBOARD or PRIMARY. This is unexpected.");
				self.send_selection_notify(event, false)?;
				return self.server.conn.flush().map_err(into_unknown);
			}
		};

		let success = if event.target == self.atoms.TARGETS {
			trace!("Handling TARGETS");
			let targets = [self.atoms.TARGETS, self.atoms.UTF8_STRING];
			self.server
				.conn
				.change_property32(
					PropMode::REPLACE,
					event.requestor,
					event.property,
					self.atoms.ATOM,
					&targets,
				)
				.map_err(into_unknown)?;
			true
		} else if event.target == self.atoms.UTF8_STRING {
			trace!("Handling request for the selection contents.");
			// Snapshot under the mutex; serving must not hold the lock
			// across server round trips.
			let payload = {
				let shared = self.shared.lock();
				let slot = shared.slot(mode);
				if slot.has_ownership {
					slot.data.clone().map(|data| (data, slot.target))
				} else {
					// Ownership was lost between the request and now.
					None
				}
			};
			match payload {
				Some((data, _)) if data.len() > self.effective_transfer_size() => {
					self.begin_incr_send(event, data, incr_sends)?;
					true
				}
				Some((data, target)) => {
					self.server
						.conn
						.change_property8(
							PropMode::REPLACE,
							event.requestor,
							event.property,
							target,
							&data,
						)
						.map_err(into_unknown)?;
					true
				}
				None => false,
			}
		} else if event.target == self.atoms.TIMESTAMP
			|| event.target == self.atoms.MULTIPLE
			|| event.target == self.atoms.LENGTH
		{
			// ICCCM side targets we do not serve.
			false
		} else {
			trace!("Refusing a request for an unsupported target.");
			false
		};

		self.send_selection_notify(event, success)?;
		self.server.conn.flush().map_err(into_unknown)
	}

	fn send_selection_notify(
		&self,
		event: &SelectionRequestEvent,
		success: bool,
	) -> Result<()> {
		let property = if success { event.property } else { AtomEnum::NONE.into() };
		self.server
			.conn
			.send_event(
				false,
				event.requestor,
				EventMask::NO_EVENT,
				SelectionNotifyEvent {
					response_type: SELECTION_NOTIFY_EVENT,
					sequence: event.sequence,
					time: event.time,
					requestor: event.requestor,
					selection: event.selection,
					target: event.target,
					property,
				},
			)
			.map_err(into_unknown)?;
		Ok(())
	}

	/// Starts an outbound INCR session: announce the total length under the
	/// `INCR` type, then stream segments each time the requestor deletes the
	/// property.
	fn begin_incr_send(
		&self,
		event: &SelectionRequestEvent,
		data: Vec<u8>,
		incr_sends: &mut Vec<IncrSend>,
	) -> Result<()> {
		trace!("Starting an INCR transfer of {} bytes", data.len());

		// A new request supersedes any stale session with the same requestor
		// and property.
		incr_sends
			.retain(|send| !(send.requestor == event.requestor && send.property == event.property));

		// Property deletions on the requestor's window drive the transfer
		// from here on.
		self.server
			.conn
			.change_window_attributes(
				event.requestor,
				&ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE),
			)
			.map_err(into_unknown)?;
		let total = u32::try_from(data.len()).unwrap_or(u32::MAX);
		self.server
			.conn
			.change_property32(
				PropMode::REPLACE,
				event.requestor,
				event.property,
				self.atoms.INCR,
				&[total],
			)
			.map_err(into_unknown)?;

		incr_sends.push(IncrSend {
			requestor: event.requestor,
			property: event.property,
			target: event.target,
			data,
			offset: 0,
			deadline: Instant::now() + self.action_timeout,
		});
		Ok(())
	}

	/// The requestor consumed the previous segment (deleted the property);
	/// write the next one. A zero-length write ends the session.
	fn continue_incr_send(
		&self,
		event: &PropertyNotifyEvent,
		incr_sends: &mut Vec<IncrSend>,
	) -> Result<()> {
		let pos = match incr_sends
			.iter()
			.position(|send| send.requestor == event.window && send.property == event.atom)
		{
			Some(pos) => pos,
			None => return Ok(()),
		};

		let finished = {
			let send = &mut incr_sends[pos];
			let remaining = send.data.len() - send.offset;
			let segment = remaining.min(self.effective_transfer_size());
			let end = send.offset + segment;
			self.server
				.conn
				.change_property8(
					PropMode::REPLACE,
					send.requestor,
					send.property,
					send.target,
					&send.data[send.offset..end],
				)
				.map_err(into_unknown)?;
			send.offset = end;
			if remaining == 0 {
				// That was the zero-length terminator.
				true
			} else {
				send.deadline = Instant::now() + self.action_timeout;
				false
			}
		};

		if finished {
			trace!("INCR transfer served completely");
			let send = incr_sends.remove(pos);
			// Stop watching the requestor's window.
			let _ = self.server.conn.change_window_attributes(
				send.requestor,
				&ChangeWindowAttributesAux::new().event_mask(EventMask::NO_EVENT),
			);
		}
		self.server.conn.flush().map_err(into_unknown)
	}

	fn abandon_expired_sends(&self, incr_sends: &mut Vec<IncrSend>) {
		let now = Instant::now();
		incr_sends.retain(|send| {
			if send.deadline > now {
				return true;
			}
			warn!("Abandoning an INCR transfer that the requestor stopped driving.");
			let _ = self.server.conn.change_window_attributes(
				send.requestor,
				&ChangeWindowAttributesAux::new().event_mask(EventMask::NO_EVENT),
			);
			false
		});
	}

	/// Blocks for the next event, or polls with a short nap while outbound
	/// INCR sessions are alive so that abandoned ones can be expired.
	fn next_event(&self, incr_sends: &mut Vec<IncrSend>) -> Result<Option<Event>> {
		if incr_sends.is_empty() {
			return self.server.conn.wait_for_event().map(Some).map_err(into_unknown);
		}
		self.abandon_expired_sends(incr_sends);
		match self.server.conn.poll_for_event().map_err(into_unknown)? {
			Some(event) => Ok(Some(event)),
			None => {
				thread::sleep(INCR_POLL_DUR);
				Ok(None)
			}
		}
	}
}

fn serve_requests(context: Arc<Inner>) -> Result<()> {
	trace!("Started serve requests thread.");

	let _guard = ScopeGuard::new(|| {
		context.serve_stopped.store(true, Ordering::Relaxed);
	});

	// Outbound INCR sessions live on the loop's stack; the façade never
	// touches them.
	let mut incr_sends: Vec<IncrSend> = Vec::new();

	loop {
		let event = match context.next_event(&mut incr_sends)? {
			Some(event) => event,
			None => continue,
		};
		match event {
			Event::DestroyNotify(_) => {
				// Our window is going away: the context is shutting down.
				trace!("Selection window is being destroyed x_x");
				return Ok(());
			}
			Event::SelectionClear(event) => {
				// Somebody else has new content for this selection and the
				// server is telling us to drop ours.
				trace!("Somebody else owns the selection now");
				if let Some(mode) = context.mode_of(event.selection) {
					let mut shared = context.shared.lock();
					let slot = shared.slot_mut(mode);
					slot.has_ownership = false;
					slot.data = None;
				}
			}
			Event::SelectionRequest(event) => {
				trace!(
					"SelectionRequest - selection: {}, target: {}",
					event.selection,
					event.target,
				);
				if let Err(e) = context.handle_selection_request(&event, &mut incr_sends) {
					error!("Failed to handle a selection request: {e}");
				}
			}
			Event::SelectionNotify(event) => {
				if let Err(e) = context.handle_transfer_notify(&event) {
					error!("Failed to handle the answer to a conversion request: {e}");
				}
			}
			Event::PropertyNotify(event) => {
				if event.window == context.server.win_id {
					// Inbound: the owner wrote a segment for us.
					if event.state == Property::NEW_VALUE {
						if let Err(e) = context.handle_transfer_segment(&event) {
							error!("Failed to read an INCR segment: {e}");
						}
					}
				} else if event.state == Property::DELETE {
					// Outbound: a requestor consumed the previous segment.
					if let Err(e) = context.continue_incr_send(&event, &mut incr_sends) {
						error!("Failed to continue an INCR transfer: {e}");
					}
				}
			}
			_event => {
				// May be useful for debugging but nothing else really.
			}
		}
	}
}

pub(crate) struct Clipboard {
	inner: Arc<Inner>,

	/// Join handle to the thread which serves selection requests.
	server_handle: Option<JoinHandle<()>>,
}

impl Clipboard {
	pub(crate) fn new(options: &ClipboardOptions) -> Result<Self> {
		let inner = Arc::new(Inner::new(options)?);
		let server_handle = {
			let context = Arc::clone(&inner);
			thread::spawn(move || {
				if let Err(error) = serve_requests(context) {
					error!("Selection worker thread errored with: {}", error);
				}
			})
		};
		Ok(Self { inner, server_handle: Some(server_handle) })
	}

	pub(crate) fn get_text(&self, mode: SelectionMode) -> Result<String> {
		let bytes = self.inner.read(mode)?;
		String::from_utf8(bytes).map_err(|_| Error::ConversionFailure)
	}

	pub(crate) fn set_text(&self, text: Cow<'_, str>, mode: SelectionMode) -> Result<()> {
		self.inner.write(text.into_owned().into_bytes(), mode)
	}

	pub(crate) fn clear(&self, mode: SelectionMode) -> Result<()> {
		self.inner.clear(mode)
	}

	pub(crate) fn has_ownership(&self, mode: SelectionMode) -> bool {
		self.inner.is_owner(mode)
	}
}

impl Drop for Clipboard {
	fn drop(&mut self) {
		// The worker observes the DestroyNotify for its own window and exits;
		// everything else unwinds through normal ownership.
		if let Err(e) = self.inner.server.conn.destroy_window(self.inner.server.win_id) {
			error!("Failed to destroy the selection window. Error: {}", e);
			return;
		}
		if let Err(e) = self.inner.server.conn.flush() {
			error!("Failed to flush the destroy request. Error: {}", e);
			return;
		}
		if let Some(handle) = self.server_handle.take() {
			if let Err(panic) = handle.join() {
				let message = panic
					.downcast_ref::<&'static str>()
					.map(|msg| (*msg).to_string())
					.or_else(|| panic.downcast_ref::<String>().cloned());
				match message {
					Some(message) => error!(
						"The selection worker thread panicked. Panic message: '{}'",
						message,
					),
					None => error!("The selection worker thread panicked."),
				}
			}
		}
	}
}
