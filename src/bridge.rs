//! Transport bridge between the link manager and the printer.
//!
//! [`Shared`] is the one piece of state both sides touch: the printer
//! session plus the signals that hand write acknowledgments and link
//! readiness from the radio task to the printer task.  The radio side
//! reaches it through the [`LinkObserver`] impl; the printer side through
//! [`Printer`](crate::printer::Printer) and [`LinkTransport`].
//!
//! ```text
//!  radio task                          printer task
//!  ----------                          ------------
//!  LinkManager --on_data------> Shared.session.feed()
//!              --on_write_complete--> write_done ---> Printer::send waits
//!              --on_link_ready-----> link_up ------> heartbeat
//!  deliver() <------ Outbound channel <------ LinkTransport::submit
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Sender;
use embassy_sync::signal::Signal;

use crate::error::{Error, LinkError};
use crate::link::{LinkManager, LinkObserver, Radio};
use crate::printer::Transport;
use crate::protocol::Frame;
use crate::session::status::PrinterStatus;
use crate::session::{PrinterSession, SessionEvent, SessionState};

pub struct Shared<M: RawMutex> {
    session: Mutex<M, RefCell<PrinterSession>>,
    /// Outcome of the last acknowledgment-required write.
    pub(crate) write_done: Signal<M, bool>,
    link_up: Signal<M, ()>,
    ready: Signal<M, ()>,
}

impl<M: RawMutex> Shared<M> {
    pub const fn new() -> Self {
        Self {
            session: Mutex::new(RefCell::new(PrinterSession::new())),
            write_done: Signal::new(),
            link_up: Signal::new(),
            ready: Signal::new(),
        }
    }

    /// Run `f` with exclusive access to the session.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut PrinterSession) -> R) -> R {
        self.session.lock(|s| f(&mut s.borrow_mut()))
    }

    pub fn session_state(&self) -> SessionState {
        self.with_session(|s| s.state())
    }

    pub fn is_ready(&self) -> bool {
        self.with_session(|s| s.is_ready())
    }

    /// A subscribed link exists (session ready or awaiting heartbeat).
    pub fn is_link_up(&self) -> bool {
        self.session_state() != SessionState::Disconnected
    }

    pub fn status(&self) -> PrinterStatus {
        self.with_session(|s| *s.status())
    }

    pub fn take_device_error(&self) -> Option<u8> {
        self.with_session(|s| s.take_device_error())
    }

    /// Resolves when the link manager reports a subscribed link.
    pub async fn wait_link_up(&self) {
        self.link_up.wait().await
    }

    /// Resolves when the first heartbeat reply arrives on a link.
    pub async fn wait_ready(&self) {
        self.ready.wait().await
    }
}

impl<M: RawMutex> Default for Shared<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> LinkObserver for &Shared<M> {
    fn on_link_ready(&mut self) {
        self.with_session(|s| s.on_link_ready());
        self.ready.reset();
        self.link_up.signal(());
    }

    fn on_data(&mut self, data: &[u8]) {
        let ready = &self.ready;
        self.with_session(|s| {
            s.feed(data, |event| {
                if event == SessionEvent::Ready {
                    ready.signal(());
                }
            })
        });
    }

    fn on_write_complete(&mut self, ok: bool) {
        self.write_done.signal(ok);
    }

    fn on_disconnected(&mut self) {
        self.with_session(|s| s.on_disconnect());
        self.link_up.reset();
        self.ready.reset();
    }
}

/// Signals for whatever presents state to the user (LEDs, buzzer).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Feedback {
    /// The printer answered its first heartbeat on this link.
    LinkReady,
    PrintSucceeded,
    PrintFailed,
}

impl Feedback {
    pub fn for_print(result: &Result<(), Error>) -> Self {
        match result {
            Ok(()) => Feedback::PrintSucceeded,
            Err(_) => Feedback::PrintFailed,
        }
    }
}

/// A frame queued for the radio task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbound {
    pub frame: Frame,
    pub require_ack: bool,
}

/// [`Transport`] that queues frames for the task owning the link manager.
pub struct LinkTransport<'a, M: RawMutex, const N: usize> {
    shared: &'a Shared<M>,
    tx: Sender<'a, M, Outbound, N>,
}

impl<'a, M: RawMutex, const N: usize> LinkTransport<'a, M, N> {
    pub fn new(shared: &'a Shared<M>, tx: Sender<'a, M, Outbound, N>) -> Self {
        Self { shared, tx }
    }
}

impl<M: RawMutex, const N: usize> Transport for LinkTransport<'_, M, N> {
    fn submit(&mut self, frame: &[u8], require_ack: bool) -> Result<(), Error> {
        if !self.shared.is_link_up() {
            error!("bridge: link not ready, dropping {} bytes", frame.len());
            return Err(Error::InvalidState);
        }
        let frame = Frame::from_slice(frame).map_err(|_| Error::InvalidSize)?;
        self.tx
            .try_send(Outbound { frame, require_ack })
            .map_err(|_| {
                error!("bridge: outbound queue full");
                Error::Link(LinkError::WriteFailed)
            })
    }
}

/// Hand one queued frame to the link manager.  If the write cannot be
/// issued, a waiting sender is released with a failure instead of
/// running into its timeout.
pub fn deliver<M: RawMutex>(
    link: &mut LinkManager,
    radio: &mut impl Radio,
    shared: &Shared<M>,
    out: &Outbound,
) {
    if let Err(e) = link.send(radio, &out.frame, out.require_ack) {
        warn!("bridge: frame not sent: {:?}", e);
        if out.require_ack {
            shared.write_done.signal(false);
        }
    }
}
