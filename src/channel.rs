//! Response Channel
//!
//! One-shot, thread-safe slot correlating a submitted command with its
//! asynchronous completion.
//!
//! ## Correlation
//! ```text
//! submit:   Arc<ResponseChannel> ──into_raw──▶ token (usize) ──▶ engine
//! complete: engine thread ──▶ on_success / on_failure(token) ──▶ channel
//! ```
//! The token carries one strong reference owned by the engine. It is
//! released by the completion that fulfils the channel, so the channel stays
//! valid for that completion even when the waiting side has already gone away.
//!
//! The engine must complete each token exactly once. After the first
//! completion the token may point at freed memory.
//!
//! ## States
//! Pending ──▶ Fulfilled(Success | Failure) ──▶ Taken
//!
//! On the channel itself the first completion wins. A later `set_value` or
//! `set_error` is logged and its payload released.

use std::ffi::{c_char, CStr};
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::engine::Engine;
use crate::response::{CommandResponse, OwnedResponse};
use crate::status::RequestErrorType;

/// Outcome stored in a fulfilled channel
#[derive(Debug)]
pub enum Completion {
    /// Success callback; `None` when the engine delivered a null response
    Response(Option<OwnedResponse>),

    /// Failure callback; mapped to a status when retrieved
    Failed {
        kind: RequestErrorType,
        message: String,
    },
}

#[derive(Default)]
struct Slot {
    completion: Option<Completion>,
    fulfilled: bool,
    waker: Option<Waker>,
}

/// One-shot completion slot shared by the submitter and the engine
pub struct ResponseChannel {
    slot: Mutex<Slot>,
    ready: Condvar,

    /// Releases responses that are never retrieved
    engine: Arc<dyn Engine>,
}

impl ResponseChannel {
    pub fn new(engine: Arc<dyn Engine>) -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Slot::default()),
            ready: Condvar::new(),
            engine,
        })
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Fulfil with a delivered response
    ///
    /// Returns false, and releases the response, if already fulfilled.
    ///
    /// # Safety
    ///
    /// `response` must be null or an unreleased response allocated by this
    /// channel's engine. Ownership passes to the channel.
    pub unsafe fn set_value(&self, response: *mut CommandResponse) -> bool {
        let response = unsafe { OwnedResponse::from_raw(response, Arc::clone(&self.engine)) };
        self.fulfil(Completion::Response(response))
    }

    /// Fulfil with an engine failure
    ///
    /// Returns false if already fulfilled.
    pub fn set_error(&self, kind: RequestErrorType, message: impl Into<String>) -> bool {
        self.fulfil(Completion::Failed {
            kind,
            message: message.into(),
        })
    }

    fn fulfil(&self, completion: Completion) -> bool {
        let waker = {
            let mut slot = self.slot.lock();
            if slot.fulfilled {
                drop(slot);
                tracing::warn!(?completion, "Duplicate completion ignored");
                // Dropping `completion` releases any response it carries.
                return false;
            }
            slot.completion = Some(completion);
            slot.fulfilled = true;
            slot.waker.take()
        };

        self.ready.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    // =========================================================================
    // Waiting
    // =========================================================================

    pub fn is_ready(&self) -> bool {
        self.slot.lock().fulfilled
    }

    /// Block until fulfilled
    pub fn wait(&self) {
        let mut slot = self.slot.lock();
        while !slot.fulfilled {
            self.ready.wait(&mut slot);
        }
    }

    /// Block until fulfilled or `timeout` elapses; true if fulfilled
    pub fn wait_for(&self, timeout: Duration) -> bool {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(deadline),
            None => {
                self.wait();
                true
            }
        }
    }

    /// Block until fulfilled or `deadline` passes; true if fulfilled
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut slot = self.slot.lock();
        while !slot.fulfilled {
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                return slot.fulfilled;
            }
        }
        true
    }

    // =========================================================================
    // Retrieval
    // =========================================================================

    /// Move the outcome out; `None` while pending or once taken
    pub fn take(&self) -> Option<Completion> {
        self.slot.lock().completion.take()
    }

    /// Non-blocking retrieval that registers `cx`'s waker while pending
    pub fn poll_take(&self, cx: &mut Context<'_>) -> Poll<Option<Completion>> {
        let mut slot = self.slot.lock();
        if slot.fulfilled {
            return Poll::Ready(slot.completion.take());
        }
        match &slot.waker {
            Some(waker) if waker.will_wake(cx.waker()) => {}
            _ => slot.waker = Some(cx.waker().clone()),
        }
        Poll::Pending
    }

    // =========================================================================
    // Engine token
    // =========================================================================

    /// Hand one strong reference to the engine as a correlation token
    pub(crate) fn into_token(channel: Arc<Self>) -> usize {
        Arc::into_raw(channel) as usize
    }

    /// Reclaim a token that was never handed to the engine
    ///
    /// # Safety
    ///
    /// `token` must come from `into_token` and not have been released.
    pub(crate) unsafe fn release_token(token: usize) {
        drop(unsafe { Arc::from_raw(token as *const ResponseChannel) });
    }
}

impl fmt::Debug for ResponseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("ResponseChannel")
            .field("fulfilled", &slot.fulfilled)
            .field("completion", &slot.completion)
            .finish()
    }
}

// =============================================================================
// Engine callbacks
// =============================================================================

/// Success callback registered with the engine
///
/// # Safety
///
/// `token` must come from `ResponseChannel::into_token`, and the engine must
/// invoke `on_success` or `on_failure` exactly once for it. The first call
/// releases the token's reference, so a second call may touch freed memory.
/// `response` must be null or an unreleased response from the channel's
/// engine.
pub(crate) unsafe extern "C" fn on_success(token: usize, response: *const CommandResponse) {
    let channel = unsafe { &*(token as *const ResponseChannel) };
    let fulfilled = unsafe { channel.set_value(response as *mut CommandResponse) };
    if fulfilled {
        unsafe { ResponseChannel::release_token(token) };
    }
}

/// Failure callback registered with the engine
///
/// The message is copied before returning.
///
/// # Safety
///
/// `token` must come from `ResponseChannel::into_token`, and the engine must
/// invoke `on_success` or `on_failure` exactly once for it. `message` must be
/// null or a valid C string.
pub(crate) unsafe extern "C" fn on_failure(token: usize, message: *const c_char, error_type: u32) {
    let message = if message.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(message) }
            .to_string_lossy()
            .into_owned()
    };

    let channel = unsafe { &*(token as *const ResponseChannel) };
    let fulfilled = channel.set_error(RequestErrorType::from_raw(error_type), message);
    if fulfilled {
        unsafe { ResponseChannel::release_token(token) };
    }
}
