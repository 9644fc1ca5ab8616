use intmap::IntMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::error::SimResult;
use crate::executor;
use crate::signal::SimObject;
use crate::sim_if::sim_if;

// One simulator callback per signal / absolute time / phase, shared by all waiters.
thread_local! {
    // key is signal handle as u64
    static EDGE_MAP: RefCell<IntMap<CallbackHandles>> = RefCell::new(IntMap::new());
    // key is absolute callback time
    static TIMER_MAP: RefCell<IntMap<CallbackHandles>> = RefCell::new(IntMap::new());
    static READ_ONLY: RefCell<CallbackHandles> = RefCell::new(CallbackHandles::default());
    static READ_WRITE: RefCell<CallbackHandles> = RefCell::new(CallbackHandles::default());
}

#[derive(Default)]
struct CallbackHandles {
    handle: Option<usize>,
    callbacks: VecDeque<TrigShared>,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum EdgeKind {
    Any,
    Rising,
    Falling,
}

struct TrigShared {
    waker: Waker,
    // Waiters for the other edge kind stay registered without rescheduling the
    // simulator callback.
    edge_kind: EdgeKind,
    fired: Arc<AtomicBool>,
}

impl TrigShared {
    fn matches(&self, edge: EdgeKind) -> bool {
        edge == EdgeKind::Any || self.edge_kind == EdgeKind::Any || self.edge_kind == edge
    }
}

#[derive(Clone, Copy, Debug)]
enum TrigKind {
    Edge(usize, EdgeKind),
    Timer(u64),
    ReadWrite,
    ReadOnly,
}

/// A future that resolves on a simulator event.
pub struct Trigger {
    kind: TrigKind,
    fired: Option<Arc<AtomicBool>>,
}

impl Clone for Trigger {
    // a clone is a fresh, not yet awaited trigger
    fn clone(&self) -> Self {
        Trigger::new(self.kind)
    }
}

impl Trigger {
    fn new(kind: TrigKind) -> Self {
        Trigger { kind, fired: None }
    }
    pub fn timer(time: u64, unit: &str) -> SimResult<Self> {
        let steps = sim_if().get_sim_steps(time as f64, unit)?;
        Ok(Trigger::timer_steps(steps))
    }
    pub fn timer_steps(steps: u64) -> Self {
        Trigger::new(TrigKind::Timer(steps))
    }
    pub async fn timer_ro(time: u64, unit: &str) -> SimResult<()> {
        Trigger::timer(time, unit)?.await?;
        Trigger::read_only().await
    }
    pub async fn timer_rw(time: u64, unit: &str) -> SimResult<()> {
        Trigger::timer(time, unit)?.await?;
        Trigger::read_write().await
    }
    pub fn edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Any))
    }
    pub fn rising_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Rising))
    }
    pub fn falling_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Falling))
    }
    pub fn read_write() -> Self {
        Trigger::new(TrigKind::ReadWrite)
    }
    pub fn read_only() -> Self {
        Trigger::new(TrigKind::ReadOnly)
    }

    fn register(&self, shared: TrigShared) -> SimResult<()> {
        match self.kind {
            TrigKind::ReadWrite => register_phase(&READ_WRITE, shared, || {
                sim_if().register_callback_rw()
            }),
            TrigKind::ReadOnly => register_phase(&READ_ONLY, shared, || {
                sim_if().register_callback_ro()
            }),
            TrigKind::Timer(t) => {
                // the simulator reports absolute time, not the delta
                let abs_time = t + sim_if().get_sim_time_steps();
                register_keyed(&TIMER_MAP, abs_time, shared, || {
                    sim_if().register_callback_time(t)
                })
            }
            TrigKind::Edge(sig_hdl, edge_kind) => {
                let shared = TrigShared { edge_kind, ..shared };
                register_keyed(&EDGE_MAP, sig_hdl as u64, shared, || {
                    sim_if().register_callback_edge(sig_hdl)
                })
            }
        }
    }
}

type PhaseSlot = std::thread::LocalKey<RefCell<CallbackHandles>>;
type KeyedSlot = std::thread::LocalKey<RefCell<IntMap<CallbackHandles>>>;

fn register_phase(
    slot: &'static PhaseSlot,
    shared: TrigShared,
    register: impl FnOnce() -> SimResult<usize>,
) -> SimResult<()> {
    let needs_callback = slot.with(|s| s.borrow().handle.is_none());
    let handle = if needs_callback { Some(register()?) } else { None };
    slot.with(|s| {
        let mut s = s.borrow_mut();
        if handle.is_some() {
            s.handle = handle;
        }
        s.callbacks.push_back(shared);
    });
    Ok(())
}

fn register_keyed(
    map: &'static KeyedSlot,
    key: u64,
    shared: TrigShared,
    register: impl FnOnce() -> SimResult<usize>,
) -> SimResult<()> {
    let exists = map.with(|m| m.borrow().contains_key(key));
    if exists {
        map.with(|m| {
            if let Some(callbacks) = m.borrow_mut().get_mut(key) {
                callbacks.callbacks.push_back(shared);
            }
        });
    } else {
        let handle = register()?;
        let mut callbacks = VecDeque::new();
        callbacks.push_back(shared);
        map.with(|m| {
            m.borrow_mut().insert(
                key,
                CallbackHandles {
                    handle: Some(handle),
                    callbacks,
                },
            )
        });
    }
    Ok(())
}

impl Future for Trigger {
    type Output = SimResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(fired) = &self.fired {
            // polled again, either by the waker or by a combinator
            return match fired.load(Ordering::Acquire) {
                true => Poll::Ready(Ok(())),
                false => Poll::Pending,
            };
        }
        let fired = Arc::new(AtomicBool::new(false));
        let shared = TrigShared {
            waker: cx.waker().clone(),
            edge_kind: EdgeKind::Any,
            fired: fired.clone(),
        };
        match self.register(shared) {
            Ok(()) => {
                self.fired = Some(fired);
                Poll::Pending
            }
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

pub(crate) fn cancel_all_triggers() {
    let mut handles = Vec::new();
    for slot in [&READ_ONLY, &READ_WRITE] {
        slot.with(|s| {
            let s = std::mem::take(&mut *s.borrow_mut());
            handles.extend(s.handle);
        });
    }
    for map in [&TIMER_MAP, &EDGE_MAP] {
        map.with(|m| {
            // waiters are dropped together with their wakers
            for (_, cb) in m.borrow_mut().drain() {
                handles.extend(cb.handle);
            }
        });
    }
    for handle in handles {
        if let Err(e) = sim_if().cancel_callback(handle) {
            sim_if().log(&format!("Failed to cancel callback {}: {}", handle, e));
        }
    }
}

#[inline]
pub fn react_rw() {
    react_phase(&READ_WRITE, "ReadWrite");
}

#[inline]
pub fn react_ro() {
    react_phase(&READ_ONLY, "ReadOnly");
}

fn react_phase(slot: &'static PhaseSlot, name: &str) {
    let callbacks = slot.with(|s| {
        let mut s = s.borrow_mut();
        // callback is done, the next waiter registers a new one
        s.handle = None;
        std::mem::take(&mut s.callbacks)
    });
    if callbacks.is_empty() {
        sim_if().log(&format!("Did not expect {} callback", name));
    }
    wake(callbacks);
}

#[inline]
pub fn react_time(t: u64) {
    match TIMER_MAP.with(|m| m.borrow_mut().remove(t)) {
        Some(callbacks) => wake(callbacks.callbacks),
        None => sim_if().log(&format!("Did not expect Timer callback: t={}", t)),
    }
}

#[inline]
pub fn react_edge(sig_hdl: usize, edge: EdgeKind) {
    let Some(mut callbacks) = EDGE_MAP.with(|m| m.borrow_mut().remove(sig_hdl as u64)) else {
        sim_if().log(&format!("Did not expect Edge callback: sig_hdl={}", sig_hdl));
        return;
    };
    let (woken, kept): (VecDeque<_>, VecDeque<_>) =
        callbacks.callbacks.drain(..).partition(|t| t.matches(edge));
    if kept.is_empty() {
        if let Some(handle) = callbacks.handle {
            if let Err(e) = sim_if().cancel_callback(handle) {
                sim_if().log(&format!("Failed to cancel edge callback {}: {}", handle, e));
            }
        }
    } else {
        callbacks.callbacks = kept;
        EDGE_MAP.with(|m| m.borrow_mut().insert(sig_hdl as u64, callbacks));
    }
    wake(woken);
}

fn wake(callbacks: VecDeque<TrigShared>) {
    if callbacks.is_empty() {
        return;
    }
    for shared in callbacks {
        shared.fired.store(true, Ordering::Release);
        shared.waker.wake();
    }
    // execute woken tasks
    executor::run_once();
}
