use futures::{
    future::{BoxFuture, FutureExt},
    task::{waker_ref, ArcWake, Context, Poll},
};
use futures_channel::oneshot;
use queues::{IsQueue, Queue};
use std::{
    cell::RefCell,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, PoisonError},
};

use crate::value::Val;
use crate::RstbResult;

thread_local! {
    static READY_QUEUE: RefCell<Queue<Arc<Task>>> = RefCell::new(Queue::new());
}

pub(crate) fn schedule_task(task: Arc<Task>) {
    READY_QUEUE.with(|q| {
        // Queue::add only fails for bounded queues
        let _ = q.borrow_mut().add(task);
    });
}

fn next_task() -> Option<Arc<Task>> {
    READY_QUEUE.with(|q| q.borrow_mut().remove().ok())
}

pub(crate) fn clear_ready_queue() {
    READY_QUEUE.with(|q| *q.borrow_mut() = Queue::new());
}

/// Polls ready tasks until none is left.
#[inline]
pub fn run_once() {
    while let Some(task) = next_task() {
        process_task(task);
    }
}

#[inline]
fn process_task(task: Arc<Task>) {
    if task.state() == TaskState::Cancelled {
        // dropped once the last waker goes away
        return;
    }

    let mut fut_slot = task.future.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(mut fut) = fut_slot.take() else {
        // woken again after completion, nothing left to poll
        return;
    };
    let waker = waker_ref(&task);
    let context = &mut Context::from_waker(&waker);
    match fut.as_mut().poll(context) {
        Poll::Pending => {
            *fut_slot = Some(fut);
        }
        Poll::Ready(result) => {
            drop(fut_slot);
            task.set_state(TaskState::Done);
            let tx = task.join_tx.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(tx) = tx {
                // nobody may be listening any more
                let _ = tx.send(result);
            }
        }
    }
}

#[derive(PartialEq, Clone, Copy, Debug)]
enum TaskState {
    Pending,
    Done,
    Cancelled,
}

pub struct Task {
    future: Mutex<Option<BoxFuture<'static, RstbResult>>>,
    state: Mutex<TaskState>,
    name: String,
    join_tx: Mutex<Option<oneshot::Sender<RstbResult>>>,
}

impl Task {
    /// Runs `future` concurrently with the calling task.
    pub fn fork(future: impl Future<Output = RstbResult> + Send + 'static) -> JoinHandle {
        Task::spawn_from_future(future, "forked")
    }
    pub fn spawn_from_future(
        future: impl Future<Output = RstbResult> + Send + 'static,
        name: &str,
    ) -> JoinHandle {
        let (task, join_handle) = Task::new(future.boxed(), name);
        schedule_task(task);
        join_handle
    }
    fn new(fut: BoxFuture<'static, RstbResult>, name: &str) -> (Arc<Self>, JoinHandle) {
        let (tx, rx) = oneshot::channel::<RstbResult>();
        let task = Arc::new(Self {
            future: Mutex::new(Some(fut)),
            state: Mutex::new(TaskState::Pending),
            name: name.to_string(),
            join_tx: Mutex::new(Some(tx)),
        });
        let join_handle = JoinHandle {
            join_rx: rx,
            awaited_task: Some(task.clone()),
        };
        (task, join_handle)
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn cancel(&self) {
        // the executor drops a cancelled task instead of polling it
        self.set_state(TaskState::Cancelled);
        // a task cancelling itself still holds its own future slot
        if let Ok(mut slot) = self.future.try_lock() {
            slot.take();
        }
        self.join_tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
    pub fn is_done(&self) -> bool {
        self.state() == TaskState::Done
    }
    fn state(&self) -> TaskState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
    fn set_state(&self, state: TaskState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        schedule_task(arc_self.clone());
    }
}

pub struct JoinHandle {
    awaited_task: Option<Arc<Task>>,
    join_rx: oneshot::Receiver<RstbResult>,
}

impl JoinHandle {
    pub fn task(&self) -> Option<&Arc<Task>> {
        self.awaited_task.as_ref()
    }
    pub fn cancel(mut self) {
        if let Some(task) = self.awaited_task.take() {
            task.cancel();
        }
    }
}

impl Future for JoinHandle {
    type Output = RstbResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.join_rx.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Val::from("task was cancelled"))),
            Poll::Pending => Poll::Pending,
        }
    }
}
