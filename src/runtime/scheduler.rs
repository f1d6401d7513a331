// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! # Task Scheduler
//!
//! A multi-queue work-stealing executor of cooperative tasks. Each worker
//! thread owns one FIFO queue. Submissions round-robin a starting queue and
//! try siblings under `try_lock` before blocking; workers pop their own
//! queue, steal from siblings when it is empty, and block only when every
//! queue turned them away. A task is a boxed future whose waker resubmits
//! it, so a task suspended on the reactor costs nothing until its fd wakes.

use futures::{
    future::BoxFuture,
    task::{waker_ref, ArcWake},
};

use pin_project::pin_project;

use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Condvar, Mutex,
    },
    task::{Context, Poll, Waker},
    thread,
};

//==============================================================================
// Constants & Structures
//==============================================================================

/// Queue contents and shutdown flag, guarded by [TaskQueue]'s mutex.
struct QueueState {
    repr: VecDeque<Arc<Task>>,
    done: bool,
}

/// A FIFO of runnable tasks. After `done()` is signaled, pending tasks keep
/// draining; `pop` reports emptiness only once the queue is both done and
/// empty.
struct TaskQueue {
    state: Mutex<QueueState>,
    cond: Condvar,
}

/// State shared between workers and submitters.
struct Shared {
    queues: Box<[TaskQueue]>,
    next_queue: AtomicUsize,
}

/// A schedulable unit: the frame of a suspended computation. The frame is
/// taken out for polling and put back only while the task is pending, so a
/// stale wake of a completed task is a no-op.
struct Task {
    frame: Mutex<Option<BoxFuture<'static, ()>>>,
    shared: Arc<Shared>,
}

/// The executor. Dropping it signals shutdown, drains every queue, and joins
/// the workers; every task submitted beforehand runs to its next suspension
/// point or completion.
pub struct Scheduler {
    shared: Arc<Shared>,
    workers: Vec<thread::JoinHandle<()>>,
}

/// A cloneable submission handle, usable from inside tasks.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

/// Completion cell linking an awaitee to its awaiter: the awaitee stores its
/// output here and wakes the waker parked by the awaiter, if any.
struct JoinState<T> {
    result: Option<T>,
    waker: Option<Waker>,
}

/// Future resolving to a spawned task's output.
pub struct JoinHandle<T> {
    state: Arc<Mutex<JoinState<T>>>,
}

/// Wrapper future running a spawned task; it signals the [JoinState] at
/// completion.
#[pin_project]
struct JoinFuture<F: Future> {
    #[pin]
    inner: F,
    state: Arc<Mutex<JoinState<F::Output>>>,
}

//==============================================================================
// Associate Functions
//==============================================================================

/// Associate functions for [TaskQueue].
impl TaskQueue {
    /// Creates an empty task queue.
    fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                repr: VecDeque::new(),
                done: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Pushes a task if the queue lock is uncontended; hands the task back
    /// otherwise.
    fn try_push(&self, task: Arc<Task>) -> Result<(), Arc<Task>> {
        match self.state.try_lock() {
            Ok(mut state) => {
                state.repr.push_back(task);
                drop(state);
                self.cond.notify_one();
                Ok(())
            }
            Err(_) => Err(task),
        }
    }

    /// Pushes a task, waiting for the queue lock.
    fn push(&self, task: Arc<Task>) {
        let mut state = self.state.lock().unwrap();
        state.repr.push_back(task);
        drop(state);
        self.cond.notify_one();
    }

    /// Pops a task if the queue lock is uncontended and a task is available.
    fn try_pop(&self) -> Option<Arc<Task>> {
        match self.state.try_lock() {
            Ok(mut state) => state.repr.pop_front(),
            Err(_) => None,
        }
    }

    /// Pops a task, blocking while the queue is empty and not yet done.
    /// Returns `None` only when the queue is done and fully drained.
    fn pop(&self) -> Option<Arc<Task>> {
        let mut state = self.state.lock().unwrap();
        while state.repr.is_empty() && !state.done {
            state = self.cond.wait(state).unwrap();
        }
        state.repr.pop_front()
    }

    /// Signals shutdown and releases all waiters.
    fn done(&self) {
        let mut state = self.state.lock().unwrap();
        state.done = true;
        drop(state);
        self.cond.notify_all();
    }
}

/// Associate functions for [Shared].
impl Shared {
    /// Submits a task: round-robins a starting queue, tries every sibling
    /// without blocking, then falls back to a blocking push.
    fn submit(&self, task: Arc<Task>) {
        let num_queues = self.queues.len();
        let start = self.next_queue.fetch_add(1, Ordering::Relaxed);

        let mut task = task;
        for i in 0..num_queues {
            match self.queues[(start + i) % num_queues].try_push(task) {
                Ok(()) => return,
                Err(t) => task = t,
            }
        }

        self.queues[start % num_queues].push(task);
    }

    /// Spawns a future as a new task and returns a handle to its output.
    fn spawn<F>(shared: &Arc<Shared>, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let state = Arc::new(Mutex::new(JoinState {
            result: None,
            waker: None,
        }));
        let frame: BoxFuture<'static, ()> = Box::pin(JoinFuture {
            inner: future,
            state: state.clone(),
        });
        let task = Arc::new(Task {
            frame: Mutex::new(Some(frame)),
            shared: shared.clone(),
        });
        shared.submit(task);
        JoinHandle { state }
    }
}

/// Associate functions for [Task].
impl Task {
    /// Polls a task's frame once. The frame is put back only when the poll
    /// suspended; a completed or already-running frame leaves nothing to do.
    fn run(task: &Arc<Task>) {
        let mut slot = task.frame.lock().unwrap();
        let mut frame = match slot.take() {
            Some(frame) => frame,
            None => return,
        };

        let waker = waker_ref(task);
        let mut ctx = Context::from_waker(&waker);
        if frame.as_mut().poll(&mut ctx).is_pending() {
            *slot = Some(frame);
        }
    }
}

/// Associate functions for [Scheduler].
impl Scheduler {
    /// Creates a scheduler running tasks on `num_workers` threads (at least
    /// one).
    pub fn new(num_workers: usize) -> Self {
        let num_workers = num_workers.max(1);
        let queues: Vec<TaskQueue> = (0..num_workers).map(|_| TaskQueue::new()).collect();
        let shared = Arc::new(Shared {
            queues: queues.into_boxed_slice(),
            next_queue: AtomicUsize::new(0),
        });

        let mut workers = Vec::with_capacity(num_workers);
        for assigned in 0..num_workers {
            let shared = shared.clone();
            let worker = thread::Builder::new()
                .name(format!("worker-{}", assigned))
                .spawn(move || worker_loop(&shared, assigned))
                .expect("failed to spawn worker thread");
            workers.push(worker);
        }

        Self { shared, workers }
    }

    /// Spawns a future onto the scheduler.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        Shared::spawn(&self.shared, future)
    }

    /// Returns a cloneable submission handle.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: self.shared.clone(),
        }
    }
}

/// Associate functions for [SchedulerHandle].
impl SchedulerHandle {
    /// Spawns a future onto the scheduler.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        Shared::spawn(&self.shared, future)
    }
}

/// Main loop of a worker thread: steal a ready task from any queue without
/// blocking, fall back to a blocking pop on the assigned queue, and exit once
/// that reports done-and-drained.
fn worker_loop(shared: &Shared, assigned: usize) {
    let num_queues = shared.queues.len();
    loop {
        let mut task = None;
        for i in 0..num_queues {
            if let Some(t) = shared.queues[(assigned + i) % num_queues].try_pop() {
                task = Some(t);
                break;
            }
        }

        let task = match task.or_else(|| shared.queues[assigned].pop()) {
            Some(task) => task,
            None => break,
        };

        trace!("worker-{}: executing task", assigned);
        Task::run(&task);
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

/// Waker trait implementation for [Task]: waking resubmits the task, so all
/// resumption goes through the queues and never runs inline in the waker's
/// caller.
impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.shared.submit(arc_self.clone());
    }
}

/// Drop trait implementation for [Scheduler].
impl Drop for Scheduler {
    fn drop(&mut self) {
        for queue in self.shared.queues.iter() {
            queue.done();
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Future trait implementation for [JoinFuture].
impl<F: Future> Future for JoinFuture<F> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, ctx: &mut Context) -> Poll<()> {
        let this = self.project();
        match this.inner.poll(ctx) {
            Poll::Ready(value) => {
                let mut state = this.state.lock().unwrap();
                state.result = Some(value);
                if let Some(waker) = state.waker.take() {
                    waker.wake();
                }
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Future trait implementation for [JoinHandle].
impl<T> Future for JoinHandle<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, ctx: &mut Context) -> Poll<T> {
        let mut state = self.state.lock().unwrap();
        match state.result.take() {
            Some(value) => Poll::Ready(value),
            None => {
                state.waker = Some(ctx.waker().clone());
                Poll::Pending
            }
        }
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
