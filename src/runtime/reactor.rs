// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! # Readiness Reactor
//!
//! One epoll handle plus a map from file descriptor to the wakers of the
//! tasks suspended on it. I/O futures try their syscall first and subscribe
//! their waker only when it would block; when the kernel reports readiness
//! the reactor swaps the fd's waker list with an empty one and wakes each
//! entry, which pushes the owning task back onto the scheduler. The reactor
//! never polls a task inline.
//!
//! Registrations are edge-triggered. A level-triggered registration would
//! keep waking the wait loop for every fd whose waker list has already been
//! drained; an edge-triggered one fires only on transitions. Because wakers
//! are installed only after a would-block syscall result, the first
//! subscription after a drain re-arms the registration: the kernel reports
//! the fd again if it became ready in the meantime, so the wakeup cannot be
//! lost between the syscall and the subscription.

use crate::fail::Fail;

use nix::{
    errno::Errno,
    sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout},
};

use std::{
    collections::HashMap,
    os::unix::io::{AsRawFd, BorrowedFd, RawFd},
    sync::Mutex,
    task::Waker,
};

//==============================================================================
// Constants & Structures
//==============================================================================

/// Maximum number of kernel events drained per wait.
const MAX_EVENTS: usize = 100;

/// Readiness multiplexer waking suspended tasks when their fds become ready.
pub struct Reactor {
    epoll: Epoll,
    subscribers: Mutex<HashMap<RawFd, Vec<Waker>>>,
}

//==============================================================================
// Associate Functions
//==============================================================================

/// Associate functions for [Reactor].
impl Reactor {
    /// Creates a reactor.
    pub fn new() -> Result<Self, Fail> {
        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC)
            .map_err(|errno| Fail::Io { errno })?;
        Ok(Self {
            epoll,
            subscribers: Mutex::new(HashMap::new()),
        })
    }

    /// Installs an fd with the given interest and an empty waker list. Used
    /// for accepted connections, which are registered for read and write
    /// interest before any operation suspends on them.
    pub(crate) fn register(&self, fd: BorrowedFd, interest: EpollFlags) -> Result<(), Errno> {
        let raw = fd.as_raw_fd();
        let mut subscribers = self.subscribers.lock().unwrap();
        if subscribers.contains_key(&raw) {
            return Ok(());
        }
        self.epoll.add(
            fd,
            EpollEvent::new(interest | EpollFlags::EPOLLET, raw as u64),
        )?;
        debug!("registered fd {}", raw);
        subscribers.insert(raw, Vec::new());
        Ok(())
    }

    /// Subscribes a waker to an fd ahead of a suspension. The first call for
    /// an fd installs it with the requested interest. A call that finds the
    /// previous batch of wakers drained re-arms the kernel registration, so
    /// readiness that arrived while nothing was parked is redelivered. Any
    /// other call appends without touching the kernel; a waker already in
    /// the list is not added again, so a continuation appears at most once
    /// per fd. Wakers for one fd are woken in subscription order.
    pub(crate) fn subscribe(
        &self,
        fd: BorrowedFd,
        waker: Waker,
        interest: EpollFlags,
    ) -> Result<(), Errno> {
        let raw = fd.as_raw_fd();
        let mut subscribers = self.subscribers.lock().unwrap();
        match subscribers.get_mut(&raw) {
            Some(wakers) if wakers.is_empty() => {
                let mut event = EpollEvent::new(interest | EpollFlags::EPOLLET, raw as u64);
                self.epoll.modify(fd, &mut event)?;
                wakers.push(waker);
            }
            Some(wakers) => {
                if !wakers.iter().any(|w| w.will_wake(&waker)) {
                    wakers.push(waker);
                }
            }
            None => {
                self.epoll.add(
                    fd,
                    EpollEvent::new(interest | EpollFlags::EPOLLET, raw as u64),
                )?;
                debug!("registered fd {}", raw);
                subscribers.insert(raw, vec![waker]);
            }
        }
        Ok(())
    }

    /// Removes an fd's kernel registration and waker list. Callers tear an fd
    /// down only once every operation on it has resumed.
    pub(crate) fn unregister(&self, fd: BorrowedFd) {
        let raw = fd.as_raw_fd();
        let mut subscribers = self.subscribers.lock().unwrap();
        if subscribers.remove(&raw).is_some() {
            debug!("unregistered fd {}", raw);
            let _ = self.epoll.delete(fd);
        }
    }

    /// Blocks in the kernel wait loop, waking subscribers as their fds become
    /// ready. Only a wait failure other than `EINTR` returns, and it is fatal
    /// to serving.
    pub fn run(&self) -> Result<(), Fail> {
        let mut events = vec![EpollEvent::empty(); MAX_EVENTS];
        loop {
            self.turn(&mut events, EpollTimeout::NONE)?;
        }
    }

    /// Waits for one batch of events and wakes the affected subscribers.
    /// Each ready fd's waker list is swapped out under the lock and woken
    /// after the lock is released. Returns the number of wakers woken.
    fn turn(&self, events: &mut [EpollEvent], timeout: EpollTimeout) -> Result<usize, Fail> {
        let nfds = match self.epoll.wait(events, timeout) {
            Ok(nfds) => nfds,
            Err(Errno::EINTR) => return Ok(0),
            Err(errno) => return Err(Fail::Io { errno }),
        };

        let mut ready: Vec<Waker> = Vec::new();
        {
            let mut subscribers = self.subscribers.lock().unwrap();
            for event in &events[..nfds] {
                let fd = event.data() as RawFd;
                if let Some(wakers) = subscribers.get_mut(&fd) {
                    ready.append(wakers);
                }
            }
        }

        let num_woken = ready.len();
        for waker in ready {
            waker.wake();
        }
        Ok(num_woken)
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
