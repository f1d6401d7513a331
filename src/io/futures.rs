// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! # I/O Futures
//!
//! For each asynchronous socket operation there is a corresponding future.
//! Each poll issues the syscall first and registers the task's waker with
//! the reactor only on a would-block result, so a waker is parked exactly
//! when the task is about to suspend and an operation that completes
//! immediately leaves nothing behind. The reactor re-arms the registration
//! on the first subscription after a drain, so readiness arriving between
//! the would-block result and the subscription is redelivered.

use crate::{
    io::{Acceptor, Connection},
    runtime::Reactor,
};

use nix::{
    errno::Errno,
    sys::{
        epoll::EpollFlags,
        socket::{self, MsgFlags, SockFlag},
    },
};

use std::{
    fmt,
    future::Future,
    os::unix::io::{AsFd, AsRawFd, FromRawFd, OwnedFd},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

//==============================================================================
// Constants & Structures
//==============================================================================

/// Future for `accept()`.
pub struct AcceptFuture<'a> {
    acceptor: &'a Acceptor,
    reactor: &'a Arc<Reactor>,
}

/// Future for `recv()`.
pub struct RecvFuture<'a> {
    conn: &'a Connection,
    buf: &'a mut [u8],
}

/// Future for `send()`.
pub struct SendFuture<'a> {
    conn: &'a Connection,
    data: &'a [u8],
}

//==============================================================================
// Associate Functions
//==============================================================================

/// Associate functions for [AcceptFuture].
impl<'a> AcceptFuture<'a> {
    /// Creates an [AcceptFuture].
    pub(crate) fn new(acceptor: &'a Acceptor, reactor: &'a Arc<Reactor>) -> Self {
        Self { acceptor, reactor }
    }
}

/// Associate functions for [RecvFuture].
impl<'a> RecvFuture<'a> {
    /// Creates a [RecvFuture].
    pub(crate) fn new(conn: &'a Connection, buf: &'a mut [u8]) -> Self {
        Self { conn, buf }
    }
}

/// Associate functions for [SendFuture].
impl<'a> SendFuture<'a> {
    /// Creates a [SendFuture].
    pub(crate) fn new(conn: &'a Connection, data: &'a [u8]) -> Self {
        Self { conn, data }
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

/// Future trait implementation for [AcceptFuture].
impl Future for AcceptFuture<'_> {
    type Output = Result<Connection, Errno>;

    /// Polls an accept operation. On success the new descriptor is made
    /// non-blocking and registered with the reactor for read and write
    /// interest before the connection is handed out.
    fn poll(self: Pin<&mut Self>, ctx: &mut Context) -> Poll<Self::Output> {
        let self_ = self.get_mut();

        match socket::accept4(self_.acceptor.as_raw_fd(), SockFlag::SOCK_NONBLOCK) {
            Ok(raw) => {
                let fd = unsafe { OwnedFd::from_raw_fd(raw) };
                if let Err(errno) = self_
                    .reactor
                    .register(fd.as_fd(), EpollFlags::EPOLLIN | EpollFlags::EPOLLOUT)
                {
                    return Poll::Ready(Err(errno));
                }
                debug!("accepted connection on fd {}", raw);
                Poll::Ready(Ok(Connection::new(fd, self_.reactor.clone())))
            }
            Err(errno) if errno == Errno::EAGAIN || errno == Errno::EWOULDBLOCK => {
                if let Err(errno) = self_.reactor.subscribe(
                    self_.acceptor.as_fd(),
                    ctx.waker().clone(),
                    EpollFlags::EPOLLIN,
                ) {
                    return Poll::Ready(Err(errno));
                }
                Poll::Pending
            }
            Err(errno) => Poll::Ready(Err(errno)),
        }
    }
}

/// Future trait implementation for [RecvFuture].
impl Future for RecvFuture<'_> {
    type Output = Result<usize, Errno>;

    /// Polls a receive operation. Zero bytes means the peer closed.
    fn poll(self: Pin<&mut Self>, ctx: &mut Context) -> Poll<Self::Output> {
        let self_ = self.get_mut();

        match socket::recv(self_.conn.as_raw_fd(), self_.buf, MsgFlags::empty()) {
            Ok(nbytes) => Poll::Ready(Ok(nbytes)),
            Err(errno) if errno == Errno::EAGAIN || errno == Errno::EWOULDBLOCK => {
                if let Err(errno) = self_.conn.reactor().subscribe(
                    self_.conn.as_fd(),
                    ctx.waker().clone(),
                    EpollFlags::EPOLLIN | EpollFlags::EPOLLOUT,
                ) {
                    return Poll::Ready(Err(errno));
                }
                Poll::Pending
            }
            Err(errno) => Poll::Ready(Err(errno)),
        }
    }
}

/// Future trait implementation for [SendFuture].
impl Future for SendFuture<'_> {
    type Output = Result<usize, Errno>;

    /// Polls a send operation. The result may be a short write; callers loop
    /// until their buffer is drained.
    fn poll(self: Pin<&mut Self>, ctx: &mut Context) -> Poll<Self::Output> {
        let self_ = self.get_mut();

        match socket::send(self_.conn.as_raw_fd(), self_.data, MsgFlags::MSG_NOSIGNAL) {
            Ok(nbytes) => Poll::Ready(Ok(nbytes)),
            Err(errno) if errno == Errno::EAGAIN || errno == Errno::EWOULDBLOCK => {
                if let Err(errno) = self_.conn.reactor().subscribe(
                    self_.conn.as_fd(),
                    ctx.waker().clone(),
                    EpollFlags::EPOLLIN | EpollFlags::EPOLLOUT,
                ) {
                    return Poll::Ready(Err(errno));
                }
                Poll::Pending
            }
            Err(errno) => Poll::Ready(Err(errno)),
        }
    }
}

/// Debug trait implementation for [AcceptFuture].
impl fmt::Debug for AcceptFuture<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AcceptFuture({})", self.acceptor.as_raw_fd())
    }
}

/// Debug trait implementation for [RecvFuture].
impl fmt::Debug for RecvFuture<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RecvFuture({})", self.conn.as_raw_fd())
    }
}

/// Debug trait implementation for [SendFuture].
impl fmt::Debug for SendFuture<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SendFuture({})", self.conn.as_raw_fd())
    }
}
