// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

pub mod futures;

use crate::{
    fail::Fail,
    io::futures::{AcceptFuture, RecvFuture, SendFuture},
    runtime::Reactor,
};

use nix::{
    errno::Errno,
    sys::socket::{
        self, sockopt, AddressFamily, Backlog, SockFlag, SockProtocol, SockType, SockaddrIn,
    },
};

use std::{
    convert::TryFrom,
    net::{Ipv4Addr, SocketAddrV4},
    os::unix::io::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd},
    sync::Arc,
};

//==============================================================================
// Constants & Structures
//==============================================================================

/// A non-blocking listening TCP socket. Move-only; the descriptor is
/// released on drop.
pub struct Acceptor {
    fd: OwnedFd,
}

/// A non-blocking accepted TCP stream, registered with the reactor for read
/// and write interest. Move-only; dropping it unregisters the descriptor
/// from the reactor before the descriptor is closed, so no reactor entry
/// ever dangles.
pub struct Connection {
    fd: OwnedFd,
    reactor: Arc<Reactor>,
}

//==============================================================================
// Associate Functions
//==============================================================================

/// Associate functions for [Acceptor].
impl Acceptor {
    /// Creates a non-blocking listening socket bound to `address:port`. The
    /// error names the step that rejected the attempt and carries the OS
    /// message.
    pub fn bind(address: &str, port: u16, backlog: u32) -> Result<Self, Fail> {
        let address: Ipv4Addr = address.parse().map_err(|e| Fail::AddressParse {
            details: format!("{}: {}", address, e),
        })?;

        let fd = socket::socket(
            AddressFamily::Inet,
            SockType::Stream,
            SockFlag::SOCK_NONBLOCK,
            SockProtocol::Tcp,
        )
        .map_err(|errno| Fail::Bind { errno })?;
        let _ = socket::setsockopt(&fd, sockopt::ReuseAddr, &true);

        let sockaddr = SockaddrIn::from(SocketAddrV4::new(address, port));
        socket::bind(fd.as_raw_fd(), &sockaddr).map_err(|errno| Fail::Bind { errno })?;

        let backlog = i32::try_from(backlog)
            .ok()
            .and_then(|b| Backlog::new(b).ok())
            .ok_or(Fail::Listen {
                errno: Errno::EINVAL,
            })?;
        socket::listen(&fd, backlog).map_err(|errno| Fail::Listen { errno })?;

        Ok(Self { fd })
    }

    /// Accepts an incoming connection. Completes when the reactor signals
    /// readiness on the listening socket.
    pub fn accept<'a>(&'a self, reactor: &'a Arc<Reactor>) -> AcceptFuture<'a> {
        AcceptFuture::new(self, reactor)
    }
}

/// Associate functions for [Connection].
impl Connection {
    /// Wraps an accepted descriptor. The caller has already registered it
    /// with the reactor.
    pub(crate) fn new(fd: OwnedFd, reactor: Arc<Reactor>) -> Self {
        Self { fd, reactor }
    }

    /// Receives bytes into `buf`. Completes with the number of bytes read;
    /// zero means the peer closed. Would-block results resuspend.
    pub fn recv<'a>(&'a self, buf: &'a mut [u8]) -> RecvFuture<'a> {
        RecvFuture::new(self, buf)
    }

    /// Sends bytes from `data`. Completes with the number of bytes written,
    /// which may be short; see [send_all](Self::send_all).
    pub fn send<'a>(&'a self, data: &'a [u8]) -> SendFuture<'a> {
        SendFuture::new(self, data)
    }

    /// Sends the whole of `data`, looping on partial writes.
    pub async fn send_all(&self, data: &[u8]) -> Result<(), Errno> {
        let mut sent = 0;
        while sent < data.len() {
            sent += self.send(&data[sent..]).await?;
        }
        Ok(())
    }

    /// Returns the reactor this connection is registered with.
    pub(crate) fn reactor(&self) -> &Arc<Reactor> {
        &self.reactor
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

/// File-descriptor access for [Acceptor].
impl AsFd for Acceptor {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for Acceptor {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// File-descriptor access for [Connection].
impl AsFd for Connection {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for Connection {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// Drop trait implementation for [Connection]: the reactor entry goes away
/// first, then the owned descriptor closes.
impl Drop for Connection {
    fn drop(&mut self) {
        self.reactor.unregister(self.fd.as_fd());
    }
}
