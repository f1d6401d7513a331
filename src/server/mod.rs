// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! # Server
//!
//! The compose-time surface: route registration, binding, and the serving
//! loop. `serve` spawns one acceptor task; every accepted connection gets a
//! task of its own that reads one request, dispatches it through the router,
//! writes the response, and closes the connection.

mod codec;

use crate::{
    fail::Fail,
    http::{request::Request, response::Response, Method},
    io::{Acceptor, Connection},
    router::{PathParameters, RequestHandler, Router},
    runtime::{Reactor, Scheduler, SchedulerHandle},
};

use std::{cmp, sync::Arc, thread};

//==============================================================================
// Constants & Structures
//==============================================================================

/// Listen backlog used by [Server::bind].
const DEFAULT_BACKLOG: u32 = 100;

/// The server façade. Configure routes, bind, then serve.
pub struct Server {
    router: Router,
    acceptor: Option<Acceptor>,
}

/// Marker for handlers taking the request.
pub struct WithRequest;

/// Marker for handlers taking the path parameters.
pub struct WithParameters;

/// Marker for handlers taking both.
pub struct WithRequestAndParameters;

/// Conversion of the accepted handler shapes into the canonical
/// `(&Request, &PathParameters)` shape. Shorter shapes are adapted by
/// ignoring the missing arguments.
pub trait IntoRequestHandler<Args> {
    fn into_handler(self) -> RequestHandler;
}

//==============================================================================
// Associate Functions
//==============================================================================

/// Associate functions for [Server].
impl Server {
    /// Creates a server with no routes and the default `404 Not Found`
    /// fallback.
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            acceptor: None,
        }
    }

    /// Registers a handler for `(method, target)`. Fails on a malformed
    /// target or a duplicate registration.
    pub fn route<H, Args>(&mut self, method: Method, target: &str, handler: H) -> Result<(), Fail>
    where
        H: IntoRequestHandler<Args>,
    {
        self.router.add_route(method, target, handler.into_handler())
    }

    /// Replaces the fallback handler invoked when no route matches.
    pub fn set_not_found_handler<H, Args>(&mut self, handler: H)
    where
        H: IntoRequestHandler<Args>,
    {
        self.router.set_not_found_handler(handler.into_handler());
    }

    /// Binds the listening endpoint with the default backlog.
    pub fn bind(&mut self, address: &str, port: u16) -> Result<(), Fail> {
        self.bind_with_backlog(address, port, DEFAULT_BACKLOG)
    }

    /// Binds the listening endpoint with an explicit backlog.
    pub fn bind_with_backlog(
        &mut self,
        address: &str,
        port: u16,
        backlog: u32,
    ) -> Result<(), Fail> {
        self.acceptor = Some(Acceptor::bind(address, port, backlog)?);
        Ok(())
    }

    /// Logs the route tree.
    pub fn print_route_tree(&self) {
        info!("route tree:\n{}", self.router.tree());
    }

    /// Serves forever: spawns the acceptor loop on a scheduler with
    /// `max(1, cores - 1)` workers and drives the reactor on the calling
    /// thread. Only a fatal reactor failure returns.
    pub fn serve(self) -> Result<(), Fail> {
        let acceptor = self.acceptor.ok_or(Fail::NotBound {})?;

        let cores = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let scheduler = Scheduler::new(cmp::max(1, cores - 1));
        let reactor = Arc::new(Reactor::new()?);
        let router = Arc::new(self.router);

        scheduler.spawn(accept_loop(
            acceptor,
            reactor.clone(),
            router,
            scheduler.handle(),
        ));

        reactor.run()
    }
}

/// Accepts connections forever, spawning one handler task per connection.
/// Accept failures are logged and do not stop the loop.
async fn accept_loop(
    acceptor: Acceptor,
    reactor: Arc<Reactor>,
    router: Arc<Router>,
    scheduler: SchedulerHandle,
) {
    loop {
        match acceptor.accept(&reactor).await {
            Ok(connection) => {
                scheduler.spawn(handle_connection(router.clone(), connection));
            }
            Err(errno) => warn!("failed to accept connection ({})", errno),
        }
    }
}

/// Serves one connection: read, route, run the handler, write, close. Any
/// parse or I/O failure is logged and the connection closes with no
/// response. The connection is closed exactly once, when this task ends.
async fn handle_connection(router: Arc<Router>, connection: Connection) {
    let request = match codec::read_request(&connection).await {
        Ok(request) => request,
        Err(e) => {
            error!("failed to read request: {}", e);
            return;
        }
    };

    let (handler, captures) = router.route(request.method(), request.target());
    let parameters = PathParameters::new(captures);
    let response = handler(&request, &parameters);
    info!(
        "{} {} -> {}",
        request.method(),
        request.target(),
        response.status()
    );

    if let Err(e) = codec::write_response(&connection, response).await {
        error!("failed to write response: {}", e);
    }
}

/// Erases a canonical-shape closure into a [RequestHandler].
fn erase<F>(f: F) -> RequestHandler
where
    F: for<'r, 't> Fn(&'r Request, &'r PathParameters<'t>) -> Response + Send + Sync + 'static,
{
    Arc::new(f)
}

//==============================================================================
// Trait Implementations
//==============================================================================

/// Default trait implementation for [Server].
impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler shape `Fn() -> Response`.
impl<F> IntoRequestHandler<()> for F
where
    F: Fn() -> Response + Send + Sync + 'static,
{
    fn into_handler(self) -> RequestHandler {
        erase(move |_request, _parameters| self())
    }
}

/// Handler shape `Fn(&Request) -> Response`.
impl<F> IntoRequestHandler<WithRequest> for F
where
    F: Fn(&Request) -> Response + Send + Sync + 'static,
{
    fn into_handler(self) -> RequestHandler {
        erase(move |request, _parameters| self(request))
    }
}

/// Handler shape `Fn(&PathParameters) -> Response`.
impl<F> IntoRequestHandler<WithParameters> for F
where
    F: for<'t> Fn(&PathParameters<'t>) -> Response + Send + Sync + 'static,
{
    fn into_handler(self) -> RequestHandler {
        erase(move |_request, parameters| self(parameters))
    }
}

/// Handler shape `Fn(&Request, &PathParameters) -> Response`.
impl<F> IntoRequestHandler<WithRequestAndParameters> for F
where
    F: for<'t> Fn(&Request, &PathParameters<'t>) -> Response + Send + Sync + 'static,
{
    fn into_handler(self) -> RequestHandler {
        erase(move |request, parameters| self(request, parameters))
    }
}
