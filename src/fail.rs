// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use crate::http::Method;

use custom_error::custom_error;

use nix::errno::Errno;

//==============================================================================
// Structures
//==============================================================================

custom_error! {
    /// Failures surfaced by the library. Per-connection failures never
    /// propagate past the connection's serving task; configuration failures
    /// are returned to the caller at registration or bind time.
    #[derive(Clone, PartialEq)]
    pub Fail
    AddressParse{ details: String }                  = "failed to parse listening address: {details}",
    Bind{ errno: Errno }                             = "failed to bind socket: {errno}",
    Listen{ errno: Errno }                           = "failed to listen on socket: {errno}",
    InvalidRoute{ target: String }                   = "malformed route target: {target}",
    DuplicateRoute{ method: Method, target: String } = "duplicate handler for {method} {target}",
    BadRequestLine{}                                 = "malformed request line",
    BadContentLength{}                               = "malformed content-length header",
    Io{ errno: Errno }                               = "i/o operation failed: {errno}",
    NotBound{}                                       = "server is not bound to an endpoint",
}
