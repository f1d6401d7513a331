// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

pub mod reactor;
pub mod scheduler;

pub use reactor::Reactor;
pub use scheduler::{JoinHandle, Scheduler, SchedulerHandle};
