//! Container runtime gateway.
//!
//! This crate wraps the container engine's control API behind the
//! [`ContainerRuntime`] trait so the orchestration crates never talk to the
//! engine client directly. The production implementation is
//! [`DockerRuntime`] (bollard); tests substitute [`fake::FakeRuntime`].
//!
//! It also hosts the two leaf utilities the gateway's callers need:
//! host-port resolution ([`ports`]) and bind-mount path normalization
//! ([`paths`]).

pub mod docker;
pub mod error;
pub mod fake;
pub mod gateway;
pub mod paths;
pub mod ports;

pub use docker::DockerRuntime;
pub use error::{Result, RuntimeError};
pub use gateway::{
    ContainerRuntime, ContainerSpec, ContainerSpecBuilder, ContainerStatus, ExecOutput, LogStream,
    PullProgress, RestartPolicyKind,
};
pub use ports::PortResolver;
