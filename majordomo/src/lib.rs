//! # Majordomo
//!
//! A service-oriented request/reply broker implementing the ØMQ Majordomo
//! Protocol (MDP/0.1, RFC 7 at rfc.zeromq.org).
//!
//! ## Architecture
//!
//! The workspace is layered the same way as the rest of our messaging stack:
//!
//! - **`majordomo-core`**: the routing engine — a pure, channel-fed state
//!   machine (service queues, worker liveness, envelope handling)
//! - **`majordomo`**: this crate — the broker task, the in-process router
//!   transport, and client/worker implementations
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use majordomo::{Broker, Client, Worker};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! #[compio::main]
//! async fn main() -> majordomo::Result<()> {
//!     // One endpoint serves both clients and workers.
//!     let broker = Broker::bind("inproc://majordomo", None)?;
//!     compio::runtime::spawn(broker.run()).detach();
//!
//!     let mut worker = Worker::connect("inproc://majordomo", &b"echo"[..])?;
//!     compio::runtime::spawn(async move {
//!         while let Ok(request) = worker.recv().await {
//!             let body = request.body.clone();
//!             let _ = worker.reply(&request, body);
//!         }
//!     })
//!     .detach();
//!
//!     let mut client = Client::connect("inproc://majordomo", &b"echo"[..])?;
//!     let reply = client
//!         .request([Bytes::from_static(b"hello")], Some(Duration::from_secs(2)))
//!         .await?;
//!     println!("reply: {:?}", reply);
//!     Ok(())
//! }
//! ```
//!
//! ## Reliability model
//!
//! Workers advertise one service and take one request at a time. The broker
//! heartbeats every worker, evicts the silent ones, and parks requests for a
//! service until a worker frees up. Nothing is persisted: a request in
//! flight to a dying worker is lost and surfaces as a client timeout.

#![warn(missing_docs)]
#![warn(clippy::all)]
// Allow some pedantic patterns
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::future_not_send)] // Runtime-agnostic design
#![allow(clippy::missing_errors_doc)]

pub mod broker;
pub mod client;
/// Development helpers (tests)
pub mod dev_tracing;
pub mod inproc;
pub mod worker;

// Re-export core types
pub use bytes::Bytes;
pub use majordomo_core::config::BrokerConfig;
pub use majordomo_core::error::{MajordomoError, Result};
pub use majordomo_core::message::{Message, Multipart};

pub use broker::{Broker, BrokerCmd, BrokerHandle};
pub use client::Client;
pub use worker::{Request, Worker, WorkerConfig};
