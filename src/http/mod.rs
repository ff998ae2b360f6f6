//! HTTP protocol implementation.
//!
//! Just enough HTTP/1.1 to serve files: one request per connection, the
//! response announces its length and closes.
//!
//! # Architecture
//!
//! - **`connection`**: per-connection record and the request-response state machine
//! - **`parser`**: extracts the decoded request path from the buffered request head
//! - **`response`**: status codes and response header serialization
//! - **`writer`**: flushing headers and zero-copy file bodies to a non-blocking socket
//!
//! # Connection State Machine
//!
//! Input readiness drives the first two states, output readiness all others.
//!
//! ```text
//!        ┌─────────────┐
//!        │   Initial   │
//!        └──────┬──────┘
//!               │ first readable event
//!               ▼
//!        ┌─────────────┐  peer closes
//!        │  Receiving  │ ───────────────► torn down, nothing written
//!        └──────┬──────┘
//!               │ "\r\n\r\n" seen
//!               ▼
//!        ┌─────────────────┐  bad request, unknown folder, open fails
//!        │ RequestReceived │ ─────────────────────┐
//!        └──────┬──────────┘                      ▼
//!               ▼                       ┌─────────────────┐
//!        ┌───────────────┐              │ SendingNotFound │
//!        │ SendingHeader │              └────────┬────────┘
//!        └──────┬────────┘                       │
//!               ▼                                ▼
//!        ┌──────────────────────────────────────────┐
//!        │               SendingData                │ header, then sendfile body
//!        └──────┬───────────────────────────┬───────┘
//!               │ dynamic                   │ static / 404 page / empty
//!               ▼                           ▼
//!        ┌──────────────┐        DataSent | HeaderSent | NotFoundSent
//!        │ AsyncOngoing │ ─────► DataSent
//!        └──────────────┘
//!                                 next dispatch ──► Closed
//! ```

pub mod connection;
pub mod parser;
pub mod response;
pub mod writer;
