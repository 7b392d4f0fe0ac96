//! Bridge Runtime - debuggee launch, backend transport, and session relay
//!
//! This crate holds everything about a debugger session that does not depend
//! on the hosting HTTP server:
//!
//! - **Launch**: spawning a debuggee suspended at startup and scanning its
//!   output for the announced backend address under a deadline
//! - **Backend**: opening the outbound WebSocket to the debuggee
//! - **Relay**: pumping framed messages between two channels with boundary
//!   and close-propagation guarantees
//! - **Session**: owning both channels (and the launched process) for the
//!   lifetime of one bridge
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐        ┌───────────────────────────┐        ┌──────────────┐
//! │  front-end   │        │          Session          │        │   debuggee   │
//! │   client     │◄──────►│ client ─► pump ─► backend │◄──────►│   backend    │
//! │  (Channel)   │        │ client ◄─ pump ◄─ backend │        │  (Channel)   │
//! └──────────────┘        └───────────────────────────┘        └──────────────┘
//!                                       ▲
//!                                       │ owns
//!                               ┌───────┴────────┐
//!                               │ LaunchedProcess│  (launch path only)
//!                               └────────────────┘
//! ```
//!
//! # Channels
//!
//! Both sides of a session are a [`Channel`]: a boxed sink of [`Outbound`]
//! frames and a stream of [`Inbound`] frames. The hosting server adapts its own
//! WebSocket type into a channel; [`backend::connect`] does the same for the
//! outbound tungstenite connection. Keeping the relay transport-agnostic lets
//! the tests drive it with in-memory channels.

pub mod assembler;
pub mod backend;
pub mod channel;
pub mod error;
pub mod frame;
pub mod launch;
pub mod relay;
pub mod session;
pub mod shutdown;

pub use assembler::MessageAssembler;
pub use channel::{Channel, FrameSink, FrameStream};
pub use error::{Error, Result};
pub use frame::{Chunk, Inbound, Message, MessageKind, Outbound};
pub use launch::{LaunchSpec, LaunchedProcess, PendingLaunch, extract_address, launch};
pub use relay::{Direction, RelayConfig};
pub use session::{Session, SessionEnd, SessionId, SessionState, Side};
pub use shutdown::{ShutdownSignal, ShutdownTrigger, shutdown_channel};

pub use bridge_protocol::CloseReason;
