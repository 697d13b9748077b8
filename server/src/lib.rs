//! # Card Game Server Library
//!
//! This library provides the authoritative server for a two-player rummy-style
//! card game played over TCP. It owns every deck, hand and table, validates
//! each move against the rules, and pushes the resulting state to both
//! players so that clients only ever render what the server decided.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Rules
//! Dealing, drawing, laying down sets and runs, attaching to the table,
//! discarding and closing are all resolved here. A refused move leaves the
//! game untouched and is answered with a human-readable `ERRR`.
//!
//! ### Session Management
//! Handles the complete lifecycle of a player:
//! - Connection admission against a fixed slot table
//! - Login with a unique nickname and a reconnect token
//! - Heartbeat supervision and forced disconnects
//! - A grace window in which a dropped player can reclaim its seat
//!
//! ### Rooms and Matches
//! Players meet in named rooms of two, ready up, and play matches that pause
//! when someone drops and resume once everyone is back.
//!
//! ## Architecture Design
//!
//! ### Task per Connection
//! Every accepted socket gets a reader worker and a writer task. Workers never
//! write to sockets directly; replies are queued on per-connection channels so
//! a slow peer cannot stall anyone else.
//!
//! ### Shared Registries
//! Sessions and rooms live in two fixed-size tables behind async mutexes,
//! always locked in the same order. A state transition runs entirely under
//! both locks and its outgoing frames are delivered after they are released.
//!
//! ### Sweeper
//! A periodic task pings every connection, evicts silent peers and forgets
//! players whose reconnect window has elapsed.
//!
//! ## Module Organization
//!
//! ### Configuration (`config`)
//! Listener address, table sizes and the three timing knobs.
//!
//! ### Game Engine (`game`, `combination`)
//! Match state, move validation, scoring, and the set/run rules for
//! combinations including jokers.
//!
//! ### Tables (`session`, `room_manager`, `registry`)
//! The session and room tables plus the lock-ordering wrapper around them.
//!
//! ### Networking (`network`, `connection`, `dispatcher`, `sweeper`)
//! The TCP listener, per-connection delivery, the per-status state machine
//! and the timeout sweeper.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:10000".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     // Accepts players until the process is stopped
//!     Server::bind(config).await?.run().await?;
//!     Ok(())
//! }
//! ```

pub mod combination;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod game;
pub mod network;
pub mod registry;
pub mod room_manager;
pub mod session;
pub mod sweeper;
