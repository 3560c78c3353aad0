//! Process execution and I/O management for bx.
//!
//! Provides utilities for spawning, monitoring, and killing external processes
//! with line-oriented output capture and hard deadlines.
//!
//! # Usage
//!
//! ```rust,no_run
//! use bx_io::runner::{RunEvent, Runner};
//! use std::time::Duration;
//! use tokio::{sync::mpsc, time::Instant};
//!
//! # async fn example() {
//! let runner = Runner::new("echo", vec!["Hello, World!"]);
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let deadline = Instant::now() + Duration::from_secs(5);
//!
//! let exit = runner.run(tx, deadline).await;
//!
//! while let Some(event) = rx.recv().await {
//!     match event {
//!         RunEvent::ProcessNewOutputLine(line) => println!("Output: {}", line),
//!         RunEvent::ProcessEnd(success) => println!("Process ended: {}", success),
//!         _ => {}
//!     }
//! }
//! # let _ = exit;
//! # }
//! ```

pub mod process;
pub mod runner;
