//! Bad node detection core
//!
//! Decides which cluster nodes are persistently unhealthy and safe to remove.
//! Removal itself is left to the calling operator. The crate provides:
//!
//! - **Health evaluation**: debounced `Ready` and `DiskPressure` checks
//! - **Tick counters**: per-node hysteresis stored in a node annotation
//! - **Candidate selection**: at most one master, at most a fraction of the fleet
//! - **`TimeLock`**: a TTL lock on a shared namespace pacing terminations
//!
//! ## Usage
//!
//! ```rust,ignore
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let detector = Detector::new(
//!     Arc::new(KubeStore::<Node>::new(client.clone())),
//!     Arc::new(KubeStore::<Namespace>::new(client)),
//!     DetectorConfig::new("aws-operator"),
//! )?;
//!
//! let bad_nodes = detector.detect_bad_nodes().await?;
//! if bad_nodes.should_terminate() {
//!     // terminate bad_nodes.nodes
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod health;
pub mod lock;
pub mod selector;
pub mod store;
pub mod tick;

pub use config::DetectorConfig;
pub use detector::{BadNodes, Detector, Pacing};
pub use error::{DetectorError, Result, StoreError};
pub use lock::TimeLock;
pub use store::{KubeStore, MemoryStore, ObjectStore};
