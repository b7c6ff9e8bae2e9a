pub mod error;
pub use error::{CoreError, WorkError};

pub mod bus;
pub use bus::{EventBus, Subscribe};

pub mod cache;
pub use cache::{Cache, CacheError, MemoryCache, SharedCache};

pub mod config;
pub use config::{DrainConfig, ProbeConfig, SupervisorConfig};

pub mod health;
pub use health::HealthReporter;

pub mod probe;
pub use probe::{ConnectivityProber, Probe};

pub mod registry;
pub use registry::{TaskDefinition, TaskRegistry};

pub mod runner;
pub use runner::{RunOutcome, TaskRunner};

pub mod scheduler;
pub use scheduler::{PeriodicAnchor, Scheduler};

pub mod shutdown;
pub use shutdown::{Release, RequestGuard, RequestTracker, ShutdownCoordinator, ShutdownReport};

pub mod state;
pub use state::{StateStore, TaskRuntime};

pub mod system;

pub mod task;
pub use task::{UnitOfWork, WorkFn, WorkRef};

pub mod timer;
pub use timer::{Timer, TimerCallback, TimerHandle, TokioTimer};
