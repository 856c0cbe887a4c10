//! Instance lifecycle supervision.
//!
//! [`MongoBox`] owns one child `mongod` process end to end: data
//! directory preparation, spawn, the blocking readiness barrier, optional
//! seed import, and teardown with resource reclamation.
//!
//! The supervisor is deliberately synchronous. `start()` blocks the
//! calling thread until the instance accepts connections or the deadline
//! expires, and `stop()` blocks until the child is reaped; test harnesses
//! need a guaranteed-ready instance before proceeding. `start()` and
//! `stop()` take `&mut self`, so concurrent invocation on one supervisor
//! is ruled out at the type level rather than with internal locking.

use crate::config::{self, InstanceConfig, ResolvedConfig, CONNECT_RETRY_INTERVAL};
use crate::error::{MongoBoxError, Result};
use crate::seed;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Instant;
use uuid::Uuid;

/// Lifecycle states - closed set.
///
/// A failed start resets to `Idle`; there is no terminal failure state
/// and a supervisor that failed to start may be started again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "starting")]
    Starting,
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "stopping")]
    Stopping,
}

/// Supervisor for one disposable `mongod` instance.
///
/// Holds the validated instance identity (binary, port, flags) and the
/// runtime state (child handle, effective data directory). Dropping a
/// `MongoBox` stops the instance, so the child process and any owned
/// data directory never outlive the supervisor's scope - including when
/// the surrounding code panics.
pub struct MongoBox {
    config: ResolvedConfig,
    state: Lifecycle,
    process: Option<Child>,
    /// Effective data directory of the current (or, for an explicitly
    /// configured path, most recent) run.
    data_dir: Option<PathBuf>,
    /// Set when the directory was supervisor-created and is deleted on
    /// stop.
    data_dir_is_temporary: bool,
}

impl MongoBox {
    /// Validate `config` and construct an idle supervisor.
    ///
    /// Fails fast with [`MongoBoxError::Config`] when the server binary
    /// cannot be resolved, the port is invalid, or the configured data
    /// directory exists as a regular file. The resolved port never
    /// changes afterwards.
    pub fn new(config: InstanceConfig) -> Result<Self> {
        Ok(Self {
            config: config.resolve()?,
            state: Lifecycle::Idle,
            process: None,
            data_dir: None,
            data_dir_is_temporary: false,
        })
    }

    /// Construct and start in one call.
    ///
    /// The returned supervisor stops its instance on drop. Note that on
    /// any error - including a seed-import failure - the partially
    /// started instance is torn down before the error reaches the
    /// caller; use [`MongoBox::new`] plus [`MongoBox::start`] to keep an
    /// instance alive across an import failure.
    pub fn start_new(config: InstanceConfig) -> Result<Self> {
        let mut instance = Self::new(config)?;
        instance.start()?;
        Ok(instance)
    }

    /// Start the instance and block until it accepts TCP connections.
    ///
    /// Prepares the data directory (creating a supervisor-owned
    /// temporary one when none is configured), spawns the child with
    /// captured output, and polls `localhost:<port>` until the readiness
    /// deadline. A child that exits during the window fails immediately
    /// with [`MongoBoxError::StartupCrash`]; deadline expiry fails with
    /// [`MongoBoxError::StartupTimeout`]. Either failure tears the
    /// attempt down (best effort, secondary errors logged) and leaves
    /// the supervisor idle and restartable.
    ///
    /// A successful TCP connect only proves the server accepts
    /// connections, not that internal initialization beyond that point
    /// has finished.
    ///
    /// When a seed dump is configured it is imported after readiness; an
    /// import failure surfaces [`MongoBoxError::Import`] *with the
    /// instance left running*.
    pub fn start(&mut self) -> Result<()> {
        if self.state != Lifecycle::Idle {
            return Err(MongoBoxError::Lifecycle(format!(
                "start() requires an idle instance, state is {:?}",
                self.state
            )));
        }

        let data_dir = self.prepare_data_dir()?;
        let args = config::build_args(&self.config, &data_dir);
        debug!(
            "spawning {} {:?}",
            self.config.mongod_bin.display(),
            args
        );

        let child = Command::new(&self.config.mongod_bin)
            .args(&args)
            // Captured, never displayed; --quiet keeps the volume below
            // pipe capacity.
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(err) => {
                self.discard_owned_data_dir();
                return Err(err.into());
            }
        };
        self.process = Some(child);
        self.state = Lifecycle::Starting;

        if let Err(err) = self.wait_until_ready() {
            // Best-effort teardown; the primary error wins.
            self.stop();
            return Err(err);
        }
        self.state = Lifecycle::Running;
        info!("mongod ready on port {}", self.config.port);

        if let Some(dump_file) = self.config.dump_file.clone() {
            seed::restore_dump(
                self.config.restore_bin.as_deref(),
                self.config.port,
                &dump_file,
            )?;
        }
        Ok(())
    }

    /// Stop the instance and reclaim its resources. Never fails.
    ///
    /// No-op when idle, safe to call repeatedly. Sends the platform
    /// termination signal, blocks until the child is reaped (no zombie
    /// left behind), then deletes the data directory when it was
    /// supervisor-created. Signal and cleanup failures are logged, not
    /// propagated.
    pub fn stop(&mut self) {
        let Some(mut child) = self.process.take() else {
            return;
        };
        self.state = Lifecycle::Stopping;

        terminate(&mut child);
        if let Err(err) = child.wait() {
            warn!("failed to reap mongod (pid {}): {}", child.id(), err);
        }

        self.discard_owned_data_dir();
        self.state = Lifecycle::Idle;
        debug!("instance on port {} stopped", self.config.port);
    }

    /// True iff a child process handle is currently held.
    pub fn running(&self) -> bool {
        self.process.is_some()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// The instance's TCP port, fixed at construction.
    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Effective data directory, if one has been established.
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Connection string for the instance.
    pub fn uri(&self) -> String {
        format!("mongodb://localhost:{}/", self.config.port)
    }

    /// Establish the data directory for this run.
    ///
    /// An explicitly configured path is created if missing and never
    /// deleted by the supervisor; an unset path gets a fresh directory
    /// under the system temp dir, owned by the supervisor.
    fn prepare_data_dir(&mut self) -> Result<PathBuf> {
        let dir = match &self.config.db_path {
            Some(path) => {
                if !path.exists() {
                    fs::create_dir_all(path)?;
                }
                self.data_dir_is_temporary = false;
                path.clone()
            }
            None => {
                let dir = env::temp_dir().join(format!("mongobox-{}", Uuid::new_v4()));
                fs::create_dir_all(&dir)?;
                self.data_dir_is_temporary = true;
                dir
            }
        };
        self.data_dir = Some(dir.clone());
        Ok(dir)
    }

    /// Delete the data directory iff this supervisor created it.
    /// Idempotent; failures are logged.
    fn discard_owned_data_dir(&mut self) {
        if !self.data_dir_is_temporary {
            return;
        }
        if let Some(dir) = self.data_dir.take() {
            if let Err(err) = fs::remove_dir_all(&dir) {
                warn!(
                    "failed to remove data directory {}: {}",
                    dir.display(),
                    err
                );
            }
        }
        self.data_dir_is_temporary = false;
    }

    /// Block until the child accepts a TCP connection or the deadline
    /// expires.
    fn wait_until_ready(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.config.startup_timeout;
        while Instant::now() < deadline {
            let child = match self.process.as_mut() {
                Some(child) => child,
                None => {
                    return Err(MongoBoxError::Lifecycle(
                        "no child process to wait for".to_string(),
                    ))
                }
            };
            // A dead child will never open the port; fail now instead of
            // burning the rest of the deadline.
            if let Some(status) = child.try_wait()? {
                return Err(MongoBoxError::StartupCrash { status });
            }
            match TcpStream::connect(("localhost", self.config.port)) {
                Ok(_) => return Ok(()),
                Err(_) => thread::sleep(CONNECT_RETRY_INTERVAL),
            }
        }
        Err(MongoBoxError::StartupTimeout {
            timeout: self.config.startup_timeout,
        })
    }
}

impl Drop for MongoBox {
    /// Scope guard: stop on every exit path, including panic unwinding.
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(target_os = "macos")]
fn terminate(child: &mut Child) {
    // SIGTERM delivery to mongod is unreliable here; hard-kill instead.
    if let Err(err) = child.kill() {
        warn!("failed to kill mongod (pid {}): {}", child.id(), err);
    }
}

#[cfg(not(target_os = "macos"))]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let pid = Pid::from_raw(child.id() as i32);
    if let Err(err) = signal::kill(pid, Signal::SIGTERM) {
        warn!("failed to signal mongod (pid {}): {}", pid, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::locate;

    fn idle_instance() -> MongoBox {
        let config = InstanceConfig {
            // Resolution only checks presence; these tests never spawn.
            mongod_bin: Some(locate::find_executable("sh").unwrap()),
            ..InstanceConfig::default()
        };
        MongoBox::new(config).unwrap()
    }

    #[test]
    fn new_instance_is_idle_and_not_running() {
        let instance = idle_instance();
        assert_eq!(instance.state(), Lifecycle::Idle);
        assert!(!instance.running());
        assert!(instance.data_dir().is_none());
    }

    #[test]
    fn stop_on_idle_instance_is_a_no_op() {
        let mut instance = idle_instance();
        instance.stop();
        instance.stop();
        assert_eq!(instance.state(), Lifecycle::Idle);
        assert!(!instance.running());
    }

    #[test]
    fn start_rejects_a_non_idle_instance() {
        let mut instance = idle_instance();
        instance.state = Lifecycle::Running;
        assert!(matches!(
            instance.start(),
            Err(MongoBoxError::Lifecycle(_))
        ));
    }

    #[test]
    fn uri_points_at_the_configured_port() {
        let config = InstanceConfig {
            mongod_bin: Some(locate::find_executable("sh").unwrap()),
            port: Some(27_100),
            ..InstanceConfig::default()
        };
        let instance = MongoBox::new(config).unwrap();
        assert_eq!(instance.uri(), "mongodb://localhost:27100/");
    }
}
