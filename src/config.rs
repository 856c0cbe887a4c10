//! Instance configuration and validation.
//!
//! [`InstanceConfig`] holds the user-facing knobs. Validation happens once,
//! in `InstanceConfig::resolve`, which produces the immutable resolved
//! form the supervisor runs with: binary resolved to a real path, port
//! pinned, log destination defaulted. After resolution nothing about the
//! instance's identity changes.

use crate::error::{MongoBoxError, Result};
use crate::util::{locate, port};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default server binary name, resolved on `PATH` when no explicit path
/// is configured.
pub const MONGOD_BIN: &str = "mongod";

/// Default restore tool name, resolved on `PATH` at import time.
pub const MONGORESTORE_BIN: &str = "mongorestore";

/// Deadline for the readiness barrier in [`crate::MongoBox::start`].
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(15);

/// Sleep between TCP connect attempts while waiting for readiness.
pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(250);

/// Flags passed to every instance before the per-instance arguments:
/// output noise down, unused listeners off, durability features off
/// (throwaway data does not need journaling or full-size files).
const BASE_ARGS: &[&str] = &[
    "--quiet",
    "--nohttpinterface",
    "--nounixsocket",
    "--smallfiles",
    "--nojournal",
];

/// User-facing knobs for a disposable mongod instance.
///
/// Every field has a usable default; `InstanceConfig::default()` describes
/// an instance on an allocator-chosen port with a supervisor-owned
/// temporary data directory and discarded server logs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Explicit path to the server binary. Must exist when set; resolved
    /// from `PATH` under [`MONGOD_BIN`] otherwise.
    pub mongod_bin: Option<PathBuf>,
    /// TCP port for the instance, 1-65535. Allocator-chosen when unset.
    pub port: Option<u16>,
    /// Data directory. Created at start if missing; when unset a fresh
    /// temporary directory is created and owned by the supervisor.
    pub db_path: Option<PathBuf>,
    /// Server log destination. Defaults to the platform null sink.
    pub log_path: Option<PathBuf>,
    /// Server-side scripting engine.
    pub scripting: bool,
    /// Data file preallocation.
    pub prealloc: bool,
    /// Authentication.
    pub auth: bool,
    /// Seed dump imported once the instance is ready.
    pub dump_file: Option<PathBuf>,
    /// Explicit path to the restore tool used for `dump_file`. Resolved
    /// from `PATH` under [`MONGORESTORE_BIN`] when unset.
    pub restore_bin: Option<PathBuf>,
    /// Readiness deadline for `start()`.
    pub startup_timeout: Duration,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            mongod_bin: None,
            port: None,
            db_path: None,
            log_path: None,
            scripting: true,  // on unless explicitly disabled
            prealloc: false,  // preallocation wastes time on throwaway data
            auth: false,
            dump_file: None,
            restore_bin: None,
            startup_timeout: STARTUP_TIMEOUT,
        }
    }
}

/// Validated, immutable instance identity. Everything the supervisor
/// needs to spawn and address the instance, fixed at construction.
#[derive(Clone, Debug)]
pub(crate) struct ResolvedConfig {
    pub mongod_bin: PathBuf,
    pub port: u16,
    pub db_path: Option<PathBuf>,
    pub log_path: PathBuf,
    pub scripting: bool,
    pub prealloc: bool,
    pub auth: bool,
    pub dump_file: Option<PathBuf>,
    pub restore_bin: Option<PathBuf>,
    pub startup_timeout: Duration,
}

impl InstanceConfig {
    /// Validate the configuration and pin the instance identity.
    ///
    /// Fails with [`MongoBoxError::Config`] when the server binary cannot
    /// be resolved, the port is out of range, or `db_path` exists as a
    /// regular file.
    pub(crate) fn resolve(self) -> Result<ResolvedConfig> {
        let mongod_bin = match self.mongod_bin {
            Some(path) => {
                if !path.exists() {
                    return Err(MongoBoxError::Config(format!(
                        "mongod binary does not exist: {}",
                        path.display()
                    )));
                }
                path
            }
            None => locate::find_executable(MONGOD_BIN).ok_or_else(|| {
                MongoBoxError::Config(format!(
                    "could not find \"{}\" on PATH; make sure MongoDB is installed",
                    MONGOD_BIN
                ))
            })?,
        };

        let port = match self.port {
            Some(0) => {
                return Err(MongoBoxError::Config(
                    "port must be in the range 1-65535".to_string(),
                ))
            }
            Some(port) => port,
            None => port::free_port()?,
        };

        if let Some(db_path) = &self.db_path {
            if db_path.is_file() {
                return Err(MongoBoxError::Config(format!(
                    "db path should be a directory, but {} is a file",
                    db_path.display()
                )));
            }
        }

        Ok(ResolvedConfig {
            mongod_bin,
            port,
            db_path: self.db_path,
            log_path: self.log_path.unwrap_or_else(null_sink),
            scripting: self.scripting,
            prealloc: self.prealloc,
            auth: self.auth,
            dump_file: self.dump_file,
            restore_bin: self.restore_bin,
            startup_timeout: self.startup_timeout,
        })
    }
}

/// Build the child argv for a resolved instance and its effective data
/// directory. Pure; safe to call repeatedly.
pub(crate) fn build_args(config: &ResolvedConfig, data_dir: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = BASE_ARGS.iter().map(OsString::from).collect();

    args.push("--dbpath".into());
    args.push(data_dir.as_os_str().to_os_string());
    args.push("--port".into());
    args.push(config.port.to_string().into());
    args.push("--logpath".into());
    args.push(config.log_path.as_os_str().to_os_string());

    if config.auth {
        args.push("--auth".into());
    }
    if !config.scripting {
        args.push("--noscripting".into());
    }
    if !config.prealloc {
        args.push("--noprealloc".into());
    }

    args
}

/// Platform null sink used when no log destination is configured.
fn null_sink() -> PathBuf {
    #[cfg(windows)]
    {
        PathBuf::from("NUL")
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("/dev/null")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing_binary() -> PathBuf {
        // Any executable that exists will do; resolution only checks
        // presence, not that the file really is a database server.
        locate::find_executable("sh").expect("sh should be on PATH")
    }

    fn config_with_binary() -> InstanceConfig {
        InstanceConfig {
            mongod_bin: Some(existing_binary()),
            ..InstanceConfig::default()
        }
    }

    #[test]
    fn missing_explicit_binary_is_a_config_error() {
        let config = InstanceConfig {
            mongod_bin: Some(PathBuf::from("/no/such/mongod")),
            ..InstanceConfig::default()
        };
        match config.resolve() {
            Err(MongoBoxError::Config(msg)) => assert!(msg.contains("/no/such/mongod")),
            other => panic!("expected Config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn db_path_pointing_at_a_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = InstanceConfig {
            db_path: Some(file.path().to_path_buf()),
            ..config_with_binary()
        };
        assert!(matches!(config.resolve(), Err(MongoBoxError::Config(_))));
    }

    #[test]
    fn port_zero_is_rejected() {
        let config = InstanceConfig {
            port: Some(0),
            ..config_with_binary()
        };
        assert!(matches!(config.resolve(), Err(MongoBoxError::Config(_))));
    }

    #[test]
    fn unset_port_gets_allocated() {
        let resolved = config_with_binary().resolve().unwrap();
        assert!(resolved.port > 0);
    }

    #[test]
    fn configured_port_is_kept() {
        let config = InstanceConfig {
            port: Some(27_100),
            ..config_with_binary()
        };
        assert_eq!(config.resolve().unwrap().port, 27_100);
    }

    #[test]
    fn log_path_defaults_to_the_null_sink() {
        let resolved = config_with_binary().resolve().unwrap();
        assert_eq!(resolved.log_path, null_sink());
    }

    #[test]
    fn default_argv_disables_prealloc_only() {
        let resolved = config_with_binary().resolve().unwrap();
        let args = build_args(&resolved, Path::new("/tmp/data"));

        assert!(args.contains(&OsString::from("--noprealloc")));
        assert!(!args.contains(&OsString::from("--auth")));
        assert!(!args.contains(&OsString::from("--noscripting")));
    }

    #[test]
    fn argv_reflects_flag_configuration() {
        let config = InstanceConfig {
            auth: true,
            scripting: false,
            prealloc: true,
            ..config_with_binary()
        };
        let resolved = config.resolve().unwrap();
        let args = build_args(&resolved, Path::new("/tmp/data"));

        assert!(args.contains(&OsString::from("--auth")));
        assert!(args.contains(&OsString::from("--noscripting")));
        assert!(!args.contains(&OsString::from("--noprealloc")));
    }

    #[test]
    fn argv_carries_dbpath_port_and_logpath() {
        let config = InstanceConfig {
            port: Some(27_101),
            log_path: Some(PathBuf::from("/tmp/mongobox.log")),
            ..config_with_binary()
        };
        let resolved = config.resolve().unwrap();
        let args = build_args(&resolved, Path::new("/tmp/data"));

        let expect_pair = |flag: &str, value: &str| {
            let at = args
                .iter()
                .position(|a| a == flag)
                .unwrap_or_else(|| panic!("{} missing from argv", flag));
            assert_eq!(args[at + 1], OsString::from(value));
        };
        expect_pair("--dbpath", "/tmp/data");
        expect_pair("--port", "27101");
        expect_pair("--logpath", "/tmp/mongobox.log");
    }

    #[test]
    fn base_flags_come_first() {
        let resolved = config_with_binary().resolve().unwrap();
        let args = build_args(&resolved, Path::new("/tmp/data"));
        assert_eq!(args[0], OsString::from("--quiet"));
        assert!(args.contains(&OsString::from("--nojournal")));
        assert!(args.contains(&OsString::from("--smallfiles")));
    }
}
