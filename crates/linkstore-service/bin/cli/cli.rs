use clap::{Parser, Subcommand, ValueEnum};
use linkstore_service::deletion::{DEFAULT_BATCH_SIZE, DEFAULT_WORKERS};
use linkstore_service::service::DEFAULT_BASE_URL;
use linkstore_service::Backend;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const STORAGE_BACKEND_ENV: &str = "LINKSTORE_STORAGE_BACKEND";
pub const FILE_STORAGE_PATH_ENV: &str = "LINKSTORE_FILE_STORAGE_PATH";
pub const MYSQL_DSN_ENV: &str = "LINKSTORE_MYSQL_DSN";
pub const BASE_URL_ENV: &str = "LINKSTORE_BASE_URL";
pub const CODE_PREFIX_ENV: &str = "LINKSTORE_CODE_PREFIX";
pub const OP_TIMEOUT_MS_ENV: &str = "LINKSTORE_OP_TIMEOUT_MS";
pub const DELETE_BATCH_SIZE_ENV: &str = "LINKSTORE_DELETE_BATCH_SIZE";
pub const DELETE_WORKERS_ENV: &str = "LINKSTORE_DELETE_WORKERS";

pub const DEFAULT_FILE_STORAGE_PATH: &str = linkstore_service::config::DEFAULT_FILE_STORAGE_PATH;
pub const DEFAULT_OP_TIMEOUT_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "log")]
    Log,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::Log => write!(f, "log"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

impl From<StorageBackendArg> for Backend {
    fn from(value: StorageBackendArg) -> Self {
        match value {
            StorageBackendArg::Log => Backend::Log,
            StorageBackendArg::Mysql => Backend::MySql,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "linkstore", about = "Operate a linkstore backend")]
pub struct CLI {
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::Log
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = FILE_STORAGE_PATH_ENV, default_value = DEFAULT_FILE_STORAGE_PATH)]
    pub file_storage_path: PathBuf,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = CODE_PREFIX_ENV, default_value = "")]
    pub code_prefix: String,

    #[arg(long, env = OP_TIMEOUT_MS_ENV, default_value_t = DEFAULT_OP_TIMEOUT_MS)]
    pub op_timeout_ms: u64,

    #[arg(long, env = DELETE_BATCH_SIZE_ENV, default_value_t = DEFAULT_BATCH_SIZE)]
    pub delete_batch_size: usize,

    #[arg(long, env = DELETE_WORKERS_ENV, default_value_t = DEFAULT_WORKERS)]
    pub delete_workers: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten a URL.
    Add {
        url: String,
        #[arg(long)]
        owner: Option<i64>,
    },
    /// Print the URL behind a short code.
    Get { code: String },
    /// List the live links of an owner.
    List { owner: i64 },
    /// Soft-delete codes owned by an owner.
    Delete {
        #[arg(long)]
        owner: i64,
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// Allocate a new owner id.
    RegisterOwner,
    /// Check that the backend is reachable.
    Ping,
}
