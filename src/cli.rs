//! 命令行界面定义
//!
//! 定义了主程序的命令行参数和选项
use clap::{Parser, Subcommand};
use cmdb_common::types::DEFAULT_OWNER;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cmdb")]
#[command(version = "0.1.0")]
#[command(
    about = "CMDB host-module relation core: move hosts between default modules, normal modules and businesses"
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,

    /// Configuration file path (defaults to searching standard locations)
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub(crate) config: PathBuf,

    /// Developer account (tenant) injected into every query
    #[arg(long, default_value = DEFAULT_OWNER, global = true)]
    pub(crate) owner: String,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Test configuration file
    Test {
        /// Configuration file path (optional, defaults to config.toml)
        #[arg(index = 1)]
        config_file: Option<PathBuf>,
    },

    /// Module catalog maintenance
    Module {
        #[command(subcommand)]
        command: ModuleCommands,
    },

    /// Run one host transfer batch from a JSON request file
    Transfer {
        #[command(subcommand)]
        command: TransferCommands,
    },

    /// Print current relations of hosts in a business
    Relations {
        /// Business ID
        #[arg(long)]
        business: i64,

        /// Host ID, repeatable
        #[arg(long = "host", required = true)]
        hosts: Vec<i64>,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum ModuleCommands {
    /// Import modules from a JSON array of module records
    Import {
        #[arg(index = 1)]
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum TransferCommands {
    /// Transfer hosts to a default (idle/fault/recycle) module
    Inner {
        #[arg(index = 1)]
        file: PathBuf,
    },
    /// Transfer hosts to modules, optionally incrementally
    Module {
        #[arg(index = 1)]
        file: PathBuf,
    },
    /// Transfer hosts to modules of another business
    Cross {
        #[arg(index = 1)]
        file: PathBuf,
    },
}
