//! CMDB 主机-模块关系管理命令行程序
//!
//! 加载配置、打开 SQLite 库，执行一次模块导入、主机转移或关系查询

mod cli;
mod error;
mod observability;

use anyhow::Context;
use clap::Parser;
use cmdb_common::config::CoreConfig;
use cmdb_common::metrics;
use cmdb_common::storage::Database;
use modulehost::{
    ContextParams, HostsModuleRelation, ModuleHostRelation, ModuleHostService, ModuleRecord,
    SqliteStore, TracingNotifier, TransferHostToInnerModule, TransferHostsCrossBusiness,
};
use observability::init_observability;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

macro_rules! bootstrap_info {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

macro_rules! bootstrap_error {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

use cli::{Cli, Commands, ModuleCommands, TransferCommands};
use error::{Error, Result};

/// Application launcher utilities
struct ApplicationLauncher;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Test { config_file } => {
            let config_path =
                ApplicationLauncher::find_config_file(config_file.as_ref().unwrap_or(&cli.config))?;
            ApplicationLauncher::test_config_file(&config_path)
        }
        command => {
            let config_path = ApplicationLauncher::find_config_file(&cli.config)?;
            let config = ApplicationLauncher::load_config(&config_path)?;

            // Create Tokio runtime（before running the command）
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;

            runtime.block_on(ApplicationLauncher::run_command(&config, &cli.owner, command))
        }
    }
}

impl ApplicationLauncher {
    /// Find config file with fallback locations
    fn find_config_file(provided_path: &PathBuf) -> Result<PathBuf> {
        // If the provided path is not the default "config.toml", check if it exists
        if provided_path != Path::new("config.toml") {
            if provided_path.exists() {
                bootstrap_info!("Using provided config file: {:?}", provided_path);
                return Ok(provided_path.clone());
            } else {
                bootstrap_error!("Provided config file not found: {:?}", provided_path);
                return Err(Error::custom(format!(
                    "Config file not found: {provided_path:?}"
                )));
            }
        }

        let fallback_paths = vec![
            // 1. Current working directory
            PathBuf::from("config.toml"),
            // 2. System config directory
            PathBuf::from("/etc/cmdb/config.toml"),
        ];

        for path in &fallback_paths {
            if path.exists() {
                bootstrap_info!("Found config file: {:?}", path);
                return Ok(path.clone());
            }
        }

        bootstrap_error!("No configuration file found!");
        bootstrap_error!("Please create a config file in one of these locations:");
        for (i, path) in fallback_paths.iter().enumerate() {
            bootstrap_error!("  {}. {:?}", i + 1, path);
        }
        bootstrap_error!("Or specify a custom path with: cmdb --config <path>");

        Err(Error::custom(
            "No configuration file found. Please create one or specify path with --config",
        ))
    }

    /// 测试配置文件是否有效
    fn test_config_file(config_path: &Path) -> Result<()> {
        // Initialize basic logging for test command
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();

        match CoreConfig::from_file(config_path) {
            Ok(config) => {
                info!("✅ 配置文件解析成功: {:?}", config_path);

                match config.validate() {
                    Ok(()) => {
                        info!("✅ 配置验证通过");
                    }
                    Err(errors) => {
                        error!("❌ 配置验证发现问题:");
                        for (i, err) in errors.iter().enumerate() {
                            if err.starts_with("Warning:") {
                                info!("  {}. ⚠️  {}", i + 1, err);
                            } else {
                                error!("  {}. ❌ {}", i + 1, err);
                            }
                        }
                        // 检查是否有非警告错误
                        let has_errors = errors.iter().any(|e| !e.starts_with("Warning:"));
                        if has_errors {
                            return Err(Error::config_validation("配置验证失败"));
                        }
                    }
                }

                info!("✅ 完整配置验证通过");
                Ok(())
            }
            Err(e) => {
                error!("❌ 配置文件解析失败: {}", e);
                Err(Error::config_validation(format!("配置解析失败: {e}")))
            }
        }
    }

    /// 加载并验证配置，只有警告时继续
    fn load_config(config_path: &Path) -> Result<CoreConfig> {
        let config = CoreConfig::from_file(config_path).inspect_err(|e| {
            bootstrap_error!("❌ 配置加载失败: {}", e);
        })?;

        if let Err(errors) = config.validate() {
            let mut has_critical_errors = false;
            for (i, err) in errors.iter().enumerate() {
                if err.starts_with("Warning:") {
                    bootstrap_info!("  {}. ⚠️  {}", i + 1, err);
                } else {
                    bootstrap_error!("  {}. ❌ {}", i + 1, err);
                    has_critical_errors = true;
                }
            }
            if has_critical_errors {
                return Err(Error::config_validation("配置验证失败，请修复上述错误"));
            }
        }

        Ok(config)
    }

    /// 执行一条命令
    async fn run_command(config: &CoreConfig, owner: &str, command: &Commands) -> Result<()> {
        // ensure sqlite_path directory exists
        if !config.sqlite_path.exists() {
            std::fs::create_dir_all(&config.sqlite_path).with_context(|| {
                format!(
                    "Failed to create SQLite data directory: {}",
                    config.sqlite_path.display()
                )
            })?;
        }

        let _observability_guard = init_observability(config)?;

        if let Err(e) = metrics::register_metrics() {
            warn!("Prometheus metrics registration warning: {}", e);
        }

        let db = Database::new(&config.sqlite_path).await?;
        let store = Arc::new(SqliteStore::new(db));

        let cancel = CancellationToken::new();
        setup_ctrl_c_handler(cancel.clone());

        let mut ctx = ContextParams::new(owner).with_cancel(cancel);
        if let Some(timeout) = config.transfer_config().request_timeout() {
            ctx = ctx.with_timeout(timeout);
        }
        info!(rid = %ctx.rid, "cmdb {} started, owner {}", config.name, owner);

        let service = ModuleHostService::new(store.clone(), store.clone(), Arc::new(TracingNotifier))
            .with_config(config.transfer_config());

        match command {
            Commands::Module {
                command: ModuleCommands::Import { file },
            } => {
                let modules: Vec<ModuleRecord> = read_json(file)?;
                store.insert_modules(owner, &modules).await?;
                info!(rid = %ctx.rid, "Imported {} modules from {:?}", modules.len(), file);
                print_json(&serde_json::json!({ "imported": modules.len() }))
            }
            Commands::Transfer { command } => {
                let result = match command {
                    TransferCommands::Inner { file } => {
                        let input: TransferHostToInnerModule = read_json(file)?;
                        service.transfer_host_to_inner_module(&ctx, &input).await
                    }
                    TransferCommands::Module { file } => {
                        let input: HostsModuleRelation = read_json(file)?;
                        service.transfer_host_module(&ctx, &input).await
                    }
                    TransferCommands::Cross { file } => {
                        let input: TransferHostsCrossBusiness = read_json(file)?;
                        service.transfer_host_cross_business(&ctx, &input).await
                    }
                };

                let report = modulehost::report(result);
                print_json(&report)?;
                debug!("metrics:\n{}", metrics::export_metrics());

                match report.error {
                    Some(e) => Err(Error::TransferFailed {
                        code: e.code,
                        message: e.message,
                    }),
                    None => Ok(()),
                }
            }
            Commands::Relations { business, hosts } => {
                let relations = service.host_relations(&ctx, *business, hosts).await?;
                let rows: Vec<&ModuleHostRelation> = relations.values().flatten().collect();
                print_json(&rows)
            }
            Commands::Test { .. } => Ok(()),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file: {}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// 设置Ctrl-C信号处理程序，取消当前请求
fn setup_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("无法监听Ctrl-C信号: {}", e);
            return;
        }
        info!("收到Ctrl-C信号，取消当前请求...");
        cancel.cancel();
    });
}
