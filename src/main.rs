use anyhow::Context;
use clap::Parser;
use dogmap::utils::error::{ErrorSeverity, EtlError};
use dogmap::utils::{logger, validation::Validate};
use dogmap::{app, server, CliConfig, Command, LocalStorage, TomlConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting dogmap");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = cli.load_config().context("failed to load configuration")?;

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if config.monitoring_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    if let Err(e) = dispatch(&cli.command, config).await {
        report_and_exit(e);
    }
    Ok(())
}

async fn dispatch(command: &Command, config: TomlConfig) -> Result<(), EtlError> {
    let storage = LocalStorage::new(config.output.root.clone());

    match command {
        Command::Preprocess => {
            let output = app::preprocess(&storage, &config).await?;
            println!("✅ Preprocessing complete, data saved to: {}", output);
        }
        Command::Maps => {
            let summary = app::generate_maps(&storage, &config).await?;
            println!(
                "✅ Generated {} breed maps and {} name maps in {}",
                summary.breed_maps, summary.name_maps, config.output.maps_dir
            );
        }
        Command::Run => {
            let summary = app::run_all(&storage, &config).await?;
            println!(
                "✅ Data in {}, {} breed maps and {} name maps in {}",
                config.output.data_dir,
                summary.breed_maps,
                summary.name_maps,
                config.output.maps_dir
            );
        }
        Command::Export { .. } => {
            let summary = app::export_site(&storage, &config).await?;
            if summary.placeholder {
                println!("⚠️  No data available, exported a placeholder site");
            }
            println!("📁 Static site ready in: {} ({} files)", summary.site_dir, summary.files);
            if let Some(archive) = summary.archive {
                println!("📦 Archive: {}", archive);
            }
        }
        Command::Serve { .. } => server::run(config).await?,
    }
    Ok(())
}

fn report_and_exit(e: EtlError) {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ dogmap failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
}
