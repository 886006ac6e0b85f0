use clap::Parser;
use prompt_inspector::{cli, config, error, inspector, report, scanner};
use cli::{Cli, Commands};
use config::Config;
use error::Result;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config = Config::load()?;

    match cli.command {
        Commands::Inspect { paths, json, raw, no_propagate_none } => {
            let mut config = config;
            if no_propagate_none {
                config.propagate_none = false;
            }
            let inspector = inspector::build_inspector(&config);
            let results = inspector::inspect_files(&paths, &config, &inspector);

            if json {
                println!("{}", report::render_json(&results)?);
                return Ok(());
            }

            for (path, result) in &results {
                match result {
                    Ok(file_report) if raw => println!("{}", report::render_raw(file_report)?),
                    Ok(file_report) => println!("{}", report::render_human(file_report)),
                    Err(e) => eprintln!("✖ {}: {}", path.display(), e),
                }
            }
        }

        Commands::Scan { folder, recursive, json } => {
            let recursive = recursive || config.recursive;

            println!("🔎 prompt-inspector - メタデータ検索\n");
            println!("[1/2] 画像をスキャン中...");
            let images = scanner::scan_folder(&folder, &config, recursive)?;
            println!("✔ {}枚の画像を検出\n", images.len());

            if images.is_empty() {
                return Err(error::InspectorError::NoImagesFound(
                    folder.display().to_string()
                ));
            }

            println!("[2/2] メタデータを確認中...");
            let inspector = inspector::build_inspector(&config);
            let progress = inspector::progress_bar(images.len());
            let reports = inspector::scan_for_metadata(&images, &config, &inspector, &progress);
            println!("✔ {}枚にメタデータあり\n", reports.len());

            if json {
                println!("{}", report::render_scan_json(&reports)?);
            } else {
                for file_report in &reports {
                    println!("{}", report::render_scan_line(file_report));
                }
            }
        }

        Commands::Config { show, set_scan_limit, propagate_none } => {
            // 環境変数の上書きを保存しないようファイルから読み直す
            let mut config = Config::load_file()?;

            if let Some(bytes) = set_scan_limit {
                config.set_scan_limit(bytes)?;
                println!("✔ スキャン上限を {} bytes に設定しました", bytes);
            }

            if let Some(value) = propagate_none {
                config.set_propagate_none(value)?;
                println!("✔ propagate_none を {} に設定しました", value);
            }

            if show || (set_scan_limit.is_none() && propagate_none.is_none()) {
                println!("設定: {}", Config::config_path()?.display());
                println!("  スキャン上限: {} bytes", config.scan_limit_bytes);
                println!("  propagate_none: {}", config.propagate_none);
                println!("  再帰スキャン: {}", if config.recursive { "有効" } else { "無効" });
                println!("  対象拡張子: {}", config.extensions.join(", "));
            }
        }
    }

    Ok(())
}
