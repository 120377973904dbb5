mod commands;
mod context;
mod tui;

use clap::{Parser, Subcommand};
use context::AppContext;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "vt")]
#[command(about = "脆弱性検証用のラボ環境をテンプレートから起動", long_about = None)]
#[command(version)]
struct Cli {
    /// テンプレートディレクトリ（デフォルト: ./templates）
    #[arg(long, global = true, env = "VT_TEMPLATES_DIR")]
    templates_dir: Option<PathBuf>,

    /// ログレベル（RUST_LOG が設定されていればそちらを優先）
    #[arg(
        short,
        long,
        global = true,
        default_value = "info",
        value_parser = ["error", "warn", "info", "debug", "trace"]
    )]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// テンプレート一覧を表示
    List {
        /// タグまたは対象技術で絞り込み
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// 環境を起動
    Start {
        /// プロバイダー名（例: docker-compose）
        #[arg(short, long)]
        provider: String,
        /// テンプレートID
        #[arg(long)]
        id: String,
    },
    /// 環境を停止
    Stop {
        /// プロバイダー名（例: docker-compose）
        #[arg(short, long)]
        provider: String,
        /// テンプレートID
        #[arg(long)]
        id: String,
    },
    /// ステータスモニターを表示
    Status {
        #[command(subcommand)]
        mode: Option<StatusMode>,

        /// 指定秒数が経過したら自動的に終了
        #[arg(long, global = true)]
        deadline: Option<u64>,
    },
    /// 起動済みのデプロイメント一覧を表示
    Ps,
    /// テンプレート定義を検証
    Validate,
    /// 登録済みのプロバイダー一覧を表示
    Providers,
}

#[derive(Subcommand, Clone, Copy)]
enum StatusMode {
    /// 定期的に状態を再取得し続ける
    Watch,
}

/// ログファイルを追記モードで開く（親ディレクトリがなければ作成）
fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn init_logging(verbosity: &str, to_file: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity));

    if to_file {
        // 全画面表示を崩さないようログはファイルへ
        let opened = vt_config::log_path()
            .map_err(|e| e.to_string())
            .and_then(|path| {
                open_log_file(&path).map_err(|e| format!("{}: {}", path.display(), e))
            });

        match opened {
            Ok(file) => tracing_subscriber::fmt()
                .with_writer(file)
                .with_env_filter(filter)
                .with_ansi(false)
                .init(),
            Err(e) => {
                // TUI に入る前に一度だけ知らせ、以降のログは捨てる
                eprintln!("⚠ ログファイルを開けません（ログは出力されません）: {}", e);
                tracing_subscriber::fmt()
                    .with_writer(std::io::sink)
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .init();
            }
        }
        return;
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.verbosity, matches!(cli.command, Commands::Status { .. }));

    let templates_dir = vt_config::templates_dir(cli.templates_dir.as_deref())?;

    // validate はカタログを読み込まずにテンプレートを1つずつ検証する
    if let Commands::Validate = cli.command {
        return commands::validate::handle(&templates_dir);
    }

    let ctx = AppContext::load(&templates_dir).await?;

    match cli.command {
        Commands::List { filter } => commands::list::handle(&ctx, filter.as_deref()),
        Commands::Start { provider, id } => commands::start::handle(&ctx, &provider, &id).await,
        Commands::Stop { provider, id } => commands::stop::handle(&ctx, &provider, &id).await,
        Commands::Status { mode, deadline } => {
            let watch = matches!(mode, Some(StatusMode::Watch));
            commands::status::handle(ctx, watch, deadline).await
        }
        Commands::Ps => commands::ps::handle(&ctx).await,
        Commands::Providers => commands::providers::handle(&ctx),
        Commands::Validate => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_log_file_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("vt.log");

        let file = open_log_file(&path);
        assert!(file.is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_open_log_file_fails_on_directory() {
        let dir = TempDir::new().unwrap();
        assert!(open_log_file(dir.path()).is_err());
    }
}
