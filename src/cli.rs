use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "prompt-inspector")]
#[command(about = "AI画像の生成メタデータ（プロンプト・モデル・シード等）を抽出するツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 画像ファイルのメタデータを表示
    Inspect {
        /// 画像ファイル（PNG/WEBP）
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// JSONで出力
        #[arg(long)]
        json: bool,

        /// 整形せず生のメタデータを出力
        #[arg(long)]
        raw: bool,

        /// ComfyUIで未解決の入力を `{name}` のまま残す
        #[arg(long)]
        no_propagate_none: bool,
    },

    /// フォルダ内でメタデータを持つ画像を一覧
    Scan {
        /// 画像フォルダのパス
        #[arg(required = true)]
        folder: PathBuf,

        /// サブフォルダも再帰的にスキャン
        #[arg(short = 'r', long)]
        recursive: bool,

        /// JSONで出力
        #[arg(long)]
        json: bool,
    },

    /// 設定を表示/編集
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,

        /// 読み込むファイルサイズの上限（バイト）
        #[arg(long)]
        set_scan_limit: Option<u64>,

        /// ComfyUIで未解決の依存があるとき値全体を捨てる (true/false)
        #[arg(long)]
        propagate_none: Option<bool>,
    },
}
