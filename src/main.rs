//! 試験結果のバッチ取得 CLI
//!
//! 実行方法:
//! ```text
//! CAPTCHA_API_KEY=... results-scraper 1 10 --out ./results
//! results-scraper 1AT22CS001 1AT22CS005 --manual
//! results-scraper 1 5 --demo
//! ```

use std::path::PathBuf;

use clap::Parser;
use tower::Service;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use exam_results_scraper::demo::demo_records;
use exam_results_scraper::{
    CaptchaMode, Exporter, ScrapeRequest, ScraperConfig, ScraperService, StudentSummary,
};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// First identifier of the range (number or full identifier)
    start: String,
    /// Last identifier of the range (inclusive)
    end: String,
    /// Wait for a human to type each CAPTCHA in a visible browser
    #[arg(long)]
    manual: bool,
    /// Show the browser window
    #[arg(long)]
    headed: bool,
    /// Output directory for the exported CSV
    #[arg(long)]
    out: Option<PathBuf>,
    /// API key of the CAPTCHA solving service (overrides CAPTCHA_API_KEY)
    #[arg(long)]
    api_key: Option<String>,
    /// Keep only the first N identifiers of the range
    #[arg(long)]
    max: Option<usize>,
    /// Generate sample records without a browser
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ログ設定
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = ScraperConfig::from_env();
    if let Some(out) = args.out {
        config = config.with_output_dir(out);
    }
    if let Some(key) = args.api_key {
        config = config.with_api_key(key);
    }
    if let Some(max) = args.max {
        config = config.with_max_batch_size(max);
    }

    if args.demo {
        return run_demo(&config, &args.start, &args.end);
    }

    let mut service = ScraperService::new(config);

    // Ctrl-C で走査を止め、そこまでの結果を保存する
    let control = service.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("中断要求を受信しました。現在の処理の後に終了します");
            control.request_exit();
        }
    });

    let mode = if args.manual {
        CaptchaMode::Manual
    } else {
        CaptchaMode::Auto
    };
    let mut request = ScrapeRequest::new(args.start, args.end).with_mode(mode);
    if args.headed {
        request = request.with_headless(false);
    }

    println!("=== Exam Results Scraper ===");
    let result = service.call(request).await?;

    print_students(&result.students);
    match &result.export_path {
        Some(path) => println!("CSV保存先: {:?}", path),
        None => println!("取得できた結果はありません"),
    }
    if result.aborted {
        println!("中断されたため部分的な結果です");
    }

    Ok(())
}

fn run_demo(
    config: &ScraperConfig,
    start: &str,
    end: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Demo Mode (no browser) ===");

    let records = demo_records(
        start,
        end,
        &config.identifier_format,
        config.max_batch_size,
    )?;

    let students: Vec<StudentSummary> = records.iter().map(StudentSummary::from).collect();
    print_students(&students);

    let path = Exporter::new(&config.output_dir)
        .with_file_prefix("demo_results")
        .export(&records)?;
    if let Some(path) = path {
        println!("CSV保存先: {:?}", path);
    }
    Ok(())
}

fn print_students(students: &[StudentSummary]) {
    for student in students {
        println!(
            "{}  {}  semester={}  total={}  {}",
            student.identifier, student.name, student.semester, student.total, student.result
        );
    }
}
