//! NutriLens 命令行客户端
//!
//! 用法：nutrilens [--config <path>] [<image>]
//! 先分析图片（如有），然后从标准输入读取追问；`/new` 开启新线程，`/quit` 退出。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, BufReader};

use nutrilens::config::{load_config, AppConfig, Secrets};
use nutrilens::core::{EngineBuilder, ShutdownManager};
use nutrilens::workflow::{TurnInput, TurnOutput, WorkflowEngine};

struct CliArgs {
    config: Option<PathBuf>,
    image: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut args = std::env::args().skip(1);
    let mut parsed = CliArgs {
        config: None,
        image: None,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                parsed.config = Some(args.next().context("--config needs a path")?.into());
            }
            "--help" | "-h" => {
                println!("usage: nutrilens [--config <path>] [<image>]");
                std::process::exit(0);
            }
            other if other.starts_with('-') => bail!("unknown option: {other}"),
            other => parsed.image = Some(other.into()),
        }
    }
    Ok(parsed)
}

/// 按扩展名推断图片 MIME 类型
fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn new_thread() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn print_output(output: &TurnOutput) {
    if let Some(answer) = &output.user_result {
        println!("\n{answer}\n");
    } else if let Some(result) = &output.result {
        if let Some(items) = &output.food_items {
            println!("\n{items}");
        }
        println!("\n{result}\n");
    } else {
        println!("\n(nothing to do; attach an image or ask a question)\n");
    }
}

async fn analyze_image(engine: &WorkflowEngine, thread_id: &str, path: &Path) -> anyhow::Result<()> {
    let mime = mime_for(path).with_context(|| format!("unsupported image type: {}", path.display()))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let output = engine
        .invoke(thread_id, TurnInput::image(bytes, mime))
        .await
        .context("image analysis failed")?;
    print_output(&output);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    nutrilens::observability::init();

    let args = parse_args()?;
    let cfg = load_config(args.config).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let engine = EngineBuilder::new(cfg, Secrets::from_env()).build();

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();
    let token = shutdown.token();

    let mut thread_id = new_thread();
    if let Some(image) = &args.image {
        analyze_image(&engine, &thread_id, image).await?;
    }

    println!("Ask a follow-up question, `/new [image]` to start over, `/quit` to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = token.cancelled() => break,
            line = lines.next_line() => line.context("failed to read stdin")?,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if let Some(rest) = line.strip_prefix("/new") {
            thread_id = new_thread();
            println!("Started a new thread.");
            let image = rest.trim();
            if !image.is_empty() {
                if let Err(e) = analyze_image(&engine, &thread_id, Path::new(image)).await {
                    eprintln!("{e:#}");
                }
            }
            continue;
        }
        match engine.invoke(&thread_id, TurnInput::question(line)).await {
            Ok(output) => print_output(&output),
            Err(e) => eprintln!("{e}"),
        }
    }
    Ok(())
}
