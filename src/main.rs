//! Distill - 迭代式文本到 JSON 抽取智能体
//!
//! 入口：初始化日志、加载配置、读取输入文本与可选 schema，运行抽取并打印结果 JSON。
//!
//! 用法：
//!   distill --text "John Doe is 29 years old."
//!   distill --file report.txt --schema schema.json
//!   distill --file report.txt --max-iterations 10 --config custom.toml

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use distill::config::load_config;
use distill::llm::OpenAiClient;
use distill::Extractor;

struct CliArgs {
    text: Option<String>,
    file: Option<PathBuf>,
    schema: Option<PathBuf>,
    config: Option<PathBuf>,
    max_iterations: Option<usize>,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut args = CliArgs {
        text: None,
        file: None,
        schema: None,
        config: None,
        max_iterations: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--text" => args.text = Some(iter.next().context("--text requires a value")?),
            "--file" => args.file = Some(PathBuf::from(iter.next().context("--file requires a path")?)),
            "--schema" => {
                args.schema = Some(PathBuf::from(iter.next().context("--schema requires a path")?))
            }
            "--config" => {
                args.config = Some(PathBuf::from(iter.next().context("--config requires a path")?))
            }
            "--max-iterations" => {
                args.max_iterations = Some(
                    iter.next()
                        .context("--max-iterations requires a number")?
                        .parse()
                        .context("--max-iterations must be a positive integer")?,
                )
            }
            "--help" | "-h" => {
                println!(
                    "Usage: distill (--text TEXT | --file PATH) [--schema PATH] [--config PATH] [--max-iterations N]"
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = parse_args()?;

    let text = match (&args.text, &args.file) {
        (Some(text), None) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {}", path.display()))?,
        (Some(_), Some(_)) => bail!("--text and --file are mutually exclusive"),
        (None, None) => bail!("one of --text or --file is required (see --help)"),
    };

    let target_schema = match &args.schema {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read schema file {}", path.display()))?;
            Some(serde_json::from_str(&raw).context("schema file is not valid JSON")?)
        }
        None => None,
    };

    let mut config = load_config(args.config).context("failed to load configuration")?;
    if let Some(n) = args.max_iterations {
        config.agent.max_iterations_per_chunk = n;
    }

    let oracle = Arc::new(OpenAiClient::new(
        config.llm.base_url.as_deref(),
        &config.llm.model,
        None,
    ));
    let output = Extractor::new(config, oracle)
        .extract(&text, target_schema)
        .await
        .context("extraction failed")?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
