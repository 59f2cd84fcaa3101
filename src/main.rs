use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cognisight::analysis::{
    Analyzer, AudioClip, ByteHeuristicExtractor, DecodedExtractor, LinearClassifier,
};
use cognisight::model::AnalysisResult;
use cognisight::report;
use cognisight::session::{DemoClip, PreviewRegistry, Session, SessionConfig, DISCLAIMER};
use cognisight::{AnalysisClient, AnalysisServer, ClientConfig, ServerConfig};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["wav", "webm", "mp3", "ogg", "oga", "flac", "m4a", "aac"];

#[derive(Parser, Debug)]
#[command(name = "cognisight")]
#[command(about = "Voice screening analysis service and client", long_about = None)]
struct Args {
    /// Verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the analysis endpoint
    Serve {
        /// Address to listen on
        #[arg(short = 'b', long, default_value = "127.0.0.1:3000")]
        bind: String,

        /// Worker threads
        #[arg(short = 'w', long, default_value = "4")]
        workers: usize,

        /// Upload limit in MiB
        #[arg(long, default_value = "25")]
        max_upload_mb: usize,

        /// Answer cross-origin requests from this origin
        #[arg(long)]
        allow_origin: Option<String>,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Analyze one clip, remotely or in-process
    Analyze {
        /// Audio file to analyze
        #[arg(required_unless_present = "demo")]
        file: Option<String>,

        /// Analyze a bundled demo clip instead of a file
        #[arg(long, conflicts_with = "file")]
        demo: Option<DemoArg>,

        /// Directory holding the demo clips
        #[arg(long, default_value = "public/demo")]
        demo_dir: String,

        /// Analysis endpoint (defaults to a local server)
        #[arg(short = 'e', long, default_value = "http://127.0.0.1:3000/api/process-audio")]
        endpoint: String,

        /// Give up on the endpoint after this many seconds
        #[arg(long, default_value = "120")]
        timeout_secs: u64,

        /// Run the analyzer in-process instead of calling the endpoint
        #[arg(long)]
        offline: bool,

        /// Upload under the file's own name instead of the default one
        #[arg(long)]
        keep_name: bool,

        /// Print the raw JSON result
        #[arg(long)]
        json: bool,

        /// Accept the screening disclaimer
        #[arg(long)]
        accept_disclaimer: bool,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Analyze every audio file under a directory in-process
    Batch {
        /// Directory to scan
        dir: String,

        /// Print one JSON object per line
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

#[derive(clap::Args, Debug)]
struct PipelineArgs {
    /// Feature extractor
    #[arg(long, value_enum, default_value = "bytes")]
    extractor: ExtractorArg,

    /// Linear model weights (JSON); the filename rules are used when absent
    #[arg(long)]
    model: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ExtractorArg {
    Bytes,
    Decoded,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DemoArg {
    HigherRisk,
    Healthy,
}

impl From<DemoArg> for DemoClip {
    fn from(arg: DemoArg) -> Self {
        match arg {
            DemoArg::HigherRisk => DemoClip::HigherRisk,
            DemoArg::Healthy => DemoClip::Healthy,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match args.command {
        Command::Serve {
            bind,
            workers,
            max_upload_mb,
            allow_origin,
            pipeline,
        } => {
            let mut config = ServerConfig::new(bind)
                .with_workers(workers)
                .with_max_upload_mb(max_upload_mb);
            if let Some(origin) = allow_origin {
                config = config.with_allow_origin(origin);
            }
            let server = AnalysisServer::bind(config, build_analyzer(&pipeline)?)?;
            server.run()
        }
        Command::Analyze {
            file,
            demo,
            demo_dir,
            endpoint,
            timeout_secs,
            offline,
            keep_name,
            json,
            accept_disclaimer,
            pipeline,
        } => {
            let target = AnalyzeTarget {
                file,
                demo: demo.map(DemoClip::from),
                demo_dir,
            };
            let backend = if offline {
                Backend::Offline(build_analyzer(&pipeline)?)
            } else {
                Backend::Remote(AnalysisClient::new(
                    ClientConfig::new(endpoint).with_timeout(Duration::from_secs(timeout_secs)),
                ))
            };
            run_analyze(target, backend, keep_name, json, accept_disclaimer)
        }
        Command::Batch {
            dir,
            json,
            pipeline,
        } => run_batch(&expand(&dir), &build_analyzer(&pipeline)?, json),
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn build_analyzer(args: &PipelineArgs) -> Result<Analyzer> {
    let mut analyzer = match args.extractor {
        ExtractorArg::Bytes => Analyzer::default().with_extractor(ByteHeuristicExtractor::new()),
        ExtractorArg::Decoded => Analyzer::default().with_extractor(DecodedExtractor::new()),
    };
    if let Some(model) = &args.model {
        analyzer = analyzer.with_classifier(LinearClassifier::from_file(&expand(model))?);
    }
    log::debug!("Analyzer pipeline: {}", analyzer.describe());
    Ok(analyzer)
}

struct AnalyzeTarget {
    file: Option<String>,
    demo: Option<DemoClip>,
    demo_dir: String,
}

enum Backend {
    Remote(AnalysisClient),
    Offline(Analyzer),
}

fn run_analyze(
    target: AnalyzeTarget,
    backend: Backend,
    keep_name: bool,
    json: bool,
    accept_disclaimer: bool,
) -> Result<()> {
    let config = SessionConfig::new().with_disclaimer_accepted(accept_disclaimer);
    let mut session = match Session::new(&config, PreviewRegistry::new()) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("{}\n", DISCLAIMER);
            bail!("{} (pass --accept-disclaimer)", e);
        }
    };

    let mut upload_name = None;
    if let Some(demo) = target.demo {
        if !session.select_demo(demo, &expand(&target.demo_dir)) {
            bail!("{}", session.error().unwrap_or("Demo clip not found"));
        }
    } else if let Some(file) = &target.file {
        let path = expand(file);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = file_name(&path);
        session.select_upload(&name, bytes, "application/octet-stream");
        if keep_name {
            upload_name = Some(name);
        }
    }

    let filename = upload_name.unwrap_or_else(|| session.upload_filename().to_string());
    log::info!("Analyzing {} bytes as {:?}", session.clip().len(), filename);

    let outcome = match &backend {
        Backend::Remote(client) => client.analyze_named(session.clip(), &filename, None),
        Backend::Offline(analyzer) => Ok(analyzer.analyze(&AudioClip::new(session.clip(), &filename))),
    };

    if session.record_result(outcome).is_err() {
        bail!("{}", session.error().unwrap_or("Analysis failed"));
    }

    match session.result() {
        Some(result) => {
            let source = session.source().map(|s| s.label()).unwrap_or("clip");
            print_result(result, source, session.explanation(), json)?;
        }
        None => print!("{}", report::format_placeholder()),
    }
    Ok(())
}

fn print_result(
    result: &AnalysisResult,
    source: &str,
    explanation: Option<&str>,
    json: bool,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print!("{}", report::format_result(result, source, explanation));
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn collect_audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Not a directory: {}", dir.display());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn run_batch(dir: &Path, analyzer: &Analyzer, json: bool) -> Result<()> {
    let files = collect_audio_files(dir)?;
    log::info!("Found {} audio file(s) under {}", files.len(), dir.display());

    let results: Vec<(PathBuf, Result<AnalysisResult>)> = files
        .into_par_iter()
        .map(|path| {
            let outcome = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))
                .map(|bytes| analyzer.analyze(&AudioClip::new(&bytes, &file_name(&path))));
            (path, outcome)
        })
        .collect();

    let mut failed = 0;
    for (path, outcome) in &results {
        match outcome {
            Ok(result) if json => {
                let line = serde_json::json!({ "file": path, "result": result });
                println!("{}", line);
            }
            Ok(result) => println!("{}", report::format_line(result, &path.display().to_string())),
            Err(e) => {
                failed += 1;
                log::warn!("{:#}", e);
            }
        }
    }

    log::info!("Analyzed {} file(s), {} failed", results.len() - failed, failed);
    Ok(())
}
