use anyhow::{bail, Context, Error};
use clap::Parser;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use earnings_signals::logging::LogFormat;
use earnings_signals::pdftext::{self, PageLayout};
use earnings_signals::{
    build_classifier, logging, narrative, store, AnalyzerConfig, Classifier, QuarterId, RawTranscript,
    TickerPipeline,
};

/// Segment a ticker's earnings-call transcripts and report sentiment and
/// strategic-focus signals quarter over quarter.
#[derive(Debug, Parser)]
#[command(name = "earnings_signals", version)]
struct Args {
    /// Ticker symbol, e.g. NVDA.
    #[arg(long)]
    ticker: String,

    /// Directory holding `{TICKER}_{YYYYQ#}.txt` transcripts and the report.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only analyse the N most recent calendar quarters.
    #[arg(long)]
    last: Option<usize>,

    /// Also ask the classifier for a narrative reading of each section.
    #[arg(long)]
    narrate: bool,

    /// Extract a PDF transcript into the data directory before analysing.
    #[arg(long, requires = "quarter")]
    pdf: Option<PathBuf>,

    /// Quarter (YYYYQ#) of the transcript given with --pdf.
    #[arg(long)]
    quarter: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init(LogFormat::from_env(), args.verbose);

    let config = AnalyzerConfig::load(args.config.as_deref()).context("loading configuration")?;
    let classifier: Arc<dyn Classifier> = Arc::from(
        build_classifier(&config.classifier).context("building classifier backend")?,
    );

    if let (Some(pdf), Some(quarter)) = (&args.pdf, &args.quarter) {
        let quarter: QuarterId = quarter.parse()?;
        let text = pdftext::extract_text(pdf, &PageLayout::default())
            .with_context(|| format!("reading {}", pdf.display()))?;
        let path = store::save_transcript(&args.data_dir, &args.ticker, quarter, &text)?;
        info!(path = %path.display(), "stored pdf transcript");
    }

    let mut transcripts = store::load_transcripts(&args.data_dir, &args.ticker)
        .with_context(|| format!("loading transcripts from {}", args.data_dir.display()))?;
    if let Some(n) = args.last {
        let wanted = QuarterId::last_n(chrono::Local::now().date_naive(), n);
        transcripts.retain(|quarter, _| wanted.contains(quarter));
    }
    if transcripts.is_empty() {
        bail!("no transcripts for {} in {}", args.ticker, args.data_dir.display());
    }

    let mut pipeline = TickerPipeline::from_config(&args.ticker, Arc::clone(&classifier), &config);
    let report = pipeline.run(transcripts.iter().map(|(quarter, text)| (quarter.to_string(), text)))?;
    let path = store::save_report(&args.data_dir, pipeline.ticker(), &report)?;
    info!(path = %path.display(), "saved report");

    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.narrate {
        let mut narratives = BTreeMap::new();
        for (quarter, text) in &transcripts {
            let transcript = pipeline.segment(text);
            let body = RawTranscript::detect(text).text;
            let management = narrative::analyze_section(classifier.as_ref(), "Prepared Remarks", &transcript.prepared_remarks);
            let qa = narrative::analyze_section(classifier.as_ref(), "Q&A", &transcript.qanda);
            let overall = narrative::analyze_long(classifier.as_ref(), &body);
            let focuses = narrative::model_focuses(classifier.as_ref(), &body);
            if management.is_empty() && qa.is_empty() && overall.is_empty() {
                warn!(%quarter, classifier = classifier.name(), "no narrative produced");
            }
            narratives.insert(
                quarter.to_string(),
                json!({ "management": management, "qa": qa, "overall": overall, "model_focuses": focuses }),
            );
        }
        println!("{}", serde_json::to_string_pretty(&narratives)?);
    }

    Ok(())
}
