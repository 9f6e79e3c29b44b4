use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use geo_audit_core::{
    build_client, load_client_list, run_batch, AgencyConfig, AgencyWorkspace, Auditor,
    CompetitorAnalysis, CompetitorResearcher, ComparisonEngine, FileReportRenderer,
    HallucinationChecker, LlmClient, LlmSettings, OutputFormat, PerplexitySearch, RenderPayload,
    ReportRenderer, Severity, VisibilityBand, LOG_ROTATE_BYTES,
};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "geo-audit",
    author,
    version,
    about = "Generative engine visibility audits"
)]
struct Cli {
    /// TOML configuration file; environment variables override its values
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Audit one brand and write its report
    Audit {
        #[arg(long)]
        brand: String,
        #[arg(long)]
        niche: String,
        /// Competitors to research for the landscape section
        #[arg(long, value_delimiter = ',')]
        competitors: Vec<String>,
        #[arg(long, value_enum, default_value_t = FormatArg::Human)]
        format: FormatArg,
        /// Request schema-guided output from the provider
        #[arg(long)]
        schema: bool,
    },
    /// Audit two brands and write a head-to-head battle report
    Compare {
        #[arg(long = "brand-a")]
        brand_a: String,
        #[arg(long = "brand-b")]
        brand_b: String,
        #[arg(long)]
        niche: String,
        #[arg(long, value_enum, default_value_t = FormatArg::Human)]
        format: FormatArg,
    },
    /// Check an AI statement against a ground-truth document
    Verify {
        #[arg(long)]
        statement: String,
        #[arg(long = "ground-truth", value_name = "FILE")]
        ground_truth: PathBuf,
        /// Emit findings as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
    /// Research a brand's competitive landscape
    Research {
        #[arg(long)]
        brand: String,
        #[arg(long, value_delimiter = ',', required = true)]
        competitors: Vec<String>,
        #[arg(long)]
        niche: String,
        #[arg(long)]
        json: bool,
    },
    /// Audit every client in a list stored under the data directory
    Batch {
        #[arg(long, default_value = "clients.json")]
        clients: String,
        #[arg(long, value_enum, default_value_t = FormatArg::Human)]
        format: FormatArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Human,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Human => OutputFormat::Human,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let workspace = config.initialize()?;
    init_tracing(&workspace)?;
    for dir in workspace.created_dirs() {
        info!(path = %dir.display(), "created directory");
    }

    match cli.command {
        Commands::Audit {
            brand,
            niche,
            competitors,
            format,
            schema,
        } => {
            audit(
                &config,
                &workspace,
                &brand,
                &niche,
                &competitors,
                format.into(),
                schema,
            )
            .await?
        }
        Commands::Compare {
            brand_a,
            brand_b,
            niche,
            format,
        } => compare(&config, &workspace, &brand_a, &brand_b, &niche, format.into()).await?,
        Commands::Verify {
            statement,
            ground_truth,
            json,
        } => verify(&config, &statement, &ground_truth, json).await?,
        Commands::Research {
            brand,
            competitors,
            niche,
            json,
        } => {
            let analysis = research(&config, &brand, &competitors, &niche).await?;
            print_analysis(&analysis, json)?;
        }
        Commands::Batch { clients, format } => {
            batch(&config, &workspace, &clients, format.into()).await?
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AgencyConfig> {
    let mut config = match path {
        Some(path) => config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .with_context(|| format!("failed to read config file {}", path.display()))?
            .try_deserialize::<AgencyConfig>()
            .with_context(|| format!("invalid configuration in {}", path.display()))?,
        None => AgencyConfig::default(),
    };
    config.apply_env(&env::vars().collect());
    Ok(config)
}

fn init_tracing(workspace: &AgencyWorkspace) -> Result<()> {
    let log_file = workspace.open_log_file(LOG_ROTATE_BYTES)?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .try_init();
    Ok(())
}

fn llm_client(settings: &LlmSettings) -> Result<Arc<dyn LlmClient>> {
    let client = build_client(settings)
        .with_context(|| format!("failed to configure provider `{}`", settings.provider))?;
    Ok(Arc::from(client))
}

async fn audit(
    config: &AgencyConfig,
    workspace: &AgencyWorkspace,
    brand: &str,
    niche: &str,
    competitors: &[String],
    format: OutputFormat,
    schema: bool,
) -> Result<()> {
    let auditor =
        Auditor::new(llm_client(&config.llm)?, config.llm.model_id()).with_schema_mode(schema);
    let report = auditor
        .audit(brand, niche)
        .await
        .with_context(|| format!("audit of {brand} failed"))?;

    let mut payload = RenderPayload::from(&report).with_report_key(brand);
    if !competitors.is_empty() {
        match research(config, brand, competitors, niche).await {
            Ok(analysis) => payload = payload.with_competitors(&analysis),
            Err(err) => warn!(error = %format!("{err:#}"), "competitor research failed; rendering without landscape"),
        }
    }

    let path = FileReportRenderer::new(workspace, format)
        .render_audit(&payload)
        .await?;
    println!("Audit: {}", report.brand_name);
    println!(
        "AI Visibility: {}",
        score_label(report.visibility_score)
    );
    for rec in &report.recommendations {
        println!("  - {rec}");
    }
    println!("Report written to {}", path.display());
    Ok(())
}

async fn compare(
    config: &AgencyConfig,
    workspace: &AgencyWorkspace,
    brand_a: &str,
    brand_b: &str,
    niche: &str,
    format: OutputFormat,
) -> Result<()> {
    let client = llm_client(&config.llm)?;
    let model = config.llm.model_id();
    let auditor = Auditor::new(Arc::clone(&client), model.clone());
    let report_a = auditor
        .audit(brand_a, niche)
        .await
        .with_context(|| format!("audit of {brand_a} failed"))?;
    let report_b = auditor
        .audit(brand_b, niche)
        .await
        .with_context(|| format!("audit of {brand_b} failed"))?;

    let comparison = ComparisonEngine::new(client, model)
        .compare(report_a, report_b, niche)
        .await
        .context("comparison failed")?;

    let payload_a = RenderPayload::from(comparison.brand_a()).with_report_key(brand_a);
    let payload_b = RenderPayload::from(comparison.brand_b()).with_report_key(brand_b);
    let path = FileReportRenderer::new(workspace, format)
        .render_battle(
            &payload_a,
            &payload_b,
            comparison.market_niche(),
            comparison.winner_summary(),
        )
        .await?;

    for side in [comparison.brand_a(), comparison.brand_b()] {
        println!("{:<30} {}", side.brand_name, score_label(side.visibility_score));
    }
    println!("Verdict: {}", comparison.winner_summary());
    println!("Report written to {}", path.display());
    Ok(())
}

async fn verify(
    config: &AgencyConfig,
    statement: &str,
    ground_truth: &Path,
    json: bool,
) -> Result<()> {
    let truth = fs::read_to_string(ground_truth)
        .with_context(|| format!("failed to read ground truth at {}", ground_truth.display()))?;
    let checker = HallucinationChecker::new(llm_client(&config.llm)?, config.llm.model_id());
    let findings = checker
        .verify(statement, &truth)
        .await
        .context("verification failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&findings)?);
        return Ok(());
    }
    if findings.is_empty() {
        println!("{}", "No discrepancies found.".green());
        return Ok(());
    }
    println!("{} discrepancy(ies) found:", findings.len());
    for finding in findings {
        let severity = match finding.severity {
            Some(Severity::High) => "HIGH".red().bold().to_string(),
            Some(Severity::Low) => "LOW".yellow().to_string(),
            None => "UNRATED".normal().to_string(),
        };
        println!("- [{severity}] {}", finding.fact);
        if !finding.correction.is_empty() {
            println!("    Correction: {}", finding.correction);
        }
    }
    Ok(())
}

async fn research(
    config: &AgencyConfig,
    brand: &str,
    competitors: &[String],
    niche: &str,
) -> Result<CompetitorAnalysis> {
    let settings = config.research_settings();
    let search = Arc::new(PerplexitySearch::new(&config.search)?);
    let researcher = CompetitorResearcher::new(search, llm_client(settings)?, settings.model_id());
    let analysis = researcher
        .compare_brands(brand, competitors, niche)
        .await
        .context("competitor research failed")?;
    Ok(analysis)
}

fn print_analysis(analysis: &CompetitorAnalysis, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(analysis)?);
        return Ok(());
    }
    println!("Market: {}", analysis.market_query);
    for (rank, entry) in analysis.leaderboard.iter().enumerate() {
        println!(
            "{rank:>2}. {name:<30} citations {count:>4}  sentiment {sentiment:>3.0}%",
            rank = rank + 1,
            name = entry.brand_name,
            count = entry.citation_count,
            sentiment = entry.sentiment_score * 100.0
        );
    }
    if !analysis.citation_gaps.is_empty() {
        println!("Citation gaps:");
        for gap in &analysis.citation_gaps {
            println!("  - {gap}");
        }
    }
    Ok(())
}

async fn batch(
    config: &AgencyConfig,
    workspace: &AgencyWorkspace,
    clients: &str,
    format: OutputFormat,
) -> Result<()> {
    let records = load_client_list(workspace, clients)?;
    info!(clients = records.len(), "starting batch");
    let auditor = Auditor::new(llm_client(&config.llm)?, config.llm.model_id());
    let renderer = FileReportRenderer::new(workspace, format);
    let summary = run_batch(&auditor, &renderer, &records).await;

    println!(
        "Batch complete: {} succeeded, {} failed",
        summary.succeeded.to_string().green(),
        summary.failed.len().to_string().red()
    );
    for failure in &summary.failed {
        println!("  - {}: {}", failure.brand_name, failure.reason);
    }
    Ok(())
}

fn score_label(score: f64) -> String {
    let band = VisibilityBand::from_score(score);
    let text = format!("{score:.1}% ({})", band.label());
    match band {
        VisibilityBand::Strong => text.green().bold().to_string(),
        VisibilityBand::AtRisk => text.red().bold().to_string(),
    }
}
