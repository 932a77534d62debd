//! Engram CLI
//!
//! Operator surface for the associative memory engine. Every command takes
//! the neuron/synapse/session fields literally and prints either colored
//! human output or machine-readable JSON (`--json`).
//!
//! Exit codes: 0 on success, 1 on engine error, 2 on argument error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use engram_core::{
    Engine, EngineOptions, Neuron, NeuronType, RecallResult, SeedBatch, SnippetRecord, Synapse,
    TypeFilter,
};

/// Neuron type as a CLI argument
///
/// A separate enum so clap validates the value itself: a bad `--type` is an
/// argument error (exit 2), never an engine error (exit 1).
#[derive(Debug, Clone, Copy, ValueEnum)]
enum NeuronTypeArg {
    File,
    Tool,
    Error,
    Semantic,
}

impl From<NeuronTypeArg> for NeuronType {
    fn from(arg: NeuronTypeArg) -> Self {
        match arg {
            NeuronTypeArg::File => NeuronType::File,
            NeuronTypeArg::Tool => NeuronType::Tool,
            NeuronTypeArg::Error => NeuronType::Error,
            NeuronTypeArg::Semantic => NeuronType::Semantic,
        }
    }
}

/// Engram - associative memory for AI coding agents
#[derive(Parser)]
#[command(name = "engram")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the Engram associative memory engine")]
#[command(
    long_about = "Engram observes an agent's tool calls and proposes relevant files, tools,\n\
                  and error fixes through Hebbian learning and spreading activation."
)]
struct Cli {
    /// Database path (overrides ENGRAM_DB_PATH and the platform default)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    json: bool,

    /// Disable the embedding model for this invocation
    #[arg(long, global = true)]
    no_embed: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one observation
    Record {
        /// File path, tool name, or concept key
        path: String,
        /// Neuron type
        #[arg(long = "type", value_enum, default_value = "file")]
        neuron_type: NeuronTypeArg,
        /// Query or context that triggered the observation
        #[arg(long)]
        query: Option<String>,
    },

    /// Record an error occurrence and list candidate fixes
    Error {
        /// Raw error text
        raw: String,
        /// Query or context active when the error occurred
        #[arg(long)]
        query: Option<String>,
    },

    /// Wire an error to the files that fixed it
    Resolve {
        /// Raw error text
        raw: String,
        /// Fix file path (repeatable)
        #[arg(long = "fix", required = true)]
        fixes: Vec<String>,
        /// Context note
        #[arg(long)]
        context: Option<String>,
    },

    /// Recall relevant neurons for a query
    Recall {
        query: String,
        /// Token budget for emitted results
        #[arg(long, default_value = "10000")]
        budget: i64,
        /// Maximum results
        #[arg(long, default_value = "5")]
        limit: usize,
        /// Restrict to a neuron type
        #[arg(long = "type", value_enum)]
        neuron_type: Option<NeuronTypeArg>,
    },

    /// Recall using only the episodic access log
    RecallEpisodic {
        query: String,
        #[arg(long, default_value = "5")]
        limit: usize,
    },

    /// Show memory statistics
    Stats,

    /// List neurons, most recently touched first
    Neurons {
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// List synapses, strongest first
    Synapses {
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// List myelinated superhighways
    Highways {
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Token accounting across sessions
    Tokens,

    /// Run the maintenance cycle (decay, pruning, homeostasis)
    Decay,

    /// Run homeostatic scaling on its own
    Homeostasis,

    /// Run the sleep-consolidation pass
    Consolidate,

    /// Predict the next tools and likely files
    Predict {
        /// Tool to predict from (defaults to the last recorded tool)
        #[arg(long)]
        tool: Option<String>,
    },

    /// Show the recent tool chain and strongest tool sequences
    Chain {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Neurons with the highest out-degree
    Hubs {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Myelinated neurons going stale
    Stale {
        #[arg(long, default_value = "0.3")]
        min_myelination: f64,
        #[arg(long, default_value = "14")]
        days: i64,
    },

    /// List project tags
    Projects,

    /// Tag every file under a root with a project name
    TagProject {
        root: String,
        name: String,
    },

    /// Set the current session's intent
    Intent {
        text: String,
    },

    /// List sessions, newest first
    Sessions {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Show anti-recall streaks and session sets
    Streaks,

    /// Seed the graph from a bootstrap JSON file (SeedBatch array)
    Bootstrap {
        /// JSON file produced by a bootstrap collaborator
        file: PathBuf,
    },

    /// Back-fill missing neuron and snippet embeddings
    Embed {
        #[arg(long, default_value = "100")]
        limit: usize,
    },

    /// Ingest externally-extracted snippets (SnippetRecord array JSON)
    ExtractSnippets {
        /// JSON file produced by the snippet extractor
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut engine = Engine::with_options(EngineOptions {
        db_path: cli.db.clone(),
        enable_embeddings: !cli.no_embed,
        ..Default::default()
    })?;
    let json = cli.json;

    match cli.command {
        Commands::Record {
            path,
            neuron_type,
            query,
        } => {
            let neuron = engine.record(&path, neuron_type.into(), query.as_deref(), None)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&neuron)?);
            } else {
                println!("{} {}", "recorded".green().bold(), neuron.id);
                print_neuron(&neuron);
            }
        }

        Commands::Error { raw, query } => {
            let (neuron, fixes) = engine.record_error(&raw, query.as_deref(), None)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "errorNeuron": neuron,
                        "potentialFixes": fixes,
                    }))?
                );
            } else {
                println!("{} {}", "error neuron".red().bold(), neuron.path);
                if fixes.is_empty() {
                    println!("{}", "no candidate fixes yet".dimmed());
                } else {
                    println!("{}", "candidate fixes:".white().bold());
                    print_results(&fixes);
                }
            }
        }

        Commands::Resolve {
            raw,
            fixes,
            context,
        } => {
            engine.resolve_error(&raw, &fixes, context.as_deref())?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({"resolved": true, "fixes": fixes})
                );
            } else {
                println!(
                    "{} error wired to {} fix file(s)",
                    "resolved".green().bold(),
                    fixes.len()
                );
            }
        }

        Commands::Recall {
            query,
            budget,
            limit,
            neuron_type,
        } => {
            let filter = match neuron_type {
                Some(t) => TypeFilter::Only(t.into()),
                None => TypeFilter::Any,
            };
            let results = engine.recall_with(&query, budget, limit, filter)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("{}", "no recall found".dimmed());
            } else {
                print_results(&results);
            }
        }

        Commands::RecallEpisodic { query, limit } => {
            let results = engine.recall_episodic(&query, limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("{}", "no episodic matches".dimmed());
            } else {
                print_results(&results);
            }
        }

        Commands::Stats => {
            let stats = engine.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", "=== Engram Memory Statistics ===".cyan().bold());
                println!();
                println!("{}: {}", "Neurons".white().bold(), stats.total_neurons);
                println!(
                    "  {} file, {} tool, {} error, {} semantic",
                    stats.file_neurons, stats.tool_neurons, stats.error_neurons,
                    stats.semantic_neurons
                );
                println!("{}: {}", "Synapses".white().bold(), stats.total_synapses);
                println!(
                    "{}: {:.3}",
                    "Average weight".white().bold(),
                    stats.average_weight
                );
                println!(
                    "{}: {:.3}",
                    "Average myelination".white().bold(),
                    stats.average_myelination
                );
                println!(
                    "{}: {}",
                    "Superhighways".white().bold(),
                    stats.superhighways
                );
                println!(
                    "{}: {}",
                    "Tagged synapses".white().bold(),
                    stats.tagged_synapses
                );
                println!(
                    "{}: {}",
                    "Access log rows".white().bold(),
                    stats.access_log_rows
                );
                println!("{}: {}", "Sessions".white().bold(), stats.sessions);
                println!("{}: {}", "Snippets".white().bold(), stats.snippets);
                println!(
                    "{}: {}",
                    "With embeddings".white().bold(),
                    stats.neurons_with_embeddings
                );
            }
        }

        Commands::Neurons { limit, offset } => {
            let neurons = engine.store().all_neurons(limit, offset)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&neurons)?);
            } else {
                for neuron in &neurons {
                    print_neuron_row(neuron);
                }
            }
        }

        Commands::Synapses { limit, offset } => {
            let synapses = engine.store().strongest_synapses(limit, offset)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&synapses)?);
            } else {
                for synapse in &synapses {
                    print_synapse_row(synapse);
                }
            }
        }

        Commands::Highways { limit } => {
            let highways = engine.highways(limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&highways)?);
            } else if highways.is_empty() {
                println!("{}", "no superhighways yet".dimmed());
            } else {
                for neuron in &highways {
                    println!(
                        "{:.3}  {}",
                        neuron.myelination,
                        neuron.path.cyan()
                    );
                }
            }
        }

        Commands::Tokens => {
            let report = engine.token_report()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", "=== Token Report ===".cyan().bold());
                println!("{}: {}", "Used".white().bold(), report.tokens_used);
                println!("{}: {}", "Saved".white().bold(), report.tokens_saved);
                let net = format!("{}", report.net);
                println!(
                    "{}: {}",
                    "Net".white().bold(),
                    if report.net >= 0 { net.green() } else { net.red() }
                );
                println!(
                    "{}: {}",
                    "Sessions".white().bold(),
                    report.sessions_counted
                );
            }
        }

        Commands::Decay => {
            let report = engine.decay()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", "=== Maintenance ===".cyan().bold());
                println!("neurons decayed: {}", report.neurons_decayed);
                println!("synapses decayed: {}", report.synapses_decayed);
                println!("noise bridges weakened: {}", report.noise_bridges_weakened);
                println!("synapses pruned: {}", report.synapses_pruned);
                println!("dead neurons pruned: {}", report.dead_neurons_pruned);
                println!("orphan files pruned: {}", report.orphan_files_pruned);
                println!("took {} ms", report.duration_ms);
            }
        }

        Commands::Homeostasis => {
            let report = engine.homeostasis()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", "=== Homeostasis ===".cyan().bold());
                match report.myelination_scale {
                    Some(ratio) => println!("myelination scaled by {:.3}", ratio),
                    None => println!("myelination within target"),
                }
                match report.weight_scale {
                    Some(ratio) => println!("weights scaled by {:.3}", ratio),
                    None => println!("weights within target"),
                }
                println!("hyperactive penalized: {}", report.hyperactive_penalized);
                println!("underactive boosted: {}", report.underactive_boosted);
                println!("tags expired: {}", report.tags_expired);
            }
        }

        Commands::Consolidate => {
            let report = engine.consolidate()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", "=== Consolidation ===".cyan().bold());
                println!("sessions replayed: {}", report.sessions_replayed);
                println!("replay reinforcements: {}", report.replay_reinforced);
                println!(
                    "reviews: {} boosted, {} faded",
                    report.reviews_boosted, report.reviews_faded
                );
                println!(
                    "cross-session edges: {} created, {} reinforced",
                    report.cross_session_created, report.cross_session_reinforced
                );
                println!(
                    "temporal edges: {} created, {} reinforced",
                    report.temporal_created, report.temporal_reinforced
                );
                println!("directional boosts: {}", report.directional_boosted);
                println!("triplets closed: {}", report.triplets_closed);
                println!("access rows pruned: {}", report.access_rows_pruned);
                println!("took {} ms", report.duration_ms);
            }
        }

        Commands::Predict { tool } => {
            let prediction = engine.predict_next(tool.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&prediction)?);
            } else if prediction.next_tools.is_empty() && prediction.likely_files.is_empty() {
                println!("{}", "no prediction available".dimmed());
            } else {
                println!("{}", "next tools:".white().bold());
                for (name, score) in &prediction.next_tools {
                    println!("  {:.2}  {}", score, name.yellow());
                }
                println!("{}", "likely files:".white().bold());
                for (path, score) in &prediction.likely_files {
                    println!("  {:.2}  {}", score, path.cyan());
                }
            }
        }

        Commands::Chain { limit } => {
            let chain = engine.tool_chain();
            let sequences = engine.store().tool_sequences(limit)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "currentChain": chain,
                        "strongestSequences": sequences,
                    }))?
                );
            } else {
                println!("{}", "current tool chain:".white().bold());
                if chain.is_empty() {
                    println!("  {}", "(empty)".dimmed());
                } else {
                    println!("  {}", chain.join(" → "));
                }
                println!("{}", "strongest sequences:".white().bold());
                for synapse in &sequences {
                    print_synapse_row(synapse);
                }
            }
        }

        Commands::Hubs { limit } => {
            let hubs = engine.get_hubs(limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hubs)?);
            } else {
                for hub in &hubs {
                    println!(
                        "{} ({} outgoing)",
                        hub.neuron.path.cyan().bold(),
                        hub.out_degree
                    );
                    for (target, weight) in &hub.strongest {
                        println!("  {:.3}  {}", weight, target);
                    }
                }
            }
        }

        Commands::Stale {
            min_myelination,
            days,
        } => {
            let stale = engine.detect_stale(min_myelination, days)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stale)?);
            } else if stale.is_empty() {
                println!("{}", "no stale pathways".dimmed());
            } else {
                for s in &stale {
                    println!(
                        "{}  idle {}d  myelination {:.3} → {:.3}",
                        s.neuron.path.cyan(),
                        s.days_idle,
                        s.neuron.myelination,
                        s.projected_myelination
                    );
                }
            }
        }

        Commands::Projects => {
            let projects = engine.list_projects()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&projects)?);
            } else if projects.is_empty() {
                println!("{}", "no project tags".dimmed());
            } else {
                for (name, count) in &projects {
                    println!("{}  {} neuron(s)", name.cyan().bold(), count);
                }
            }
        }

        Commands::TagProject { root, name } => {
            let tagged = engine.tag_project(&root, &name)?;
            if json {
                println!("{}", serde_json::json!({"project": name, "tagged": tagged}));
            } else {
                println!(
                    "{} {} file neuron(s) as {}",
                    "tagged".green().bold(),
                    tagged,
                    name.cyan()
                );
            }
        }

        Commands::Intent { text } => {
            engine.set_session_intent(&text)?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({"sessionId": engine.session_id(), "intent": text})
                );
            } else {
                println!("{} session intent set", "ok".green().bold());
            }
        }

        Commands::Sessions { limit } => {
            let sessions = engine.store().list_sessions(limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else {
                for session in &sessions {
                    let status = match session.ended_at {
                        Some(_) => "ended".dimmed(),
                        None => "open".green(),
                    };
                    println!(
                        "{}  {}  {}  {} accesses, {:.0}% hit rate, intent: {}",
                        session.id[..8.min(session.id.len())].yellow(),
                        session.started_at.format("%Y-%m-%d %H:%M"),
                        status,
                        session.total_accesses,
                        session.hit_rate * 100.0,
                        session.intent.as_deref().unwrap_or("-")
                    );
                }
            }
        }

        Commands::Streaks => {
            let state = engine.get_anti_recall_state()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                println!("{}: {}", "session".white().bold(), state.session_id);
                println!("recalled this session: {}", state.recalled.len());
                println!("opened this session: {}", state.opened.len());
                println!("currently ignored: {}", state.ignored.len());
                if !state.streaks.is_empty() {
                    println!("{}", "ignore streaks:".white().bold());
                    for (id, streak) in &state.streaks {
                        println!("  {}  {}", streak, id);
                    }
                }
            }
        }

        Commands::Bootstrap { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let batches: Vec<SeedBatch> = match serde_json::from_str::<Vec<SeedBatch>>(&raw) {
                Ok(batches) => batches,
                Err(_) => vec![serde_json::from_str::<SeedBatch>(&raw)?],
            };
            let mut neurons = 0;
            let mut synapses = 0;
            for batch in &batches {
                let (n, s) = engine.apply_seed_batch(batch)?;
                neurons += n;
                synapses += s;
            }
            if json {
                println!(
                    "{}",
                    serde_json::json!({"batches": batches.len(), "neurons": neurons, "synapses": synapses})
                );
            } else {
                println!(
                    "{} {} batch(es): {} neurons, {} synapses",
                    "seeded".green().bold(),
                    batches.len(),
                    neurons,
                    synapses
                );
            }
        }

        Commands::Embed { limit } => {
            #[cfg(feature = "embeddings")]
            {
                let (neurons, snippets) = engine.embed_pending(limit)?;
                if json {
                    println!(
                        "{}",
                        serde_json::json!({"neurons": neurons, "snippets": snippets})
                    );
                } else {
                    println!(
                        "{} {} neuron(s), {} snippet(s)",
                        "embedded".green().bold(),
                        neurons,
                        snippets
                    );
                }
            }
            #[cfg(not(feature = "embeddings"))]
            {
                let _ = limit;
                anyhow::bail!("built without the embeddings feature");
            }
        }

        Commands::ExtractSnippets { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let records: Vec<SnippetRecord> = serde_json::from_str(&raw)?;
            let ingested = engine.ingest_snippets(&records)?;
            if json {
                println!("{}", serde_json::json!({"ingested": ingested}));
            } else {
                println!("{} {} snippet(s)", "ingested".green().bold(), ingested);
            }
        }
    }

    Ok(())
}

// ============================================================================
// HELPERS
// ============================================================================

fn print_neuron(neuron: &Neuron) {
    println!(
        "  type {}  activation {:.2}  myelination {:.3}  accesses {}",
        neuron.neuron_type, neuron.activation, neuron.myelination, neuron.access_count
    );
    if !neuron.contexts.is_empty() {
        println!("  contexts: {}", neuron.contexts.join(", ").dimmed());
    }
}

fn print_neuron_row(neuron: &Neuron) {
    let marker = if neuron.is_superhighway() {
        "★".yellow().to_string()
    } else {
        " ".to_string()
    };
    println!(
        "{} {:.3}  {:<9} {}",
        marker,
        neuron.myelination,
        neuron.neuron_type.to_string().dimmed(),
        neuron.path.cyan()
    );
}

fn print_synapse_row(synapse: &Synapse) {
    let tag = if synapse.tagged_at.is_some() {
        " [tagged]".yellow().to_string()
    } else {
        String::new()
    };
    println!(
        "{:.3}  {} → {} (co-access {}){}",
        synapse.weight,
        synapse.source_id,
        synapse.target_id.cyan(),
        synapse.co_access_count,
        tag
    );
}

fn print_results(results: &[RecallResult]) {
    for result in results {
        println!(
            "{:.2}  {}  {}",
            result.confidence,
            result.neuron.path.cyan().bold(),
            format!("[{}]", result.activation_path).dimmed()
        );
        for snippet in &result.snippets {
            println!(
                "      {} {} (lines {}-{}, {:.2})",
                snippet.kind.as_str().dimmed(),
                snippet.name,
                snippet.start_line,
                snippet.end_line,
                snippet.similarity
            );
        }
    }
}
