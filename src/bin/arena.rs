#![forbid(unsafe_code)]

use std::sync::Arc;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use idea_arena::gateway::ProviderGateway;
use idea_arena::judge::{Anonymizer, Comparator, Judge, LlmAnonymizer, LlmComparator, LlmJudge};
use idea_arena::matcher::{run_auto_match, MatchScheduler};
use idea_arena::model::{EvaluateRequest, Language, DEFAULT_MATCH_TARGET};
use idea_arena::store::{IdeaStore, SqliteIdeaStore};
use idea_arena::{compare, leaderboard, pipeline};

const DEFAULT_MODEL: &str = "google/gemini-3.1-pro-preview";

#[derive(Parser)]
#[command(name = "arena", version, about = "Idea arena CLI")]
struct Cli {
    /// SQLite database path (default: $ARENA_DB_PATH or .arena.sqlite)
    #[arg(long, global = true)]
    db: Option<std::path::PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Judge an idea and admit it to the ranked pool when viable
    Evaluate {
        /// Idea text; omit when re-evaluating with --idea-id
        #[arg(long, default_value = "")]
        text: String,
        /// Re-evaluate an existing idea
        #[arg(long)]
        idea_id: Option<Uuid>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        stage: Option<String>,
        #[arg(long)]
        user: Option<Uuid>,
        /// Make the idea visible (anonymized) on the public leaderboard
        #[arg(long)]
        public: bool,
        /// Response language for the judge (en or zh)
        #[arg(long, default_value = "en")]
        language: String,
        /// Skip the background auto-match run after admission
        #[arg(long)]
        no_match: bool,
    },
    /// Run one head-to-head match between two rated ideas
    Compare {
        #[arg(long)]
        idea_a: Uuid,
        #[arg(long)]
        idea_b: Uuid,
    },
    /// Print the leaderboard
    Top {
        #[arg(long)]
        limit: Option<u32>,
        /// Viewer id; their own ideas show raw text
        #[arg(long)]
        viewer: Option<Uuid>,
    },
    /// Drive one idea toward its target match count
    Automatch {
        #[arg(long)]
        idea_id: Uuid,
        #[arg(long, default_value_t = DEFAULT_MATCH_TARGET)]
        target: u32,
    },
    /// Create the database schema and exit
    Init,
}

fn model_from_env() -> String {
    std::env::var("ARENA_JUDGE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(SqliteIdeaStore::default_path);
    let store = SqliteIdeaStore::new(&db_path)?;

    match cli.command {
        Commands::Init => {
            println!("initialized {}", db_path.display());
        }
        Commands::Evaluate {
            text,
            idea_id,
            category,
            stage,
            user,
            public,
            language,
            no_match,
        } => {
            let language = match language.as_str() {
                "zh" => Language::Zh,
                _ => Language::En,
            };
            let gateway: Arc<dyn idea_arena::ChatGateway> =
                Arc::new(ProviderGateway::from_env()?);
            let model = model_from_env();
            let judge = LlmJudge::new(gateway.clone(), &model);
            let anonymizer = LlmAnonymizer::new(gateway.clone(), &model);
            let comparator: Arc<dyn Comparator> =
                Arc::new(LlmComparator::new(gateway.clone(), &model));

            let req = EvaluateRequest {
                idea_id,
                text,
                category,
                stage,
                user_id: user,
                conversation_id: None,
                is_public: public,
                language: Some(language),
            };

            let store: Arc<dyn IdeaStore> = Arc::new(store);
            if no_match {
                let response = pipeline::evaluate_idea(
                    store.as_ref(),
                    &judge as &dyn Judge,
                    Some(&anonymizer as &dyn Anonymizer),
                    None,
                    req,
                )
                .await?;
                print_json(&response)?;
            } else {
                let (scheduler, worker) = MatchScheduler::spawn(store.clone(), comparator);
                let response = pipeline::evaluate_idea(
                    store.as_ref(),
                    &judge as &dyn Judge,
                    Some(&anonymizer as &dyn Anonymizer),
                    Some(&scheduler),
                    req,
                )
                .await?;
                print_json(&response)?;
                // Dropping the scheduler lets the worker drain and exit.
                drop(scheduler);
                worker.join().await;
            }
        }
        Commands::Compare { idea_a, idea_b } => {
            let gateway: Arc<dyn idea_arena::ChatGateway> =
                Arc::new(ProviderGateway::from_env()?);
            let comparator = LlmComparator::new(gateway, model_from_env());
            let report = compare::run_match(&store, &comparator, idea_a, idea_b).await?;
            print_json(&report)?;
        }
        Commands::Top { limit, viewer } => {
            let board = leaderboard::top_ideas(&store, limit, viewer).await?;
            print_json(&board)?;
        }
        Commands::Automatch { idea_id, target } => {
            let gateway: Arc<dyn idea_arena::ChatGateway> =
                Arc::new(ProviderGateway::from_env()?);
            let comparator = LlmComparator::new(gateway, model_from_env());
            let summary = run_auto_match(&store, &comparator, idea_id, target).await?;
            println!(
                "attempted {} matches, completed {}, failed {} (target {})",
                summary.attempted, summary.completed, summary.failed, summary.target
            );
        }
    }

    Ok(())
}
