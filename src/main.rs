//! JurisAI - legal assistant service
//!
//! `serve` runs the HTTP API. `chat`, `summarize` and `extract` are thin
//! terminal front ends over the same endpoints and document rules.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt};

use jurisai::auth::{AuthContext, Identity};
use jurisai::client::{ChatError, ChatSession, JurisClient, Summarizer};
use jurisai::config::JurisConfig;
use jurisai::{document, server};

const DEFAULT_SERVER: &str = "http://localhost:3000";

#[derive(Parser)]
#[command(name = "jurisai")]
#[command(version, about = "Legal assistant: streaming chat and document summaries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },

    /// Interactive legal chat
    Chat {
        #[arg(long, env = "JURIS_SERVER", default_value = DEFAULT_SERVER)]
        server: String,

        /// Signed-in identity
        #[arg(long, env = "JURIS_EMAIL")]
        email: Option<String>,

        /// Bearer token for a gated server
        #[arg(long, env = "JURIS_TOKEN")]
        token: Option<String>,

        /// Attach a document before the first question
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Summarize one document ("-" reads stdin)
    Summarize {
        file: String,

        #[arg(long, env = "JURIS_SERVER", default_value = DEFAULT_SERVER)]
        server: String,

        #[arg(long, env = "JURIS_TOKEN")]
        token: Option<String>,
    },

    /// Print the text extracted from a document
    Extract { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("jurisai=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { host, port } => {
            let mut config = JurisConfig::from_env().context("Invalid configuration")?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            server::run(config).await
        }
        Command::Chat {
            server,
            email,
            token,
            file,
        } => run_chat(server, email, token, file).await,
        Command::Summarize {
            file,
            server,
            token,
        } => run_summarize(&file, server, token).await,
        Command::Extract { file } => {
            let extracted = document::extract_file(&file)
                .await
                .with_context(|| format!("Failed to extract {}", file.display()))?;
            print!("{}", extracted.text);
            Ok(())
        }
    }
}

async fn run_chat(
    server: String,
    email: Option<String>,
    token: Option<String>,
    file: Option<PathBuf>,
) -> Result<()> {
    let mut auth = AuthContext::signed_out();
    if let Some(email) = email.filter(|e| !e.trim().is_empty()) {
        auth.sign_in(Identity::new(email, token));
    }

    let mut session = ChatSession::new(JurisClient::new(server));
    session.begin()?;
    match session.resolve_auth(&auth) {
        Ok(()) => {}
        Err(ChatError::SignInRequired) => {
            eprintln!("Sign in required: pass --email or set JURIS_EMAIL");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    if let Some(path) = file {
        attach(&mut session, &path).await;
    }

    println!("JurisAI legal assistant. Commands: /attach <file>, /detach, /logout, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/logout", _) => {
                session.logout(&mut auth);
                println!("Signed out.");
                break;
            }
            ("/detach", _) => {
                session.clear_file();
                println!("Document removed.");
            }
            ("/attach", path) if !path.trim().is_empty() => {
                attach(&mut session, Path::new(path.trim())).await;
            }
            _ => {
                let result = session
                    .submit(line, |chunk| {
                        print!("{chunk}");
                        let _ = std::io::stdout().flush();
                    })
                    .await;
                println!();
                if let Err(e) = result {
                    eprintln!("Error: {e}");
                }
            }
        }
    }

    Ok(())
}

async fn attach(session: &mut ChatSession, path: &Path) {
    match session.attach_file(path).await {
        Ok(doc) => match doc.pages {
            Some(pages) => println!("Attached {} ({} pages)", doc.filename, pages),
            None => println!("Attached {}", doc.filename),
        },
        Err(e) => eprintln!("Error: {e}"),
    }
}

async fn run_summarize(file: &str, server: String, token: Option<String>) -> Result<()> {
    let text = if file == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read stdin")?;
        buf
    } else {
        document::extract_file(Path::new(file))
            .await
            .with_context(|| format!("Failed to extract {file}"))?
            .text
    };

    if text.is_empty() {
        eprintln!("No document provided");
        return Ok(());
    }

    let mut summarizer = Summarizer::new(JurisClient::new(server).with_token(token));
    let mut shown = String::new();
    let result = summarizer
        .summarize(&text, |summary| {
            // Callbacks carry the whole summary so far; print only the new tail
            match summary.strip_prefix(shown.as_str()) {
                Some(tail) => print!("{tail}"),
                None => print!("\n{summary}"),
            }
            shown = summary.to_string();
            let _ = std::io::stdout().flush();
        })
        .await;
    println!();

    result.context("Summary failed")
}
