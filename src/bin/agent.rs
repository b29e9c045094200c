//! agentipc Binary
//!
//! Serves the IPC protocol over the process's stdin/stdout.

use clap::Parser;
use agentipc::{Agent, AgentConfig};
use agentipc::protocol::DEFAULT_CODEC;
use tracing_subscriber::{fmt, EnvFilter};

/// agentipc agent
#[derive(Parser, Debug)]
#[command(name = "agentipc")]
#[command(about = "Agent-side IPC engine speaking json, cbor or msgpack over stdio")]
#[command(version)]
struct Args {
    /// Agent name, reported to the client and in logs
    #[arg(short, long, default_value = agentipc::config::DEFAULT_AGENT_NAME)]
    name: String,

    /// Codec used on stdin/stdout: json, cbor or msgpack
    #[arg(short, long, default_value = DEFAULT_CODEC)]
    codec: String,
}

fn main() {
    let args = Args::parse();

    let config = AgentConfig::builder()
        .agent_name(&args.name)
        .codec(&args.codec)
        .build();

    let (agent, codec_err) = Agent::new(config);

    // Initialize tracing/logging on the agent's log stream
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,agentipc=debug"));

    fmt()
        .with_env_filter(filter)
        .with_writer(agent.log_writer())
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    tracing::info!("agentipc v{}", agentipc::VERSION);
    if let Some(e) = codec_err {
        tracing::warn!("{}; using {}", e, agent.format());
    }

    if let Err(e) = agent.run() {
        tracing::error!("Agent error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Agent stopped");
}
