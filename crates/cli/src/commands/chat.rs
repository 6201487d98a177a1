//! `colloquy chat` — create a node and adjudicate messages against it.
//!
//! Each line is submitted as a pending message, dequeued, adjudicated,
//! and — when accepted — folded into the node's memory with a generated
//! reply. `/context` and `/facts` inspect the node's current memory.

use colloquy_config::AppConfig;
use colloquy_core::message::MessageStatus;
use colloquy_core::store::NodeStore;
use colloquy_core::transport::Transport;
use colloquy_pipeline::PipelineController;
use colloquy_providers::OpenAiCompatProvider;
use colloquy_store::InMemoryStore;
use colloquy_transport::InMemoryQueue;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

pub async fn run(
    topic: String,
    description: Option<String>,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let api_key = config.api_key.clone().ok_or(
        "No API key configured — set COLLOQUY_API_KEY or add api_key to config.toml",
    )?;

    let provider = OpenAiCompatProvider::new(
        "openai",
        &config.provider.base_url,
        api_key,
        Duration::from_secs(config.provider.timeout_secs),
    )?
    .with_embedding_model(&config.provider.embedding_model);

    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(InMemoryQueue::new());
    let controller = PipelineController::new(
        store.clone(),
        queue.clone(),
        Arc::new(provider),
        &config,
    );

    let node = controller.create_node(&topic, description.as_deref()).await?;
    println!(
        "Node {} created for topic \"{}\" (v{})",
        node.id, node.topic, node.version
    );

    if let Some(message) = message {
        send(&controller, &store, &queue, &node.id, &message).await?;
        return Ok(());
    }

    println!("Type a message; \"/context\", \"/facts\", or \"exit\".\n");
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "exit" | "quit" => break,
            "/context" => print_context(&store, &node.id).await?,
            "/facts" => print_facts(&store, &node.id).await?,
            _ => send(&controller, &store, &queue, &node.id, line).await?,
        }
    }

    Ok(())
}

async fn send(
    controller: &PipelineController,
    store: &Arc<InMemoryStore>,
    queue: &Arc<InMemoryQueue>,
    node_id: &str,
    content: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    controller.submit(node_id, "cli", content).await?;

    let envelope = queue
        .recv(Duration::from_secs(1))
        .await?
        .ok_or("submitted message never reached the queue")?;

    match controller.process_envelope(envelope).await? {
        Some(MessageStatus::Accepted) => {
            let node = store.get_node(node_id).await?;
            // The generated reply, when any, is the buffer's last turn
            if let Some(last) = node.memory.working_memory.lines().last() {
                if let Some(reply) = last.strip_prefix("Assistant: ") {
                    println!("{reply}");
                }
            }
            println!("[accepted — node now v{}]", node.version);
        }
        Some(status) => println!("[{status}]"),
        None => println!("[discarded]"),
    }

    Ok(())
}

async fn print_context(
    store: &Arc<InMemoryStore>,
    node_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let node = store.get_node(node_id).await?;
    println!("--- memory (v{}) ---", node.version);
    println!("{}", node.memory.core_context);
    if !node.memory.working_memory.is_empty() {
        println!("\n{}", node.memory.working_memory);
    }
    println!("--------------------");
    Ok(())
}

async fn print_facts(
    store: &Arc<InMemoryStore>,
    node_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let node = store.get_node(node_id).await?;
    if node.memory.key_facts.is_empty() {
        println!("(no key facts yet)");
        return Ok(());
    }
    for fact in &node.memory.key_facts {
        println!(
            "- {} ({:?}, confidence {:.0}%)",
            fact.content,
            fact.source,
            fact.confidence * 100.0
        );
    }
    Ok(())
}
