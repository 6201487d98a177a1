//! `colloquy status` — Show effective configuration.

use colloquy_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    println!("Colloquy Status");
    println!("===============\n");

    println!("Provider:");
    println!("  base_url:         {}", config.provider.base_url);
    println!("  default_model:    {}", config.default_model);
    println!("  embedding_model:  {}", config.provider.embedding_model);
    println!(
        "  api_key:          {}",
        if config.api_key.is_some() {
            "configured"
        } else {
            "NOT SET"
        }
    );

    println!("\nMemory:");
    println!(
        "  compression:      every {} turns or > {} est. tokens",
        config.memory.working_memory_limit, config.memory.max_token_estimate
    );
    println!(
        "  facts:            merge ≥ {:.2} similarity, prune < {:.2}, cap {}",
        config.memory.similarity_threshold,
        config.memory.min_confidence,
        config.memory.max_facts
    );
    println!(
        "  decay:            ×{:.2} per week",
        config.memory.weekly_decay
    );

    println!("\nAdjudication:");
    println!("  timeout:          {}s", config.adjudication.timeout_secs);
    println!("  facts in prompt:  {}", config.adjudication.fact_limit);

    println!("\nPipeline:");
    println!("  poll wait:        {}s", config.pipeline.poll_wait_secs);
    println!("  generate replies: {}", config.pipeline.generate_replies);

    Ok(())
}
