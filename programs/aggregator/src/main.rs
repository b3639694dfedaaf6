use anyhow::Result;
use clap::Parser;
use tracing_subscriber::FmtSubscriber;

use attestation_aggregator::{
    aggregator::Aggregator,
    cli::{Cli, Commands},
    config::Config,
    mock_attestor::{self, MockBehaviour},
    rpc::{aggregator_service_client::AggregatorServiceClient, QuorumAttestationRequest},
    server,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let config = Config::load(config)?;

            let subscriber = FmtSubscriber::builder()
                .with_max_level(config.server.log_level())
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;

            tracing::info!(
                "starting aggregator with attestor endpoints: {:?}",
                config.attestor.attestor_endpoints
            );

            let service = Aggregator::from_config(config.clone()).await?;
            server::start(service, &config.server).await?;
        }
        Commands::Attestor { listen_addr, seed } => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(tracing::Level::INFO)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;

            mock_attestor::serve_attestor(listen_addr, seed, MockBehaviour::Honest).await?;
        }
        Commands::Query {
            aggregator_addr,
            min_height,
        } => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(tracing::Level::INFO)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;

            tracing::info!("querying aggregator at {aggregator_addr}");
            let mut client = AggregatorServiceClient::connect(aggregator_addr).await?;

            let request = tonic::Request::new(QuorumAttestationRequest { min_height });
            let response = client.get_quorum_attestation(request).await?.into_inner();

            println!(
                "quorum attestation:\n  height: {}\n  timestamp: {}\n  attestors: {}\n  data: 0x{}",
                response.height,
                response.timestamp,
                response.signatures.len(),
                hex::encode(&response.attested_data),
            );
            for pair in &response.signatures {
                println!(
                    "  signer 0x{}: 0x{}",
                    hex::encode(&pair.attestor_id),
                    hex::encode(&pair.signature)
                );
            }
        }
    }

    Ok(())
}
