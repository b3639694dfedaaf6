//! gRPC server surface for the aggregation service.

use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

use crate::{
    aggregator::Aggregator,
    config::ServerConfig,
    error::Result,
    rpc::{aggregator_service_server::AggregatorServiceServer, FILE_DESCRIPTOR_SET},
};

/// Serve the [`Aggregator`] over gRPC with reflection and request
/// tracing, blocking until the server exits.
pub async fn start(service: Aggregator, config: &ServerConfig) -> Result<()> {
    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    tracing::info!("aggregator gRPC server listening on {}", config.listener_addr);
    tonic::transport::Server::builder()
        .layer(
            TraceLayer::new_for_grpc()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        )
        .add_service(AggregatorServiceServer::new(service))
        .add_service(reflection_service)
        .serve(config.listener_addr)
        .await?;

    Ok(())
}
