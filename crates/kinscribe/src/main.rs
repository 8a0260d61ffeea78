mod cli;
mod server;

use std::sync::Arc;

use clap::Parser;
use eyre::{eyre, WrapErr};

use kinscribe_core::reservation::ReservationRegistry;
use kinscribe_core::rpc::{HttpNodeClient, UtxoSource};
use kinscribe_core::signer::{LocalSigner, Signer};
use kinscribe_core::types::format_kaspa;
use kinscribe_core::address::p2pk_address;
use kinscribe_core::{NetworkId, TransferOrchestrator};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    let network: NetworkId = args
        .network
        .parse()
        .wrap_err("parse --network")?;
    let config = args.transfer_config(network);
    config.validate().wrap_err("invalid transfer configuration")?;

    let signer = Arc::new(LocalSigner::from_hex(&args.private_key).wrap_err("load private key")?);
    let sender = p2pk_address(network, &signer.public_key());

    // Use the configured token, or generate a random one for this session.
    let api_token = match &args.api_token {
        Some(token) if !token.is_empty() => token.clone(),
        _ => {
            use rand::Rng;
            let bytes: [u8; 16] = rand::thread_rng().r#gen();
            hex::encode(bytes)
        }
    };

    let node = Arc::new(
        HttpNodeClient::new(
            &args.rpc_url,
            args.rpc_user.as_deref(),
            args.rpc_pass.as_deref(),
            args.rpc_requests_per_second,
        )
        .wrap_err("configure node RPC client")?,
    );

    // Verify the node answers before starting the server.
    let funding = node.get_utxos_by_address(&sender).await.map_err(|err| {
        let message = format_rpc_connect_error(&args.rpc_url, &err.to_string());
        eyre!(message).wrap_err("while attempting to query the Kaspa node")
    })?;
    let balance: u64 = funding.iter().map(|entry| entry.amount()).sum();
    tracing::info!(
        %network,
        sender = %sender,
        utxos = funding.len(),
        balance = %format_kaspa(balance),
        "connected to Kaspa node"
    );
    if balance < config.anchor_amount + config.priority_fee {
        tracing::warn!(
            required = %format_kaspa(config.anchor_amount + config.priority_fee),
            "sender balance cannot fund a single transfer"
        );
    }

    let registry = Arc::new(ReservationRegistry::new(config.reservation_timeout));
    let orchestrator = TransferOrchestrator::new(node.clone(), node, signer, registry, config)
        .wrap_err("build transfer orchestrator")?;

    let state = server::AppState::new(orchestrator, sender.clone(), api_token.clone());

    let bind_addr = format!("{}:{}", args.bind, args.port);
    let origin = format!("http://{}:{}", args.bind, args.port);
    let router = server::build_router(state, &origin)?;

    if args.bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0; it is accessible from the network");
    }

    println!();
    println!("  Kinscribe is running:");
    println!("    API:       http://{bind_addr}/api/v1");
    println!("    Sender:    {sender}");
    if args.api_token.is_none() {
        println!("    Token:     {api_token}");
    }
    println!();

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("bind TCP listener")?;

    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("run HTTP server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down; in-flight sessions are abandoned");
}

fn format_rpc_connect_error(rpc_url: &str, source_error: &str) -> String {
    let mut lines = vec![
        format!("could not query RPC endpoint `{rpc_url}`"),
        format!("RPC error: {source_error}"),
    ];

    if source_error.contains("Could not resolve host") || source_error.contains("dns error") {
        lines.push(
            "hint: hostname resolution failed; verify the endpoint hostname and your DNS/network"
                .into(),
        );
    } else if source_error.contains("tls")
        || source_error.contains("certificate")
        || source_error.contains("SSL")
    {
        lines.push(
            "hint: TLS handshake failed; verify certificate trust and that the endpoint uses HTTPS"
                .into(),
        );
    } else if source_error.contains("401") || source_error.contains("403") {
        lines.push("hint: authentication failed; verify --rpc-user/--rpc-pass".into());
    } else if source_error.contains("Method not found") {
        lines.push(
            "hint: the node does not serve getUtxosByAddresses; start kaspad with --utxoindex"
                .into(),
        );
    } else if source_error.contains("error sending request for url") {
        lines.push("hint: request could not be sent; verify URL format, network access, and that the node exposes JSON-RPC over HTTP".into());
    }

    lines.join("\n")
}
