//! bridge-oracle: watch `AssetDeposited` on the source bridge and mint on the destination bridge.
//!
//! Configuration comes from the environment (or a `.env` file in the working directory):
//!
//!   SOURCE_CHAIN_RPC, DEST_CHAIN_RPC, SOURCE_BRIDGE_CONTRACT_ADDRESS,
//!   DEST_BRIDGE_CONTRACT_ADDRESS, ORACLE_PRIVATE_KEY            (required)
//!   REQUIRED_CONFIRMATIONS (12), SCAN_INTERVAL_SECONDS (15), STATE_FILE, MINT_GAS_LIMIT,
//!   RECEIPT_TIMEOUT_SECONDS, RECEIPT_POLL_INTERVAL_MS, CURSOR_COMMIT  (optional)
//!
//! Log level via RUST_LOG (default `info`). Ctrl-C stops the loop between cycles.

use anyhow::Context;
use bridge_oracle::abi::to_hex;
use bridge_oracle::{
    DestinationLedger, EventKind, EventScanner, EvmDestinationLedger, EvmSourceLedger,
    FileCursorStore, LocalSigner, OracleConfig, ReceiptPolicy, RelayLoop, RelaySettings,
    TransactionSubmitter,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match OracleConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(reason = %e, "failed to start oracle due to a configuration error");
            return Err(e.into());
        }
    };
    if let Err(e) = run(config).await {
        tracing::error!(reason = %e, "oracle stopped with an error");
        return Err(e);
    }
    Ok(())
}

async fn run(config: OracleConfig) -> anyhow::Result<()> {
    let signer = LocalSigner::from_hex(config.signer_key.expose()).context("ORACLE_PRIVATE_KEY")?;

    let source = EvmSourceLedger::new(&config.source_rpc_url).context("source RPC client")?;
    let source_chain_id = source
        .chain_id()
        .await
        .with_context(|| format!("connect to source chain at {}", config.source_rpc_url))?;
    tracing::info!(chain_id = source_chain_id, "connected to source chain");

    let receipts = ReceiptPolicy {
        timeout: config.receipt_timeout,
        poll_interval: config.receipt_poll_interval,
    };
    let destination =
        EvmDestinationLedger::connect(&config.dest_rpc_url, config.dest_contract, signer, receipts)
            .await
            .with_context(|| format!("connect to destination chain at {}", config.dest_rpc_url))?;
    tracing::info!(chain_id = destination.chain_id(), "connected to destination chain");

    let event_kind = EventKind::ASSET_DEPOSITED;
    tracing::info!(
        event = event_kind.name,
        source_contract = %to_hex(config.source_contract.as_slice()),
        dest_contract = %to_hex(config.dest_contract.as_slice()),
        account = %to_hex(destination.signer_address().as_slice()),
        state_file = %config.state_file.display(),
        "bridge oracle starting up"
    );

    let scanner = EventScanner::new(
        Arc::new(source),
        Box::new(FileCursorStore::new(&config.state_file)),
        config.source_contract,
    );
    let submitter = TransactionSubmitter::new(Arc::new(destination), config.mint_gas_limit);
    let relay = RelayLoop::new(
        scanner,
        submitter,
        RelaySettings {
            event_kind,
            required_confirmations: config.required_confirmations,
            scan_interval: config.scan_interval,
            cursor_commit: config.cursor_commit,
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(reason = %e, "cannot listen for shutdown signal");
            // A dropped sender also stops the loop, so hold it for the life of the process.
            let _keep = shutdown_tx;
            std::future::pending::<()>().await;
            return;
        }
        tracing::info!("shutdown requested, finishing current cycle");
        let _ = shutdown_tx.send(true);
    });
    relay.run(shutdown_rx).await;
    Ok(())
}
