use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header;
use tracing::{debug, trace, warn};

use kaspa_consensus_core::tx::TransactionId;

use crate::address::Address;
use crate::error::{CoreError, RpcError};
use crate::signer::SignedTransaction;
use crate::types::UtxoWithOutpoint;

use super::super::{Broadcaster, UtxoSource};
use super::connection::{parse_connection, resolve_auth};
use super::parsing::{parse_transaction_id, parse_utxos_result, transaction_json};
use super::protocol::{check_response_id, parse_jsonrpc_error, JsonRpcRequest, JsonRpcResponse};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Kaspa node JSON-RPC client over HTTP(S).
///
/// Serves as both the UTXO source and the broadcaster of a transfer. Every
/// request carries a fresh id and the response id is checked against it.
pub struct HttpNodeClient {
    client: reqwest::Client,
    url: String,
    auth: Option<(String, String)>,
    limiter: Option<DirectRateLimiter>,
    next_id: AtomicU64,
}

impl HttpNodeClient {
    /// Create a new client for an `http://` or `https://` endpoint.
    ///
    /// `user` and `pass` enable basic auth and must be given together. If
    /// `requests_per_second` is set, outbound requests are rate-limited.
    pub fn new(
        connection: &str,
        user: Option<&str>,
        pass: Option<&str>,
        requests_per_second: Option<u32>,
    ) -> Result<Self, CoreError> {
        let auth = resolve_auth(user, pass)?;
        let url = parse_connection(connection)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| CoreError::InvalidConfig(format!("build http client: {e}")))?;

        let limiter = match requests_per_second {
            None => None,
            Some(limit) => {
                let limit = NonZeroU32::new(limit).ok_or_else(|| {
                    CoreError::InvalidConfig("requests_per_second must be at least 1".to_owned())
                })?;
                Some(RateLimiter::direct(Quota::per_second(limit)))
            }
        };

        Ok(Self {
            client,
            url,
            auth,
            limiter,
            next_id: AtomicU64::new(initial_request_id()),
        })
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    async fn rpc_call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, CoreError> {
        self.wait_for_rate_limit().await;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(rpc.id = id, rpc.method = method, "rpc call");
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let mut builder = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&req);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user, Some(pass));
        }

        let response = builder.send().await.map_err(RpcError::Transport)?;
        let status = response.status();

        let body = response.text().await.map_err(RpcError::Transport)?;
        debug!(rpc.id = id, rpc.method = method, %status, body_len = body.len(), "rpc response");
        trace!(rpc.id = id, rpc.method = method, body = %body, "rpc response body");

        let decoded: JsonRpcResponse = serde_json::from_str(&body).map_err(|e| {
            RpcError::InvalidResponse(format!("decode JSON-RPC response ({status}): {e}; body={body}"))
        })?;
        check_response_id(id, &decoded.id)?;

        if let Some(err) = decoded.error {
            return Err(parse_jsonrpc_error(err));
        }

        Ok(decoded.result.unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl UtxoSource for HttpNodeClient {
    async fn get_utxos_by_address(&self, address: &Address) -> Result<Vec<UtxoWithOutpoint>, CoreError> {
        let raw = self
            .rpc_call(
                "getUtxosByAddresses",
                serde_json::json!({ "addresses": [address.to_string()] }),
            )
            .await
            .map_err(normalize_query_error)?;
        let entries = parse_utxos_result(&raw)?;
        debug!(%address, count = entries.len(), "fetched utxos");
        Ok(entries)
    }
}

#[async_trait]
impl Broadcaster for HttpNodeClient {
    async fn submit(&self, tx: &SignedTransaction) -> Result<TransactionId, CoreError> {
        let local_id = tx.id();
        let transaction = transaction_json(&tx.tx);
        let raw = self
            .rpc_call(
                "submitTransaction",
                serde_json::json!({ "transaction": transaction, "allowOrphan": false }),
            )
            .await
            .map_err(normalize_submit_error)?;

        let accepted = parse_transaction_id(raw.get("transactionId"), "transactionId")?;
        if accepted != local_id {
            warn!(%local_id, %accepted, "node accepted transaction under a different id");
        }
        Ok(accepted)
    }
}

fn initial_request_id() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}

// ==============================================================================
// RPC Error Normalization
// ==============================================================================

/// Transport failures on a query mean the node could not be reached.
fn normalize_query_error(err: CoreError) -> CoreError {
    match err {
        CoreError::Rpc(RpcError::Transport(e)) => CoreError::NodeUnavailable(e.to_string()),
        other => other,
    }
}

/// A node-reported error on submission is a rejection of the transaction.
fn normalize_submit_error(err: CoreError) -> CoreError {
    match err {
        CoreError::Rpc(RpcError::ServerError { message, .. }) => CoreError::RejectedByNode(message),
        other => normalize_query_error(other),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};

    use super::*;
    use crate::signer::SigningMode;
    use crate::test_util::{sender_address, txid_from_byte};
    use kaspa_consensus_core::tx::{ScriptPublicKey, TransactionOutpoint, TransactionOutput};

    use crate::tx::{new_transaction, unsigned_input};

    type Reply = Arc<dyn Fn(&serde_json::Value) -> serde_json::Value + Send + Sync>;

    #[derive(Clone)]
    struct Stub {
        reply: Reply,
        seen: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    async fn handle(State(stub): State<Stub>, Json(req): Json<serde_json::Value>) -> Json<serde_json::Value> {
        let body = (stub.reply)(&req);
        stub.seen.lock().expect("stub lock").push(req);
        Json(body)
    }

    /// Serve `reply` on an ephemeral port and return its URL plus the log of
    /// received requests.
    async fn spawn_stub(
        reply: impl Fn(&serde_json::Value) -> serde_json::Value + Send + Sync + 'static,
    ) -> (String, Arc<Mutex<Vec<serde_json::Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let stub = Stub {
            reply: Arc::new(reply),
            seen: seen.clone(),
        };
        let app = Router::new().route("/", post(handle)).with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub server");
        });
        (format!("http://{addr}/"), seen)
    }

    fn ok(req: &serde_json::Value, result: serde_json::Value) -> serde_json::Value {
        serde_json::json!({"jsonrpc": "2.0", "id": req["id"].clone(), "result": result})
    }

    fn sample_tx() -> SignedTransaction {
        let tx = new_transaction(
            vec![unsigned_input(TransactionOutpoint::new(txid_from_byte(1), 0), vec![0x41; 3])],
            vec![TransactionOutput::new(1_000, ScriptPublicKey::from_vec(0, vec![0xac]))],
        );
        SignedTransaction {
            tx,
            mode: SigningMode::Full,
        }
    }

    #[tokio::test]
    async fn fetches_utxos_by_address() {
        let (url, seen) = spawn_stub(|req| {
            ok(
                req,
                serde_json::json!({"entries": [{
                    "outpoint": {"transactionId": "01".repeat(32), "index": 1},
                    "utxoEntry": {
                        "amount": "250000000",
                        "scriptPublicKey": {"version": 0, "script": "20aaac"},
                        "blockDaaScore": 7,
                        "isCoinbase": false
                    }
                }]}),
            )
        })
        .await;
        let client = HttpNodeClient::new(&url, None, None, None).expect("client");

        let entries = client
            .get_utxos_by_address(&sender_address())
            .await
            .expect("utxos");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount(), 250_000_000);
        assert_eq!(entries[0].outpoint, TransactionOutpoint::new(txid_from_byte(1), 1));

        let seen = seen.lock().expect("seen lock");
        assert_eq!(seen[0]["method"], "getUtxosByAddresses");
        assert_eq!(
            seen[0]["params"]["addresses"][0],
            sender_address().to_string()
        );
    }

    #[tokio::test]
    async fn submit_returns_accepted_id() {
        let expected = sample_tx().id();
        let (url, seen) = spawn_stub(move |req| {
            ok(req, serde_json::json!({"transactionId": expected.to_string()}))
        })
        .await;
        let client = HttpNodeClient::new(&url, Some("user"), Some("pass"), Some(50)).expect("client");

        let id = client.submit(&sample_tx()).await.expect("submit");
        assert_eq!(id, expected);

        let seen = seen.lock().expect("seen lock");
        assert_eq!(seen[0]["method"], "submitTransaction");
        assert_eq!(seen[0]["params"]["allowOrphan"], false);
        let transaction = &seen[0]["params"]["transaction"];
        assert_eq!(transaction["outputs"][0]["value"], 1_000);
        assert_eq!(transaction["inputs"][0]["signatureScript"], "414141");
    }

    #[tokio::test]
    async fn submit_server_error_is_rejection() {
        let (url, _) = spawn_stub(|req| {
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": req["id"].clone(),
                "error": {"code": -32000, "message": "transaction already spent"}
            })
        })
        .await;
        let client = HttpNodeClient::new(&url, None, None, None).expect("client");

        let err = client.submit(&sample_tx()).await.expect_err("must reject");
        assert!(
            matches!(err, CoreError::RejectedByNode(ref m) if m == "transaction already spent"),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn mismatched_response_id_is_rejected() {
        let (url, _) = spawn_stub(|_| serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": {}})).await;
        let client = HttpNodeClient::new(&url, None, None, None).expect("client");

        let err = client
            .get_utxos_by_address(&sender_address())
            .await
            .expect_err("must reject");
        assert!(matches!(
            err,
            CoreError::Rpc(RpcError::UnexpectedResponseId { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_node_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let client = HttpNodeClient::new(&format!("http://{addr}/"), None, None, None).expect("client");
        let err = client
            .get_utxos_by_address(&sender_address())
            .await
            .expect_err("must fail");
        assert!(matches!(err, CoreError::NodeUnavailable(_)), "got {err:?}");
    }

    #[test]
    fn zero_rate_limit_is_invalid_config() {
        let err = HttpNodeClient::new("http://127.0.0.1:16110", None, None, Some(0))
            .err()
            .expect("must reject");
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }
}
