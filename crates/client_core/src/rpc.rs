use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use alloy_primitives::{Address, Bytes, U256, U64};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use shared::{
    domain::{Event, EventId, Ticket, TicketId},
    error::RegistryError,
    protocol::{u256_to_u64, IEventTicket},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::registry::{
    CreateEventCall, MintTicketCall, PendingTransaction, RegistryClient, TransactionReceipt,
    TxHash,
};

pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

const USER_REJECTED_CODE: i64 = 4001;
const EXECUTION_REVERTED_CODE: i64 = 3;

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct CallRequest {
    to: Address,
    data: Bytes,
}

#[derive(Debug, Serialize)]
struct TransactionRequest {
    from: Address,
    to: Address,
    data: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<U256>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    #[serde(default)]
    block_number: Option<U64>,
    #[serde(default)]
    status: Option<U64>,
}

/// Maps a JSON-RPC error object onto the registry error taxonomy.
fn classify_rpc_error(code: i64, message: String) -> RegistryError {
    if code == USER_REJECTED_CODE {
        return RegistryError::Rejected(Some(message));
    }
    if code == EXECUTION_REVERTED_CODE || message.to_ascii_lowercase().contains("revert") {
        return RegistryError::Reverted(Some(message));
    }
    RegistryError::Transport(message)
}

/// Registry client speaking Ethereum JSON-RPC to a node that holds the signing account.
pub struct JsonRpcRegistry {
    http: Client,
    rpc_url: Url,
    address: Address,
    sender: Option<Address>,
    poll_interval: Duration,
    next_request_id: AtomicU64,
}

impl JsonRpcRegistry {
    pub fn new(rpc_url: Url, address: Address) -> Self {
        Self {
            http: Client::new(),
            rpc_url,
            address,
            sender: None,
            poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn contract_name(&self) -> Result<String, RegistryError> {
        let ret = self.call(&IEventTicket::nameCall {}).await?;
        Ok(ret._0)
    }

    async fn request<P, R>(&self, method: &str, params: P) -> Result<R, RegistryError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .http
            .post(self.rpc_url.clone())
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await
            .map_err(|err| RegistryError::transport(format!("{method}: {err}")))?
            .error_for_status()
            .map_err(|err| RegistryError::transport(format!("{method}: {err}")))?;

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|err| RegistryError::decode(format!("{method}: {err}")))?;

        if let Some(error) = body.error {
            warn!(
                "rpc: method={method} code={} message={}",
                error.code, error.message
            );
            return Err(classify_rpc_error(error.code, error.message));
        }

        serde_json::from_value(body.result.unwrap_or(Value::Null))
            .map_err(|err| RegistryError::decode(format!("{method}: {err}")))
    }

    async fn call<C>(&self, call: &C) -> Result<C::Return, RegistryError>
    where
        C: SolCall + Sync,
    {
        let request = CallRequest {
            to: self.address,
            data: Bytes::from(call.abi_encode()),
        };
        let output: Bytes = self.request("eth_call", (request, "latest")).await?;
        C::abi_decode_returns(&output, true)
            .map_err(|err| RegistryError::decode(format!("{}: {err}", C::SIGNATURE)))
    }

    async fn send<C>(
        &self,
        call: &C,
        value: Option<U256>,
    ) -> Result<PendingTransaction, RegistryError>
    where
        C: SolCall + Sync,
    {
        let from = self.sending_account().await?;
        let request = TransactionRequest {
            from,
            to: self.address,
            data: Bytes::from(call.abi_encode()),
            value,
        };
        let tx_hash: TxHash = self.request("eth_sendTransaction", (request,)).await?;
        info!(
            "registry: submitted {} tx={tx_hash} from={from}",
            C::SIGNATURE
        );
        Ok(PendingTransaction { tx_hash })
    }

    async fn sending_account(&self) -> Result<Address, RegistryError> {
        if let Some(sender) = self.sender {
            return Ok(sender);
        }
        self.accounts()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RegistryError::Rejected(Some("no account is available to sign".into())))
    }
}

#[async_trait]
impl RegistryClient for JsonRpcRegistry {
    async fn chain_id(&self) -> Result<u64, RegistryError> {
        let chain_id: U64 = self.request("eth_chainId", Vec::<Value>::new()).await?;
        Ok(chain_id.to::<u64>())
    }

    async fn accounts(&self) -> Result<Vec<Address>, RegistryError> {
        self.request("eth_accounts", Vec::<Value>::new()).await
    }

    async fn total_events(&self) -> Result<u64, RegistryError> {
        let ret = self.call(&IEventTicket::totalEventsCall {}).await?;
        u256_to_u64(ret._0, "totalEvents")
    }

    async fn get_event(&self, event_id: EventId) -> Result<Event, RegistryError> {
        let ret = self
            .call(&IEventTicket::getEventCall {
                eventId: U256::from(event_id.0),
            })
            .await?;
        Event::try_from(ret._0)
    }

    async fn get_owner_tickets(&self, owner: Address) -> Result<Vec<TicketId>, RegistryError> {
        let ret = self
            .call(&IEventTicket::getOwnerTicketsCall { owner })
            .await?;
        ret._0
            .into_iter()
            .map(|id| u256_to_u64(id, "ticketId").map(TicketId))
            .collect()
    }

    async fn get_ticket(&self, ticket_id: TicketId) -> Result<Ticket, RegistryError> {
        let ret = self
            .call(&IEventTicket::getTicketCall {
                ticketId: U256::from(ticket_id.0),
            })
            .await?;
        Ticket::try_from(ret._0)
    }

    async fn create_event(
        &self,
        call: CreateEventCall,
    ) -> Result<PendingTransaction, RegistryError> {
        let call = IEventTicket::createEventCall {
            name: call.name,
            description: call.description,
            eventDate: U256::from(call.event_date),
            venue: call.venue,
            totalTickets: U256::from(call.total_tickets),
            price: call.price,
        };
        self.send(&call, None).await
    }

    async fn mint_ticket(&self, call: MintTicketCall) -> Result<PendingTransaction, RegistryError> {
        let payment = call.payment;
        let call = IEventTicket::mintTicketCall {
            eventId: U256::from(call.event_id.0),
            to: call.recipient,
        };
        self.send(&call, Some(payment)).await
    }

    async fn wait_for_inclusion(
        &self,
        pending: &PendingTransaction,
    ) -> Result<TransactionReceipt, RegistryError> {
        loop {
            let receipt: Option<RpcReceipt> = self
                .request("eth_getTransactionReceipt", (pending.tx_hash,))
                .await?;

            let Some(receipt) = receipt else {
                debug!("registry: waiting for inclusion tx={}", pending.tx_hash);
                tokio::time::sleep(self.poll_interval).await;
                continue;
            };

            let block_number = receipt.block_number.map(|block| block.to::<u64>());
            if receipt.status == Some(U64::ZERO) {
                warn!(
                    "registry: tx={} reverted in block={block_number:?}",
                    receipt.transaction_hash
                );
                return Err(RegistryError::Reverted(None));
            }

            info!(
                "registry: tx={} included in block={block_number:?}",
                receipt.transaction_hash
            );
            return Ok(TransactionReceipt {
                tx_hash: receipt.transaction_hash,
                block_number,
            });
        }
    }
}

#[cfg(test)]
#[path = "tests/rpc_tests.rs"]
mod tests;
