// src/testing.rs
//! Scripted in-memory EIP-1193 wallet backed by a one-contract chain.

use alloy_primitives::{address, Address, B256, U256};
use alloy_sol_types::{Revert, SolCall, SolError, SolEvent};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Notify};

use crate::constants::COUNTER_ADDRESS;
use crate::eips::eip1193::{codes, Eip1193Provider, ProviderEvent, WalletProvider};
use crate::error::ProviderError;
use crate::evm::abi::ICounter;
use crate::utils::num::{u64_to_quantity, value_to_u64};

pub const ALICE: Address = address!("00000000000000000000000000000000000a11ce");
pub const BOB: Address = address!("0000000000000000000000000000000000000b0b");

pub const FLOOR_REASON: &str = "Count cannot be negative";

pub fn increment_calldata() -> Vec<u8> {
    ICounter::incrementCall {}.abi_encode()
}

pub fn revert_hex(reason: &str) -> String {
    format!("0x{}", hex::encode(Revert { reason: reason.to_string() }.abi_encode()))
}

fn word(value: U256) -> String {
    format!("0x{}", hex::encode(value.to_be_bytes::<32>()))
}

struct MockChain {
    chain_id: u64,
    known_chains: Vec<u64>,
    authorized: bool,
    account: Address,
    reject_accounts: bool,
    reject_switch: bool,
    ignore_switch: bool,
    add_switches: bool,
    reject_tx: bool,
    mined_revert: bool,
    fail_calls: bool,
    contract: Address,
    count: U256,
    block: u64,
    receipt_delay: usize,
    receipt_failures: usize,
    receipt_error: Option<ProviderError>,
    receipts: HashMap<B256, Value>,
    sent: Vec<Value>,
    added: Vec<Value>,
    calls: Vec<String>,
}

/// Cloneable handle: tests keep one, the code under test gets another.
#[derive(Clone)]
pub struct MockWallet {
    chain: Arc<Mutex<MockChain>>,
    gate: Arc<Mutex<Option<(String, Arc<Notify>)>>>,
    events: broadcast::Sender<ProviderEvent>,
}

impl MockWallet {
    pub fn on_chain(chain_id: u64) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            chain: Arc::new(Mutex::new(MockChain {
                chain_id,
                known_chains: vec![1, 8453, 84532, 11155111],
                authorized: false,
                account: ALICE,
                reject_accounts: false,
                reject_switch: false,
                ignore_switch: false,
                add_switches: true,
                reject_tx: false,
                mined_revert: false,
                fail_calls: false,
                contract: COUNTER_ADDRESS,
                count: U256::ZERO,
                block: 100,
                receipt_delay: 0,
                receipt_failures: 0,
                receipt_error: None,
                receipts: HashMap::new(),
                sent: Vec::new(),
                added: Vec::new(),
                calls: Vec::new(),
            })),
            gate: Arc::new(Mutex::new(None)),
            events,
        }
    }

    fn with(self, f: impl FnOnce(&mut MockChain)) -> Self {
        f(&mut self.chain.lock().unwrap());
        self
    }

    // ==================== scripting ====================

    pub fn authorized(self) -> Self {
        self.with(|c| c.authorized = true)
    }

    pub fn without_chain(self, chain_id: u64) -> Self {
        self.with(|c| c.known_chains.retain(|id| *id != chain_id))
    }

    /// Registration succeeds but the wallet stays where it was.
    pub fn add_without_switch(self) -> Self {
        self.with(|c| c.add_switches = false)
    }

    pub fn reject_switch(self) -> Self {
        self.with(|c| c.reject_switch = true)
    }

    /// Switch call succeeds without changing chains.
    pub fn ignore_switch(self) -> Self {
        self.with(|c| c.ignore_switch = true)
    }

    pub fn reject_accounts(self) -> Self {
        self.with(|c| c.reject_accounts = true)
    }

    pub fn reject_tx(self) -> Self {
        self.with(|c| c.reject_tx = true)
    }

    pub fn with_count(self, count: u64) -> Self {
        self.with(|c| c.count = U256::from(count))
    }

    /// Floor violations get mined with status 0 instead of failing estimation.
    pub fn mined_revert(self) -> Self {
        self.with(|c| c.mined_revert = true)
    }

    /// Number of receipt polls answered with `null` first.
    pub fn with_receipt_delay(self, polls: usize) -> Self {
        self.with(|c| c.receipt_delay = polls)
    }

    /// Number of receipt polls that fail with a transport error first.
    pub fn with_receipt_failures(self, polls: usize) -> Self {
        self.with(|c| c.receipt_failures = polls)
    }

    /// Every receipt poll answers with `error` from now on.
    pub fn set_receipt_error(&self, error: ProviderError) {
        self.chain.lock().unwrap().receipt_error = Some(error);
    }

    /// Parks the next request for `method` until the returned handle is notified.
    pub fn hold(&self, method: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some((method.to_string(), Arc::clone(&notify)));
        notify
    }

    /// Out-of-band switch from the wallet UI.
    pub fn set_chain(&self, chain_id: u64) {
        self.chain.lock().unwrap().chain_id = chain_id;
        self.emit(ProviderEvent::ChainChanged(chain_id));
    }

    pub fn set_fail_calls(&self, fail: bool) {
        self.chain.lock().unwrap().fail_calls = fail;
    }

    pub fn mine_blocks(&self, blocks: u64) {
        self.chain.lock().unwrap().block += blocks;
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    // ==================== inspection ====================

    pub fn provider(&self) -> WalletProvider {
        WalletProvider::new(self.as_provider())
    }

    pub fn as_provider(&self) -> Arc<dyn Eip1193Provider> {
        Arc::new(self.clone())
    }

    pub fn calls(&self) -> Vec<String> {
        self.chain.lock().unwrap().calls.clone()
    }

    pub fn count_of(&self, method: &str) -> usize {
        self.chain.lock().unwrap().calls.iter().filter(|m| *m == method).count()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain.lock().unwrap().chain_id
    }

    pub fn count(&self) -> U256 {
        self.chain.lock().unwrap().count
    }

    pub fn added_chains(&self) -> Vec<Value> {
        self.chain.lock().unwrap().added.clone()
    }

    pub fn sent(&self) -> Vec<Value> {
        self.chain.lock().unwrap().sent.clone()
    }

    // ==================== chain simulation ====================

    fn answer(&self, method: &str, params: &Value) -> Result<Value, ProviderError> {
        let mut chain = self.chain.lock().unwrap();
        let mut event = None;
        let result = match method {
            "eth_chainId" => Ok(json!(u64_to_quantity(chain.chain_id))),
            "eth_blockNumber" => Ok(json!(u64_to_quantity(chain.block))),
            "eth_accounts" => Ok(if chain.authorized { json!([chain.account]) } else { json!([]) }),
            "eth_requestAccounts" => {
                if chain.reject_accounts {
                    Err(ProviderError::rpc(codes::USER_REJECTED, "User rejected the request."))
                } else {
                    chain.authorized = true;
                    Ok(json!([chain.account]))
                }
            }
            "wallet_switchEthereumChain" => {
                let target = value_to_u64(&params[0]["chainId"]).unwrap_or_default();
                if chain.reject_switch {
                    Err(ProviderError::rpc(codes::USER_REJECTED, "User rejected the request."))
                } else if !chain.known_chains.contains(&target) {
                    Err(ProviderError::rpc(
                        codes::UNRECOGNIZED_CHAIN,
                        format!("Unrecognized chain ID \"{}\".", u64_to_quantity(target)),
                    ))
                } else {
                    if !chain.ignore_switch {
                        chain.chain_id = target;
                        event = Some(ProviderEvent::ChainChanged(target));
                    }
                    Ok(Value::Null)
                }
            }
            "wallet_addEthereumChain" => {
                let param = params[0].clone();
                let target = value_to_u64(&param["chainId"]).unwrap_or_default();
                chain.added.push(param);
                chain.known_chains.push(target);
                if chain.add_switches {
                    chain.chain_id = target;
                    event = Some(ProviderEvent::ChainChanged(target));
                }
                Ok(Value::Null)
            }
            "eth_call" => chain.call(&params[0]),
            "eth_sendTransaction" => chain.send(&params[0]),
            "eth_getTransactionReceipt" => {
                if let Some(error) = chain.receipt_error.clone() {
                    Err(error)
                } else if chain.receipt_failures > 0 {
                    chain.receipt_failures -= 1;
                    Err(ProviderError::Transport("connection reset".to_string()))
                } else if chain.receipt_delay > 0 {
                    chain.receipt_delay -= 1;
                    Ok(Value::Null)
                } else {
                    let hash: B256 = serde_json::from_value(params[0].clone())
                        .map_err(|e| ProviderError::rpc(-32602, e.to_string()))?;
                    Ok(chain.receipts.get(&hash).cloned().unwrap_or(Value::Null))
                }
            }
            other => Err(ProviderError::rpc(codes::UNSUPPORTED_METHOD, format!("{other} is not supported"))),
        };
        drop(chain);
        if let Some(event) = event {
            self.emit(event);
        }
        result
    }
}

fn selector(tx: &Value) -> Option<[u8; 4]> {
    let data = tx["data"].as_str()?;
    let bytes = hex::decode(data.strip_prefix("0x")?).ok()?;
    bytes.get(..4)?.try_into().ok()
}

fn floor_error() -> ProviderError {
    ProviderError::Rpc {
        code: codes::INTERNAL_ERROR,
        message: "Internal JSON-RPC error.".to_string(),
        data: Some(json!({
            "code": codes::EXECUTION_REVERTED,
            "message": format!("execution reverted: {FLOOR_REASON}"),
            "data": revert_hex(FLOOR_REASON),
        })),
    }
}

impl MockChain {
    fn call(&self, tx: &Value) -> Result<Value, ProviderError> {
        if self.fail_calls {
            return Err(ProviderError::Transport("connection reset".to_string()));
        }
        let selector = selector(tx);
        if selector == Some(ICounter::getCountCall::SELECTOR) || selector == Some(ICounter::countCall::SELECTOR) {
            Ok(json!(word(self.count)))
        } else if selector == Some(ICounter::decrementCall::SELECTOR) && self.count.is_zero() {
            Err(floor_error())
        } else if selector == Some(ICounter::incrementCall::SELECTOR) || selector == Some(ICounter::decrementCall::SELECTOR) {
            Ok(json!("0x"))
        } else {
            Err(ProviderError::rpc(codes::EXECUTION_REVERTED, "execution reverted"))
        }
    }

    fn send(&mut self, tx: &Value) -> Result<Value, ProviderError> {
        if self.reject_tx {
            return Err(ProviderError::rpc(codes::USER_REJECTED, "User denied transaction signature."));
        }
        let selector = selector(tx);
        let success = if selector == Some(ICounter::incrementCall::SELECTOR) {
            self.count += U256::from(1);
            true
        } else if selector == Some(ICounter::decrementCall::SELECTOR) {
            if self.count.is_zero() {
                if !self.mined_revert {
                    return Err(floor_error());
                }
                false
            } else {
                self.count -= U256::from(1);
                true
            }
        } else {
            return Err(ProviderError::rpc(codes::INTERNAL_ERROR, "unknown call"));
        };

        self.sent.push(tx.clone());
        self.block += 1;
        let hash = B256::with_last_byte(self.sent.len() as u8);
        let logs = if success {
            json!([{
                "address": self.contract,
                "topics": [ICounter::CountChanged::SIGNATURE_HASH],
                "data": word(self.count),
            }])
        } else {
            json!([])
        };
        self.receipts.insert(
            hash,
            json!({
                "transactionHash": hash,
                "blockNumber": u64_to_quantity(self.block),
                "status": if success { "0x1" } else { "0x0" },
                "logs": logs,
            }),
        );
        Ok(json!(hash))
    }
}

#[async_trait]
impl Eip1193Provider for MockWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.chain.lock().unwrap().calls.push(method.to_string());
        let parked = {
            let mut gate = self.gate.lock().unwrap();
            match gate.as_ref() {
                Some((held, _)) if held == method => gate.take().map(|(_, notify)| notify),
                _ => None,
            }
        };
        if let Some(notify) = parked {
            notify.notified().await;
        }
        self.answer(method, &params)
    }

    fn events(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        Some(self.events.subscribe())
    }
}
