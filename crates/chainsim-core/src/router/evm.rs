//! EVM method handlers.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use super::params::{self, BlockTag};
use super::{Call, Handler, HandlerResult};
use crate::chain::{ChainFamily, EvmChain};
use crate::error::RpcError;
use crate::payload::{quantity, BlockHeader};
use crate::subscription::NotificationKind;

/// Canned result of the state-reading stubs.
const STUB_QUANTITY: &str = "0x1234567890";

pub(super) fn methods() -> HashMap<&'static str, Handler> {
    let mut m: HashMap<&'static str, Handler> = HashMap::new();
    m.insert("eth_chainId", chain_id);
    m.insert("eth_blockNumber", block_number);
    m.insert("eth_getBalance", stub_quantity);
    m.insert("eth_call", stub_quantity);
    m.insert("eth_accounts", accounts);
    m.insert("net_listening", listening);
    m.insert("eth_getBlockByNumber", get_block_by_number);
    m.insert("eth_getLogs", get_logs);
    m.insert("eth_subscribe", subscribe);
    m.insert("eth_unsubscribe", unsubscribe);
    m.insert("getHealth", health);
    m
}

fn evm<'a>(call: &Call<'a>) -> Result<&'a Arc<EvmChain>, RpcError> {
    call.chain
        .as_evm()
        .ok_or_else(|| RpcError::internal("not an EVM chain"))
}

fn chain_id(call: &Call<'_>) -> HandlerResult {
    Ok(Value::String(evm(call)?.chain_id_hex().to_string()))
}

fn block_number(call: &Call<'_>) -> HandlerResult {
    Ok(Value::String(quantity(call.chain.state().height())))
}

fn stub_quantity(_: &Call<'_>) -> HandlerResult {
    Ok(Value::String(STUB_QUANTITY.into()))
}

fn accounts(_: &Call<'_>) -> HandlerResult {
    Ok(json!([]))
}

fn listening(_: &Call<'_>) -> HandlerResult {
    Ok(Value::Bool(true))
}

fn health(_: &Call<'_>) -> HandlerResult {
    Ok(Value::String("ok".into()))
}

fn get_block_by_number(call: &Call<'_>) -> HandlerResult {
    let heights = call.chain.state().heights();
    let number = match call.params.first() {
        None => heights.latest,
        Some(Value::String(tag)) => BlockTag::parse(tag)
            .map(|t| t.resolve(&heights))
            .ok_or_else(|| RpcError::invalid_params("Invalid block number"))?,
        Some(_) => return Err(RpcError::invalid_params("Invalid block parameter")),
    };
    let header = BlockHeader::new(call.chain.key(), number);
    serde_json::to_value(header).map_err(|e| RpcError::internal(e.to_string()))
}

/// Validates the range and returns no logs. The filter object is required;
/// `fromBlock` defaults to 0 and `toBlock` to the current height.
fn get_logs(call: &Call<'_>) -> HandlerResult {
    let filter = params::required_object(call.params, 0, "Invalid filter object")?;
    let heights = call.chain.state().heights();
    let from = params::filter_block(Some(filter), "fromBlock", &heights, 0)?;
    let to = params::filter_block(Some(filter), "toBlock", &heights, heights.latest)?;

    if to > heights.latest || from > to {
        return Err(RpcError::invalid_block_range());
    }
    Ok(json!([]))
}

fn subscribe(call: &Call<'_>) -> HandlerResult {
    let kind = match params::required_str(call.params, 0, "Invalid subscription type")? {
        "newHeads" => {
            let options = params::optional_object(call.params, 1, "Invalid subscription options")?;
            let include_tx = options
                .and_then(|o| o.get("includeTransactions"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if include_tx {
                NotificationKind::NewHeadsWithTx
            } else {
                NotificationKind::NewHeads
            }
        }
        "logs" => {
            params::optional_object(call.params, 1, "Invalid log filter parameters")?;
            NotificationKind::Logs
        }
        other => return Err(RpcError::unsupported(format!("Unsupported subscription type: {other}"))),
    };

    let id = call.subscribe(kind)?;
    Ok(id.to_wire(ChainFamily::Evm))
}

fn unsubscribe(call: &Call<'_>) -> HandlerResult {
    let id = params::subscription_id(call.params)?;
    call.sim.subscriptions().unsubscribe(id)?;
    Ok(Value::Bool(true))
}
