//! Solana method handlers.

use std::collections::HashMap;

use serde_json::{json, Value};

use super::params;
use super::{Call, Handler, HandlerResult};
use crate::chain::ChainFamily;
use crate::error::RpcError;
use crate::payload::root_of;
use crate::subscription::NotificationKind;

pub(super) fn methods() -> HashMap<&'static str, Handler> {
    let mut m: HashMap<&'static str, Handler> = HashMap::new();
    m.insert("getSlot", get_slot);
    m.insert("getVersion", get_version);
    m.insert("getHealth", health);
    m.insert("slotSubscribe", slot_subscribe);
    m.insert("rootSubscribe", root_subscribe);
    m.insert("slotUnsubscribe", unsubscribe);
    m.insert("rootUnsubscribe", unsubscribe);
    m
}

/// Slot for a commitment level: `finalized` trails by the root distance,
/// `confirmed` by one, anything else is the current slot.
pub fn slot_for_commitment(current: u64, commitment: Option<&str>) -> u64 {
    match commitment {
        Some("finalized") => root_of(current),
        Some("confirmed") if current > 1 => current - 1,
        _ => current,
    }
}

fn get_slot(call: &Call<'_>) -> HandlerResult {
    let commitment = call
        .params
        .first()
        .and_then(Value::as_object)
        .and_then(|o| o.get("commitment"))
        .and_then(Value::as_str);
    Ok(Value::from(slot_for_commitment(call.chain.state().height(), commitment)))
}

fn get_version(call: &Call<'_>) -> HandlerResult {
    let chain = call
        .chain
        .as_solana()
        .ok_or_else(|| RpcError::internal("not a Solana chain"))?;
    Ok(json!({
        "solana-core": chain.version(),
        "feature-set": chain.feature_set(),
    }))
}

fn health(_: &Call<'_>) -> HandlerResult {
    Ok(Value::String("ok".into()))
}

fn slot_subscribe(call: &Call<'_>) -> HandlerResult {
    let id = call.subscribe(NotificationKind::SlotNotification)?;
    Ok(id.to_wire(ChainFamily::Solana))
}

fn root_subscribe(call: &Call<'_>) -> HandlerResult {
    let id = call.subscribe(NotificationKind::RootNotification)?;
    Ok(id.to_wire(ChainFamily::Solana))
}

fn unsubscribe(call: &Call<'_>) -> HandlerResult {
    let id = params::subscription_id(call.params)?;
    call.sim.subscriptions().unsubscribe(id)?;
    Ok(Value::Bool(true))
}
