//! Positional parameter helpers shared by the method handlers.

use serde_json::{Map, Value};

use crate::chain::Heights;
use crate::error::RpcError;
use crate::subscription::SubscriptionId;

/// A block selector as accepted by `eth_getBlockByNumber` and `eth_getLogs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Safe,
    Finalized,
    Earliest,
    Number(u64),
}

impl BlockTag {
    /// `latest`, `pending`, `safe`, `finalized`, `earliest` or a hex number
    /// (the `0x` prefix is optional).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "latest" | "pending" => Some(Self::Latest),
            "safe" => Some(Self::Safe),
            "finalized" => Some(Self::Finalized),
            "earliest" => Some(Self::Earliest),
            other => {
                let digits = other.strip_prefix("0x").unwrap_or(other);
                u64::from_str_radix(digits, 16).ok().map(Self::Number)
            }
        }
    }

    pub fn resolve(self, heights: &Heights) -> u64 {
        match self {
            Self::Latest => heights.latest,
            Self::Safe => heights.safe,
            Self::Finalized => heights.finalized,
            Self::Earliest => 0,
            Self::Number(n) => n,
        }
    }
}

/// Optional object parameter at `index`. Present but not an object
/// (`null` included) is an invalid-params error carrying `message`.
pub fn optional_object<'a>(
    params: &'a [Value],
    index: usize,
    message: &str,
) -> Result<Option<&'a Map<String, Value>>, RpcError> {
    match params.get(index) {
        None => Ok(None),
        Some(Value::Object(obj)) => Ok(Some(obj)),
        Some(_) => Err(RpcError::invalid_params(message)),
    }
}

/// Required object parameter at `index`.
pub fn required_object<'a>(params: &'a [Value], index: usize, message: &str) -> Result<&'a Map<String, Value>, RpcError> {
    optional_object(params, index, message)?.ok_or_else(|| RpcError::invalid_params("Invalid params"))
}

/// Required string parameter at `index`.
pub fn required_str<'a>(params: &'a [Value], index: usize, message: &str) -> Result<&'a str, RpcError> {
    match params.get(index) {
        Some(Value::String(s)) => Ok(s),
        None => Err(RpcError::invalid_params("Invalid params")),
        Some(_) => Err(RpcError::invalid_params(message)),
    }
}

/// Resolve the block field `name` of a filter object, `default` when absent.
pub fn filter_block(
    filter: Option<&Map<String, Value>>,
    name: &str,
    heights: &Heights,
    default: u64,
) -> Result<u64, RpcError> {
    let Some(raw) = filter.and_then(|f| f.get(name)) else {
        return Ok(default);
    };
    let tag = raw
        .as_str()
        .ok_or_else(|| RpcError::invalid_params(format!("Invalid {name} parameter")))?;
    BlockTag::parse(tag)
        .map(|t| t.resolve(heights))
        .ok_or_else(|| RpcError::invalid_params(format!("Invalid {name} hex value")))
}

/// Subscription id argument of an `*_unsubscribe` call.
pub fn subscription_id(params: &[Value]) -> Result<SubscriptionId, RpcError> {
    let raw = params
        .first()
        .ok_or_else(|| RpcError::invalid_params("Invalid params"))?;
    match raw {
        Value::String(_) | Value::Number(_) => {
            SubscriptionId::parse(raw).ok_or_else(|| RpcError::invalid_params("Invalid subscription ID"))
        }
        _ => Err(RpcError::invalid_params("Invalid subscription ID type")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn block_tags() {
        let heights = Heights::at(100);
        assert_eq!(BlockTag::parse("latest").unwrap().resolve(&heights), 100);
        assert_eq!(BlockTag::parse("pending").unwrap().resolve(&heights), 100);
        assert_eq!(BlockTag::parse("safe").unwrap().resolve(&heights), 68);
        assert_eq!(BlockTag::parse("finalized").unwrap().resolve(&heights), 36);
        assert_eq!(BlockTag::parse("earliest").unwrap().resolve(&heights), 0);
        assert_eq!(BlockTag::parse("0xff"), Some(BlockTag::Number(255)));
        assert_eq!(BlockTag::parse("ff"), Some(BlockTag::Number(255)));
        assert_eq!(BlockTag::parse("0xzz"), None);
    }

    #[test]
    fn filter_defaults_and_errors() {
        let heights = Heights::at(10);
        assert_eq!(filter_block(None, "toBlock", &heights, 10).unwrap(), 10);

        let params = vec![json!({"fromBlock": 5})];
        let filter = optional_object(&params, 0, "Invalid filter object").unwrap();
        let err = filter_block(filter, "fromBlock", &heights, 0).unwrap_err();
        assert_eq!(err.message, "Invalid fromBlock parameter");
    }

    #[test]
    fn non_object_option_rejected() {
        let params = vec![json!("newHeads"), json!(true)];
        assert!(optional_object(&params, 1, "Invalid subscription options").is_err());
        assert!(optional_object(&params, 2, "x").unwrap().is_none());
        assert!(optional_object(&[json!("logs"), json!(null)], 1, "x").is_err());
    }

    #[test]
    fn required_object_must_be_present() {
        assert_eq!(required_object(&[], 0, "Invalid filter object").unwrap_err().message, "Invalid params");
        assert_eq!(
            required_object(&[json!(null)], 0, "Invalid filter object").unwrap_err().message,
            "Invalid filter object"
        );
        assert!(required_object(&[json!({})], 0, "Invalid filter object").is_ok());
    }

    #[test]
    fn subscription_id_argument() {
        assert_eq!(subscription_id(&[json!("0x2")]).unwrap(), SubscriptionId(2));
        assert_eq!(subscription_id(&[json!(3)]).unwrap(), SubscriptionId(3));
        assert_eq!(subscription_id(&[json!([1])]).unwrap_err().message, "Invalid subscription ID type");
        assert_eq!(subscription_id(&[]).unwrap_err().message, "Invalid params");
    }
}
