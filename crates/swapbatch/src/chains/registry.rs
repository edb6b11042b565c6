use crate::config::RpcConfig;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainInfo {
    pub id: u64,
    pub name: String,
    pub display_name: String,
}

/// Chain id ⇄ name lookups for status and error text.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    by_id: BTreeMap<u64, ChainInfo>,
}

impl ChainRegistry {
    pub fn from_rpc_config(rpc: &RpcConfig) -> Self {
        let by_id = rpc
            .evm_chain_ids
            .iter()
            .map(|(name, &id)| {
                let display_name = rpc
                    .evm_display_names
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| name.clone());
                (
                    id,
                    ChainInfo {
                        id,
                        name: name.clone(),
                        display_name,
                    },
                )
            })
            .collect();
        Self { by_id }
    }

    pub fn with_chain(mut self, id: u64, name: &str, display_name: &str) -> Self {
        self.by_id.insert(
            id,
            ChainInfo {
                id,
                name: name.to_owned(),
                display_name: display_name.to_owned(),
            },
        );
        self
    }

    pub fn get(&self, id: u64) -> Option<&ChainInfo> {
        self.by_id.get(&id)
    }

    pub fn display_name(&self, id: u64) -> Option<&str> {
        self.by_id.get(&id).map(|c| c.display_name.as_str())
    }

    /// Display name, or `chain <id>` for chains we don't know.
    pub fn label(&self, id: u64) -> String {
        self.display_name(id)
            .map_or_else(|| format!("chain {id}"), str::to_owned)
    }

    /// Resolve a chain by config name (`base`) or numeric id (`8453`).
    pub fn resolve(&self, name_or_id: &str) -> Option<&ChainInfo> {
        let s = name_or_id.trim();
        if let Ok(id) = s.parse::<u64>() {
            return self.by_id.get(&id);
        }
        self.by_id
            .values()
            .find(|c| c.name.eq_ignore_ascii_case(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_name_and_id() {
        let reg = ChainRegistry::from_rpc_config(&RpcConfig::default());
        assert_eq!(reg.resolve("base").map(|c| c.id), Some(8453));
        assert_eq!(reg.resolve("42161").map(|c| c.name.as_str()), Some("arbitrum"));
        assert_eq!(reg.display_name(10), Some("OP Mainnet"));
        assert_eq!(reg.label(999_999), "chain 999999");
        assert!(reg.resolve("nope").is_none(), "unknown names resolve to none");
    }
}
