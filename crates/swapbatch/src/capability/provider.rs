use crate::{types::WalletProvider, wallet::ConnectorInfo};

/// Static per-provider batch limits.
const BATCH_LIMITS: &[(WalletProvider, usize)] = &[
    (WalletProvider::MetaMask, 10),
    (WalletProvider::Rabby, 20),
    (WalletProvider::CoinbaseSmartWallet, 50),
];

/// The smallest known limit; unknown providers get this.
pub fn strictest_batch_limit() -> usize {
    BATCH_LIMITS.iter().map(|(_, n)| *n).min().unwrap_or(1)
}

pub fn max_batch_size(provider: WalletProvider) -> usize {
    BATCH_LIMITS
        .iter()
        .find(|(p, _)| *p == provider)
        .map_or_else(strictest_batch_limit, |(_, n)| *n)
}

/// Classify the wallet from connector metadata and injected-provider flags.
///
/// Rabby also sets `isMetaMask`, so it is checked first.
pub fn fingerprint(c: &ConnectorInfo) -> WalletProvider {
    let id = c.id.to_lowercase();
    let name = c.name.to_lowercase();
    let mentions = |needle: &str| id.contains(needle) || name.contains(needle);

    if c.is_rabby || mentions("rabby") {
        return WalletProvider::Rabby;
    }
    if c.is_coinbase_wallet || mentions("coinbase") {
        return WalletProvider::CoinbaseSmartWallet;
    }
    if c.is_metamask || mentions("metamask") {
        return WalletProvider::MetaMask;
    }
    WalletProvider::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_gets_strictest_limit() {
        assert_eq!(max_batch_size(WalletProvider::Unknown), 10);
        assert_eq!(
            max_batch_size(WalletProvider::Unknown),
            BATCH_LIMITS.iter().map(|(_, n)| *n).min().unwrap_or(0)
        );
        assert_eq!(max_batch_size(WalletProvider::Rabby), 20);
        assert_eq!(max_batch_size(WalletProvider::CoinbaseSmartWallet), 50);
    }

    #[test]
    fn rabby_wins_over_injected_metamask_flag() {
        let c = ConnectorInfo {
            id: "injected".into(),
            name: "Injected".into(),
            is_metamask: true,
            is_rabby: true,
            is_coinbase_wallet: false,
        };
        assert_eq!(fingerprint(&c), WalletProvider::Rabby);
    }

    #[test]
    fn connector_ids_are_matched_case_insensitively() {
        let c = ConnectorInfo {
            id: "coinbaseWalletSDK".into(),
            ..ConnectorInfo::default()
        };
        assert_eq!(fingerprint(&c), WalletProvider::CoinbaseSmartWallet);
        let c = ConnectorInfo {
            id: "io.metamask".into(),
            ..ConnectorInfo::default()
        };
        assert_eq!(fingerprint(&c), WalletProvider::MetaMask);
        assert_eq!(fingerprint(&ConnectorInfo::default()), WalletProvider::Unknown);
    }
}
