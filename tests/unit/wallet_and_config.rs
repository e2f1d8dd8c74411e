//! Wallet files and configuration files on disk

#[cfg(test)]
mod tests {
    use std::io::Write;

    use solana_sdk::{signature::Keypair, signer::Signer};
    use tempfile::NamedTempFile;
    use tx_pipeline::config::{Config, ConfigError};
    use tx_pipeline::tx_builder::keygen;
    use tx_pipeline::wallet::WalletManager;
    use tx_pipeline::Commitment;

    #[test]
    fn test_wallet_from_json_array() {
        let keypair = Keypair::new();
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap()).unwrap();

        let wallet = WalletManager::from_file(file.path()).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_wallet_from_raw_bytes() {
        let keypair = Keypair::new();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&keypair.to_bytes()).unwrap();

        let wallet = WalletManager::from_file(file.path()).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_keygen_output_round_trips_through_wallet() {
        let material = keygen::generate().unwrap();
        let file = NamedTempFile::new().unwrap();
        WalletManager::write_json(&material, file.path()).unwrap();

        let wallet = WalletManager::from_file(file.path()).unwrap();
        assert_eq!(wallet.pubkey(), material.address());
    }

    #[test]
    fn test_base58_round_trip() {
        let material = keygen::generate().unwrap();
        let encoded = WalletManager::to_base58(&material);

        let wallet = WalletManager::from_base58(&encoded).unwrap();
        assert_eq!(wallet.pubkey(), material.address());

        assert!(WalletManager::from_base58("0OIl").is_err());
        let zero = bs58::encode([0u8; 64]).into_string();
        assert!(WalletManager::from_base58(&zero).is_err());
    }

    #[test]
    fn test_wallet_rejects_bad_files() {
        let mut zero = NamedTempFile::new().unwrap();
        zero.write_all(&[0u8; 64]).unwrap();
        let err = WalletManager::from_file(zero.path()).err().unwrap();
        assert!(err.to_string().contains("all-zero"));

        let mut short = NamedTempFile::new().unwrap();
        write!(short, "[1,2,3]").unwrap();
        let err = WalletManager::from_file(short.path()).err().unwrap();
        assert!(err.to_string().contains("expected 64 bytes"));

        // Public half not derived from the secret half
        let mut mismatched = Keypair::new().to_bytes();
        mismatched[32..].copy_from_slice(&Keypair::new().pubkey().to_bytes());
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&mismatched).unwrap();
        assert!(WalletManager::from_file(file.path()).is_err());

        assert!(WalletManager::from_file("/nonexistent/id.json").is_err());
    }

    #[test]
    fn test_config_file_round_trip() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[network]
rpc_url = "http://127.0.0.1:8899"
ws_url = "ws://127.0.0.1:8900"
cluster = "custom"
commitment = "processed"
confirmation_timeout_secs = 30

[wallet]
keypair_path = "/tmp/dev-wallet.json"

[transfer]
amount = 42
"#
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.network.commitment, Commitment::Processed);
        assert_eq!(config.network.cluster, "custom");
        assert_eq!(config.transfer.amount, 42);
        assert_eq!(config.wallet.keypair_path, "/tmp/dev-wallet.json");
        assert_eq!(config.submit_options().confirmation_timeout.as_secs(), 30);
        assert_eq!(
            config.explorer_url(&"sig"),
            "https://explorer.solana.com/tx/sig?cluster=custom"
        );
    }

    #[test]
    fn test_config_errors() {
        assert!(matches!(
            Config::from_file("/nonexistent/config.toml"),
            Err(ConfigError::Io { .. })
        ));

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[network\nrpc_url = 1").unwrap();
        assert!(matches!(
            Config::from_file(file.path().to_str().unwrap()),
            Err(ConfigError::Parse(_))
        ));

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[enrollment]\nprogram_id = \"xyz\"\n").unwrap();
        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "enrollment.program_id", .. })
        ));
    }
}
