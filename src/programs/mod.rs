//! Instruction builders for the programs the CLI talks to
//!
//! The pipeline treats instructions as opaque. These builders only encode
//! account lists and data; nothing here touches the network.

pub mod enrollment;
pub mod token;

use sha2::{Digest, Sha256};

/// Anchor-style instruction discriminator: first 8 bytes of `sha256("global:<name>")`
pub fn anchor_discriminator(name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("global:{}", name).as_bytes());
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&hash[..8]);
    discriminator
}

/// Borsh string: little-endian u32 length followed by UTF-8 bytes
pub fn borsh_string(value: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminator_is_stable() {
        assert_eq!(anchor_discriminator("initialize"), anchor_discriminator("initialize"));
        assert_ne!(anchor_discriminator("initialize"), anchor_discriminator("submit_ts"));
        // Anchor's well-known discriminator for `initialize`
        assert_eq!(
            anchor_discriminator("initialize"),
            [175, 175, 109, 31, 13, 152, 155, 237]
        );
    }

    #[test]
    fn test_borsh_string_layout() {
        let mut out = Vec::new();
        borsh_string("abc", &mut out);
        assert_eq!(out, vec![3, 0, 0, 0, b'a', b'b', b'c']);
    }
}
