// src/by_sig.rs
//! Signed calls for the contract's `bySig` entry point.
//!
//! A signed call is `SignedCall { traits, data }` signed as EIP-712 typed data.
//! `traits` packs, high bits first: nonce type in `[254, 256)`, deadline in
//! `[208, 248)`, the low 80 bits of the relayer in `[128, 208)`, and the nonce
//! in `[0, 128)`.

use ethers::types::transaction::eip712::TypedData;
use ethers::types::{Address, Bytes, U256};
use serde_json::json;

use crate::error::SdkError;

pub const DOMAIN_NAME: &str = "Papaya";
pub const DOMAIN_VERSION: &str = "1";

/// Deadlines are unix timestamps stored in 40 bits.
pub const MAX_DEADLINE: u64 = 0xff_ffff_ffff;

const NONCE_TYPE_SHIFT: usize = 254;
const DEADLINE_SHIFT: usize = 208;
const RELAYER_SHIFT: usize = 128;
const RELAYER_BITS: usize = 80;
const NONCE_BITS: usize = 128;

/// Which nonce space the contract checks the call against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum NonceType {
    #[default]
    Account = 0,
    Selector = 1,
    Unique = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BySigTraits {
    pub nonce_type: NonceType,
    pub deadline: u64,
    pub relayer: Address,
    pub nonce: U256,
}

impl BySigTraits {
    /// Traits for an account-nonce call that any relayer may submit.
    pub fn account(nonce: U256, deadline: u64) -> Self {
        Self {
            nonce_type: NonceType::Account,
            deadline,
            relayer: Address::zero(),
            nonce,
        }
    }

    pub fn encode(&self) -> Result<U256, SdkError> {
        if self.deadline > MAX_DEADLINE {
            return Err(SdkError::InvalidBySig("deadline must not exceed 0xffffffffff"));
        }
        if self.nonce.bits() > NONCE_BITS {
            return Err(SdkError::InvalidBySig("nonce must fit in 128 bits"));
        }

        let relayer_mask = (U256::one() << RELAYER_BITS) - U256::one();
        let relayer = U256::from_big_endian(self.relayer.as_bytes()) & relayer_mask;

        Ok((U256::from(self.nonce_type as u8) << NONCE_TYPE_SHIFT)
            | (U256::from(self.deadline) << DEADLINE_SHIFT)
            | (relayer << RELAYER_SHIFT)
            | self.nonce)
    }
}

/// EIP-712 payload for a signed call to the contract at `verifying_contract`.
pub fn signed_call_typed_data(
    chain_id: U256,
    verifying_contract: Address,
    traits: U256,
    data: &Bytes,
) -> Result<TypedData, SdkError> {
    let payload = json!({
        "types": {
            "EIP712Domain": [
                { "name": "name", "type": "string" },
                { "name": "version", "type": "string" },
                { "name": "chainId", "type": "uint256" },
                { "name": "verifyingContract", "type": "address" }
            ],
            "SignedCall": [
                { "name": "traits", "type": "uint256" },
                { "name": "data", "type": "bytes" }
            ]
        },
        "primaryType": "SignedCall",
        "domain": {
            "name": DOMAIN_NAME,
            "version": DOMAIN_VERSION,
            "chainId": chain_id.to_string(),
            "verifyingContract": verifying_contract
        },
        "message": {
            "traits": traits.to_string(),
            "data": data
        }
    });
    serde_json::from_value(payload).map_err(|e| SdkError::Signing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::signers::{LocalWallet, Signer};
    use ethers::types::transaction::eip712::Eip712;

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn packs_account_traits() {
        let traits = BySigTraits::account(U256::from(7u64), 1_700_000_000).encode().unwrap();
        assert_eq!(traits, (U256::from(1_700_000_000u64) << 208) | U256::from(7u64));
        assert_eq!(traits >> 254, U256::zero());
    }

    #[test]
    fn packs_nonce_type_and_relayer() {
        let relayer: Address = "0x00000000000000000000ffffffffffffffffffff".parse().unwrap();
        let traits = BySigTraits {
            nonce_type: NonceType::Unique,
            deadline: MAX_DEADLINE,
            relayer,
            nonce: U256::zero(),
        }
        .encode()
        .unwrap();

        assert_eq!(traits >> 254, U256::from(2u64));
        assert_eq!((traits >> 208) & U256::from(MAX_DEADLINE), U256::from(MAX_DEADLINE));
        assert_eq!(
            (traits >> 128) & ((U256::one() << 80) - U256::one()),
            (U256::one() << 80) - U256::one()
        );
        assert_eq!(traits & U256::from(u128::MAX), U256::zero());
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let late = BySigTraits::account(U256::zero(), MAX_DEADLINE + 1);
        assert!(matches!(late.encode(), Err(SdkError::InvalidBySig(_))));

        let wide_nonce = BySigTraits::account(U256::one() << 128, 0);
        assert!(matches!(wide_nonce.encode(), Err(SdkError::InvalidBySig(_))));

        let widest_nonce = BySigTraits::account(U256::from(u128::MAX), 0);
        assert!(widest_nonce.encode().is_ok());
    }

    #[test]
    fn builds_signed_call_payload() {
        let contract: Address = "0xb8fD71A4d29e2138056b2a309f97b96ec2A8EeD7".parse().unwrap();
        let data = Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]);
        let typed = signed_call_typed_data(U256::from(137u64), contract, U256::from(9u64), &data).unwrap();

        assert_eq!(typed.primary_type, "SignedCall");
        assert_eq!(typed.domain.name.as_deref(), Some(DOMAIN_NAME));
        assert_eq!(typed.domain.version.as_deref(), Some(DOMAIN_VERSION));
        assert_eq!(typed.domain.chain_id, Some(U256::from(137u64)));
        assert_eq!(typed.domain.verifying_contract, Some(contract));
    }

    #[tokio::test]
    async fn signature_recovers_to_signer() {
        let wallet: LocalWallet = KEY.parse().unwrap();
        let contract: Address = "0xb8fD71A4d29e2138056b2a309f97b96ec2A8EeD7".parse().unwrap();
        let traits = BySigTraits::account(U256::zero(), 1_700_000_000).encode().unwrap();
        let typed = signed_call_typed_data(U256::from(137u64), contract, traits, &Bytes::from(vec![1, 2, 3])).unwrap();

        let signature = wallet.sign_typed_data(&typed).await.unwrap();
        let digest = typed.encode_eip712().unwrap();
        assert_eq!(signature.recover(digest).unwrap(), wallet.address());
    }
}
