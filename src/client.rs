// src/client.rs
//! Convenience wrapper over the generated `Papaya` binding.
//!
//! Reads go through `eth_call`; writes need a middleware with a default
//! sender (e.g. `SignerMiddleware`) and return the submitted transaction hash.

use std::sync::Arc;

use ethers::abi::Detokenize;
use ethers::contract::{ContractCall, ContractError};
use ethers::providers::Middleware;
use ethers::types::{Address, Bytes, I256, Signature, TxHash, U256};

use crate::by_sig::{self, BySigTraits};
use crate::codec::{self, MAX_RATE, RATE_BITS, RateLanes};
use crate::config::{self, NetworkName, TokenSymbol};
use crate::error::{Lane, RateError, SdkError};
use crate::rate_period::{self, RatePeriod};
use crate::{Papaya, Settings, SignedCall};

#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub network: NetworkName,
    pub token: TokenSymbol,
    /// Defaults to the network's default version.
    pub version: Option<String>,
    pub contract_address: Option<Address>,
    pub token_address: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub balance: I256,
    pub income_rate: I256,
    pub outgoing_rate: I256,
    pub updated: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub recipient: Address,
    pub income_rate: u128,
    pub outgoing_rate: u128,
    pub project_id: u64,
}

impl Subscription {
    fn new(recipient: Address, rates: RateLanes) -> Self {
        Self {
            recipient,
            income_rate: rates.income_rate,
            outgoing_rate: rates.outgoing_rate,
            project_id: rates.project_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionStatus {
    pub is_subscribed: bool,
    pub rates: RateLanes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProjectSettings {
    pub initialized: bool,
    /// Basis points.
    pub project_fee: u16,
}

impl From<ProjectSettings> for Settings {
    fn from(settings: ProjectSettings) -> Self {
        Settings {
            initialized: settings.initialized,
            project_fee: settings.project_fee,
        }
    }
}

pub struct PapayaClient<M> {
    contract: Papaya<M>,
    network: Option<NetworkName>,
    token: Option<TokenSymbol>,
    version: Option<String>,
    token_address: Option<Address>,
}

fn contract_error<M: Middleware>(err: ContractError<M>) -> SdkError {
    SdkError::Contract(err.to_string())
}

impl<M: Middleware + 'static> PapayaClient<M> {
    /// Binds to the deployment listed for the requested network and token.
    pub fn new(client: Arc<M>, options: ClientOptions) -> Result<Self, SdkError> {
        let resolved = config::resolve(options.network, options.token, options.version.as_deref())?;
        let contract_address = options
            .contract_address
            .unwrap_or(resolved.deployment.contract_address);
        let token_address = options.token_address.unwrap_or(resolved.deployment.token_address);

        tracing::debug!(
            network = %resolved.network,
            token = %resolved.token,
            version = %resolved.deployment.version,
            contract = ?contract_address,
            "papaya client created"
        );

        Ok(Self {
            contract: Papaya::new(contract_address, client),
            network: Some(resolved.network),
            token: Some(resolved.token),
            version: Some(resolved.deployment.version.clone()),
            token_address: Some(token_address),
        })
    }

    /// Binds to an explicit contract address, outside the deployment table.
    pub fn at(address: Address, client: Arc<M>) -> Self {
        Self {
            contract: Papaya::new(address, client),
            network: None,
            token: None,
            version: None,
            token_address: None,
        }
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    pub fn contract(&self) -> &Papaya<M> {
        &self.contract
    }

    pub fn network(&self) -> Option<NetworkName> {
        self.network
    }

    pub fn token_symbol(&self) -> Option<TokenSymbol> {
        self.token
    }

    pub fn token_address(&self) -> Option<Address> {
        self.token_address
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn sender(&self, op: &'static str) -> Result<Address, SdkError> {
        self.contract
            .client()
            .default_sender()
            .ok_or(SdkError::SignerRequired(op))
    }

    fn account(&self, account: Option<Address>) -> Result<Address, SdkError> {
        account
            .or_else(|| self.contract.client().default_sender())
            .ok_or(SdkError::AccountRequired)
    }

    async fn submit<D: Detokenize>(&self, op: &'static str, call: ContractCall<M, D>) -> Result<TxHash, SdkError> {
        let pending = call.send().await.map_err(contract_error)?;
        let hash = pending.tx_hash();
        tracing::debug!(op, tx = ?hash, "transaction submitted");
        Ok(hash)
    }

    async fn send(&self, op: &'static str, call: ContractCall<M, ()>) -> Result<TxHash, SdkError> {
        self.sender(op)?;
        self.submit(op, call).await
    }

    /// Signs `call` as typed data with the sender's account on the node
    /// (`eth_signTypedData_v4`) and submits it through `bySig`.
    async fn send_by_sig(&self, op: &'static str, call: ContractCall<M, ()>, deadline: u64) -> Result<TxHash, SdkError> {
        let signer = self.sender(op)?;
        let data = call
            .calldata()
            .ok_or_else(|| SdkError::Contract(format!("{} produced no calldata", op)))?;

        let nonce = self
            .contract
            .by_sig_account_nonces(signer)
            .call()
            .await
            .map_err(contract_error)?;
        let traits = BySigTraits::account(nonce, deadline).encode()?;

        let client = self.contract.client();
        let chain_id = client
            .get_chainid()
            .await
            .map_err(|e| SdkError::Provider(e.to_string()))?;
        let typed = by_sig::signed_call_typed_data(chain_id, self.address(), traits, &data)?;
        let raw: Bytes = client
            .provider()
            .request("eth_signTypedData_v4", (signer, &typed))
            .await
            .map_err(|e| SdkError::Signing(e.to_string()))?;
        let signature = Signature::try_from(&raw[..]).map_err(|e| SdkError::Signing(e.to_string()))?;

        tracing::debug!(op, ?signer, %nonce, deadline, "submitting signed call");
        let signed = SignedCall { traits, data };
        self.submit(op, self.contract.by_sig(signer, signed, Bytes::from(signature.to_vec())))
            .await
    }

    /// Per-second `uint96` rate for the `subscribe` call.
    fn subscription_rate(amount: &str, period: RatePeriod) -> Result<u128, SdkError> {
        let rate = rate_period::convert_rate_per_second(amount, period)?;
        if rate > U256::from(MAX_RATE) {
            return Err(RateError::FieldOverflow {
                lane: Lane::OutgoingRate,
                bits: RATE_BITS,
            }
            .into());
        }
        Ok(rate.low_u128())
    }

    pub async fn balance_of(&self, account: Option<Address>) -> Result<U256, SdkError> {
        let account = self.account(account)?;
        self.contract
            .balance_of(account)
            .call()
            .await
            .map_err(contract_error)
    }

    pub async fn user_info(&self, account: Option<Address>) -> Result<UserInfo, SdkError> {
        let account = self.account(account)?;
        let (balance, income_rate, outgoing_rate, updated) = self
            .contract
            .users(account)
            .call()
            .await
            .map_err(contract_error)?;
        Ok(UserInfo {
            balance,
            income_rate,
            outgoing_rate,
            updated,
        })
    }

    pub async fn subscriptions(&self, account: Option<Address>) -> Result<Vec<Subscription>, SdkError> {
        let account = self.account(account)?;
        let (recipients, encoded_rates) = self
            .contract
            .all_subscriptions(account)
            .call()
            .await
            .map_err(contract_error)?;
        Ok(recipients
            .into_iter()
            .zip(encoded_rates)
            .map(|(recipient, rates)| Subscription::new(recipient, codec::decode_rates(rates)))
            .collect())
    }

    pub async fn is_subscribed(&self, to: Address, from: Option<Address>) -> Result<SubscriptionStatus, SdkError> {
        let from = self.account(from)?;
        let (is_subscribed, encoded_rates) = self
            .contract
            .subscriptions(from, to)
            .call()
            .await
            .map_err(contract_error)?;
        Ok(SubscriptionStatus {
            is_subscribed,
            rates: codec::decode_rates(encoded_rates),
        })
    }

    pub async fn project_settings(&self, project_id: U256) -> Result<ProjectSettings, SdkError> {
        let (initialized, project_fee) = self
            .contract
            .default_settings(project_id)
            .call()
            .await
            .map_err(contract_error)?;
        Ok(ProjectSettings {
            initialized,
            project_fee,
        })
    }

    pub async fn user_settings(&self, project_id: U256, account: Option<Address>) -> Result<ProjectSettings, SdkError> {
        let account = self.account(account)?;
        let (initialized, project_fee) = self
            .contract
            .user_settings(project_id, account)
            .call()
            .await
            .map_err(contract_error)?;
        Ok(ProjectSettings {
            initialized,
            project_fee,
        })
    }

    /// Decimals of the contract's internal balance unit.
    pub async fn decimals(&self) -> Result<u8, SdkError> {
        self.contract.decimals().call().await.map_err(contract_error)
    }

    pub async fn symbol(&self) -> Result<String, SdkError> {
        self.contract.symbol().call().await.map_err(contract_error)
    }

    pub async fn deposit(&self, amount: U256, is_permit2: bool) -> Result<TxHash, SdkError> {
        self.send("deposit", self.contract.deposit(amount, is_permit2)).await
    }

    pub async fn deposit_for(&self, amount: U256, to: Address, is_permit2: bool) -> Result<TxHash, SdkError> {
        self.send("depositFor", self.contract.deposit_for(amount, to, is_permit2))
            .await
    }

    pub async fn withdraw(&self, amount: U256) -> Result<TxHash, SdkError> {
        self.send("withdraw", self.contract.withdraw(amount)).await
    }

    pub async fn withdraw_to(&self, to: Address, amount: U256) -> Result<TxHash, SdkError> {
        self.send("withdrawTo", self.contract.withdraw_to(to, amount)).await
    }

    /// Subscribes to `author` at `amount` per `period`, e.g. `"10"` per month.
    pub async fn subscribe(
        &self,
        author: Address,
        amount: &str,
        period: RatePeriod,
        project_id: U256,
    ) -> Result<TxHash, SdkError> {
        self.sender("subscribe")?;
        let rate = Self::subscription_rate(amount, period)?;
        self.send("subscribe", self.contract.subscribe(author, rate, project_id))
            .await
    }

    pub async fn unsubscribe(&self, author: Address) -> Result<TxHash, SdkError> {
        self.send("unsubscribe", self.contract.unsubscribe(author)).await
    }

    pub async fn pay(&self, receiver: Address, amount: U256) -> Result<TxHash, SdkError> {
        self.send("pay", self.contract.pay(receiver, amount)).await
    }

    pub async fn claim_project_id(&self, project_owner: Address) -> Result<TxHash, SdkError> {
        self.send("claimProjectId", self.contract.claim_project_id(project_owner))
            .await
    }

    pub async fn set_default_settings(&self, settings: ProjectSettings, project_id: U256) -> Result<TxHash, SdkError> {
        self.send(
            "setDefaultSettings",
            self.contract.set_default_settings(settings.into(), project_id),
        )
        .await
    }

    pub async fn set_settings_for_user(
        &self,
        user: Address,
        settings: ProjectSettings,
        project_id: U256,
    ) -> Result<TxHash, SdkError> {
        self.send(
            "setSettingsForUser",
            self.contract.set_settings_for_user(user, settings.into(), project_id),
        )
        .await
    }

    pub async fn deposit_by_sig(&self, amount: U256, deadline: u64) -> Result<TxHash, SdkError> {
        self.send_by_sig("deposit", self.contract.deposit(amount, false), deadline)
            .await
    }

    pub async fn withdraw_by_sig(&self, amount: U256, deadline: u64) -> Result<TxHash, SdkError> {
        self.send_by_sig("withdraw", self.contract.withdraw(amount), deadline)
            .await
    }

    pub async fn subscribe_by_sig(
        &self,
        author: Address,
        amount: &str,
        period: RatePeriod,
        project_id: U256,
        deadline: u64,
    ) -> Result<TxHash, SdkError> {
        let rate = Self::subscription_rate(amount, period)?;
        self.send_by_sig(
            "subscribe",
            self.contract.subscribe(author, rate, project_id),
            deadline,
        )
        .await
    }

    pub async fn unsubscribe_by_sig(&self, author: Address, deadline: u64) -> Result<TxHash, SdkError> {
        self.send_by_sig("unsubscribe", self.contract.unsubscribe(author), deadline)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::{self, Token};
    use ethers::providers::{MockProvider, Provider};
    use ethers::types::{Block, BlockId, BlockNumber, FeeHistory};
    use ethers::utils;

    const SENDER: &str = "0x0000000000000000000000000000000000000002";

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    fn mocked(sender: Option<Address>) -> (PapayaClient<Provider<MockProvider>>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        let provider = match sender {
            Some(sender) => provider.with_sender(sender),
            None => provider,
        };
        let client = PapayaClient::at(
            addr("0xb8fD71A4d29e2138056b2a309f97b96ec2A8EeD7"),
            Arc::new(provider),
        );
        (client, mock)
    }

    fn push_return(mock: &MockProvider, tokens: &[Token]) {
        mock.push::<Bytes, _>(Bytes::from(abi::encode(tokens))).unwrap();
    }

    /// Queues the node replies for one transaction: the mock answers the
    /// last push first, so the block comes out before the fee history, the
    /// gas estimate and finally the hash from `eth_sendTransaction`.
    fn push_submission(mock: &MockProvider, hash: TxHash) {
        mock.push::<TxHash, _>(hash).unwrap();
        mock.push::<U256, _>(U256::from(120_000u64)).unwrap();
        mock.push::<FeeHistory, _>(FeeHistory {
            base_fee_per_gas: vec![],
            gas_used_ratio: vec![],
            oldest_block: U256::zero(),
            reward: vec![],
        })
        .unwrap();
        mock.push::<Block<TxHash>, _>(Block {
            base_fee_per_gas: Some(U256::exp10(9)),
            ..Default::default()
        })
        .unwrap();
    }

    fn signature_bytes() -> Bytes {
        let mut raw = vec![0x11; 32];
        raw.extend_from_slice(&[0x22; 32]);
        raw.push(0x1b);
        Bytes::from(raw)
    }

    #[test]
    fn new_resolves_deployment() {
        let (provider, _mock) = Provider::mocked();
        let client = PapayaClient::new(
            Arc::new(provider),
            ClientOptions {
                network: NetworkName::Base,
                token: TokenSymbol::Usdt,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(client.token_symbol(), Some(TokenSymbol::Usdc));
        assert_eq!(client.version(), Some("1"));
        assert_eq!(client.address(), addr("0x574DeD69a731B5e19e1dD6861D1Cc33cfE7dB45c"));
        assert_eq!(
            client.token_address(),
            Some(addr("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"))
        );
    }

    #[test]
    fn explicit_addresses_override_table() {
        let (provider, _mock) = Provider::mocked();
        let override_address = addr("0x0000000000000000000000000000000000000001");
        let client = PapayaClient::new(
            Arc::new(provider),
            ClientOptions {
                contract_address: Some(override_address),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(client.address(), override_address);
        assert_eq!(client.network(), Some(NetworkName::Polygon));
        assert_eq!(client.version(), Some("1.5"));
    }

    #[tokio::test]
    async fn decodes_all_subscriptions() {
        let (client, mock) = mocked(None);
        let author = addr("0x1c3E45F2D9Dd65ceb6a644A646337015119952ff");
        let encoded = codec::encode_rates(100, 200, 5).unwrap();
        push_return(
            &mock,
            &[
                Token::Array(vec![Token::Address(author)]),
                Token::Array(vec![Token::Uint(encoded)]),
            ],
        );

        let subs = client.subscriptions(Some(Address::zero())).await.unwrap();
        assert_eq!(
            subs,
            vec![Subscription {
                recipient: author,
                income_rate: 100,
                outgoing_rate: 200,
                project_id: 5,
            }]
        );
    }

    #[tokio::test]
    async fn decodes_subscription_status() {
        let (client, mock) = mocked(None);
        let encoded = codec::encode_rates(0, codec::MAX_RATE, 42).unwrap();
        push_return(&mock, &[Token::Bool(true), Token::Uint(encoded)]);

        let status = client
            .is_subscribed(Address::zero(), Some(Address::zero()))
            .await
            .unwrap();
        assert!(status.is_subscribed);
        assert_eq!(status.rates, RateLanes::new(0, codec::MAX_RATE, 42));
    }

    #[tokio::test]
    async fn reads_signed_user_info() {
        let (client, mock) = mocked(None);
        push_return(
            &mock,
            &[
                Token::Int(I256::from(-250).into_raw()),
                Token::Int(I256::from(10).into_raw()),
                Token::Int(I256::from(3).into_raw()),
                Token::Uint(U256::from(1_700_000_000u64)),
            ],
        );

        let info = client.user_info(Some(Address::zero())).await.unwrap();
        assert_eq!(info.balance, I256::from(-250));
        assert_eq!(info.income_rate, I256::from(10));
        assert_eq!(info.outgoing_rate, I256::from(3));
        assert_eq!(info.updated, U256::from(1_700_000_000u64));
    }

    #[tokio::test]
    async fn reads_project_settings() {
        let (client, mock) = mocked(None);
        push_return(&mock, &[Token::Bool(true), Token::Uint(U256::from(500u64))]);

        let settings = client.project_settings(U256::from(1u64)).await.unwrap();
        assert_eq!(
            settings,
            ProjectSettings {
                initialized: true,
                project_fee: 500,
            }
        );
    }

    #[tokio::test]
    async fn reads_need_an_account() {
        let (client, _mock) = mocked(None);
        assert!(matches!(
            client.balance_of(None).await,
            Err(SdkError::AccountRequired)
        ));
    }

    #[tokio::test]
    async fn writes_need_a_signer() {
        let (client, _mock) = mocked(None);
        assert!(matches!(
            client.deposit(U256::from(1u64), false).await,
            Err(SdkError::SignerRequired("deposit"))
        ));
        assert!(matches!(
            client
                .subscribe(Address::zero(), "10", RatePeriod::Month, U256::zero())
                .await,
            Err(SdkError::SignerRequired("subscribe"))
        ));
        assert!(matches!(
            client.withdraw_by_sig(U256::from(1u64), 0).await,
            Err(SdkError::SignerRequired("withdraw"))
        ));
    }

    #[tokio::test]
    async fn subscribe_rejects_rates_past_uint96() {
        let (client, _mock) = mocked(Some(addr("0x0000000000000000000000000000000000000002")));
        let result = client
            .subscribe(
                Address::zero(),
                "100000000000000000000",
                RatePeriod::Second,
                U256::zero(),
            )
            .await;
        assert!(matches!(
            result,
            Err(SdkError::Rate(RateError::FieldOverflow { bits: 96, .. }))
        ));

        let result = client
            .subscribe(Address::zero(), "ten", RatePeriod::Month, U256::zero())
            .await;
        assert!(matches!(result, Err(SdkError::Rate(RateError::InvalidAmount(_)))));
    }

    #[tokio::test]
    async fn reads_token_metadata() {
        let (client, mock) = mocked(None);
        push_return(&mock, &[Token::String("USDC".to_string())]);
        push_return(&mock, &[Token::Uint(U256::from(18u64))]);

        assert_eq!(client.decimals().await.unwrap(), 18);
        assert_eq!(client.symbol().await.unwrap(), "USDC");
    }

    #[tokio::test]
    async fn deposit_returns_transaction_hash() {
        let (client, mock) = mocked(Some(addr(SENDER)));
        let hash = TxHash::repeat_byte(0xab);
        push_submission(&mock, hash);

        let submitted = client.deposit(U256::from(1_000_000u64), false).await.unwrap();
        assert_eq!(submitted, hash);
    }

    #[tokio::test]
    async fn subscribe_returns_transaction_hash() {
        let (client, mock) = mocked(Some(addr(SENDER)));
        let hash = TxHash::repeat_byte(0xcd);
        push_submission(&mock, hash);

        let submitted = client
            .subscribe(
                addr("0x1c3E45F2D9Dd65ceb6a644A646337015119952ff"),
                "10",
                RatePeriod::Month,
                U256::zero(),
            )
            .await
            .unwrap();
        assert_eq!(submitted, hash);
    }

    #[tokio::test]
    async fn deposit_by_sig_signs_nonce_deadline_and_calldata() {
        let signer = addr(SENDER);
        let (client, mock) = mocked(Some(signer));
        let amount = U256::from(5_000_000u64);
        let nonce = U256::from(7u64);
        let deadline = 1_900_000_000u64;
        let chain_id = U256::from(137u64);
        let hash = TxHash::repeat_byte(0x42);

        push_submission(&mock, hash);
        mock.push::<Bytes, _>(signature_bytes()).unwrap();
        mock.push::<U256, _>(chain_id).unwrap();
        push_return(&mock, &[Token::Uint(nonce)]);

        let submitted = client.deposit_by_sig(amount, deadline).await.unwrap();
        assert_eq!(submitted, hash);

        let nonce_call = client.contract().by_sig_account_nonces(signer);
        mock.assert_request(
            "eth_call",
            [
                utils::serialize(&nonce_call.tx),
                utils::serialize(&BlockId::from(BlockNumber::Latest)),
            ],
        )
        .unwrap();
        mock.assert_request("eth_chainId", ()).unwrap();

        let traits = BySigTraits::account(nonce, deadline).encode().unwrap();
        assert_eq!(traits & U256::from(u128::MAX), nonce);
        assert_eq!((traits >> 208u32).low_u64(), deadline);

        let data = client.contract().deposit(amount, false).calldata().unwrap();
        let typed = by_sig::signed_call_typed_data(chain_id, client.address(), traits, &data).unwrap();
        mock.assert_request("eth_signTypedData_v4", (signer, &typed)).unwrap();
    }

    #[tokio::test]
    async fn malformed_node_signature_is_a_signing_error() {
        let (client, mock) = mocked(Some(addr(SENDER)));
        mock.push::<Bytes, _>(Bytes::from(vec![0x11; 64])).unwrap();
        mock.push::<U256, _>(U256::one()).unwrap();
        push_return(&mock, &[Token::Uint(U256::zero())]);

        let result = client.withdraw_by_sig(U256::from(1u64), 0).await;
        assert!(matches!(result, Err(SdkError::Signing(_))));
    }
}
