/// In-memory `RpcClient` double for unit tests
use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{RpcClient, SignatureStatus, TransactionRecord};
use crate::errors::CopyTraderError;

#[derive(Default)]
pub struct MockRpcClient {
    pub accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
    /// Results handed out by successive `send_transaction` calls; empty means success
    pub send_results: Mutex<VecDeque<Result<(), CopyTraderError>>>,
    /// Successive `get_signature_status` answers; the last one repeats
    pub statuses: Mutex<VecDeque<Option<SignatureStatus>>>,
    /// Successive `get_transaction` answers; the last one repeats
    pub records: Mutex<VecDeque<Option<TransactionRecord>>>,
    pub sent: Mutex<Vec<VersionedTransaction>>,
    pub account_reads: AtomicUsize,
    pub status_polls: AtomicUsize,
}

impl MockRpcClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_account(&self, pubkey: Pubkey, data: Vec<u8>) {
        self.accounts.lock().insert(pubkey, data);
    }

    pub fn push_status(&self, status: Option<SignatureStatus>) {
        self.statuses.lock().push_back(status);
    }

    pub fn push_record(&self, record: Option<TransactionRecord>) {
        self.records.lock().push_back(record);
    }

    pub fn account_reads(&self) -> usize {
        self.account_reads.load(Ordering::SeqCst)
    }

    pub fn status_polls(&self) -> usize {
        self.status_polls.load(Ordering::SeqCst)
    }
}

fn next_or_last<T: Clone>(queue: &Mutex<VecDeque<Option<T>>>) -> Option<T> {
    let mut queue = queue.lock();
    if queue.len() > 1 {
        queue.pop_front().flatten()
    } else {
        queue.front().cloned().flatten()
    }
}

#[async_trait]
impl RpcClient for MockRpcClient {
    async fn get_account_data(&self, pubkey: &Pubkey) -> Result<Option<Vec<u8>>, CopyTraderError> {
        self.account_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounts.lock().get(pubkey).cloned())
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, CopyTraderError> {
        self.sent.lock().push(transaction.clone());
        if let Some(result) = self.send_results.lock().pop_front() {
            result?;
        }
        Ok(transaction.signatures[0])
    }

    async fn get_signature_status(
        &self,
        _signature: &Signature,
    ) -> Result<Option<SignatureStatus>, CopyTraderError> {
        self.status_polls.fetch_add(1, Ordering::SeqCst);
        Ok(next_or_last(&self.statuses))
    }

    async fn get_transaction(
        &self,
        _signature: &Signature,
    ) -> Result<Option<TransactionRecord>, CopyTraderError> {
        Ok(next_or_last(&self.records))
    }
}
