//! Replay driver for the CLI: turns instruction rows into engine calls
//! against a simulated notary that always answers with a successful,
//! transaction-carrying reply. Contacts are registered on sight so
//! origination never fails closed during a replay.

use crate::application::engine::WorkflowEngine;
use crate::domain::identifier::{AccountId, ContactId, NotaryId, NymId, SourceId, UnitId, WorkflowId};
use crate::domain::instrument::{Cheque, ChequeKind, Purse, Transfer};
use crate::domain::message::{
    LedgerPayload, MessageType, ProtocolMessage, ReceiptKind, TransactionEntry, TransactionReceipt,
};
use crate::domain::ports::WorkflowStoreBox;
use crate::error::{Result, WorkflowError};
use crate::infrastructure::in_memory::{
    InMemoryActivityRecorder, InMemoryContactResolver, InMemoryNotificationPublisher,
};
use crate::interfaces::csv::instruction_reader::{Instruction, OpKind};
use crate::interfaces::csv::report_writer::ReportRow;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

pub struct SimulationDriver {
    engine: WorkflowEngine,
    contacts: InMemoryContactResolver,
    notary: NotaryId,
    unit: UnitId,
    cheques: HashMap<String, Cheque>,
    transfers: HashMap<String, Transfer>,
    purses: HashMap<String, Purse>,
    touched: Vec<(NymId, WorkflowId)>,
}

impl SimulationDriver {
    pub fn new(store: WorkflowStoreBox) -> Self {
        let contacts = InMemoryContactResolver::new();
        let engine = WorkflowEngine::new(
            store,
            Box::new(contacts.clone()),
            Box::new(InMemoryActivityRecorder::new()),
            Box::new(InMemoryNotificationPublisher::new()),
        );
        Self {
            engine,
            contacts,
            notary: NotaryId::from("notary-sim"),
            unit: UnitId::from("unit-sim"),
            cheques: HashMap::new(),
            transfers: HashMap::new(),
            purses: HashMap::new(),
            touched: Vec::new(),
        }
    }

    /// Applies one instruction, returning the touched workflow id.
    pub async fn apply(&mut self, instruction: &Instruction) -> Result<WorkflowId> {
        let owner = NymId::new(&instruction.owner);
        if let Some(counterparty) = &instruction.counterparty {
            let nym = NymId::new(counterparty);
            let contact = ContactId::new(format!("contact-{counterparty}"));
            self.contacts.register(nym, contact).await;
        }

        let workflow = match instruction.op {
            OpKind::WriteCheque => {
                let cheque = self.build_cheque(instruction, false)?;
                let id = self.engine.write_cheque(&owner, &cheque).await?;
                self.cheques.insert(cheque.id.to_string(), cheque);
                id
            }
            OpKind::WriteInvoice => {
                let cheque = self.build_cheque(instruction, true)?;
                let id = self.engine.write_invoice(&owner, &cheque).await?;
                self.cheques.insert(cheque.id.to_string(), cheque);
                id
            }
            OpKind::SendCheque => {
                let cheque = self.cheque(instruction)?;
                let (request, reply) = self.exchange();
                self.engine
                    .send_cheque(&owner, &cheque, &request, Some(&reply))
                    .await?
            }
            OpKind::ReceiveCheque => {
                let cheque = self.cheque(instruction)?;
                let message = self.conveying_message(&cheque.sender_nym);
                match cheque.kind() {
                    ChequeKind::Invoice => {
                        self.engine.receive_invoice(&owner, &cheque, &message).await?
                    }
                    ChequeKind::Voucher => {
                        self.engine.receive_voucher(&owner, &cheque, &message).await?
                    }
                    _ => self.engine.receive_cheque(&owner, &cheque, &message).await?,
                }
            }
            OpKind::DepositCheque => {
                let cheque = self.cheque(instruction)?;
                let account = Self::account(instruction, &instruction.owner);
                let (request, reply) = self.exchange();
                self.engine
                    .deposit_cheque(&owner, &account, &cheque, &request, Some(&reply))
                    .await?
            }
            OpKind::CancelCheque => {
                let cheque = self.cheque(instruction)?;
                let (request, reply) = self.exchange();
                self.engine
                    .cancel_cheque(&owner, &cheque, &request, Some(&reply))
                    .await?
            }
            OpKind::ClearCheque => {
                // The owner column names the recipient whose deposit
                // cleared; the workflow owner is the cheque's sender.
                let cheque = self.cheque(instruction)?;
                let receipt = TransactionReceipt::for_cheque(
                    ReceiptKind::ChequeReceipt,
                    cheque.source_account.clone(),
                    cheque.source_account.clone(),
                    Utc::now(),
                    &cheque,
                )?;
                let id = self.engine.clear_cheque(&owner, &receipt).await?;
                self.touched.push((cheque.sender_nym.clone(), id));
                return Ok(id);
            }
            OpKind::CreateTransfer => {
                let transfer = self.build_transfer(instruction)?;
                let (request, reply) = self.exchange();
                let id = self
                    .engine
                    .create_transfer(&owner, &transfer, &request, Some(&reply))
                    .await?;
                self.transfers.insert(transfer.id.to_string(), transfer);
                id
            }
            OpKind::AcknowledgeTransfer => {
                let transfer = self.transfer(instruction)?;
                let (request, reply) = self.exchange();
                self.engine
                    .acknowledge_transfer(&owner, &transfer, &request, Some(&reply))
                    .await?
            }
            OpKind::ConveyTransfer => {
                let transfer = self.transfer(instruction)?;
                let receipt = TransactionReceipt::for_transfer(
                    ReceiptKind::Pending,
                    transfer.destination_account.clone(),
                    transfer.destination_account.clone(),
                    Utc::now(),
                    &transfer,
                )?;
                let notary = self.notary.clone();
                self.engine.convey_transfer(&owner, &notary, &receipt).await?
            }
            OpKind::AcceptTransfer => {
                let transfer = self.transfer(instruction)?;
                let receipt = TransactionReceipt::for_transfer(
                    ReceiptKind::Pending,
                    transfer.destination_account.clone(),
                    transfer.destination_account.clone(),
                    Utc::now(),
                    &transfer,
                )?;
                let (request, reply) = self.exchange();
                self.engine
                    .accept_transfer(&owner, &receipt, &request, Some(&reply))
                    .await?
            }
            OpKind::ClearTransfer => {
                let transfer = self.transfer(instruction)?;
                let receipt = TransactionReceipt::for_transfer(
                    ReceiptKind::TransferReceipt,
                    transfer.source_account.clone(),
                    transfer.source_account.clone(),
                    Utc::now(),
                    &transfer,
                )?;
                let notary = self.notary.clone();
                self.engine.clear_transfer(&owner, &notary, &receipt).await?
            }
            OpKind::CompleteTransfer => {
                let transfer = self.transfer(instruction)?;
                let receipt = TransactionReceipt::for_transfer(
                    ReceiptKind::AcceptPending,
                    transfer.source_account.clone(),
                    transfer.source_account.clone(),
                    Utc::now(),
                    &transfer,
                )?;
                let notary = self.notary.clone();
                self.engine
                    .complete_transfer(&owner, &notary, &receipt)
                    .await?
            }
            OpKind::AbortTransfer => {
                let transfer = self.transfer(instruction)?;
                let (request, reply) = self.exchange();
                self.engine
                    .abort_transfer(&owner, &transfer, &request, Some(&reply))
                    .await?
            }
            OpKind::AllocateCash => {
                let purse = self.build_purse(instruction)?;
                let id = self.engine.allocate_cash(&owner, &purse).await?;
                self.purses.insert(purse.id.to_string(), purse);
                id
            }
            OpKind::SendCash => {
                let purse = self.purse(instruction)?;
                let (request, reply) = self.exchange();
                self.engine
                    .send_cash(&owner, &purse, &request, Some(&reply))
                    .await?
            }
            OpKind::ReceiveCash => {
                let purse = self.purse(instruction)?;
                let message = self.conveying_message(&purse.sender_nym);
                self.engine.receive_cash(&owner, &purse, &message).await?
            }
        };

        self.touched.push((owner, workflow));
        Ok(workflow)
    }

    /// Final state of every workflow touched during the replay.
    pub async fn report(&self) -> Result<Vec<ReportRow>> {
        let mut seen = Vec::new();
        let mut rows = Vec::new();
        for (owner, id) in &self.touched {
            if seen.contains(&(owner, id)) {
                continue;
            }
            seen.push((owner, id));
            if let Some(workflow) = self.engine.load_workflow(owner, id).await? {
                rows.push(ReportRow::new(owner, &workflow));
            }
        }
        Ok(rows)
    }

    fn account(instruction: &Instruction, owner: &str) -> AccountId {
        match &instruction.account {
            Some(account) if !account.is_empty() => AccountId::new(account.clone()),
            _ => AccountId::new(format!("acct-{owner}")),
        }
    }

    fn build_cheque(&self, instruction: &Instruction, invoice: bool) -> Result<Cheque> {
        let amount = instruction.amount.unwrap_or(Decimal::ONE);
        let amount = if invoice { -amount.abs() } else { amount.abs() };
        let now = Utc::now();
        Ok(Cheque {
            id: SourceId::new(instruction.instrument_id()?),
            unit: self.unit.clone(),
            notary: self.notary.clone(),
            source_account: Self::account(instruction, &instruction.owner),
            sender_nym: NymId::new(&instruction.owner),
            recipient_nym: instruction.counterparty.as_deref().map(NymId::new),
            remitter_nym: None,
            amount,
            memo: instruction.memo.clone().unwrap_or_default(),
            valid_from: now,
            valid_to: now + Duration::days(30),
            revision: 1,
        })
    }

    fn build_transfer(&self, instruction: &Instruction) -> Result<Transfer> {
        Ok(Transfer {
            id: SourceId::new(instruction.instrument_id()?),
            unit: self.unit.clone(),
            notary: self.notary.clone(),
            source_account: Self::account(instruction, &instruction.owner),
            destination_account: match &instruction.dest_account {
                Some(account) if !account.is_empty() => AccountId::new(account.clone()),
                _ => AccountId::new(format!("acct-{}-2", instruction.owner)),
            },
            sender_nym: NymId::new(&instruction.owner),
            recipient_nym: instruction.counterparty.as_deref().map(NymId::new),
            amount: instruction.amount.unwrap_or(Decimal::ONE).abs(),
            memo: instruction.memo.clone().unwrap_or_default(),
            revision: 1,
        })
    }

    fn build_purse(&self, instruction: &Instruction) -> Result<Purse> {
        Ok(Purse {
            id: SourceId::new(instruction.instrument_id()?),
            unit: self.unit.clone(),
            notary: self.notary.clone(),
            sender_nym: NymId::new(&instruction.owner),
            recipient_nym: instruction.counterparty.as_deref().map(NymId::new),
            value: instruction.amount.unwrap_or(Decimal::ONE).abs(),
            revision: 1,
        })
    }

    fn cheque(&self, instruction: &Instruction) -> Result<Cheque> {
        let id = instruction.instrument_id()?;
        self.cheques
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(format!("cheque {id}")))
    }

    fn transfer(&self, instruction: &Instruction) -> Result<Transfer> {
        let id = instruction.instrument_id()?;
        self.transfers
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(format!("transfer {id}")))
    }

    fn purse(&self, instruction: &Instruction) -> Result<Purse> {
        let id = instruction.instrument_id()?;
        self.purses
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(format!("purse {id}")))
    }

    /// A request plus the simulated notary's successful reply.
    fn exchange(&self) -> (ProtocolMessage, ProtocolMessage) {
        let now = Utc::now();
        let request = ProtocolMessage {
            message_type: MessageType::NotarizeTransaction,
            success: true,
            sender_nym: None,
            recipient_nym: None,
            account: None,
            notary: Some(self.notary.clone()),
            time: now,
            ledger: None,
        };
        let reply = ProtocolMessage {
            message_type: MessageType::NotarizeTransaction,
            success: true,
            sender_nym: None,
            recipient_nym: None,
            account: None,
            notary: Some(self.notary.clone()),
            time: now,
            ledger: Some(LedgerPayload {
                transaction: Some(TransactionEntry { success: true }),
            }),
        };
        (request, reply)
    }

    fn conveying_message(&self, sender: &NymId) -> ProtocolMessage {
        ProtocolMessage {
            message_type: MessageType::SendNymMessage,
            success: true,
            sender_nym: Some(sender.clone()),
            recipient_nym: None,
            account: None,
            notary: Some(self.notary.clone()),
            time: Utc::now(),
            ledger: None,
        }
    }
}
