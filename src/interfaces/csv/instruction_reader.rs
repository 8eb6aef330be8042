use crate::error::{Result, WorkflowError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One lifecycle operation to replay against the engine.
#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    WriteCheque,
    WriteInvoice,
    SendCheque,
    ReceiveCheque,
    DepositCheque,
    CancelCheque,
    ClearCheque,
    CreateTransfer,
    AcknowledgeTransfer,
    ConveyTransfer,
    AcceptTransfer,
    ClearTransfer,
    CompleteTransfer,
    AbortTransfer,
    AllocateCash,
    SendCash,
    ReceiveCash,
}

/// One row of the instruction CSV.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Instruction {
    pub op: OpKind,
    pub owner: String,
    pub counterparty: Option<String>,
    pub account: Option<String>,
    pub dest_account: Option<String>,
    pub amount: Option<Decimal>,
    pub memo: Option<String>,
    pub id: Option<String>,
}

impl Instruction {
    /// The instrument id this row refers to.
    pub fn instrument_id(&self) -> Result<&str> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                WorkflowError::WrongInstrument(format!("{:?} requires an instrument id", self.op))
            })
    }
}

/// Reads instructions from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record
/// lengths, yielding `Result<Instruction>` lazily so large replay files
/// stream without loading into memory.
pub struct InstructionReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> InstructionReader<R> {
    /// Creates a new `InstructionReader` from any `Read` source.
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes instructions.
    pub fn instructions(self) -> impl Iterator<Item = Result<Instruction>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(WorkflowError::from))
    }
}
