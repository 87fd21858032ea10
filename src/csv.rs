use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::amount::AmountParseError;
use crate::ledger::Balance;
use crate::model::{LedgerOp, ScopeId, TransactionType, UserId};

/// Errors that can occur when parsing csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized operation type '{op_type}'")]
    UnrecognizedType { line: usize, op_type: String },

    #[error("line {line}: {op_type} missing amount")]
    MissingAmount { line: usize, op_type: String },

    #[error("line {line}: transfer missing counterparty")]
    MissingCounterparty { line: usize },

    #[error("line {line}: bad amount: {source}")]
    BadAmount {
        line: usize,
        source: AmountParseError,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    user: UserId,
    scope: ScopeId,
    amount: Option<String>,
    counterparty: Option<UserId>,
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    user: UserId,
    scope: ScopeId,
    current: String,
    earned: String,
    purchased: String,
    spent: String,
    collected: String,
    frozen: bool,
}

fn parse_amount(
    row_amount: Option<&str>,
    line: usize,
    op_type: &str,
) -> Result<crate::Amount, CsvError> {
    let raw = row_amount.ok_or_else(|| CsvError::MissingAmount {
        line,
        op_type: op_type.to_string(),
    })?;
    raw.parse()
        .map_err(|source| CsvError::BadAmount { line, source })
}

/// Read ledger operations from a csv file
pub fn read_operations(path: impl AsRef<Path>) -> impl Iterator<Item = Result<LedgerOp, CsvError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open csv file");

    reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            let reason = row.reason.clone().unwrap_or_default();
            match row.r#type.as_str() {
                "earn" => Ok(LedgerOp::Credit {
                    user: row.user,
                    scope: row.scope,
                    amount: parse_amount(row.amount.as_deref(), line, "earn")?,
                    txn_type: TransactionType::Earn,
                    reason,
                }),
                "spend" => Ok(LedgerOp::Debit {
                    user: row.user,
                    scope: row.scope,
                    amount: parse_amount(row.amount.as_deref(), line, "spend")?,
                    txn_type: TransactionType::Spend,
                    reason,
                }),
                "collect" => Ok(LedgerOp::Debit {
                    user: row.user,
                    scope: row.scope,
                    amount: parse_amount(row.amount.as_deref(), line, "collect")?,
                    txn_type: TransactionType::Collect,
                    reason,
                }),
                "burn" => Ok(LedgerOp::Debit {
                    user: row.user,
                    scope: row.scope,
                    amount: parse_amount(row.amount.as_deref(), line, "burn")?,
                    txn_type: TransactionType::Burn,
                    reason,
                }),
                "transfer" => Ok(LedgerOp::Transfer {
                    from: row.user,
                    to: row
                        .counterparty
                        .ok_or(CsvError::MissingCounterparty { line })?,
                    scope: row.scope,
                    amount: parse_amount(row.amount.as_deref(), line, "transfer")?,
                    message: row.reason,
                }),
                "freeze" => Ok(LedgerOp::Freeze {
                    user: row.user,
                    scope: row.scope,
                }),
                "unfreeze" => Ok(LedgerOp::Unfreeze {
                    user: row.user,
                    scope: row.scope,
                }),
                other => Err(CsvError::UnrecognizedType {
                    line,
                    op_type: other.to_string(),
                }),
            }
        })
}

/// write account balances to stdout in csv format
pub fn write_balances(balances: impl IntoIterator<Item = Balance>) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    for balance in balances {
        let row = OutputRow {
            user: balance.user,
            scope: balance.scope,
            current: balance.current.to_string(),
            earned: balance.total_earned.to_string(),
            purchased: balance.total_purchased.to_string(),
            spent: balance.total_spent.to_string(),
            collected: balance.total_collected.to_string(),
            frozen: balance.frozen,
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}
