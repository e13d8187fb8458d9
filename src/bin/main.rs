// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use teller_rs::{
    Account, AccountId, AccountLifecycle, AccountStore, CustomerDirectory, CustomerId,
    InMemoryDirectory, LedgerError, LedgerService, Storage,
};
use tracing_subscriber::EnvFilter;

/// Teller - Process banking operation CSV files
///
/// Reads operations from a CSV file and outputs final account states to
/// stdout. Supports opening and closing accounts, deposits, withdrawals,
/// and transfers.
#[derive(Parser, Debug)]
#[command(name = "teller-rs")]
#[command(about = "A banking ledger that processes operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,account,customer,type,amount,to
    /// Example: cargo run -- operations.csv > accounts.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Known customer identifiers, comma separated
    ///
    /// When given, open operations are admitted only for these customers;
    /// when omitted, every customer passes the existence check.
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    customers: Option<Vec<u32>>,
}

fn main() {
    // Logs go to stderr so the CSV output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args = Args::parse();

    // Open input file
    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let app = App::new(args.customers);

    // Process operations from CSV
    if let Err(e) = process_operations(&app, BufReader::new(file)) {
        eprintln!("Error processing operations: {}", e);
        process::exit(1);
    }

    // Write results to stdout
    if let Err(e) = write_accounts(&app, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }

    app.shutdown();
}

/// Directory that admits every customer, used when no --customers list is
/// given.
struct AdmitAll;

impl CustomerDirectory for AdmitAll {
    fn exists(&self, _customer_id: CustomerId) -> bool {
        true
    }
}

/// Ledger services wired to one storage handle for the driver's lifetime.
pub struct App {
    storage: Storage,
    store: AccountStore,
    ledger: LedgerService,
    lifecycle: AccountLifecycle,
}

impl App {
    pub fn new(customers: Option<Vec<u32>>) -> Self {
        let storage = Storage::open();
        let directory: Arc<dyn CustomerDirectory> = match customers {
            Some(ids) => Arc::new(
                ids.into_iter()
                    .map(CustomerId)
                    .collect::<InMemoryDirectory>(),
            ),
            None => Arc::new(AdmitAll),
        };
        Self {
            store: AccountStore::new(storage.clone()),
            ledger: LedgerService::new(storage.clone()),
            lifecycle: AccountLifecycle::new(storage.clone(), directory),
            storage,
        }
    }

    fn apply(&self, operation: Operation) -> Result<(), LedgerError> {
        match operation {
            Operation::Open {
                customer,
                account_type,
                opening_balance,
            } => {
                self.lifecycle.open(customer, &account_type, opening_balance)?;
            }
            Operation::Deposit { account, amount } => {
                self.ledger.deposit(account, amount)?;
            }
            Operation::Withdraw { account, amount } => {
                self.ledger.withdraw(account, amount)?;
            }
            Operation::Transfer { from, to, amount } => {
                self.ledger.transfer(from, to, amount)?;
            }
            Operation::Close { account } => {
                self.lifecycle.close(account)?;
            }
        }
        Ok(())
    }

    /// Snapshots of all accounts, ordered by identifier. The driver keeps
    /// its storage open until shutdown, so this cannot fail.
    pub fn accounts(&self) -> Vec<Account> {
        self.store.accounts().unwrap_or_default()
    }

    pub fn shutdown(&self) {
        self.storage.shutdown();
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, account, customer, type, amount, to`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    account: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    customer: Option<u32>,
    #[serde(rename = "type")]
    account_type: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(deserialize_with = "csv::invalid_option")]
    to: Option<u32>,
}

#[derive(Debug)]
enum Operation {
    Open {
        customer: CustomerId,
        account_type: String,
        opening_balance: Decimal,
    },
    Deposit {
        account: AccountId,
        amount: Decimal,
    },
    Withdraw {
        account: AccountId,
        amount: Decimal,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    },
    Close {
        account: AccountId,
    },
}

impl CsvRecord {
    /// Converts a CSV record to an Operation.
    ///
    /// Returns `None` for unknown operations or missing required fields.
    fn into_operation(self) -> Option<Operation> {
        match self.op.to_lowercase().as_str() {
            "open" => Some(Operation::Open {
                customer: CustomerId(self.customer?),
                account_type: self.account_type?,
                opening_balance: self.amount?,
            }),
            "deposit" => Some(Operation::Deposit {
                account: AccountId(self.account?),
                amount: self.amount?,
            }),
            "withdraw" | "withdrawal" => Some(Operation::Withdraw {
                account: AccountId(self.account?),
                amount: self.amount?,
            }),
            "transfer" => Some(Operation::Transfer {
                from: AccountId(self.account?),
                to: AccountId(self.to?),
                amount: self.amount?,
            }),
            "close" => Some(Operation::Close {
                account: AccountId(self.account?),
            }),
            _ => None,
        }
    }
}

/// Process operations from a CSV reader.
///
/// This function uses streaming parsing to handle arbitrarily large CSV
/// files without loading the entire file into memory. Malformed rows,
/// unknown operations, and operations the ledger rejects are skipped.
///
/// # CSV Format
///
/// Expected columns: `op, account, customer, type, amount, to`
/// - `op`: Operation (open, deposit, withdraw, transfer, close)
/// - `account`: Account ID (u32); the source account for transfers
/// - `customer`: Customer ID (u32), required by open
/// - `type`: Account type label, required by open
/// - `amount`: Decimal amount; the opening balance for open
/// - `to`: Destination account ID (u32), required by transfer
///
/// Accounts receive sequential identifiers starting at 1, so a file that
/// opens accounts first can address them by position.
///
/// # Example
///
/// ```csv
/// op,account,customer,type,amount,to
/// open,,1,Savings,100.00,
/// deposit,1,,,50.00,
/// open,,2,Checking,0.00,
/// transfer,1,,,30.00,2
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails. Individual operation failures
/// are logged in debug mode but don't stop processing.
pub fn process_operations<R: Read>(app: &App, reader: R) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All) // Handle whitespace in fields like " deposit "
        .flexible(true) // Allow missing trailing fields
        .has_headers(true) // Skip first row as header
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                // Convert CSV record to an operation
                let Some(operation) = record.into_operation() else {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping invalid operation record");
                    continue;
                };

                // Apply the operation, ignoring failures (silent skip)
                if let Err(e) = app.apply(operation) {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping operation: {}", e);
                }
            }
            Err(e) => {
                // Skip malformed rows
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", e);
                continue;
            }
        }
    }

    Ok(())
}

/// Write account states to a CSV writer
///
/// Outputs all remaining accounts in CSV format with 2 decimal precision,
/// ordered by account identifier.
///
/// # CSV Format
///
/// Columns: `account, customer, type, balance`
///
/// # Example
///
/// ```csv
/// account,customer,type,balance
/// 1,1,Savings,120.00
/// 2,2,Checking,30.00
/// ```
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_accounts<W: Write>(app: &App, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    // Get all account snapshots and serialize each one
    for account in app.accounts() {
        wtr.serialize(&account)?;
    }

    // Flush to ensure all data is written
    wtr.flush()?;
    Ok(())
}
