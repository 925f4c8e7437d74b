//! CSV files under an output directory, one per account and one per
//! account's transaction list.

use std::path::{Path, PathBuf};

use chrono::Utc;
use fiserv_session::orchestrator::{ArtifactSink, SinkError};
use fiserv_session::{Account, Transaction};
use serde::Serialize;

use super::{collapse_whitespace, output_file_name};

const ACCOUNT_COLUMNS: [&str; 6] = [
    "name",
    "balanceAmount",
    "balanceDescription",
    "type",
    "number",
    "unformattedBalanceAmount",
];

const TRANSACTION_COLUMNS: [&str; 5] = [
    "amount",
    "balance",
    "creditDebitIndicator",
    "description",
    "tranDate",
];

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: ::csv::Error,
    },

    #[error("failed to flush {path}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Serialize)]
struct AccountRow<'a> {
    name: &'a str,
    balance_amount: &'a str,
    balance_description: &'a str,
    account_type: i64,
    number: &'a str,
    unformatted_balance_amount: f64,
}

#[derive(Serialize)]
struct TransactionRow<'a> {
    amount: &'a str,
    balance: Option<&'a str>,
    credit_debit_indicator: &'static str,
    description: String,
    tran_date: &'a str,
}

/// Writes export artifacts as CSV.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    output_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn prepare(&self, label: &str, account_name: &str) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| ExportError::CreateDir {
            path: self.output_dir.clone(),
            source,
        })?;
        Ok(self
            .output_dir
            .join(output_file_name(Utc::now(), label, account_name)))
    }

    fn write_rows<R: Serialize>(
        path: &Path,
        columns: &[&str],
        rows: impl IntoIterator<Item = R>,
    ) -> Result<(), ExportError> {
        let write_err = |source| ExportError::Write {
            path: path.to_path_buf(),
            source,
        };
        // Header written by hand so an empty list still gets one.
        let mut writer = ::csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(write_err)?;
        writer.write_record(columns).map_err(write_err)?;
        for row in rows {
            writer.serialize(row).map_err(write_err)?;
        }
        writer.flush().map_err(|source| ExportError::Flush {
            path: path.to_path_buf(),
            source,
        })
    }

    /// One-row account summary.
    pub fn export_account(&self, account: &Account) -> Result<PathBuf, ExportError> {
        tracing::info!("attempting to export account info to csv");
        let path = self.prepare("account", &account.name)?;
        let row = AccountRow {
            name: &account.name,
            balance_amount: &account.balance_amount,
            balance_description: &account.balance_description,
            account_type: account.account_type,
            number: &account.number,
            unformatted_balance_amount: account.unformatted_balance_amount,
        };
        Self::write_rows(&path, &ACCOUNT_COLUMNS, [row])?;
        tracing::info!("wrote account record to {}", path.display());
        Ok(path)
    }

    /// All transactions for one account, in retrieval order.
    pub fn export_transactions(
        &self,
        account_name: &str,
        transactions: &[Transaction],
    ) -> Result<PathBuf, ExportError> {
        tracing::info!("attempting to export transaction info to csv");
        let path = self.prepare("txns", account_name)?;
        let rows = transactions.iter().map(|t| TransactionRow {
            amount: &t.amount,
            balance: t.balance.as_deref(),
            credit_debit_indicator: t.credit_debit_indicator.as_str(),
            description: collapse_whitespace(&t.description, " "),
            tran_date: &t.tran_date,
        });
        Self::write_rows(&path, &TRANSACTION_COLUMNS, rows)?;
        tracing::info!(
            "wrote {} record(s) to {}",
            transactions.len(),
            path.display()
        );
        Ok(path)
    }
}

impl ArtifactSink for CsvExporter {
    fn export_account(&self, account: &Account) -> Result<(), SinkError> {
        CsvExporter::export_account(self, account)?;
        Ok(())
    }

    fn export_transactions(
        &self,
        account: &Account,
        transactions: &[Transaction],
    ) -> Result<(), SinkError> {
        CsvExporter::export_transactions(self, &account.name, transactions)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiserv_session::CreditDebitIndicator;

    fn account(name: &str) -> Account {
        Account {
            account_id: "acct-1".to_string(),
            balance_amount: "$1,204.50".to_string(),
            balance_description: "Available Balance".to_string(),
            can_change_nickname: true,
            can_have_transactions: true,
            can_view_transactions: true,
            name: name.to_string(),
            account_type: 1,
            number: "*1234".to_string(),
            is_hidden: false,
            can_transfer: true,
            unformatted_balance_amount: 1204.5,
        }
    }

    fn txn(description: &str, balance: Option<&str>) -> Transaction {
        Transaction {
            amount: "$12.00".to_string(),
            balance: balance.map(|b| b.to_string()),
            credit_debit_indicator: CreditDebitIndicator::Debit,
            description: description.to_string(),
            tran_date: "01/03/2023".to_string(),
            posting_status: "Posted".to_string(),
            transaction_id: "t1".to_string(),
            has_image: false,
            unformatted_balance: None,
        }
    }

    #[test]
    fn account_file_has_header_and_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path().join("output"));
        let path = exporter.export_account(&account("Holiday Savings")).unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with("-account-holiday_savings.csv"));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "name,balanceAmount,balanceDescription,type,number,unformattedBalanceAmount\n\
             Holiday Savings,\"$1,204.50\",Available Balance,1,*1234,1204.5\n"
        );
    }

    #[test]
    fn transactions_collapse_description_and_blank_null_balance() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path());
        let path = exporter
            .export_transactions(
                "Checking",
                &[txn("COFFEE   SHOP\n #12", None), txn("PAYROLL", Some("$900.00"))],
            )
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "amount,balance,creditDebitIndicator,description,tranDate\n\
             $12.00,,debit,COFFEE SHOP #12,01/03/2023\n\
             $12.00,$900.00,debit,PAYROLL,01/03/2023\n"
        );
    }

    #[test]
    fn empty_transaction_list_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path());
        let path = exporter.export_transactions("Checking", &[]).unwrap();
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "amount,balance,creditDebitIndicator,description,tranDate\n"
        );
    }

    #[test]
    fn sink_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let exporter = CsvExporter::new(&blocker);
        let sink: &dyn ArtifactSink = &exporter;
        let err = sink.export_account(&account("Checking")).unwrap_err();
        assert!(err.to_string().contains("failed to create output directory"));
    }
}
