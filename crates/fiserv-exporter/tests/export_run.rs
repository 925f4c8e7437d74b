//! A full export against a canned portal, written to CSV.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use fiserv_exporter::config::ExporterConfig;
use fiserv_exporter::daemon::{export_once, orchestrator_with};
use fiserv_exporter::export::CsvExporter;
use fiserv_session::{HttpRequest, HttpResponse, Pacing, Transport, TransportError};

struct Replay(Mutex<VecDeque<HttpResponse>>);

#[async_trait]
impl Transport for Replay {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut resp = self
            .0
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::Network("no more responses".to_string()))?;
        resp.url = request.url;
        Ok(resp)
    }
}

fn resp(status: u16, headers: &[(&str, &str)], cookies: &[&str], body: String) -> HttpResponse {
    HttpResponse {
        url: String::new(),
        status,
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        set_cookies: cookies.iter().map(|c| c.to_string()).collect(),
        body,
    }
}

const JSON: (&str, &str) = ("content-type", "application/json; charset=utf-8");

fn script() -> Vec<HttpResponse> {
    vec![
        resp(
            302,
            &[(
                "location",
                "https://retailonline.fiservapps.com/MFA/SecurityChallenge?Token=abc%3D",
            )],
            &[
                "SessionContext=242170549_1",
                "PBISession=CfDJ8pb",
                "PMData=pm1%253D%253D",
                "TS01d4e29a=0a1b",
            ],
            String::new(),
        ),
        resp(
            200,
            &[],
            &[
                "__RequestVerificationCookie=rv",
                "PMData=pm2%253D%253D",
                "TS01d4e29a=0a2b",
            ],
            "<!DOCTYPE html>\nPBI.antiForgeryToken = \"af_1-2\";\nWhat is the name of your first employer?\n"
                .to_string(),
        ),
        resp(
            200,
            &[JSON],
            &["Auth=au", "PMData=pm3%253D%253D", "TS01d4e29a=0a3b"],
            json!({"success": true, "redirectUrl": "https://retailonline.fiservapps.com/?Token=def"})
                .to_string(),
        ),
        resp(
            200,
            &[],
            &[],
            "<!DOCTYPE html>\nPBI.pageNonce = \"nonce+1=\";\n".to_string(),
        ),
        resp(
            200,
            &[JSON],
            &[],
            json!([{
                "accountId": "a1",
                "balanceAmount": "$10.00",
                "balanceDescription": "Current Balance",
                "canChangeNickname": false,
                "canHaveTransactions": true,
                "canViewTransactions": true,
                "name": "Free Checking",
                "type": 0,
                "number": "*9876",
                "isHidden": false,
                "canTransfer": false,
                "unformattedBalanceAmount": 10.0
            }])
            .to_string(),
        ),
        resp(
            200,
            &[JSON],
            &[],
            json!({
                "hasMore": false,
                "archivedTransactionsErrored": false,
                "isSuccessful": true,
                "transactions": [{
                    "amount": "$3.50",
                    "balance": "$10.00",
                    "creditDebitIndicator": "credit",
                    "description": "INTEREST\tPAID",
                    "tranDate": "02/01/2023",
                    "postingStatus": "Posted",
                    "transactionId": "x1",
                    "hasImage": false,
                    "unformattedBalance": "10.00"
                }]
            })
            .to_string(),
        ),
    ]
}

#[tokio::test]
async fn export_writes_account_and_transaction_files() {
    let config = ExporterConfig {
        url: "https://www.bluegrassfederal.com/".to_string(),
        username: "jane".to_string(),
        password: "hunter2".to_string(),
        sec_employer: "Acme".to_string(),
        ..ExporterConfig::default()
    }
    .resolve()
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let exporter = CsvExporter::new(dir.path());
    let orchestrator = orchestrator_with(
        Replay(Mutex::new(script().into())),
        &config,
        Pacing::immediate(),
    );

    let exports = export_once(&orchestrator, &exporter).await.unwrap();
    assert_eq!(exports.len(), 1);

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names.iter().any(|n| n.ends_with("-account-free_checking.csv")));
    let txns = names
        .iter()
        .find(|n| n.ends_with("-txns-free_checking.csv"))
        .unwrap();

    let contents = std::fs::read_to_string(dir.path().join(txns)).unwrap();
    assert_eq!(
        contents,
        "amount,balance,creditDebitIndicator,description,tranDate\n\
         $3.50,$10.00,credit,INTEREST PAID,02/01/2023\n"
    );
}
