//! PRTG historic-data API
//!
//! Fetches the same CSV a manual export produces from
//! `{url}/api/historicdata.csv`, covering whole days from `days` before the
//! end date up to the end of the end date.

use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use log::{debug, info};
use reqwest::Url;
use reqwest::blocking::Client;

use crate::config::PrtgServer;
use crate::error::RetrievalError;

const HISTORY_PATH: &str = "/api/historicdata.csv";

/// Leading part of an error body kept in [`RetrievalError::Status`]
const ERROR_BODY_CHARS: usize = 150;

/// Blocking client for one PRTG server, shared by all sensor threads
#[derive(Debug)]
pub struct PrtgClient {
    server: PrtgServer,
    http: Client,
}

impl PrtgClient {
    pub fn new(server: &PrtgServer) -> Result<Self, RetrievalError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(server.timeout_secs))
            .danger_accept_invalid_certs(server.accept_invalid_certs)
            .build()
            .map_err(RetrievalError::Client)?;

        Ok(Self {
            server: server.clone(),
            http,
        })
    }

    /// Request URL for the history of `sensor_id` ending on `end`'s date
    pub fn history_url(
        &self,
        sensor_id: &str,
        days: u32,
        end: NaiveDateTime,
    ) -> Result<Url, RetrievalError> {
        let start = TimeDelta::try_days(i64::from(days))
            .and_then(|window| end.checked_sub_signed(window))
            .unwrap_or(end);

        let mut params = vec![
            ("id", sensor_id.to_string()),
            ("sdate", start.format("%Y-%m-%d-00-00-00").to_string()),
            ("edate", end.format("%Y-%m-%d-23-59-59").to_string()),
            ("avg", self.server.average_secs.to_string()),
        ];
        if let Some(username) = &self.server.username {
            params.push(("username", username.clone()));
        }
        if let Some(password) = &self.server.password {
            params.push(("password", password.clone()));
        }

        let base = self.server.url.trim().trim_end_matches('/');
        let endpoint = format!("{base}{HISTORY_PATH}");
        Url::parse_with_params(&endpoint, &params).map_err(|error| RetrievalError::InvalidUrl {
            url: base.to_string(),
            reason: error.to_string(),
        })
    }

    /// Fetch the historic-data CSV of one sensor
    ///
    /// Any status other than 200 is an error carrying the start of the body.
    pub fn fetch_history(
        &self,
        sensor_id: &str,
        days: u32,
        end: NaiveDateTime,
    ) -> Result<String, RetrievalError> {
        let url = self.history_url(sensor_id, days, end)?;
        debug!("Fetching sensor {} history (last {} days)", sensor_id, days);

        let response = self
            .http
            .get(url)
            .send()
            .map_err(|error| RetrievalError::Connection(error.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|error| RetrievalError::Connection(error.without_url()))?;

        if status != reqwest::StatusCode::OK {
            return Err(RetrievalError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_CHARS).collect(),
            });
        }

        info!("Retrieved {} bytes for sensor {}", body.len(), sensor_id);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn end() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(9, 41, 0)
            .unwrap()
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_history_url() {
        let mut server = PrtgServer::new("https://prtg.example.net/");
        server.username = Some("reports".into());
        server.password = Some("p&ss word".into());
        let client = PrtgClient::new(&server).unwrap();

        let url = client.history_url("2041", 2, end()).unwrap();
        assert_eq!(url.path(), "/api/historicdata.csv");

        let query = query(&url);
        assert_eq!(query["id"], "2041");
        assert_eq!(query["sdate"], "2025-03-12-00-00-00");
        assert_eq!(query["edate"], "2025-03-14-23-59-59");
        assert_eq!(query["avg"], "300");
        assert_eq!(query["username"], "reports");
        assert_eq!(query["password"], "p&ss word");
    }

    #[test]
    fn test_history_url_without_credentials() {
        let mut server = PrtgServer::new("http://10.0.0.5:8080");
        server.average_secs = 60;
        let client = PrtgClient::new(&server).unwrap();

        let query = query(&client.history_url("7", 0, end()).unwrap());
        assert_eq!(query["sdate"], "2025-03-14-00-00-00");
        assert_eq!(query["avg"], "60");
        assert!(!query.contains_key("username"));
        assert!(!query.contains_key("password"));
    }

    #[test]
    fn test_unparseable_server_url() {
        let client = PrtgClient::new(&PrtgServer::new("http://exa mple")).unwrap();
        let err = client.history_url("1", 1, end()).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidUrl { .. }));
    }
}
