//! Async HTTP client wrapping the courtbook JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use courtbook_core::{
  member::MemberView,
  ops::Renewal,
  reconcile::ReconcileReport,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

/// Connection settings for the courtbook API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// The two alert buckets returned by `GET /alerts`.
#[derive(Debug, Deserialize)]
pub struct Alerts {
  pub expiring: Vec<MemberView>,
  pub ended:    Vec<MemberView>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustResponse {
  pub remaining_credits: i64,
}

/// Async HTTP client for the courtbook JSON REST API.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  // ── Members ───────────────────────────────────────────────────────────────

  /// `GET /members`
  pub async fn list_members(&self) -> Result<Vec<MemberView>> {
    let resp = self
      .auth(self.client.get(self.url("/members")))
      .send()
      .await
      .context("GET /members failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /members → {}", resp.status()));
    }
    resp.json().await.context("deserialising members")
  }

  /// `POST /members/{id}/adjust`
  pub async fn adjust_credits(
    &self,
    member_id: i64,
    delta: i64,
  ) -> Result<AdjustResponse> {
    let resp = self
      .auth(self.client.post(self.url(&format!("/members/{member_id}/adjust"))))
      .json(&json!({ "delta": delta }))
      .send()
      .await
      .context("POST /members/{id}/adjust failed")?;

    if resp.status() == StatusCode::NOT_FOUND {
      return Err(anyhow!("member {member_id} not found"));
    }
    if !resp.status().is_success() {
      return Err(anyhow!("POST /members/{member_id}/adjust → {}", resp.status()));
    }
    resp.json().await.context("deserialising adjust response")
  }

  /// `POST /members/{id}/renew`
  pub async fn renew_membership(
    &self,
    member_id: i64,
    credits: Option<i64>,
    until: Option<NaiveDate>,
  ) -> Result<Renewal> {
    let mut body = json!({});
    if let Some(credits) = credits {
      body["credits"] = json!(credits);
    }
    if let Some(until) = until {
      body["until"] = json!(until);
    }

    let resp = self
      .auth(self.client.post(self.url(&format!("/members/{member_id}/renew"))))
      .json(&body)
      .send()
      .await
      .context("POST /members/{id}/renew failed")?;

    if resp.status() == StatusCode::NOT_FOUND {
      return Err(anyhow!("member {member_id} not found"));
    }
    if !resp.status().is_success() {
      return Err(anyhow!("POST /members/{member_id}/renew → {}", resp.status()));
    }
    resp.json().await.context("deserialising renewal")
  }

  // ── Attendance ────────────────────────────────────────────────────────────

  /// `POST /reconcile`
  pub async fn reconcile(
    &self,
    as_of: Option<NaiveDate>,
  ) -> Result<ReconcileReport> {
    let body = match as_of {
      Some(date) => json!({ "as_of": date }),
      None => json!({}),
    };
    let resp = self
      .auth(self.client.post(self.url("/reconcile")))
      .json(&body)
      .send()
      .await
      .context("POST /reconcile failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("POST /reconcile → {}", resp.status()));
    }
    resp.json().await.context("deserialising reconcile report")
  }

  /// `GET /alerts`
  pub async fn alerts(&self) -> Result<Alerts> {
    let resp = self
      .auth(self.client.get(self.url("/alerts")))
      .send()
      .await
      .context("GET /alerts failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /alerts → {}", resp.status()));
    }
    resp.json().await.context("deserialising alerts")
  }
}
