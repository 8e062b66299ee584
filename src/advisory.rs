//! Human guidance on planned leave. Never gates a decision.

use std::time::Duration;

use chrono::NaiveDate;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::model::{LeaveRequest, User};

pub trait Advisor: Send + Sync {
    fn advise<'a>(
        &'a self,
        user: &'a User,
        start: NaiveDate,
        end: NaiveDate,
        requests: &'a [LeaveRequest],
    ) -> BoxFuture<'a, String>;
}

pub fn fallback_advice(user: &User) -> String {
    format!(
        "Coverage at {} for the {} team looks standard. Please ensure your tasks are handed over.",
        user.branch, user.department
    )
}

/// Only leave from the user's own branch and department is relevant.
pub fn build_prompt(user: &User, start: NaiveDate, end: NaiveDate, requests: &[LeaveRequest]) -> String {
    let team: Vec<_> = requests
        .iter()
        .filter(|r| r.department == user.department && r.branch == user.branch)
        .map(|r| {
            json!({
                "user": r.user_name,
                "start": r.start_date(),
                "end": r.end_date(),
                "status": r.status,
            })
        })
        .collect();

    format!(
        "Context:\n\
         User: {name} ({role} in {dept} at {branch})\n\
         Proposed Leave: {start} to {end}\n\
         Existing Branch-Specific Leaves: {team}\n\n\
         Task:\n\
         Review this leave request for the {branch} location. Coverage is at risk \
         if more than 20% of the local {dept} team is out. Consider seasonal peaks \
         such as December and mid-year. If leave overlaps at this branch, suggest \
         checking with local colleagues.\n\n\
         Format:\n\
         Two concise, professional sentences that mention \"{branch}\".",
        name = user.name,
        role = user.role,
        dept = user.department,
        branch = user.branch,
        team = serde_json::Value::from(team),
    )
}

/// Always answers with the fallback sentence.
#[derive(Debug, Default, Clone)]
pub struct StaticAdvisor;

impl Advisor for StaticAdvisor {
    fn advise<'a>(
        &'a self,
        user: &'a User,
        _start: NaiveDate,
        _end: NaiveDate,
        _requests: &'a [LeaveRequest],
    ) -> BoxFuture<'a, String> {
        Box::pin(async move { fallback_advice(user) })
    }
}

#[derive(Serialize)]
struct AdvisoryRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct AdvisoryReply {
    text: String,
}

/// Posts the prompt to a text-generation endpoint answering `{"text": ...}`.
pub struct HttpAdvisor {
    endpoint: reqwest::Url,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl HttpAdvisor {
    pub const TIMEOUT: Duration = Duration::from_secs(8);

    pub fn new(endpoint: &str, api_key: Option<String>) -> anyhow::Result<Self> {
        let endpoint = reqwest::Url::parse(endpoint)?;
        let http = reqwest::Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self {
            endpoint,
            api_key,
            http,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, reqwest::Error> {
        let mut request = self
            .http
            .post(self.endpoint.clone())
            .json(&AdvisoryRequest { prompt });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let reply: AdvisoryReply = request.send().await?.error_for_status()?.json().await?;
        Ok(reply.text)
    }
}

impl Advisor for HttpAdvisor {
    fn advise<'a>(
        &'a self,
        user: &'a User,
        start: NaiveDate,
        end: NaiveDate,
        requests: &'a [LeaveRequest],
    ) -> BoxFuture<'a, String> {
        Box::pin(async move {
            let prompt = build_prompt(user, start, end, requests);
            match self.generate(&prompt).await {
                Ok(text) if !text.trim().is_empty() => text,
                Ok(_) => fallback_advice(user),
                Err(e) => {
                    tracing::warn!(error = %e, user = %user.name, "advisory unavailable, using fallback");
                    fallback_advice(user)
                }
            }
        })
    }
}
