//! XQueue HTTP 客户端
//!
//! 提交接口为表单 POST `{base}/xqueue/submit/`，会话失效时队列返回
//! `login_required`，此时登录一次后重试。

use crate::queue::CertificateQueue;
use async_trait::async_trait;
use coursehub_common::xqueue::{XQueueHeader, XQueueReply};
use coursehub_common::{AppConfig, CoursehubError, Result};
use serde_json::Value as JsonValue;
use std::time::Duration;

const LOGIN_REQUIRED: &str = "login_required";

pub struct XQueueClient {
    http: reqwest::Client,
    base_url: String,
    login: Option<(String, String)>,
    basic_auth: Option<(String, String)>,
}

impl XQueueClient {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.xqueue_timeout_secs))
            .build()?;
        let login = match (&config.xqueue_username, &config.xqueue_password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        };
        Ok(Self {
            http,
            base_url: config.xqueue_url.trim_end_matches('/').to_string(),
            login,
            basic_auth: config.xqueue_basic_auth.clone(),
        })
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<XQueueReply> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.post(&url).form(form);
        if let Some((user, password)) = &self.basic_auth {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await.map_err(|err| {
            tracing::warn!(url = %url, error = %err, "XQueue request failed");
            CoursehubError::queue("cannot connect to server")
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(CoursehubError::queue(format!(
                "unexpected HTTP status code [{}]",
                status.as_u16()
            )));
        }
        response
            .json::<XQueueReply>()
            .await
            .map_err(|_| CoursehubError::queue("unexpected reply from server"))
    }

    async fn login(&self) -> Result<()> {
        let Some((user, password)) = &self.login else {
            return Err(CoursehubError::queue("login required but no credentials configured"));
        };
        let reply = self
            .post_form(
                "/xqueue/login/",
                &[("username", user.as_str()), ("password", password.as_str())],
            )
            .await?;
        if reply.return_code != 0 {
            return Err(CoursehubError::queue(format!(
                "login failed: {}",
                reply_content(&reply)
            )));
        }
        tracing::info!("logged in to XQueue");
        Ok(())
    }

    async fn submit(&self, header: &str, body: &str) -> Result<XQueueReply> {
        self.post_form(
            "/xqueue/submit/",
            &[("xqueue_header", header), ("xqueue_body", body)],
        )
        .await
    }
}

fn reply_content(reply: &XQueueReply) -> String {
    match &reply.content {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl CertificateQueue for XQueueClient {
    async fn send_to_queue(&self, header: &XQueueHeader, body: &JsonValue) -> Result<()> {
        let header = serde_json::to_string(header)?;
        let body = body.to_string();

        let mut reply = self.submit(&header, &body).await?;
        if reply.return_code != 0 && reply_content(&reply) == LOGIN_REQUIRED {
            self.login().await?;
            reply = self.submit(&header, &body).await?;
        }

        if reply.return_code != 0 {
            return Err(CoursehubError::queue(format!(
                "submission rejected: {}",
                reply_content(&reply)
            )));
        }
        Ok(())
    }
}
