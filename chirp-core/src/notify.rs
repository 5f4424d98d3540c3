//! 通知邮件能力：SMTP 发送与开发环境的日志替身

use crate::error::{AuthError, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

/// 邮件发送能力；调用方负责失败时只记日志
#[async_trait]
pub trait Mailer: Send + Sync {
    /// 发送一封纯文本邮件
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// SMTP 邮件发送器
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// 创建 SMTP 发送器；`from` 形如 `Chirp <noreply@example.com>`
    pub fn new(
        host: &str,
        port: u16,
        username: String,
        password: String,
        from: &str,
    ) -> Result<Self> {
        let from = from
            .parse::<Mailbox>()
            .map_err(|e| AuthError::Mail(format!("invalid from address: {}", e)))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| AuthError::Mail(format!("smtp relay error: {}", e)))?
            .port(port)
            .credentials(Credentials::new(username, password))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to
                .parse()
                .map_err(|e| AuthError::Mail(format!("invalid recipient: {}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AuthError::Mail(format!("failed to build message: {}", e)))?;
        self.transport
            .send(message)
            .await
            .map_err(|e| AuthError::Mail(format!("smtp send failed: {}", e)))?;
        Ok(())
    }
}

/// 开发 / 测试环境的替身：邮件只写进日志，不真正外发
#[derive(Debug, Default)]
pub struct TraceMailer;

#[async_trait]
impl Mailer for TraceMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        info!(to = %to, subject = %subject, body = %body, "mail (not sent)");
        Ok(())
    }
}
