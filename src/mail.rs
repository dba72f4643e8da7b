//! Outbound email: SMTP in production, a disabled stand-in when unconfigured.

use std::sync::Mutex;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::auth::otp::OTP_TTL;
use crate::config::SmtpConfig;
use crate::model::{ImovelResumo, NovoLead};
use crate::{AppError, AppResult};

pub const MAIL_DISABLED_CODE: &str = "MAIL/DISABLED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
    pub reply_to: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn enabled(&self) -> bool;
    async fn send(&self, email: Email) -> AppResult<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Port 465 uses implicit TLS, anything else STARTTLS.
    pub fn new(cfg: &SmtpConfig) -> AppResult<Self> {
        let builder = if cfg.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)?
        };
        let mut builder = builder.port(cfg.port).timeout(Some(cfg.timeout));
        if let (Some(user), Some(pass)) = (&cfg.user, &cfg.pass) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self {
            transport: builder.build(),
            from: cfg.from.parse()?,
        })
    }

    fn message(&self, email: &Email) -> AppResult<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse()?)
            .subject(email.subject.clone());
        if let Some(reply_to) = &email.reply_to {
            builder = builder.reply_to(reply_to.parse()?);
        }
        let message = match &email.html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                html.clone(),
            ))?,
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(email.text.clone())?,
        };
        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, email: Email) -> AppResult<()> {
        let message = self.message(&email)?;
        self.transport.send(message).await?;
        tracing::info!(target: "imobiliaria", event = "mail_sent", subject = %email.subject);
        Ok(())
    }
}

/// Used when SMTP is not configured or failed to initialise.
#[derive(Debug, Default)]
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    fn enabled(&self) -> bool {
        false
    }

    async fn send(&self, _email: Email) -> AppResult<()> {
        Err(AppError::new(MAIL_DISABLED_CODE, "Envio de email não configurado"))
    }
}

/// Keeps every message instead of sending it. Optionally fails each send.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Every attempted message, including failed ones.
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, email: Email) -> AppResult<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(email);
        if self.fail {
            return Err(AppError::new("MAIL/TRANSPORT", "falha simulada de envio"));
        }
        Ok(())
    }
}

/// Build the configured mailer. Misconfiguration is logged and yields a disabled mailer.
pub fn from_config(cfg: Option<&SmtpConfig>) -> Box<dyn Mailer> {
    let Some(cfg) = cfg else {
        tracing::warn!(target: "imobiliaria", event = "mail_disabled", reason = "smtp_not_configured");
        return Box::new(DisabledMailer);
    };
    match SmtpMailer::new(cfg) {
        Ok(mailer) => {
            tracing::info!(target: "imobiliaria", event = "mail_ready", host = %cfg.host, port = cfg.port);
            Box::new(mailer)
        }
        Err(err) => {
            tracing::error!(target: "imobiliaria", event = "mail_init_failed", host = %cfg.host, error = %err);
            Box::new(DisabledMailer)
        }
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn lead_notification(to: &str, lead: &NovoLead, imovel: Option<&ImovelResumo>) -> Email {
    let referencia = match imovel {
        Some(i) if !i.titulo.is_empty() => format!("{} ({})", i.titulo, i.id),
        _ => lead.imovel_id.clone(),
    };
    let email = lead.cliente_email.as_deref().unwrap_or("não informado");
    let mensagem = lead.mensagem.as_deref().unwrap_or("");
    let text = format!(
        "Novo interesse no imóvel {referencia}\n\n\
         Nome: {}\nTelefone: {}\nEmail: {email}\n\nMensagem:\n{mensagem}\n",
        lead.cliente_nome, lead.cliente_telefone
    );
    let html = format!(
        "<h2>Novo interesse no imóvel {}</h2>\
         <p><strong>Nome:</strong> {}<br><strong>Telefone:</strong> {}<br><strong>Email:</strong> {}</p>\
         <p>{}</p>",
        escape_html(&referencia),
        escape_html(&lead.cliente_nome),
        escape_html(&lead.cliente_telefone),
        escape_html(email),
        escape_html(mensagem).replace('\n', "<br>"),
    );
    Email {
        to: to.to_string(),
        subject: format!("Novo lead: {referencia}"),
        text,
        html: Some(html),
        reply_to: lead.cliente_email.clone(),
    }
}

pub fn otp_email(to: &str, code: &str) -> Email {
    let minutos = OTP_TTL.as_secs() / 60;
    Email {
        to: to.to_string(),
        subject: "Seu código de acesso".to_string(),
        text: format!("Seu código de acesso é {code}. Ele expira em {minutos} minutos."),
        html: None,
        reply_to: None,
    }
}

/// One delivery attempt for a lead notification. Failures are logged and reported as `false`.
pub async fn notify_lead(
    mailer: &dyn Mailer,
    to: Option<&str>,
    lead: &NovoLead,
    imovel: Option<&ImovelResumo>,
) -> bool {
    let Some(to) = to else {
        tracing::warn!(target: "imobiliaria", event = "lead_mail_skipped", reason = "no_recipient");
        return false;
    };
    match mailer.send(lead_notification(to, lead, imovel)).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                target: "imobiliaria",
                event = "lead_mail_failed",
                imovel_id = %lead.imovel_id,
                code = %err.code,
                error = %err.message,
            );
            false
        }
    }
}
