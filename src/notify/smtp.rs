use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use crate::{
    config::{SMTP_PASSWORD_VAR, SmtpConfig, SmtpSecurity},
    models::task::TaskRecord,
    notify::{NotificationError, Notifier, ReminderMessage},
};

pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotificationError> {
    address
        .trim()
        .parse()
        .map_err(|e| NotificationError::InvalidAddress {
            address: address.to_string(),
            source: e,
        })
}

impl SmtpNotifier {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, NotificationError> {
        let (Some(host), Some(from)) = (config.host.as_deref(), config.from.as_deref()) else {
            return Err(NotificationError::NotConfigured);
        };
        let from = parse_mailbox(from)?;

        let builder = match config.security {
            SmtpSecurity::Tls => SmtpTransport::relay(host)?,
            SmtpSecurity::StartTls => SmtpTransport::starttls_relay(host)?,
            SmtpSecurity::None => SmtpTransport::builder_dangerous(host),
        };
        let mut builder = builder.port(config.port);

        match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
            }
            (Some(username), None) => {
                log::warn!(
                    "SMTP username '{}' is set but {} is not, sending without authentication",
                    username,
                    SMTP_PASSWORD_VAR
                );
            }
            _ => {}
        }

        log::debug!("SMTP notifier ready for {}:{}", host, config.port);
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, record: &TaskRecord, address: &str) -> Result<Message, NotificationError> {
        let to = parse_mailbox(address)?;
        let reminder = ReminderMessage::for_record(record);

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(reminder.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(reminder.body)?;
        Ok(message)
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, record: &TaskRecord, address: &str) -> Result<(), NotificationError> {
        let message = self.build_message(record, address)?;
        self.transport.send(&message)?;
        log::info!("Sent reminder for task {} to {}", record.id, address);
        Ok(())
    }
}
