use std::time::Duration;

use serde::Serialize;

use crate::error::ProcessorError;

/// One rendered email, ready for the mail API.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutboundMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Delivers mail through an HTTP mail API. The request timeout bounds every
/// send, so a slow relay can't stall the consumer loop indefinitely.
pub struct MailerClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    from: String,
}

impl MailerClient {
    pub fn new(
        endpoint: String,
        token: String,
        from: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            token,
            from,
        })
    }

    pub fn compose(&self, to: String, subject: String, html: String) -> OutboundMail {
        OutboundMail {
            from: self.from.clone(),
            to,
            subject,
            html,
        }
    }

    pub async fn send(&self, mail: &OutboundMail) -> Result<(), ProcessorError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(mail)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProcessorError::DeliveryRejected {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer(endpoint: String) -> MailerClient {
        MailerClient::new(
            endpoint,
            "test-token".to_string(),
            "orders@example.com".to_string(),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[test]
    fn compose_stamps_the_configured_sender() {
        let mailer = mailer("http://localhost/send".to_string());
        let mail = mailer.compose(
            "ada@example.com".to_string(),
            "subject".to_string(),
            "<html></html>".to_string(),
        );
        assert_eq!(mail.from, "orders@example.com");
        assert_eq!(mail.to, "ada@example.com");
    }

    #[tokio::test]
    async fn send_posts_json_with_bearer_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/send")
            .match_header("authorization", "Bearer test-token")
            .match_header("content-type", "application/json")
            .with_status(200)
            .create_async()
            .await;

        let mailer = mailer(format!("{}/send", server.url()));
        let mail = mailer.compose(
            "ada@example.com".to_string(),
            "subject".to_string(),
            "<html></html>".to_string(),
        );
        mailer.send(&mail).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_send_surfaces_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/send")
            .with_status(422)
            .with_body("bad recipient")
            .create_async()
            .await;

        let mailer = mailer(format!("{}/send", server.url()));
        let mail = mailer.compose(
            "nobody".to_string(),
            "subject".to_string(),
            "<html></html>".to_string(),
        );

        let err = mailer.send(&mail).await.unwrap_err();
        match err {
            ProcessorError::DeliveryRejected { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "bad recipient");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
