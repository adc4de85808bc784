//! Support inbox

use super::PesaClient;
use super::error::ClientError;
use crate::types::{ContactBody, ContactMessage, ContactReply};
use reqwest::{Method, StatusCode};

impl PesaClient {
    /// Send a message to support; no login required
    ///
    /// Returns the server's confirmation text.
    pub async fn send_contact_message(
        &self,
        contact: &ContactMessage,
    ) -> Result<String, ClientError> {
        let request = self
            .request(Method::POST, "/api/contact/send/")
            .json(&ContactBody::from(contact));
        let reply: Option<ContactReply> = self.execute_public(request).await?;
        let reply = reply.unwrap_or_default();

        match (reply.success, reply.error) {
            (_, Some(error)) => Err(ClientError::from_status(StatusCode::BAD_REQUEST, error)),
            (Some(success), None) => Ok(success),
            (None, None) => Ok("Message sent".to_string()),
        }
    }
}
